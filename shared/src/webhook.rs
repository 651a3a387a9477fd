use crate::flightaware::Aircraft;
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use thiserror::Error;
use tracing::instrument;

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

#[derive(Serialize, Debug)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// Destination for sighting messages.
pub trait Notifier {
    fn deliver(&self, message: &str) -> impl Future<Output = Result<(), WebhookError>> + Send;
}

pub fn sighting_message(aircraft: &Aircraft) -> String {
    let ident = aircraft.ident().unwrap_or("unknown");
    let origin = aircraft.origin_code().unwrap_or("unknown");
    let model = aircraft.properties.model.as_deref().unwrap_or("unknown");
    format!("Look up! Thats flight {ident} from {origin}. It's a {model}")
}

/// Posts `{"content": ...}` to a Discord-compatible webhook.
#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
    url: String,
}

impl WebhookClient {
    pub fn new_with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

impl Notifier for WebhookClient {
    #[instrument(skip(self))]
    async fn deliver(&self, message: &str) -> Result<(), WebhookError> {
        self.client
            .post(&self.url)
            .json(&WebhookPayload { content: message })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
