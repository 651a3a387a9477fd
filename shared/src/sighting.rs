use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

pub const DEFAULT_COOLDOWN: TimeDelta = TimeDelta::seconds(7200);

/// Last accepted notification time per aircraft identifier.
///
/// Callers must pass non-decreasing `now` values; nothing enforces it. Entries
/// are never dropped unless [`SightingRecord::evict_expired`] is called.
#[derive(Debug, Clone)]
pub struct SightingRecord {
    cooldown: TimeDelta,
    last_notified: HashMap<String, DateTime<Utc>>,
}

impl Default for SightingRecord {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl SightingRecord {
    pub fn new(cooldown: TimeDelta) -> Self {
        Self {
            cooldown,
            last_notified: HashMap::new(),
        }
    }

    pub const fn cooldown(&self) -> TimeDelta {
        self.cooldown
    }

    pub fn should_notify(&self, id: &str, now: DateTime<Utc>) -> bool {
        match self.last_notified.get(id) {
            Some(last) => now - *last >= self.cooldown,
            None => true,
        }
    }

    /// Stores `now` for `id` and returns the timestamp it replaced.
    pub fn record(&mut self, id: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.last_notified.insert(id.to_string(), now)
    }

    /// Puts `id` back to the state it had before the matching [`record`](Self::record).
    pub fn restore(&mut self, id: &str, previous: Option<DateTime<Utc>>) {
        match previous {
            Some(t) => {
                self.last_notified.insert(id.to_string(), t);
            }
            None => {
                self.last_notified.remove(id);
            }
        }
    }

    pub fn last_notified(&self, id: &str) -> Option<DateTime<Utc>> {
        self.last_notified.get(id).copied()
    }

    /// Drops entries whose cooldown has elapsed at `now`.
    ///
    /// An expired entry answers `should_notify` the same as a missing one, so
    /// this only reclaims memory.
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.last_notified.len();
        let cooldown = self.cooldown;
        self.last_notified.retain(|_, last| now - *last < cooldown);
        before - self.last_notified.len()
    }

    pub fn len(&self) -> usize {
        self.last_notified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_notified.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn accept(record: &mut SightingRecord, id: &str, now: DateTime<Utc>) -> bool {
        let notify = record.should_notify(id, now);
        if notify {
            record.record(id, now);
        }
        notify
    }

    #[test]
    fn cooldown_suppresses_repeat_sighting() {
        let mut record = SightingRecord::default();
        assert!(accept(&mut record, "AAL100", at(0)));
        assert!(!accept(&mut record, "AAL100", at(100)));
        assert!(accept(&mut record, "AAL100", at(7201)));
    }

    #[test]
    fn cooldown_boundary_is_inclusive() {
        let mut record = SightingRecord::default();
        record.record("UAL1", at(0));
        assert!(!record.should_notify("UAL1", at(7199)));
        assert!(record.should_notify("UAL1", at(7200)));
    }

    #[test]
    fn suppressed_check_does_not_mutate() {
        let mut record = SightingRecord::default();
        accept(&mut record, "AAL100", at(0));
        assert!(!accept(&mut record, "AAL100", at(3600)));
        assert_eq!(record.last_notified("AAL100"), Some(at(0)));
    }

    #[test]
    fn identifiers_are_independent() {
        let mut record = SightingRecord::default();
        assert!(accept(&mut record, "AAL100", at(0)));
        assert!(accept(&mut record, "DAL200", at(10)));
        assert!(!accept(&mut record, "AAL100", at(20)));
        assert!(!accept(&mut record, "DAL200", at(7205)));
        assert!(accept(&mut record, "AAL100", at(7205)));
    }

    #[test]
    fn grows_without_eviction() {
        let mut record = SightingRecord::default();
        for i in 0..500 {
            accept(&mut record, &format!("N{i}"), at(i * 10_000));
        }
        assert_eq!(record.len(), 500);
    }

    #[test]
    fn eviction_only_drops_expired_entries() {
        let mut record = SightingRecord::new(TimeDelta::seconds(100));
        record.record("OLD", at(0));
        record.record("NEW", at(150));
        assert_eq!(record.evict_expired(at(200)), 1);
        assert_eq!(record.len(), 1);
        assert!(record.should_notify("OLD", at(200)));
        assert!(!record.should_notify("NEW", at(200)));
    }

    #[test]
    fn restore_reverts_record() {
        let mut record = SightingRecord::default();
        let previous = record.record("SWA9", at(0));
        record.restore("SWA9", previous);
        assert!(record.is_empty());

        record.record("SWA9", at(0));
        let previous = record.record("SWA9", at(10_000));
        assert_eq!(previous, Some(at(0)));
        record.restore("SWA9", previous);
        assert_eq!(record.last_notified("SWA9"), Some(at(0)));
    }
}
