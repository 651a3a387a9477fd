use serde::{Deserialize, Serialize};

/// A geographic position in decimal degrees.
///
/// Serialized as a `[latitude, longitude]` pair so an area can be written as
/// `NW = [47.7, -122.45]` in the settings file.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([latitude, longitude]: [f64; 2]) -> Self {
        Self::new(latitude, longitude)
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(c: Coordinate) -> Self {
        [c.latitude, c.longitude]
    }
}

/// The watched quadrilateral.
///
/// Corners must be supplied in the winding order NW, NE, SE, SW; the edge
/// walk in [`Area::contains`] depends on it. The shape is expected to be
/// simple and convex, but nothing checks that.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Area {
    #[serde(rename = "NW", alias = "nw")]
    pub nw: Coordinate,
    #[serde(rename = "NE", alias = "ne")]
    pub ne: Coordinate,
    #[serde(rename = "SE", alias = "se")]
    pub se: Coordinate,
    #[serde(rename = "SW", alias = "sw")]
    pub sw: Coordinate,
}

/// Coarse rectangle sent to the vicinity endpoint before the precise polygon
/// test narrows the results down.
#[derive(Serialize, Debug, Copy, Clone, PartialEq)]
pub struct BoundingBox {
    pub max_lat: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub min_lon: f64,
}

/// How the western edge of the [`BoundingBox`] is derived.
///
/// The deployed behavior takes the *larger* of the two western longitudes,
/// which clips the box to the narrower side of a non-rectangular area. `Min`
/// takes the smaller one and always covers the whole area.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MinLongitudeRule {
    #[default]
    Max,
    Min,
}

impl Area {
    /// Edges in walk order: NE→NW, SE→NE, SW→SE, NW→SW.
    pub const fn edges(&self) -> [(Coordinate, Coordinate); 4] {
        [
            (self.ne, self.nw),
            (self.se, self.ne),
            (self.sw, self.se),
            (self.nw, self.sw),
        ]
    }

    /// Even-odd containment test over the four edges.
    ///
    /// NaN coordinates produce an unspecified result but never panic.
    pub fn contains(&self, point: Coordinate) -> bool {
        self.edges()
            .iter()
            .filter(|(start, end)| crosses_ray(point, *start, *end))
            .count()
            % 2
            == 1
    }

    pub fn bounding_box(&self, rule: MinLongitudeRule) -> BoundingBox {
        let min_lon = match rule {
            MinLongitudeRule::Max => self.nw.longitude.max(self.sw.longitude),
            MinLongitudeRule::Min => self.nw.longitude.min(self.sw.longitude),
        };
        BoundingBox {
            max_lat: self.nw.latitude.max(self.ne.latitude),
            min_lat: self.sw.latitude.min(self.se.latitude),
            max_lon: self.se.longitude.max(self.ne.longitude),
            min_lon,
        }
    }
}

/// Whether a ray cast from `point` crosses the edge `start`..`end`.
///
/// The result does not depend on which endpoint is passed first. A point
/// sharing a longitude with either endpoint is nudged east one ULP at a time
/// until it no longer does, so a ray through a vertex is never ambiguous.
/// Zero latitude deltas yield infinite slopes, which compare as usual.
pub fn crosses_ray(point: Coordinate, start: Coordinate, end: Coordinate) -> bool {
    let (start, end) = if start.longitude > end.longitude {
        (end, start)
    } else {
        (start, end)
    };

    let mut lon = point.longitude;
    // next_up saturates at +inf, so stop once the value is no longer finite
    while (lon == start.longitude || lon == end.longitude) && lon.is_finite() {
        lon = lon.next_up();
    }
    let lat = point.latitude;

    if lon < start.longitude || lon > end.longitude {
        return false;
    }

    if start.latitude > end.latitude {
        if lat > start.latitude {
            return false;
        }
        if lat < end.latitude {
            return true;
        }
    } else {
        if lat > end.latitude {
            return false;
        }
        if lat < start.latitude {
            return true;
        }
    }

    let ray_slope = (lon - start.longitude) / (lat - start.latitude);
    let edge_slope = (end.longitude - start.longitude) / (end.latitude - start.latitude);

    ray_slope >= edge_slope
}
