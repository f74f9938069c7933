//! Coordinates and the providers that produce them
//!
//! The terminal has no browser geolocation, so coordinates come either from
//! configuration or from an IP geolocation lookup.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::PrayerError;
use crate::redact;

/// Absorbs float noise in degree differences such as 33.60 - 33.59
const DEGREE_EPSILON: f64 = 1e-9;

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCoordinates")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Unchecked wire form, range-checked on the way in
#[derive(Deserialize)]
struct RawCoordinates {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawCoordinates> for Coordinates {
    type Error = PrayerError;

    fn try_from(raw: RawCoordinates) -> Result<Self, Self::Error> {
        Coordinates::new(raw.latitude, raw.longitude)
    }
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, PrayerError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(PrayerError::InvalidCoordinates(format!(
                "latitude {} outside [-90, 90]",
                latitude
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(PrayerError::InvalidCoordinates(format!(
                "longitude {} outside [-180, 180]",
                longitude
            )));
        }
        Ok(Self { latitude, longitude })
    }

    /// True when neither axis deviates from `other` by more than `tolerance` degrees
    pub fn is_within(&self, other: &Coordinates, tolerance: f64) -> bool {
        (self.latitude - other.latitude).abs() <= tolerance + DEGREE_EPSILON
            && (self.longitude - other.longitude).abs() <= tolerance + DEGREE_EPSILON
    }
}

/// Source of the user's coordinates
pub trait LocationProvider {
    fn locate(&self) -> impl Future<Output = Result<Coordinates, PrayerError>> + Send;
}

/// Coordinates taken from configuration
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub Coordinates);

impl LocationProvider for FixedLocation {
    async fn locate(&self) -> Result<Coordinates, PrayerError> {
        Ok(self.0)
    }
}

/// ip-api.com style response
#[derive(Debug, Deserialize, PartialEq)]
pub struct IpLocationResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub city: Option<String>,
}

impl IpLocationResponse {
    pub fn into_coordinates(self) -> Result<Coordinates, PrayerError> {
        if self.status != "success" {
            let reason = self.message.unwrap_or_else(|| "lookup refused".to_string());
            return Err(PrayerError::LocationUnavailable(reason));
        }
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon)
                .map_err(|e| PrayerError::LocationUnavailable(e.to_string())),
            _ => Err(PrayerError::LocationUnavailable(
                "response carried no coordinates".to_string(),
            )),
        }
    }
}

/// Geolocation by public IP address
pub struct IpLocator {
    client: reqwest::Client,
    url: String,
}

impl IpLocator {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, PrayerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PrayerError::LocationUnavailable(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl LocationProvider for IpLocator {
    async fn locate(&self) -> Result<Coordinates, PrayerError> {
        debug!("Looking up location via {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PrayerError::LocationUnavailable(format!("lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(PrayerError::LocationUnavailable(format!(
                "lookup returned HTTP {}",
                response.status()
            )));
        }

        let body: IpLocationResponse = response
            .json()
            .await
            .map_err(|e| PrayerError::LocationUnavailable(format!("unreadable response: {}", e)))?;

        let city = body.city.clone();
        let coords = body.into_coordinates()?;
        info!(
            "Located at {} ({})",
            redact::coordinates(&coords),
            city.as_deref().unwrap_or("unknown city")
        );
        Ok(coords)
    }
}

/// The provider picked at startup
pub enum Locator {
    Fixed(FixedLocation),
    Ip(IpLocator),
}

impl LocationProvider for Locator {
    async fn locate(&self) -> Result<Coordinates, PrayerError> {
        match self {
            Locator::Fixed(fixed) => fixed.locate().await,
            Locator::Ip(ip) => ip.locate().await,
        }
    }
}
