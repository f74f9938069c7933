//! Error types shared by the prayer-time core and its providers

use thiserror::Error;

/// Coarse classification used to pick the user-facing message and retry hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Location,
    Fetch,
    Data,
    Storage,
}

#[derive(Debug, Error)]
pub enum PrayerError {
    /// Geolocation denied, unsupported, or the lookup failed
    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    /// Network error, bad status, or malformed body while fetching a month
    #[error("failed to fetch prayer times: {0}")]
    FetchFailure(String),

    #[error("invalid time of day '{0}'")]
    InvalidTime(String),

    #[error("malformed schedule: {0}")]
    MalformedSchedule(String),

    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("cache storage error: {0}")]
    Storage(String),
}

impl PrayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PrayerError::LocationUnavailable(_) | PrayerError::InvalidCoordinates(_) => {
                ErrorKind::Location
            }
            PrayerError::FetchFailure(_) => ErrorKind::Fetch,
            PrayerError::InvalidTime(_) | PrayerError::MalformedSchedule(_) => ErrorKind::Data,
            PrayerError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Whether a manual retry can reasonably change the outcome
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Location | ErrorKind::Fetch)
    }

    /// Fold a parse/validation error raised while decoding a provider
    /// response into a fetch failure.
    pub fn into_fetch_failure(self) -> Self {
        match self {
            PrayerError::FetchFailure(_) => self,
            other => PrayerError::FetchFailure(format!("malformed response: {}", other)),
        }
    }
}
