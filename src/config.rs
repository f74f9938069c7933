use anyhow::{bail, Context, Result};
#[cfg(test)]
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::{DEFAULT_API_URL, DEFAULT_METHOD, MAX_METHOD};
use crate::geo::Coordinates;

pub const DEFAULT_GEOLOCATION_URL: &str = "http://ip-api.com/json";
pub const DEFAULT_CACHE_DIR: &str = "./.prayertimes";

#[derive(Debug, Clone)]
pub struct Config {
    // Fixed position (optional, IP geolocation otherwise)
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    // AlAdhan calculation method id
    pub method: u8,

    pub api_url: String,
    pub geolocation_url: String,

    // Directory holding the cache slot
    pub cache_dir: PathBuf,

    // IANA zone override. When unset the provider's zone is used.
    pub timezone: Option<String>,

    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let latitude = get("PRAYER_LATITUDE")
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().parse::<f64>())
            .transpose()
            .context("PRAYER_LATITUDE must be a number")?;
        let longitude = get("PRAYER_LONGITUDE")
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().parse::<f64>())
            .transpose()
            .context("PRAYER_LONGITUDE must be a number")?;

        if latitude.is_some() != longitude.is_some() {
            bail!("PRAYER_LATITUDE and PRAYER_LONGITUDE must be set together");
        }

        Ok(Config {
            latitude,
            longitude,

            method: get("PRAYER_METHOD")
                .unwrap_or_else(|| DEFAULT_METHOD.to_string())
                .trim()
                .parse()
                .context("PRAYER_METHOD must be a method id (0-23)")?,

            api_url: get("PRAYER_API_URL")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            geolocation_url: get("GEOLOCATION_URL")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_GEOLOCATION_URL.to_string()),

            cache_dir: get("PRAYER_CACHE_DIR")
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string())
                .into(),

            timezone: get("PRAYER_TIMEZONE").filter(|s| !s.trim().is_empty()),

            http_timeout_secs: get("HTTP_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(10),
        })
    }

    /// Create config from a HashMap (convenience for testing)
    #[cfg(test)]
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    /// Fixed coordinates, if configured and in range
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Coordinates::new(lat, lon).ok(),
            _ => None,
        }
    }

    /// Parsed zone override
    pub fn tz(&self) -> Option<chrono_tz::Tz> {
        self.timezone.as_deref().and_then(|name| name.trim().parse().ok())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            if let Err(e) = Coordinates::new(lat, lon) {
                errors.push(format!("PRAYER_LATITUDE/PRAYER_LONGITUDE: {}", e));
            }
        }

        if self.method > MAX_METHOD {
            errors.push(format!(
                "PRAYER_METHOD={} is not a known method (0-{}).",
                self.method, MAX_METHOD
            ));
        }

        for (key, url) in [("PRAYER_API_URL", &self.api_url), ("GEOLOCATION_URL", &self.geolocation_url)] {
            if !Self::is_http_url(url) {
                errors.push(format!("{} '{}' must be an http(s) URL.", key, url));
            }
        }

        if let Some(name) = &self.timezone {
            if self.tz().is_none() {
                errors.push(format!("PRAYER_TIMEZONE '{}' is not an IANA zone name.", name));
            }
        }

        if self.http_timeout_secs == 0 {
            errors.push("HTTP_TIMEOUT_SECS must be greater than 0.".to_string());
        } else if self.http_timeout_secs > 120 {
            errors.push(format!(
                "HTTP_TIMEOUT_SECS={} seems too long (max recommended: 120).",
                self.http_timeout_secs
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }

    /// Scheme plus a non-empty host
    fn is_http_url(url: &str) -> bool {
        match reqwest::Url::parse(url) {
            Ok(parsed) => {
                matches!(parsed.scheme(), "http" | "https")
                    && parsed.host_str().is_some_and(|h| !h.is_empty())
            }
            Err(_) => false,
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn in_range_coordinates_validate(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0, method in 0u8..=23) {
            let env: HashMap<&str, String> = [
                ("PRAYER_LATITUDE", lat.to_string()),
                ("PRAYER_LONGITUDE", lon.to_string()),
                ("PRAYER_METHOD", method.to_string()),
            ]
            .into_iter()
            .collect();
            let config = Config::from_getter(|key| env.get(key).cloned()).unwrap();
            prop_assert!(config.validate().is_ok());
            prop_assert!(config.coordinates().is_some());
        }

        #[test]
        fn method_parsing_never_panics(method_str in ".*") {
            let env: HashMap<&str, String> = [("PRAYER_METHOD", method_str)].into_iter().collect();
            let _ = Config::from_getter(|key| env.get(key).cloned());
        }
    }
}

/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    #[kani::proof]
    #[kani::unwind(6)]
    fn method_parsing_never_panics() {
        let bytes: [u8; 4] = kani::any();
        if let Ok(method) = std::str::from_utf8(&bytes) {
            let result = Config::from_getter(|key| {
                (key == "PRAYER_METHOD").then(|| method.to_string())
            });
            if let Ok(config) = result {
                kani::assert(
                    method.trim().parse::<u8>().ok() == Some(config.method),
                    "accepted method must be the trimmed id",
                );
            }
        }
    }
}
