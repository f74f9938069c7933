//! AlAdhan calendar API client
//!
//! One request returns a whole month of timings for a coordinate pair.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::PrayerError;
use crate::geo::Coordinates;
use crate::redact;
use crate::schedule::{DailyPrayerRecord, MonthlySchedule, PrayerTimes};
use crate::time::{Marker, Prayer, TimeOfDay};

/// Default AlAdhan API base
pub const DEFAULT_API_URL: &str = "http://api.aladhan.com/v1";

/// Calculation method used when none is configured
pub const DEFAULT_METHOD: u8 = 21;

/// Highest calculation method id the provider accepts
pub const MAX_METHOD: u8 = 23;

/// What to fetch: one month at one location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalendarRequest {
    pub coords: Coordinates,
    pub method: u8,
    pub year: i32,
    pub month: u32,
}

impl CalendarRequest {
    /// Request for the month containing `date`
    pub fn for_date(coords: Coordinates, method: u8, date: NaiveDate) -> Self {
        Self {
            coords,
            method,
            year: date.year(),
            month: date.month(),
        }
    }
}

/// Anything that can produce a month of prayer times
pub trait ScheduleProvider {
    fn fetch_month(
        &self,
        request: &CalendarRequest,
    ) -> impl Future<Output = Result<MonthlySchedule, PrayerError>> + Send;
}

/// Query parameters for the calendar endpoint
pub fn calendar_params(request: &CalendarRequest) -> [(&'static str, String); 5] {
    [
        ("latitude", request.coords.latitude.to_string()),
        ("longitude", request.coords.longitude.to_string()),
        ("method", request.method.to_string()),
        ("month", request.month.to_string()),
        ("year", request.year.to_string()),
    ]
}

/// Full calendar URL, used for logging and tests
pub fn build_calendar_url(base_url: &str, request: &CalendarRequest) -> String {
    let query: Vec<String> = calendar_params(request)
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    format!("{}/calendar?{}", base_url.trim_end_matches('/'), query.join("&"))
}

#[derive(Debug, Deserialize)]
pub struct CalendarResponse {
    pub code: u16,
    #[serde(default)]
    pub status: String,
    pub data: Vec<ApiDay>,
}

#[derive(Debug, Deserialize)]
pub struct ApiDay {
    pub timings: HashMap<String, String>,
    pub date: ApiDate,
    #[serde(default)]
    pub meta: Option<ApiMeta>,
}

#[derive(Debug, Deserialize)]
pub struct ApiDate {
    pub readable: String,
    pub gregorian: ApiGregorian,
    pub hijri: ApiHijri,
}

#[derive(Debug, Deserialize)]
pub struct ApiGregorian {
    /// "DD-MM-YYYY"
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiHijri {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiMeta {
    #[serde(default)]
    pub timezone: Option<String>,
}

impl ApiDay {
    fn timing(&self, key: &str) -> Option<&str> {
        self.timings.get(key).map(String::as_str)
    }

    /// Convert to a record. Missing prayers or unparseable timings are errors;
    /// markers are optional.
    pub fn into_record(self) -> Result<DailyPrayerRecord, PrayerError> {
        let date = NaiveDate::parse_from_str(&self.date.gregorian.date, "%d-%m-%Y").map_err(|e| {
            PrayerError::MalformedSchedule(format!(
                "bad gregorian date '{}': {}",
                self.date.gregorian.date, e
            ))
        })?;

        let prayer = |p: Prayer| -> Result<TimeOfDay, PrayerError> {
            let raw = self.timing(p.name()).ok_or_else(|| {
                PrayerError::MalformedSchedule(format!("{} missing on {}", p, date))
            })?;
            TimeOfDay::parse(raw)
        };

        let prayers = PrayerTimes {
            fajr: prayer(Prayer::Fajr)?,
            dhuhr: prayer(Prayer::Dhuhr)?,
            asr: prayer(Prayer::Asr)?,
            maghrib: prayer(Prayer::Maghrib)?,
            isha: prayer(Prayer::Isha)?,
        };

        // Auxiliary markers: a malformed one is skipped
        let mut markers = BTreeMap::new();
        for marker in Marker::ALL {
            if let Some(raw) = self.timing(marker.name()) {
                match TimeOfDay::parse(raw) {
                    Ok(time) => {
                        markers.insert(marker, time);
                    }
                    Err(e) => warn!("Skipping {} on {}: {}", marker, date, e),
                }
            }
        }

        DailyPrayerRecord::new(date, self.date.readable, self.date.hijri.date, prayers, markers)
    }
}

impl CalendarResponse {
    /// Turn a decoded response into a validated schedule for `request`'s month
    pub fn into_schedule(self, request: &CalendarRequest) -> Result<MonthlySchedule, PrayerError> {
        if self.code != 200 {
            return Err(PrayerError::FetchFailure(format!(
                "provider returned code {} ({})",
                self.code, self.status
            )));
        }

        let timezone = self
            .data
            .iter()
            .find_map(|d| d.meta.as_ref().and_then(|m| m.timezone.clone()))
            .filter(|tz| !tz.is_empty())
            .unwrap_or_else(|| "UTC".to_string());

        let days = self
            .data
            .into_iter()
            .map(ApiDay::into_record)
            .collect::<Result<Vec<_>, _>>()?;

        MonthlySchedule::new(request.year, request.month, timezone, days)
    }
}

pub struct AladhanClient {
    client: reqwest::Client,
    base_url: String,
}

impl AladhanClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PrayerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PrayerError::FetchFailure(format!("HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn try_fetch(&self, request: &CalendarRequest) -> Result<MonthlySchedule, PrayerError> {
        let url = format!("{}/calendar", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&calendar_params(request))
            .send()
            .await
            .map_err(|e| PrayerError::FetchFailure(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PrayerError::FetchFailure(format!("HTTP {}", status)));
        }

        let body: CalendarResponse = response
            .json()
            .await
            .map_err(|e| PrayerError::FetchFailure(format!("unreadable response: {}", e)))?;

        body.into_schedule(request)
            .map_err(PrayerError::into_fetch_failure)
    }
}

impl ScheduleProvider for AladhanClient {
    async fn fetch_month(&self, request: &CalendarRequest) -> Result<MonthlySchedule, PrayerError> {
        debug!(
            "GET {}",
            redact::url(&build_calendar_url(&self.base_url, request))
        );
        info!(
            "Fetching prayer times for {}-{:02} at {} (method {})",
            request.year,
            request.month,
            redact::coordinates(&request.coords),
            request.method
        );

        match self.try_fetch(request).await {
            Ok(schedule) => {
                info!(
                    "Fetched {} days ({})",
                    schedule.len(),
                    schedule.timezone()
                );
                Ok(schedule)
            }
            Err(e) => {
                warn!("{}", e);
                Err(e)
            }
        }
    }
}
