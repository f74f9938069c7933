/// Time-of-day values and the prayer/marker names they are attached to
///
/// Provider timings look like "05:10 (+01)": the annotation after the first
/// whitespace is dropped and the rest must be a strict "HH:MM".

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::PrayerError;

/// The five canonical prayers, in the order they fall during a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Prayer {
    Fajr,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

impl Prayer {
    pub const ALL: [Prayer; 5] = [
        Prayer::Fajr,
        Prayer::Dhuhr,
        Prayer::Asr,
        Prayer::Maghrib,
        Prayer::Isha,
    ];

    /// Key used by the provider's `timings` object
    pub fn name(&self) -> &'static str {
        match self {
            Prayer::Fajr => "Fajr",
            Prayer::Dhuhr => "Dhuhr",
            Prayer::Asr => "Asr",
            Prayer::Maghrib => "Maghrib",
            Prayer::Isha => "Isha",
        }
    }

    pub fn arabic_name(&self) -> &'static str {
        match self {
            Prayer::Fajr => "الفجر",
            Prayer::Dhuhr => "الظهر",
            Prayer::Asr => "العصر",
            Prayer::Maghrib => "المغرب",
            Prayer::Isha => "العشاء",
        }
    }
}

impl fmt::Display for Prayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Auxiliary timings shown alongside the prayers but never "next"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Marker {
    Imsak,
    Sunrise,
    Sunset,
    Midnight,
}

impl Marker {
    pub const ALL: [Marker; 4] = [Marker::Imsak, Marker::Sunrise, Marker::Sunset, Marker::Midnight];

    pub fn name(&self) -> &'static str {
        match self {
            Marker::Imsak => "Imsak",
            Marker::Sunrise => "Sunrise",
            Marker::Sunset => "Sunset",
            Marker::Midnight => "Midnight",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hour and minute of a timing; seconds are always zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, PrayerError> {
        if hour > 23 || minute > 59 {
            return Err(PrayerError::InvalidTime(format!("{}:{}", hour, minute)));
        }
        Ok(Self { hour, minute })
    }

    /// Parse a provider timing, dropping any annotation after the first
    /// whitespace ("05:10 (+01)" -> 05:10). The remaining text must be
    /// exactly two digits, a colon, two digits.
    pub fn parse(raw: &str) -> Result<Self, PrayerError> {
        let trimmed = raw.trim_start();
        let clock = trimmed.split_whitespace().next().unwrap_or("");
        let bytes = clock.as_bytes();

        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(PrayerError::InvalidTime(raw.to_string()));
        }

        let digit = |b: u8| -> Option<u32> { b.is_ascii_digit().then(|| (b - b'0') as u32) };

        let hour = match (digit(bytes[0]), digit(bytes[1])) {
            (Some(h1), Some(h2)) => h1 * 10 + h2,
            _ => return Err(PrayerError::InvalidTime(raw.to_string())),
        };
        let minute = match (digit(bytes[3]), digit(bytes[4])) {
            (Some(m1), Some(m2)) => m1 * 10 + m2,
            _ => return Err(PrayerError::InvalidTime(raw.to_string())),
        };

        Self::new(hour, minute).map_err(|_| PrayerError::InvalidTime(raw.to_string()))
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        // Range is enforced by the constructor
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = PrayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TimeOfDay::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let t = TimeOfDay::parse("05:10").unwrap();
        assert_eq!((t.hour(), t.minute()), (5, 10));
    }

    #[test]
    fn test_parse_strips_annotation() {
        let t = TimeOfDay::parse("05:10 (+01)").unwrap();
        assert_eq!((t.hour(), t.minute()), (5, 10));

        let t = TimeOfDay::parse("20:50 (WEST)").unwrap();
        assert_eq!((t.hour(), t.minute()), (20, 50));
    }

    #[test]
    fn test_parse_boundaries() {
        assert_eq!(TimeOfDay::parse("00:00").unwrap(), TimeOfDay::new(0, 0).unwrap());
        assert_eq!(TimeOfDay::parse("23:59").unwrap(), TimeOfDay::new(23, 59).unwrap());
        assert!(TimeOfDay::parse("24:00").is_err());
        assert!(TimeOfDay::parse("12:60").is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in ["", " ", "5:10", "05:1", "0510", "05-10", "ab:cd", "05:10:00", "(+01) 05:10", "٠٥:١٠"] {
            assert!(TimeOfDay::parse(raw).is_err(), "'{}' should be rejected", raw);
        }
    }

    #[test]
    fn test_parse_error_keeps_raw_input() {
        let err = TimeOfDay::parse("5:1x (+01)").unwrap_err();
        assert!(err.to_string().contains("5:1x (+01)"));
    }

    #[test]
    fn test_display_zero_padded() {
        assert_eq!(TimeOfDay::new(5, 7).unwrap().to_string(), "05:07");
    }

    #[test]
    fn test_serde_as_string() {
        let t = TimeOfDay::new(16, 5).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"16:05\"");
        let back: TimeOfDay = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);

        assert!(serde_json::from_str::<TimeOfDay>("\"16h05\"").is_err());
    }

    #[test]
    fn test_prayer_order() {
        let mut sorted = Prayer::ALL;
        sorted.sort();
        assert_eq!(sorted, Prayer::ALL);
        assert_eq!(Prayer::ALL[0], Prayer::Fajr);
        assert_eq!(Prayer::ALL[4], Prayer::Isha);
    }

    #[test]
    fn test_ordering_follows_clock() {
        assert!(TimeOfDay::new(5, 10).unwrap() < TimeOfDay::new(12, 45).unwrap());
        assert!(TimeOfDay::new(12, 45).unwrap() < TimeOfDay::new(12, 46).unwrap());
    }
}


/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    #[kani::proof]
    #[kani::unwind(8)]
    fn parse_never_panics() {
        let raw: [u8; 6] = kani::any();
        if let Ok(s) = std::str::from_utf8(&raw) {
            let _ = TimeOfDay::parse(s);
        }
    }

    #[kani::proof]
    #[kani::unwind(8)]
    fn parsed_values_in_range() {
        let raw: [u8; 5] = kani::any();
        if let Ok(s) = std::str::from_utf8(&raw) {
            if let Ok(t) = TimeOfDay::parse(s) {
                kani::assert(t.hour() < 24, "hour must be < 24");
                kani::assert(t.minute() < 60, "minute must be < 60");
            }
        }
    }
}
