//! Daily records and the month they belong to

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PrayerError;
use crate::time::{Marker, Prayer, TimeOfDay};

/// One time per canonical prayer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrayerTimes {
    pub fajr: TimeOfDay,
    pub dhuhr: TimeOfDay,
    pub asr: TimeOfDay,
    pub maghrib: TimeOfDay,
    pub isha: TimeOfDay,
}

impl PrayerTimes {
    pub fn get(&self, prayer: Prayer) -> TimeOfDay {
        match prayer {
            Prayer::Fajr => self.fajr,
            Prayer::Dhuhr => self.dhuhr,
            Prayer::Asr => self.asr,
            Prayer::Maghrib => self.maghrib,
            Prayer::Isha => self.isha,
        }
    }

    /// Prayers paired with their times in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Prayer, TimeOfDay)> + '_ {
        Prayer::ALL.iter().map(move |&p| (p, self.get(p)))
    }

    /// Times must never go backwards from Fajr to Isha
    pub fn is_ordered(&self) -> bool {
        let times: Vec<TimeOfDay> = self.iter().map(|(_, t)| t).collect();
        times.windows(2).all(|w| w[0] <= w[1])
    }
}

/// A single calendar day as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPrayerRecord {
    pub date: NaiveDate,
    /// Gregorian display string, e.g. "14 Oct 2024"
    pub gregorian: String,
    /// Hijri display string, e.g. "10-04-1446"
    pub hijri: String,
    pub prayers: PrayerTimes,
    #[serde(default)]
    pub markers: BTreeMap<Marker, TimeOfDay>,
}

impl DailyPrayerRecord {
    pub fn new(
        date: NaiveDate,
        gregorian: String,
        hijri: String,
        prayers: PrayerTimes,
        markers: BTreeMap<Marker, TimeOfDay>,
    ) -> Result<Self, PrayerError> {
        if !prayers.is_ordered() {
            return Err(PrayerError::MalformedSchedule(format!(
                "prayer times on {} are out of order",
                date
            )));
        }
        Ok(Self {
            date,
            gregorian,
            hijri,
            prayers,
            markers,
        })
    }

    pub fn time_of(&self, prayer: Prayer) -> TimeOfDay {
        self.prayers.get(prayer)
    }
}

/// Number of days in a Gregorian month, None for an invalid year/month
pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    u32::try_from(next_first.signed_duration_since(first).num_days()).ok()
}

/// Every day of one month, indexed by day-of-month minus one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySchedule {
    year: i32,
    month: u32,
    timezone: String,
    days: Vec<DailyPrayerRecord>,
}

impl MonthlySchedule {
    /// Build a schedule, checking that it holds exactly one record per day
    /// of the month in ascending order.
    pub fn new(
        year: i32,
        month: u32,
        timezone: String,
        days: Vec<DailyPrayerRecord>,
    ) -> Result<Self, PrayerError> {
        let schedule = Self {
            year,
            month,
            timezone,
            days,
        };
        schedule.check()?;
        Ok(schedule)
    }

    /// Re-run the construction checks, e.g. on a schedule read back from disk
    pub fn check(&self) -> Result<(), PrayerError> {
        let (year, month) = (self.year, self.month);
        let expected = days_in_month(year, month).ok_or_else(|| {
            PrayerError::MalformedSchedule(format!("invalid month {}-{}", year, month))
        })?;

        if self.days.len() != expected as usize {
            return Err(PrayerError::MalformedSchedule(format!(
                "{}-{:02} has {} days but {} records were provided",
                year,
                month,
                expected,
                self.days.len()
            )));
        }

        for (index, day) in self.days.iter().enumerate() {
            let d = &day.date;
            if d.year() != year || d.month() != month || d.day() as usize != index + 1 {
                return Err(PrayerError::MalformedSchedule(format!(
                    "record {} is dated {}, expected day {} of {}-{:02}",
                    index,
                    d,
                    index + 1,
                    year,
                    month
                )));
            }
            if !day.prayers.is_ordered() {
                return Err(PrayerError::MalformedSchedule(format!(
                    "prayer times on {} are out of order",
                    d
                )));
            }
        }

        Ok(())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// IANA zone the provider computed the timings for
    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DailyPrayerRecord> {
        self.days.get(index)
    }

    pub fn days(&self) -> &[DailyPrayerRecord] {
        &self.days
    }

    /// Whether `date` falls in this schedule's month
    pub fn covers_month_of(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Index of the record for `date`, if this schedule holds it
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        if self.covers_month_of(date) {
            Some(date.day0() as usize)
        } else {
            None
        }
    }
}
