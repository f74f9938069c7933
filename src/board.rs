//! Presentation state: the loaded month, the selected day, the reference
//! instant, and whatever went wrong last.

use chrono::{DateTime, NaiveDate, TimeZone};
use tracing::debug;

use crate::error::{ErrorKind, PrayerError};
use crate::resolver::NextPrayer;
use crate::schedule::{DailyPrayerRecord, MonthlySchedule};

/// A failure turned into something the user can act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&PrayerError> for Alert {
    fn from(err: &PrayerError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

pub struct PrayerBoard<Tz: TimeZone> {
    schedule: Option<MonthlySchedule>,
    selected: Option<usize>,
    now: DateTime<Tz>,
    next: Option<NextPrayer<Tz>>,
    follow_today: bool,
    loading: bool,
    alert: Option<Alert>,
}

impl<Tz: TimeZone> PrayerBoard<Tz> {
    pub fn new(now: DateTime<Tz>) -> Self {
        Self {
            schedule: None,
            selected: None,
            now,
            next: None,
            follow_today: true,
            loading: false,
            alert: None,
        }
    }

    /// Install a month and select today's record if the month holds it
    pub fn load_schedule(&mut self, schedule: MonthlySchedule) {
        self.selected = schedule.index_of(self.today());
        self.follow_today = true;
        self.schedule = Some(schedule);
        self.alert = None;
        self.recompute();
    }

    /// Swap in a fresh copy of the loaded month without disturbing the
    /// user's position. A different month goes through `load_schedule`.
    pub fn replace_schedule(&mut self, schedule: MonthlySchedule) {
        let same_month = self
            .schedule
            .as_ref()
            .is_some_and(|s| s.year() == schedule.year() && s.month() == schedule.month());
        let in_range = self.selected.is_some_and(|index| index < schedule.len());
        if !same_month || !in_range {
            self.load_schedule(schedule);
            return;
        }

        if self.follow_today {
            if let Some(index) = schedule.index_of(self.today()) {
                self.selected = Some(index);
            }
        }
        self.schedule = Some(schedule);
        self.alert = None;
        self.recompute();
    }

    pub fn schedule(&self) -> Option<&MonthlySchedule> {
        self.schedule.as_ref()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn current_day(&self) -> Option<&DailyPrayerRecord> {
        let index = self.selected?;
        self.schedule.as_ref()?.get(index)
    }

    pub fn next_prayer(&self) -> Option<&NextPrayer<Tz>> {
        self.next.as_ref()
    }

    pub fn now(&self) -> &DateTime<Tz> {
        &self.now
    }

    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    /// Whether the selected record is dated today
    pub fn is_viewing_today(&self) -> bool {
        self.current_day().is_some_and(|day| day.date == self.today())
    }

    /// Step back one day. Ignored at the first record or with nothing selected.
    pub fn go_to_previous_day(&mut self) -> bool {
        match self.selected {
            Some(index) if index > 0 => self.select(index - 1),
            _ => false,
        }
    }

    /// Step forward one day. Ignored at the last record or with nothing selected.
    pub fn go_to_next_day(&mut self) -> bool {
        let len = self.schedule.as_ref().map_or(0, MonthlySchedule::len);
        match self.selected {
            Some(index) if index + 1 < len => self.select(index + 1),
            _ => false,
        }
    }

    /// Jump back to today's record, if the month holds it
    pub fn go_to_today(&mut self) -> bool {
        match self.schedule.as_ref().and_then(|s| s.index_of(self.today())) {
            Some(index) => self.select(index),
            None => false,
        }
    }

    fn select(&mut self, index: usize) -> bool {
        self.selected = Some(index);
        self.follow_today = self.is_viewing_today();
        // Same reference instant as before the move
        self.recompute();
        true
    }

    /// Advance the reference instant. If the board was showing today and the
    /// date has changed, follow it to the new today.
    pub fn tick(&mut self, now: DateTime<Tz>) {
        let date_changed = now.date_naive() != self.today();
        self.now = now;

        if date_changed && self.follow_today {
            if let Some(schedule) = &self.schedule {
                if let Some(index) = schedule.index_of(self.today()) {
                    debug!("Date rolled over to {}, following", self.today());
                    self.selected = Some(index);
                }
            }
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        self.next = match (&self.schedule, self.selected) {
            (Some(schedule), Some(index)) => schedule.next_prayer_at(index, &self.now),
            _ => None,
        };
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    pub fn alert(&self) -> Option<&Alert> {
        self.alert.as_ref()
    }

    /// Record a failure. Any loaded month stays usable.
    pub fn fail(&mut self, err: &PrayerError) {
        self.alert = Some(Alert::from(err));
    }

    pub fn clear_alert(&mut self) {
        self.alert = None;
    }
}
