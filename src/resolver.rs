//! Next-prayer resolution
//!
//! Given one day's timings and a reference instant, find the first canonical
//! prayer strictly after the instant. When the day is over, the next prayer is
//! the following day's Fajr, taken from wherever the caller says it lives.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone};

use crate::schedule::{DailyPrayerRecord, MonthlySchedule};
use crate::time::{Prayer, TimeOfDay};

/// Where tomorrow's Fajr comes from once today's prayers have all passed
#[derive(Debug, Clone, Copy)]
pub enum Rollover<'a> {
    /// The following day's record is held; use its Fajr
    Next(&'a DailyPrayerRecord),
    /// Reuse the current record's Fajr time on the next date
    Repeat,
    /// The held data ends here; nothing further can be determined
    Exhausted,
}

/// Outcome of a resolution
#[derive(Debug, Clone, PartialEq)]
pub enum NextPrayer<Tz: TimeZone> {
    Upcoming {
        prayer: Prayer,
        at: DateTime<Tz>,
        remaining: Duration,
    },
    /// Every prayer in the held schedule has passed
    NoFurtherPrayer,
}

impl<Tz: TimeZone> NextPrayer<Tz> {
    pub fn prayer(&self) -> Option<Prayer> {
        match self {
            NextPrayer::Upcoming { prayer, .. } => Some(*prayer),
            NextPrayer::NoFurtherPrayer => None,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self {
            NextPrayer::Upcoming { remaining, .. } => Some(*remaining),
            NextPrayer::NoFurtherPrayer => None,
        }
    }
}

/// Map a wall-clock time to an instant in `tz`.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times
/// inside a DST gap do not exist and are pushed forward one hour.
pub fn localize<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(at) => at,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .unwrap_or_else(|| tz.from_utc_datetime(&naive)),
    }
}

fn instant_on<Tz: TimeZone>(tz: &Tz, date: NaiveDate, time: TimeOfDay) -> DateTime<Tz> {
    localize(tz, date.and_time(time.to_naive_time()))
}

/// Find the next prayer after `now` using `day`'s timings.
///
/// Timings are applied to `now`'s calendar date, whichever date `day` carries.
/// A prayer whose instant equals `now` has already passed.
pub fn next_prayer<Tz: TimeZone>(
    day: &DailyPrayerRecord,
    rollover: Rollover<'_>,
    now: &DateTime<Tz>,
) -> NextPrayer<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    for (prayer, time) in day.prayers.iter() {
        let at = instant_on(&tz, today, time);
        if at > *now {
            let remaining = at.clone().signed_duration_since(now.clone());
            return NextPrayer::Upcoming {
                prayer,
                at,
                remaining,
            };
        }
    }

    let fajr = match rollover {
        Rollover::Next(following) => following.time_of(Prayer::Fajr),
        Rollover::Repeat => day.time_of(Prayer::Fajr),
        Rollover::Exhausted => return NextPrayer::NoFurtherPrayer,
    };

    let Some(tomorrow) = today.succ_opt() else {
        return NextPrayer::NoFurtherPrayer;
    };

    let at = instant_on(&tz, tomorrow, fajr);
    let remaining = at.clone().signed_duration_since(now.clone());
    NextPrayer::Upcoming {
        prayer: Prayer::Fajr,
        at,
        remaining,
    }
}

impl MonthlySchedule {
    /// Resolve the next prayer for the record at `index`, rolling over into
    /// the following record when there is one.
    ///
    /// Returns None when `index` is out of range.
    pub fn next_prayer_at<Tz: TimeZone>(
        &self,
        index: usize,
        now: &DateTime<Tz>,
    ) -> Option<NextPrayer<Tz>> {
        let day = self.get(index)?;
        let rollover = match self.get(index + 1) {
            Some(following) => Rollover::Next(following),
            None => Rollover::Exhausted,
        };
        Some(next_prayer(day, rollover, now))
    }
}
