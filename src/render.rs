//! Plain-text rendering of the board

use chrono::{Duration, TimeZone};
use std::fmt::Write;

use crate::board::PrayerBoard;
use crate::resolver::NextPrayer;
use crate::time::{Marker, Prayer};

/// Format a countdown as HH:MM:SS. Negative durations show as zero.
pub fn format_countdown(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

/// Render the whole board. `zone` is the label shown in the header.
pub fn render_board<Tz: TimeZone>(board: &PrayerBoard<Tz>, zone: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Prayer Times  [{}]", zone);
    let _ = writeln!(out, "{}", "-".repeat(40));

    if board.is_loading() {
        let _ = writeln!(out, "Loading prayer times...");
    }

    if let Some(alert) = board.alert() {
        let _ = write!(out, "! {}", alert.message);
        if alert.retryable {
            let _ = write!(out, " (press r to retry)");
        }
        let _ = writeln!(out);
    }

    let Some(schedule) = board.schedule() else {
        if !board.is_loading() && board.alert().is_none() {
            let _ = writeln!(out, "No prayer times loaded");
        }
        return out;
    };

    let Some(day) = board.current_day() else {
        let _ = writeln!(
            out,
            "Today ({}) is not in the loaded month {}-{:02}",
            board.today(),
            schedule.year(),
            schedule.month()
        );
        return out;
    };

    let _ = writeln!(out, "{}  |  {} AH", day.gregorian, day.hijri);
    if !board.is_viewing_today() {
        let _ = writeln!(out, "(viewing {}, press t for today)", day.date.format("%a %d %b"));
    }
    let _ = writeln!(out);

    let next = board.next_prayer().and_then(NextPrayer::prayer);
    match board.next_prayer() {
        Some(NextPrayer::Upcoming { prayer, at, remaining }) => {
            let _ = writeln!(
                out,
                "Next: {} at {}  in {}",
                prayer,
                at.naive_local().format("%H:%M"),
                format_countdown(*remaining)
            );
        }
        Some(NextPrayer::NoFurtherPrayer) => {
            let _ = writeln!(out, "No More Prayers");
        }
        None => {}
    }
    let _ = writeln!(out);

    for prayer in Prayer::ALL {
        let pointer = if next == Some(prayer) { ">" } else { " " };
        let _ = writeln!(
            out,
            "{} {:<8} {:<8} {}",
            pointer,
            prayer.name(),
            prayer.arabic_name(),
            day.time_of(prayer)
        );
    }

    if !day.markers.is_empty() {
        let _ = writeln!(out);
        for marker in Marker::ALL {
            if let Some(time) = day.markers.get(&marker) {
                let _ = writeln!(out, "  {:<17} {}", marker.name(), time);
            }
        }
    }

    out
}
