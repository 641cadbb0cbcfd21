use chrono::{Datelike, Days, Local, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// The current local calendar date. Everything else in this module works on
/// naive dates so day boundaries never drift with the host timezone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn day_of_week(date: NaiveDate) -> u32 {
    date.weekday().num_days_from_sunday()
}

pub fn add_days(date: NaiveDate, n: i64) -> NaiveDate {
    let shifted = if n >= 0 {
        date.checked_add_days(Days::new(n.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(n.unsigned_abs()))
    };
    shifted.unwrap_or(if n >= 0 { NaiveDate::MAX } else { NaiveDate::MIN })
}

/// Signed whole days from `b` to `a`; positive when `a` is after `b`.
pub fn days_between(a: NaiveDate, b: NaiveDate) -> i64 {
    a.signed_duration_since(b).num_days()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WeekBounds {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekBounds {
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..7).map(move |offset| add_days(start, offset))
    }

    pub fn previous(&self) -> WeekBounds {
        WeekBounds {
            start: add_days(self.start, -7),
            end: add_days(self.end, -7),
        }
    }
}

pub fn week_bounds(date: NaiveDate, week_start: Weekday) -> WeekBounds {
    let offset = (day_of_week(date) + 7 - week_start.num_days_from_sunday()) % 7;
    let start = add_days(date, -i64::from(offset));
    WeekBounds {
        start,
        end: add_days(start, 6),
    }
}

pub fn weekday_from_number(number: u32) -> Option<Weekday> {
    match number {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Accepts `0`-`6` (Sunday first) or an English weekday name, full or abbreviated.
pub fn parse_weekday(input: &str) -> Option<Weekday> {
    let trimmed = input.trim();
    if let Ok(number) = trimmed.parse::<u32>() {
        return weekday_from_number(number);
    }
    trimmed.parse::<Weekday>().ok()
}
