// src/queue/cron.rs

//! Five-field cron expressions (`minute hour day-of-month month day-of-week`).
//!
//! Supported per field: `*`, `n`, `a-b`, `*/s`, `a-b/s`, `n/s` and
//! comma-separated lists of those. Day-of-week accepts `0-7` where both `0`
//! and `7` mean Sunday.
//!
//! When both day-of-month and day-of-week are restricted (neither starts with
//! `*`), a day matches if *either* field matches, as in classic cron.
//! All times are UTC.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};

/// How far ahead `next_after` searches before giving up.
const MAX_SEARCH_DAYS: u32 = 366 * 5;

/// A parsed cron schedule.
#[derive(Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expr: String,
    minutes: u64,
    hours: u32,
    days_of_month: u32,
    months: u16,
    days_of_week: u8,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl fmt::Debug for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CronSchedule").field(&self.expr).finish()
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

impl FromStr for CronSchedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(format!(
                "cron expression '{s}' must have 5 fields (got {})",
                fields.len()
            ));
        };

        let minutes = parse_field(minute, 0, 59, "minute")?;
        let hours = parse_field(hour, 0, 23, "hour")?;
        let days_of_month = parse_field(dom, 1, 31, "day-of-month")?;
        let months = parse_field(month, 1, 12, "month")?;
        let mut days_of_week = parse_field(dow, 0, 7, "day-of-week")?;

        // 7 is an alias for Sunday (0).
        if days_of_week & (1 << 7) != 0 {
            days_of_week |= 1;
            days_of_week &= !(1 << 7);
        }

        Ok(Self {
            expr: fields.join(" "),
            minutes,
            hours: hours as u32,
            days_of_month: days_of_month as u32,
            months: months as u16,
            days_of_week: days_of_week as u8,
            dom_restricted: !dom.starts_with('*'),
            dow_restricted: !dow.starts_with('*'),
        })
    }
}

impl CronSchedule {
    /// The normalised expression text.
    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// Whether `t` (truncated to the minute) matches this schedule.
    pub fn matches(&self, t: &DateTime<Utc>) -> bool {
        self.date_matches(t.date_naive())
            && bit(u64::from(self.hours), t.hour())
            && bit(self.minutes, t.minute())
    }

    /// First whole minute strictly after `after` that matches, or `None` if
    /// nothing matches within five years (e.g. `0 0 30 2 *`).
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);

        let mut date = start.date_naive();
        let mut first_day = true;

        for _ in 0..MAX_SEARCH_DAYS {
            if self.date_matches(date) {
                let from_hour = if first_day { start.hour() } else { 0 };
                for hour in from_hour..24 {
                    if !bit(u64::from(self.hours), hour) {
                        continue;
                    }
                    let from_minute = if first_day && hour == start.hour() {
                        start.minute()
                    } else {
                        0
                    };
                    for minute in from_minute..60 {
                        if bit(self.minutes, minute) {
                            return date.and_hms_opt(hour, minute, 0).map(|dt| dt.and_utc());
                        }
                    }
                }
            }
            date = date.succ_opt()?;
            first_day = false;
        }

        None
    }

    fn date_matches(&self, date: NaiveDate) -> bool {
        if !bit(u64::from(self.months), date.month()) {
            return false;
        }
        let dom_ok = bit(u64::from(self.days_of_month), date.day());
        let dow_ok = bit(
            u64::from(self.days_of_week),
            date.weekday().num_days_from_sunday(),
        );

        if self.dom_restricted && self.dow_restricted {
            dom_ok || dow_ok
        } else {
            dom_ok && dow_ok
        }
    }
}

fn bit(mask: u64, n: u32) -> bool {
    mask & (1u64 << n) != 0
}

/// Parse one cron field into a bitmask where bit `n` means value `n`.
fn parse_field(text: &str, min: u32, max: u32, name: &str) -> Result<u64, String> {
    let mut mask = 0u64;

    for part in text.split(',') {
        if part.is_empty() {
            return Err(format!("empty list item in {name} field '{text}'"));
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step '{step}' in {name} field '{text}'"))?;
                if step == 0 {
                    return Err(format!("step must be >= 1 in {name} field '{text}'"));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, name)?, parse_value(b, name)?)
        } else {
            let value = parse_value(range, name)?;
            // `n/s` means "from n to the end, every s".
            if step.is_some() { (value, max) } else { (value, value) }
        };

        if lo < min || hi > max || lo > hi {
            return Err(format!(
                "{name} range '{range}' out of bounds ({min}-{max})"
            ));
        }

        let step = step.unwrap_or(1) as usize;
        for value in (lo..=hi).step_by(step) {
            mask |= 1u64 << value;
        }
    }

    Ok(mask)
}

fn parse_value(text: &str, name: &str) -> Result<u32, String> {
    text.parse()
        .map_err(|_| format!("invalid {name} value '{text}'"))
}
