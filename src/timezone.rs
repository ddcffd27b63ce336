//! Local/UTC conversion of alarm fields.
//!
//! The RTC runs on UTC while schedules are written in local time. An alarm
//! tuple is shifted field by field: minute, then hour, then a day carry into
//! weekday and date. Disabled fields never carry and are never altered.
//!
//! Date rollover uses the length of the month containing `today`, not the
//! month the shifted alarm would land in. Near a month boundary the shifted
//! date can therefore be off; this matches how the alarm was always computed
//! and is kept as is.

use chrono::{Datelike, NaiveDate};

use crate::{alarm::AlarmFields, occurrence::days_in_month};

/// Direction of an alarm conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local time to UTC (before writing the alarm registers)
    ToUtc,
    /// UTC to local time (when describing the alarm registers)
    FromUtc,
}

/// Host offset from UTC, truncated to whole minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UtcOffset {
    hours: i32,
    minutes: i32,
}

impl UtcOffset {
    /// Splits an offset in seconds (local minus UTC) into hours and minutes.
    ///
    /// The sub-minute remainder is discarded. Both parts carry the sign of
    /// the offset.
    pub fn from_seconds(seconds: i32) -> Self {
        let total_minutes = seconds / 60;
        Self {
            hours: total_minutes / 60,
            minutes: total_minutes % 60,
        }
    }

    /// Whole hours of the offset.
    pub fn hours(&self) -> i32 {
        self.hours
    }

    /// Remaining minutes of the offset.
    pub fn minutes(&self) -> i32 {
        self.minutes
    }
}

/// Shifts an alarm tuple between local time and UTC.
///
/// `today` selects the month whose length bounds a date carry.
pub fn convert_alarm(
    fields: AlarmFields,
    offset: UtcOffset,
    direction: Direction,
    today: NaiveDate,
) -> AlarmFields {
    let sign = match direction {
        Direction::ToUtc => -1,
        Direction::FromUtc => 1,
    };
    let shift_hours = sign * offset.hours();
    let shift_minutes = sign * offset.minutes();

    let mut result = fields;

    let mut hour_carry = 0;
    if let Some(minute) = fields.minute {
        let (wrapped, carry) = wrap(i32::from(minute) + shift_minutes, 60);
        result.minute = Some(wrapped);
        hour_carry = carry;
    }

    let mut day_carry = 0;
    if let Some(hour) = fields.hour {
        let (wrapped, carry) = wrap(i32::from(hour) + shift_hours + hour_carry, 24);
        result.hour = Some(wrapped);
        day_carry = carry;
    }

    if day_carry != 0 {
        if let Some(weekday) = fields.weekday {
            let (wrapped, _) = wrap(i32::from(weekday) + day_carry, 7);
            result.weekday = Some(wrapped);
        }
        if let Some(date) = fields.date.filter(|d| *d > 0) {
            let last = days_in_month(today.year(), today.month());
            let shifted = i32::from(date) + day_carry;
            let shifted = if shifted < 1 {
                last
            } else if shifted > i32::try_from(last).unwrap_or(31) {
                1
            } else {
                shifted.unsigned_abs()
            };
            result.date = u8::try_from(shifted).ok();
        }
    }

    result
}

/// Wraps `value` into `0..modulus`, returning the carry of -1, 0 or +1.
fn wrap(value: i32, modulus: i32) -> (u8, i32) {
    let carry = if value < 0 {
        -1
    } else if value >= modulus {
        1
    } else {
        0
    };
    let wrapped = value.rem_euclid(modulus);
    // rem_euclid of a positive modulus below 256 always fits
    (u8::try_from(wrapped).unwrap_or_default(), carry)
}
