//! Alarm configuration utilities for the PCF8563 RTC.
//!
//! The PCF8563 has a single alarm made of four registers (minute, hour, day,
//! weekday). Each register is independently enabled; the alarm fires when
//! every enabled register matches the clock. There is no seconds register, so
//! an alarm always fires at 00 seconds of the matching minute.
//!
//! [`AlarmFields`] is the typed form of that register set, with `None` for a
//! disabled field. [`PCF8563Alarm`] is the raw register image written to and
//! read from the device.

use chrono::{NaiveDateTime, Timelike};

use crate::{
    datetime::{decode_bcd, encode_bcd},
    schedule::ScheduleEntry,
    DayAlarm, HourAlarm, MinuteAlarm, WeekdayAlarm, ALARM_DISABLED,
};

/// Error type for alarm configuration operations.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum AlarmError {
    /// Invalid time component value
    #[error("invalid alarm time: {0}")]
    InvalidTime(&'static str),
    /// Invalid day of week (must be 0-6)
    #[error("invalid alarm day of week (must be 0-6)")]
    InvalidDayOfWeek,
    /// Invalid date of month (must be 1-31)
    #[error("invalid alarm date of month (must be 1-31)")]
    InvalidDateOfMonth,
    /// No field is enabled
    #[error("alarm has no enabled field")]
    Empty,
}

/// The four alarm fields, each either disabled (`None`) or a value.
///
/// Weekday uses the RTC convention: 0 = Sunday ... 6 = Saturday.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlarmFields {
    /// Day of week (0-6)
    pub weekday: Option<u8>,
    /// Date of month (1-31)
    pub date: Option<u8>,
    /// Hour (0-23)
    pub hour: Option<u8>,
    /// Minute (0-59)
    pub minute: Option<u8>,
}

impl AlarmFields {
    /// Validates the alarm fields.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is out of range or if every field is
    /// disabled.
    pub fn validate(&self) -> Result<(), AlarmError> {
        if self.is_empty() {
            return Err(AlarmError::Empty);
        }
        if self.minute.is_some_and(|m| m > 59) {
            return Err(AlarmError::InvalidTime("minutes must be 0-59"));
        }
        if self.hour.is_some_and(|h| h > 23) {
            return Err(AlarmError::InvalidTime("hours must be 0-23"));
        }
        if self.weekday.is_some_and(|w| w > 6) {
            return Err(AlarmError::InvalidDayOfWeek);
        }
        if self.date.is_some_and(|d| d == 0 || d > 31) {
            return Err(AlarmError::InvalidDateOfMonth);
        }
        Ok(())
    }

    /// Returns true if every field is disabled.
    pub fn is_empty(&self) -> bool {
        self.weekday.is_none() && self.date.is_none() && self.hour.is_none() && self.minute.is_none()
    }

    /// Builds the local alarm for a resolved schedule occurrence.
    ///
    /// Weekday and date are only enabled when the entry pins them. Hour and
    /// minute always come from the resolved instant: a wildcard hour or
    /// minute still fires at one concrete time on the day it resolves to.
    ///
    /// # Errors
    ///
    /// Returns an error if a pinned value cannot be represented.
    pub fn for_occurrence(entry: &ScheduleEntry, at: &NaiveDateTime) -> Result<Self, AlarmError> {
        let weekday = entry
            .weekday
            .map(|w| u8::try_from(w).map_err(|_| AlarmError::InvalidDayOfWeek))
            .transpose()?;
        let date = entry
            .date
            .map(|d| u8::try_from(d).map_err(|_| AlarmError::InvalidDateOfMonth))
            .transpose()?;
        let hour = u8::try_from(at.hour()).map_err(|_| AlarmError::InvalidTime("hour"))?;
        let minute = u8::try_from(at.minute()).map_err(|_| AlarmError::InvalidTime("minute"))?;
        let fields = AlarmFields {
            weekday,
            date,
            hour: Some(hour),
            minute: Some(minute),
        };
        fields.validate()?;
        Ok(fields)
    }
}

/// Register image of the PCF8563 alarm.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PCF8563Alarm {
    minute: MinuteAlarm,
    hour: HourAlarm,
    day: DayAlarm,
    weekday: WeekdayAlarm,
}

impl PCF8563Alarm {
    /// Creates the register image for the given alarm fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the fields fail validation.
    pub fn from_fields(fields: &AlarmFields) -> Result<Self, AlarmError> {
        fields.validate()?;
        Ok(Self {
            minute: MinuteAlarm::from(Self::encode(fields.minute)),
            hour: HourAlarm::from(Self::encode(fields.hour)),
            day: DayAlarm::from(Self::encode(fields.date)),
            weekday: WeekdayAlarm::from(Self::encode(fields.weekday)),
        })
    }

    /// Register image with every field disabled.
    pub fn disabled() -> Self {
        Self::from_registers(
            MinuteAlarm::from(ALARM_DISABLED),
            HourAlarm::from(ALARM_DISABLED),
            DayAlarm::from(ALARM_DISABLED),
            WeekdayAlarm::from(ALARM_DISABLED),
        )
    }

    /// Creates an alarm from raw register values.
    pub fn from_registers(
        minute: MinuteAlarm,
        hour: HourAlarm,
        day: DayAlarm,
        weekday: WeekdayAlarm,
    ) -> Self {
        Self {
            minute,
            hour,
            day,
            weekday,
        }
    }

    /// Converts the register values back to alarm fields.
    pub fn to_fields(&self) -> AlarmFields {
        AlarmFields {
            weekday: (!self.weekday.disabled()).then(|| self.weekday.weekday()),
            date: (!self.day.disabled()).then(|| decode_bcd(u8::from(self.day) & 0x3F)),
            hour: (!self.hour.disabled()).then(|| decode_bcd(u8::from(self.hour) & 0x3F)),
            minute: (!self.minute.disabled()).then(|| decode_bcd(u8::from(self.minute) & 0x7F)),
        }
    }

    fn encode(value: Option<u8>) -> u8 {
        match value {
            Some(value) => encode_bcd(value) & 0x7F,
            None => ALARM_DISABLED,
        }
    }

    /// Returns the minute alarm register.
    pub fn minute(&self) -> MinuteAlarm {
        self.minute
    }

    /// Returns the hour alarm register.
    pub fn hour(&self) -> HourAlarm {
        self.hour
    }

    /// Returns the day alarm register.
    pub fn day(&self) -> DayAlarm {
        self.day
    }

    /// Returns the weekday alarm register.
    pub fn weekday(&self) -> WeekdayAlarm {
        self.weekday
    }
}
