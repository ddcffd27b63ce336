//! `DateTime` conversion and register utilities for the PCF8563 RTC.
//!
//! This module provides the BCD register codec and the internal
//! representation of the PCF8563's seven time registers. It converts between
//! those registers and chrono's `NaiveDateTime`.
//!
//! # Register Model
//!
//! The PCF8563 stores date and time in 7 consecutive registers starting at
//! `0x02`:
//! - Seconds, Minutes, Hours, Days, Weekdays, Century/Months, Years
//!
//! The clock is kept in UTC. Years are stored as an offset from 2000.
//!
//! # Error Handling
//!
//! Conversion errors are reported via [`DateTimeError`].

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use log::{debug, error, warn};

use crate::{Days, Hours, Minutes, Months, Seconds, Weekdays, Years};

/// Decodes a BCD register value.
///
/// Only the two low nibbles are considered; callers mask off flag bits first.
pub fn decode_bcd(value: u8) -> u8 {
    (value & 0x0F) + 10 * ((value >> 4) & 0x0F)
}

/// Encodes a value in the range 0-99 as BCD.
///
/// Values above 99 are a caller error; they must be range checked first.
pub fn encode_bcd(value: u8) -> u8 {
    debug_assert!(value <= 99, "BCD value out of range: {}", value);
    ((value / 10) << 4) | (value % 10)
}

/// Internal representation of the PCF8563 RTC date and time.
///
/// This struct models the 7 date/time registers of the PCF8563, using
/// strongly-typed bitfield wrappers for each field.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct PCF8563DateTime {
    seconds: Seconds,
    minutes: Minutes,
    hours: Hours,
    days: Days,
    weekdays: Weekdays,
    months: Months,
    years: Years,
}

impl PCF8563DateTime {
    /// Helper function to convert a number to BCD format with validation
    pub(crate) fn make_bcd(value: u32, max_value: u32) -> Result<(u8, u8), DateTimeError> {
        if value > max_value {
            return Err(DateTimeError::InvalidDateTime);
        }
        let ones = u8::try_from(value % 10).map_err(|_| DateTimeError::InvalidDateTime)?;
        let tens = u8::try_from(value / 10).map_err(|_| DateTimeError::InvalidDateTime)?;
        Ok((ones, tens))
    }

    fn convert_year(year: i32) -> Result<Years, DateTimeError> {
        if year > 2099 {
            error!("Year {} is too late! must be before 2100", year);
            return Err(DateTimeError::YearNotBefore2100);
        }
        if year < 2000 {
            error!("Year {} is too early! must be greater than 1999", year);
            return Err(DateTimeError::YearNotAfter1999);
        }
        let offset = u32::try_from(year - 2000).map_err(|_| DateTimeError::InvalidDateTime)?;
        let (ones, tens) = Self::make_bcd(offset, 99)?;
        let mut value = Years::default();
        value.set_year(ones);
        value.set_ten_year(tens);
        Ok(value)
    }

    pub(crate) fn from_datetime(datetime: &NaiveDateTime) -> Result<Self, DateTimeError> {
        let seconds = {
            let (ones, tens) = Self::make_bcd(datetime.second(), 59)?;
            let mut value = Seconds::default();
            value.set_seconds(ones);
            value.set_ten_seconds(tens);
            value
        };
        let minutes = {
            let (ones, tens) = Self::make_bcd(datetime.minute(), 59)?;
            let mut value = Minutes::default();
            value.set_minutes(ones);
            value.set_ten_minutes(tens);
            value
        };
        let hours = {
            let (ones, tens) = Self::make_bcd(datetime.hour(), 23)?;
            let mut value = Hours::default();
            value.set_hours(ones);
            value.set_ten_hours(tens);
            value
        };
        let days = {
            let (ones, tens) = Self::make_bcd(datetime.day(), 31)?;
            let mut value = Days::default();
            value.set_days(ones);
            value.set_ten_days(tens);
            value
        };
        let weekdays = {
            let weekday = u8::try_from(datetime.weekday().num_days_from_sunday())
                .map_err(|_| DateTimeError::InvalidDateTime)?;
            let mut value = Weekdays::default();
            value.set_weekday(weekday);
            value
        };
        let months = {
            let (ones, tens) = Self::make_bcd(datetime.month(), 12)?;
            let mut value = Months::default();
            value.set_month(ones);
            value.set_ten_month(tens);
            value
        };
        let years = Self::convert_year(datetime.year())?;

        let raw = PCF8563DateTime {
            seconds,
            minutes,
            hours,
            days,
            weekdays,
            months,
            years,
        };

        debug!("raw={:?}", raw);

        Ok(raw)
    }

    pub(crate) fn into_datetime(self) -> Result<NaiveDateTime, DateTimeError> {
        if self.seconds.voltage_low() {
            warn!("RTC voltage-low flag set, clock integrity is not guaranteed");
        }
        let seconds = u32::from(10 * self.seconds.ten_seconds() + self.seconds.seconds());
        let minutes = u32::from(decode_bcd(u8::from(self.minutes) & 0x7F));
        let hours = u32::from(decode_bcd(u8::from(self.hours) & 0x3F));
        let date = u32::from(decode_bcd(u8::from(self.days) & 0x3F));
        let month = match decode_bcd(u8::from(self.months) & 0x1F) {
            // Uninitialized clock
            0 => 1,
            month => u32::from(month),
        };
        let year = 2000 + i32::from(decode_bcd(u8::from(self.years)));
        debug!(
            "decoded {}-{}-{} {}:{}:{} (weekday register {} ignored)",
            year,
            month,
            date,
            hours,
            minutes,
            seconds,
            self.weekdays.weekday()
        );

        NaiveDate::from_ymd_opt(year, month, date)
            .and_then(|d| d.and_hms_opt(hours, minutes, seconds))
            .ok_or(DateTimeError::InvalidDateTime)
    }
}

impl From<[u8; 7]> for PCF8563DateTime {
    fn from(data: [u8; 7]) -> Self {
        PCF8563DateTime {
            seconds: Seconds::from(data[0]),
            minutes: Minutes::from(data[1]),
            hours: Hours::from(data[2]),
            days: Days::from(data[3]),
            weekdays: Weekdays::from(data[4]),
            months: Months::from(data[5]),
            years: Years::from(data[6]),
        }
    }
}

impl From<&PCF8563DateTime> for [u8; 7] {
    fn from(dt: &PCF8563DateTime) -> [u8; 7] {
        [
            u8::from(dt.seconds),
            u8::from(dt.minutes),
            u8::from(dt.hours),
            u8::from(dt.days),
            u8::from(dt.weekdays),
            u8::from(dt.months),
            u8::from(dt.years),
        ]
    }
}

/// Errors that can occur during PCF8563 date/time conversion or validation.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum DateTimeError {
    /// The provided or decoded date/time is invalid (e.g., out of range, not representable)
    #[error("invalid date/time")]
    InvalidDateTime,
    /// The year is not before 2100 (the year register holds 0-99 from 2000)
    #[error("year must be before 2100")]
    YearNotBefore2100,
    /// The year is not after 1999
    #[error("year must be after 1999")]
    YearNotAfter1999,
}
