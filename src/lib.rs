//! Schedule-driven wake alarms for the NXP PCF8563 real-time clock.
//!
//! The PCF8563 keeps running on its backup battery while the host is powered
//! off, and its single alarm can pull the host's power-enable line. This
//! crate keeps that alarm armed for the nearest scheduled power-on time:
//!
//! - [`PCF8563`] is a blocking `embedded-hal` 1.0 driver for the clock,
//!   alarm, timer and event flag registers.
//! - [`schedule`] parses cron-like schedule lines into entries.
//! - [`occurrence`] finds the next time an entry fires.
//! - [`timezone`] shifts alarm fields between local time and UTC.
//! - [`service`] runs the loop that re-arms the alarm and shuts the host
//!   down on power-off entries.
//!
//! The clock itself always runs on UTC.
//!
//! # Example
//!
//! ```rust,ignore
//! use pcf8563_wake::{AlarmFields, PCF8563, DEFAULT_ADDRESS};
//!
//! let mut rtc = PCF8563::new(i2c, DEFAULT_ADDRESS);
//! let now = rtc.datetime()?;
//!
//! // Wake every day at 06:30 UTC
//! rtc.set_alarm(&AlarmFields {
//!     hour: Some(6),
//!     minute: Some(30),
//!     ..Default::default()
//! })?;
//! ```

pub mod alarm;
pub mod config;
pub mod datetime;
pub mod occurrence;
pub mod registers;
pub mod schedule;
pub mod service;
pub mod status;
pub mod timezone;

use chrono::NaiveDateTime;
use embedded_hal::i2c::I2c;
use log::{debug, info};
use paste::paste;

pub use alarm::{AlarmError, AlarmFields, PCF8563Alarm};
pub use datetime::{decode_bcd, encode_bcd, DateTimeError};
pub use registers::*;
pub use status::TimerSetting;

use datetime::PCF8563DateTime;

/// 7-bit I2C address of the PCF8563.
pub const DEFAULT_ADDRESS: u8 = 0x51;

/// Errors that can occur when talking to the PCF8563.
#[derive(Debug, thiserror::Error)]
pub enum PCF8563Error<I2CE> {
    /// I2C bus error
    #[error("I2C error: {0:?}")]
    I2c(I2CE),
    /// Date/time conversion error
    #[error("date/time conversion: {0}")]
    DateTime(DateTimeError),
    /// Alarm fields out of range
    #[error("alarm configuration: {0}")]
    Alarm(AlarmError),
}

impl<I2CE> From<I2CE> for PCF8563Error<I2CE> {
    fn from(e: I2CE) -> Self {
        PCF8563Error::I2c(e)
    }
}

/// PCF8563 real-time clock driver.
///
/// Owns the I2C bus handle for its whole lifetime. Use
/// [`PCF8563::destroy`] to get it back.
pub struct PCF8563<I2C: I2c> {
    i2c: I2C,
    address: u8,
}

impl<I2C: I2c> PCF8563<I2C> {
    /// Creates a new driver instance.
    ///
    /// # Arguments
    /// * `i2c` - The I2C bus implementation
    /// * `address` - The I2C address of the device (normally [`DEFAULT_ADDRESS`])
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Releases the I2C bus.
    pub fn destroy(self) -> I2C {
        self.i2c
    }

    fn read_raw_datetime(&mut self) -> Result<PCF8563DateTime, PCF8563Error<I2C::Error>> {
        let mut data = [0; 7];
        self.i2c
            .write_read(self.address, &[RegAddr::Seconds as u8], &mut data)?;
        debug!("PCF8563: read datetime registers {:02x?}", data);
        Ok(data.into())
    }

    fn write_raw_datetime(
        &mut self,
        datetime: &PCF8563DateTime,
    ) -> Result<(), PCF8563Error<I2C::Error>> {
        let data: [u8; 7] = datetime.into();
        self.i2c.write(
            self.address,
            &[
                RegAddr::Seconds as u8,
                data[0],
                data[1],
                data[2],
                data[3],
                data[4],
                data[5],
                data[6],
            ],
        )?;
        Ok(())
    }

    /// Reads the current date and time (UTC).
    ///
    /// # Errors
    ///
    /// Returns an error on a bus failure or if the registers do not hold a
    /// valid date.
    pub fn datetime(&mut self) -> Result<NaiveDateTime, PCF8563Error<I2C::Error>> {
        let raw = self.read_raw_datetime()?;
        raw.into_datetime().map_err(PCF8563Error::DateTime)
    }

    /// Sets the date and time (UTC).
    ///
    /// # Errors
    ///
    /// Returns an error on a bus failure or if the year is outside 2000-2099.
    pub fn set_datetime(&mut self, datetime: &NaiveDateTime) -> Result<(), PCF8563Error<I2C::Error>> {
        let raw = PCF8563DateTime::from_datetime(datetime).map_err(PCF8563Error::DateTime)?;
        self.write_raw_datetime(&raw)
    }

    /// Returns true if the event's fired flag is set.
    pub fn has_event_flag(&mut self, flag: EventFlag) -> Result<bool, PCF8563Error<I2C::Error>> {
        Ok(self.control_status2()?.fired(flag))
    }

    /// Clears the event's fired flag if it is set.
    ///
    /// Returns whether the event had fired. Nothing is written when it had
    /// not.
    pub fn clear_event_flag(&mut self, flag: EventFlag) -> Result<bool, PCF8563Error<I2C::Error>> {
        let mut status = self.control_status2()?;
        if !status.fired(flag) {
            return Ok(false);
        }
        status.clear_fired(flag);
        self.set_control_status2(status)?;
        debug!("PCF8563: cleared {:?} flag", flag);
        Ok(true)
    }

    /// Enables or disables the event's interrupt.
    pub fn set_event_enabled(
        &mut self,
        flag: EventFlag,
        enabled: bool,
    ) -> Result<(), PCF8563Error<I2C::Error>> {
        let mut status = self.control_status2()?;
        status.set_enabled(flag, enabled);
        self.set_control_status2(status)
    }

    fn write_alarm(&mut self, alarm: &PCF8563Alarm) -> Result<(), PCF8563Error<I2C::Error>> {
        self.set_minute_alarm(alarm.minute())?;
        self.set_hour_alarm(alarm.hour())?;
        self.set_day_alarm(alarm.day())?;
        self.set_weekday_alarm(alarm.weekday())
    }

    /// Programs and enables the alarm. The fields must already be in UTC.
    ///
    /// A pending alarm flag is cleared before the registers are written.
    ///
    /// # Errors
    ///
    /// Returns [`PCF8563Error::Alarm`] without touching the bus if a field
    /// is out of range.
    pub fn set_alarm(&mut self, fields: &AlarmFields) -> Result<(), PCF8563Error<I2C::Error>> {
        let alarm = PCF8563Alarm::from_fields(fields).map_err(PCF8563Error::Alarm)?;
        self.clear_event_flag(EventFlag::Alarm)?;
        self.write_alarm(&alarm)?;
        self.set_event_enabled(EventFlag::Alarm, true)?;
        info!("PCF8563: alarm set to {:?} UTC", fields);
        Ok(())
    }

    /// Disables the alarm interrupt and every alarm field.
    pub fn clear_alarm(&mut self) -> Result<(), PCF8563Error<I2C::Error>> {
        self.set_event_enabled(EventFlag::Alarm, false)?;
        self.write_alarm(&PCF8563Alarm::disabled())?;
        info!("PCF8563: alarm cleared");
        Ok(())
    }

    /// Reads back the alarm fields (UTC).
    pub fn alarm(&mut self) -> Result<AlarmFields, PCF8563Error<I2C::Error>> {
        let alarm = PCF8563Alarm::from_registers(
            self.minute_alarm()?,
            self.hour_alarm()?,
            self.day_alarm()?,
            self.weekday_alarm()?,
        );
        Ok(alarm.to_fields())
    }

    /// Disables the countdown timer and leaves it on the slowest clock.
    pub fn clear_timer(&mut self) -> Result<(), PCF8563Error<I2C::Error>> {
        self.set_event_enabled(EventFlag::Timer, false)?;
        let mut control = TimerControl::default();
        control.set_timer_enable(false);
        control.set_frequency(TimerFrequency::PerMinute);
        self.set_timer_control(control)?;
        self.set_timer(Timer::default())?;
        info!("PCF8563: timer cleared");
        Ok(())
    }

    /// Reads back the countdown timer configuration.
    pub fn timer_setting(&mut self) -> Result<TimerSetting, PCF8563Error<I2C::Error>> {
        let control = self.timer_control()?;
        let value = self.timer()?;
        Ok(TimerSetting::new(control, value))
    }
}

// Register access implementations
macro_rules! impl_register_access {
    ($(($name:ident, $regaddr:expr, $typ:ty)),+) => {
        impl<I2C: I2c> PCF8563<I2C> {
            $(
                paste! {
                    #[doc = concat!("Gets the value of the ", stringify!($name), " register.")]
                    pub fn $name(&mut self) -> Result<$typ, PCF8563Error<I2C::Error>> {
                        let mut data = [0];
                        self.i2c
                            .write_read(self.address, &[$regaddr as u8], &mut data)?;
                        Ok(<$typ>::from(data[0]))
                    }

                    #[doc = concat!("Sets the value of the ", stringify!($name), " register.")]
                    pub fn [<set_ $name>](&mut self, value: $typ) -> Result<(), PCF8563Error<I2C::Error>> {
                        self.i2c.write(
                            self.address,
                            &[$regaddr as u8, value.into()],
                        )?;
                        Ok(())
                    }
                }
            )+
        }
    }
}

impl_register_access!(
    (control_status2, RegAddr::ControlStatus2, ControlStatus2),
    (second, RegAddr::Seconds, Seconds),
    (minute, RegAddr::Minutes, Minutes),
    (hour, RegAddr::Hours, Hours),
    (day, RegAddr::Days, Days),
    (weekday, RegAddr::Weekdays, Weekdays),
    (month, RegAddr::Months, Months),
    (year, RegAddr::Years, Years),
    (minute_alarm, RegAddr::MinuteAlarm, MinuteAlarm),
    (hour_alarm, RegAddr::HourAlarm, HourAlarm),
    (day_alarm, RegAddr::DayAlarm, DayAlarm),
    (weekday_alarm, RegAddr::WeekdayAlarm, WeekdayAlarm),
    (timer_control, RegAddr::TimerControl, TimerControl),
    (timer, RegAddr::Timer, Timer)
);
