//! Register definitions and bitfield structures for the PCF8563 RTC.
//!
//! This module contains the register addresses, bitfield definitions, and
//! related types for interacting with the PCF8563 Real-Time Clock registers.
//! Time and alarm values are BCD encoded; the alarm registers carry an
//! "alarm disabled" bit in bit 7.

use bitfield::bitfield;

/// Register addresses for the PCF8563 RTC.
#[allow(unused)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RegAddr {
    /// Control/Status 1 register (test and stop bits)
    ControlStatus1 = 0x00,
    /// Control/Status 2 register (alarm/timer flags and enables)
    ControlStatus2 = 0x01,
    /// Seconds register (0-59) with voltage-low flag
    Seconds = 0x02,
    /// Minutes register (0-59)
    Minutes = 0x03,
    /// Hours register (0-23)
    Hours = 0x04,
    /// Days register (1-31)
    Days = 0x05,
    /// Weekdays register (0-6, 0=Sunday)
    Weekdays = 0x06,
    /// Century/Months register (1-12)
    Months = 0x07,
    /// Years register (0-99)
    Years = 0x08,
    /// Minute alarm register
    MinuteAlarm = 0x09,
    /// Hour alarm register
    HourAlarm = 0x0A,
    /// Day alarm register
    DayAlarm = 0x0B,
    /// Weekday alarm register
    WeekdayAlarm = 0x0C,
    /// CLKOUT control register
    ClkoutControl = 0x0D,
    /// Timer control register
    TimerControl = 0x0E,
    /// Timer countdown value register
    Timer = 0x0F,
}

/// Value written to an alarm register to disable it.
pub const ALARM_DISABLED: u8 = 0x80;

/// Shared timer/interrupt mode bit of Control/Status 2.
///
/// Must be zero whenever either interrupt enable bit is written.
pub const TI_TP: u8 = 0x10;

/// The two event sources latched in Control/Status 2.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventFlag {
    /// Alarm flag (AF, bit 3); enabled by AIE (bit 1)
    Alarm,
    /// Timer flag (TF, bit 2); enabled by TIE (bit 0)
    Timer,
}

impl EventFlag {
    /// Bit mask of the "fired" flag.
    pub const fn mask(self) -> u8 {
        match self {
            EventFlag::Alarm => 0x08,
            EventFlag::Timer => 0x04,
        }
    }

    /// Bit mask of the paired interrupt enable bit.
    pub const fn enable_mask(self) -> u8 {
        self.mask() >> 2
    }
}

/// Countdown timer source clock frequency.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TimerFrequency {
    /// 4.096 kHz source clock
    Hz4096 = 0b00,
    /// 64 Hz source clock
    Hz64 = 0b01,
    /// 1 Hz source clock
    Hz1 = 0b10,
    /// 1/60 Hz source clock
    PerMinute = 0b11,
}
impl From<u8> for TimerFrequency {
    /// Creates a `TimerFrequency` from a raw register value.
    ///
    /// # Panics
    /// Panics if the value is not 0b00, 0b01, 0b10, or 0b11.
    fn from(v: u8) -> Self {
        match v {
            0b00 => TimerFrequency::Hz4096,
            0b01 => TimerFrequency::Hz64,
            0b10 => TimerFrequency::Hz1,
            0b11 => TimerFrequency::PerMinute,
            _ => panic!("Invalid value for TimerFrequency: {}", v),
        }
    }
}
impl From<TimerFrequency> for u8 {
    /// Converts a `TimerFrequency` to its raw register value.
    fn from(v: TimerFrequency) -> Self {
        v as u8
    }
}

// This macro generates the From<u8> and Into<u8> implementations for the
// register type
macro_rules! from_register_u8 {
    ($typ:ty) => {
        impl From<u8> for $typ {
            fn from(v: u8) -> Self {
                paste::paste!([< $typ >](v))
            }
        }
        impl From<$typ> for u8 {
            fn from(v: $typ) -> Self {
                v.0
            }
        }
    };
}

bitfield! {
    /// Control/Status 2 register: alarm and timer event flags.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct ControlStatus2(u8);
    impl Debug;
    /// Timer interrupt mode (pulse vs. level), shared by both sources
    pub ti_tp, set_ti_tp: 4;
    /// Alarm fired flag (AF)
    pub alarm_flag, set_alarm_flag: 3;
    /// Timer fired flag (TF)
    pub timer_flag, set_timer_flag: 2;
    /// Alarm interrupt enable (AIE)
    pub alarm_interrupt_enable, set_alarm_interrupt_enable: 1;
    /// Timer interrupt enable (TIE)
    pub timer_interrupt_enable, set_timer_interrupt_enable: 0;
}
from_register_u8!(ControlStatus2);

impl ControlStatus2 {
    /// Returns true if the given event has fired.
    pub fn fired(&self, flag: EventFlag) -> bool {
        self.0 & flag.mask() != 0
    }

    /// Returns true if the given event's interrupt is enabled.
    pub fn enabled(&self, flag: EventFlag) -> bool {
        self.0 & flag.enable_mask() != 0
    }

    /// Clears the fired flag of the given event.
    pub fn clear_fired(&mut self, flag: EventFlag) {
        self.0 &= !flag.mask();
    }

    /// Sets or clears the interrupt enable of the given event.
    ///
    /// The fired flag of the same event and the TI_TP mode bit are cleared in
    /// the same write.
    pub fn set_enabled(&mut self, flag: EventFlag, enabled: bool) {
        let (enable, disable) = if enabled {
            (flag.enable_mask(), 0)
        } else {
            (0, flag.enable_mask())
        };
        self.0 = (self.0 & !(flag.mask() | disable | TI_TP)) | enable;
    }
}

bitfield! {
    /// Seconds register (0-59) with BCD encoding and voltage-low flag.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Seconds(u8);
    impl Debug;
    /// Clock integrity is no longer guaranteed
    pub voltage_low, set_voltage_low: 7;
    /// Tens place of seconds (0-5)
    pub ten_seconds, set_ten_seconds: 6, 4;
    /// Ones place of seconds (0-9)
    pub seconds, set_seconds: 3, 0;
}
from_register_u8!(Seconds);

bitfield! {
    /// Minutes register (0-59) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Minutes(u8);
    impl Debug;
    /// Tens place of minutes (0-5)
    pub ten_minutes, set_ten_minutes: 6, 4;
    /// Ones place of minutes (0-9)
    pub minutes, set_minutes: 3, 0;
}
from_register_u8!(Minutes);

bitfield! {
    /// Hours register (0-23) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Hours(u8);
    impl Debug;
    /// Tens place of hours (0-2)
    pub ten_hours, set_ten_hours: 5, 4;
    /// Ones place of hours (0-9)
    pub hours, set_hours: 3, 0;
}
from_register_u8!(Hours);

bitfield! {
    /// Days register (1-31) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Days(u8);
    impl Debug;
    /// Tens place of day (0-3)
    pub ten_days, set_ten_days: 5, 4;
    /// Ones place of day (0-9)
    pub days, set_days: 3, 0;
}
from_register_u8!(Days);

bitfield! {
    /// Weekdays register (0-6, 0=Sunday).
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Weekdays(u8);
    impl Debug;
    /// Day of week (0-6)
    pub weekday, set_weekday: 2, 0;
}
from_register_u8!(Weekdays);

bitfield! {
    /// Century/Months register (1-12) with century flag and BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Months(u8);
    impl Debug;
    /// Century flag
    pub century, set_century: 7;
    /// Tens place of month (0-1)
    pub ten_month, set_ten_month: 4, 4;
    /// Ones place of month (0-9)
    pub month, set_month: 3, 0;
}
from_register_u8!(Months);

bitfield! {
    /// Years register (0-99) with BCD encoding.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Years(u8);
    impl Debug;
    /// Tens place of year (0-9)
    pub ten_year, set_ten_year: 7, 4;
    /// Ones place of year (0-9)
    pub year, set_year: 3, 0;
}
from_register_u8!(Years);

// Alarm register types with the AE (alarm disabled) bit

bitfield! {
    /// Minute alarm register with disable bit.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct MinuteAlarm(u8);
    impl Debug;
    /// Alarm disabled (AE_M)
    pub disabled, set_disabled: 7;
    /// Tens place of minutes (0-5)
    pub ten_minutes, set_ten_minutes: 6, 4;
    /// Ones place of minutes (0-9)
    pub minutes, set_minutes: 3, 0;
}
from_register_u8!(MinuteAlarm);

bitfield! {
    /// Hour alarm register with disable bit.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct HourAlarm(u8);
    impl Debug;
    /// Alarm disabled (AE_H)
    pub disabled, set_disabled: 7;
    /// Tens place of hours (0-2)
    pub ten_hours, set_ten_hours: 5, 4;
    /// Ones place of hours (0-9)
    pub hours, set_hours: 3, 0;
}
from_register_u8!(HourAlarm);

bitfield! {
    /// Day alarm register with disable bit.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct DayAlarm(u8);
    impl Debug;
    /// Alarm disabled (AE_D)
    pub disabled, set_disabled: 7;
    /// Tens place of day (0-3)
    pub ten_days, set_ten_days: 5, 4;
    /// Ones place of day (0-9)
    pub days, set_days: 3, 0;
}
from_register_u8!(DayAlarm);

bitfield! {
    /// Weekday alarm register with disable bit.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct WeekdayAlarm(u8);
    impl Debug;
    /// Alarm disabled (AE_W)
    pub disabled, set_disabled: 7;
    /// Day of week (0-6)
    pub weekday, set_weekday: 2, 0;
}
from_register_u8!(WeekdayAlarm);

bitfield! {
    /// Timer control register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct TimerControl(u8);
    impl Debug;
    /// Timer enabled (TE)
    pub timer_enable, set_timer_enable: 7;
    /// Timer source clock frequency (TD)
    pub from into TimerFrequency, frequency, set_frequency: 1, 0;
}
from_register_u8!(TimerControl);

bitfield! {
    /// Timer countdown value register.
    #[derive(Clone, Copy, Default, PartialEq)]
    pub struct Timer(u8);
    impl Debug;
    /// Countdown value (binary)
    pub value, set_value: 7, 0;
}
from_register_u8!(Timer);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_flag_masks() {
        assert_eq!(EventFlag::Alarm.mask(), 0x08);
        assert_eq!(EventFlag::Alarm.enable_mask(), 0x02);
        assert_eq!(EventFlag::Timer.mask(), 0x04);
        assert_eq!(EventFlag::Timer.enable_mask(), 0x01);
    }

    #[test]
    fn test_control_status2_conversions() {
        let status = ControlStatus2::from(0b0001_1010);
        assert!(status.ti_tp());
        assert!(status.alarm_flag());
        assert!(!status.timer_flag());
        assert!(status.alarm_interrupt_enable());
        assert!(!status.timer_interrupt_enable());
        assert!(status.fired(EventFlag::Alarm));
        assert!(!status.fired(EventFlag::Timer));
        assert!(status.enabled(EventFlag::Alarm));
        assert_eq!(u8::from(status), 0b0001_1010);
    }

    #[test]
    fn test_control_status2_clear_fired() {
        let mut status = ControlStatus2::from(0x0C);
        status.clear_fired(EventFlag::Alarm);
        assert_eq!(u8::from(status), 0x04);
        status.clear_fired(EventFlag::Timer);
        assert_eq!(u8::from(status), 0x00);
    }

    #[test]
    fn test_control_status2_enable_clears_mode_bit() {
        // TI_TP set, timer enabled, alarm fired
        let mut status = ControlStatus2::from(0x19);
        status.set_enabled(EventFlag::Alarm, true);
        assert!(!status.ti_tp());
        assert!(!status.alarm_flag());
        assert!(status.alarm_interrupt_enable());
        assert!(status.timer_interrupt_enable());
        assert_eq!(u8::from(status), 0x03);
    }

    #[test]
    fn test_control_status2_disable() {
        let mut status = ControlStatus2::from(0x17);
        status.set_enabled(EventFlag::Timer, false);
        assert!(!status.ti_tp());
        assert!(!status.timer_flag());
        assert!(!status.timer_interrupt_enable());
        // Alarm enable is untouched
        assert!(status.alarm_interrupt_enable());
        assert_eq!(u8::from(status), 0x02);
    }

    #[test]
    fn test_seconds_register_conversions() {
        let seconds = Seconds::from(0xD9); // 59 seconds, voltage low
        assert!(seconds.voltage_low());
        assert_eq!(seconds.ten_seconds(), 5);
        assert_eq!(seconds.seconds(), 9);

        let seconds = Seconds::from(0x30);
        assert!(!seconds.voltage_low());
        assert_eq!(seconds.ten_seconds(), 3);
        assert_eq!(seconds.seconds(), 0);
        assert_eq!(u8::from(seconds), 0x30);
    }

    #[test]
    fn test_hours_register_ignores_unused_bits() {
        let hours = Hours::from(0xE3); // 23 with garbage in bits 7-6
        assert_eq!(hours.ten_hours(), 2);
        assert_eq!(hours.hours(), 3);
    }

    #[test]
    fn test_months_register_conversions() {
        let month = Months::from(0x92); // century flag, month 12
        assert!(month.century());
        assert_eq!(month.ten_month(), 1);
        assert_eq!(month.month(), 2);

        let month = Months::from(0x09);
        assert!(!month.century());
        assert_eq!(month.ten_month(), 0);
        assert_eq!(month.month(), 9);
    }

    #[test]
    fn test_alarm_register_bitfield_operations() {
        let mut minute = MinuteAlarm::default();
        minute.set_ten_minutes(4);
        minute.set_minutes(5);
        assert!(!minute.disabled());
        assert_eq!(u8::from(minute), 0x45);
        minute.set_disabled(true);
        assert_eq!(u8::from(minute), 0xC5);

        let hour = HourAlarm::from(ALARM_DISABLED);
        assert!(hour.disabled());
        assert_eq!(hour.ten_hours(), 0);
        assert_eq!(hour.hours(), 0);

        let day = DayAlarm::from(0x31);
        assert!(!day.disabled());
        assert_eq!(day.ten_days(), 3);
        assert_eq!(day.days(), 1);

        let weekday = WeekdayAlarm::from(0x06);
        assert!(!weekday.disabled());
        assert_eq!(weekday.weekday(), 6);
    }

    #[test]
    fn test_timer_control_conversions() {
        let control = TimerControl::from(0x83);
        assert!(control.timer_enable());
        assert_eq!(control.frequency(), TimerFrequency::PerMinute);

        let mut control = TimerControl::default();
        control.set_frequency(TimerFrequency::Hz1);
        assert!(!control.timer_enable());
        assert_eq!(u8::from(control), 0x02);
    }

    #[test]
    fn test_timer_frequency_conversions() {
        assert_eq!(TimerFrequency::from(0), TimerFrequency::Hz4096);
        assert_eq!(TimerFrequency::from(1), TimerFrequency::Hz64);
        assert_eq!(TimerFrequency::from(2), TimerFrequency::Hz1);
        assert_eq!(TimerFrequency::from(3), TimerFrequency::PerMinute);
        assert_eq!(u8::from(TimerFrequency::PerMinute), 3);
    }

    #[test]
    #[should_panic(expected = "Invalid value for TimerFrequency: 4")]
    fn test_invalid_timer_frequency_conversion() {
        let _ = TimerFrequency::from(4);
    }
}
