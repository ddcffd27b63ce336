//! Human readable status of the alarm, timer and event flags.

use core::fmt;

use chrono::NaiveDate;

use crate::{
    alarm::AlarmFields,
    schedule::{describe_schedule, Field},
    timezone::{convert_alarm, Direction, UtcOffset},
    ControlStatus2, EventFlag, Timer, TimerControl, TimerFrequency, TI_TP,
};

/// Countdown timer configuration as read from the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimerSetting {
    control: TimerControl,
    value: Timer,
}

impl TimerSetting {
    pub fn new(control: TimerControl, value: Timer) -> Self {
        Self { control, value }
    }

    pub fn enabled(&self) -> bool {
        self.control.timer_enable()
    }

    pub fn frequency(&self) -> TimerFrequency {
        self.control.frequency()
    }

    /// Countdown value in source clock periods.
    pub fn value(&self) -> u8 {
        self.value.value()
    }

    fn unit(&self) -> &'static str {
        match self.frequency() {
            TimerFrequency::PerMinute => " Minute(s)",
            TimerFrequency::Hz1 => " Second(s)",
            TimerFrequency::Hz64 => "/64th Second",
            TimerFrequency::Hz4096 => "/4096th Second",
        }
    }

    /// Describes the timer. A disabled timer reads `None` unless
    /// `show_setting` asks for the idle interval.
    pub fn describe(&self, show_setting: bool) -> String {
        if self.enabled() {
            format!("Every {}{}", self.value(), self.unit())
        } else if show_setting {
            format!("Disabled (Interval every 1{})", self.unit())
        } else {
            "None".to_string()
        }
    }
}

impl fmt::Display for TimerSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(true))
    }
}

fn field(value: Option<u8>) -> Field {
    value.map_or(Field::Any, |v| Field::List(vec![u32::from(v)]))
}

fn describe_fields(fields: &AlarmFields) -> String {
    describe_schedule(
        &Field::Any,
        &field(fields.weekday),
        &field(fields.date),
        &field(fields.hour),
        &field(fields.minute),
    )
}

/// Describes the alarm registers (UTC) in local time, e.g.
/// `Daily: 7am Local (RTC Schedule: Daily: 6am UTC)`.
///
/// Returns `None` as text when every field is disabled.
pub fn describe_alarm(utc: &AlarmFields, offset: UtcOffset, today: NaiveDate) -> String {
    if utc.is_empty() {
        return "None".to_string();
    }
    let local = convert_alarm(*utc, offset, Direction::FromUtc, today);
    format!(
        "{} Local (RTC Schedule: {} UTC)",
        describe_fields(&local),
        describe_fields(utc)
    )
}

/// Multi-line report of the Control/Status 2 flags.
pub fn describe_control_status(status: ControlStatus2) -> String {
    let raw = u8::from(status);
    format!(
        "Control Status 2\n\tTI_TP Flag: {}\n\tAlarm Flag: {} ( Enabled = {} )\n\tTimer Flag: {} ( Enabled = {} )",
        raw & TI_TP != 0,
        status.fired(EventFlag::Alarm),
        status.enabled(EventFlag::Alarm),
        status.fired(EventFlag::Timer),
        status.enabled(EventFlag::Timer),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[test]
    fn test_timer_description() {
        let mut control = TimerControl::default();
        control.set_frequency(TimerFrequency::PerMinute);
        let idle = TimerSetting::new(control, Timer::default());
        assert_eq!(idle.describe(false), "None");
        assert_eq!(idle.describe(true), "Disabled (Interval every 1 Minute(s))");

        control.set_timer_enable(true);
        control.set_frequency(TimerFrequency::Hz1);
        let running = TimerSetting::new(control, Timer::from(30));
        assert_eq!(running.to_string(), "Every 30 Second(s)");
    }

    #[test]
    fn test_alarm_description() {
        let utc = AlarmFields {
            hour: Some(6),
            minute: Some(0),
            ..Default::default()
        };
        assert_eq!(
            describe_alarm(&utc, UtcOffset::from_seconds(3600), today()),
            "Daily: 7am Local (RTC Schedule: Daily: 6am UTC)"
        );
    }

    #[test]
    fn test_alarm_description_crosses_day() {
        // Sunday 23:30 UTC is Monday 05:00 at +05:30
        let utc = AlarmFields {
            weekday: Some(0),
            hour: Some(23),
            minute: Some(30),
            ..Default::default()
        };
        assert_eq!(
            describe_alarm(&utc, UtcOffset::from_seconds(19800), today()),
            "Weekly: on Mon,at 5am Local (RTC Schedule: Weekly: on Sun,at 11:30pm UTC)"
        );
    }

    #[test]
    fn test_disabled_alarm_description() {
        assert_eq!(
            describe_alarm(&AlarmFields::default(), UtcOffset::default(), today()),
            "None"
        );
    }

    #[test]
    fn test_control_status_report() {
        let report = describe_control_status(ControlStatus2::from(0x0A));
        assert!(report.contains("TI_TP Flag: false"));
        assert!(report.contains("Alarm Flag: true ( Enabled = true )"));
        assert!(report.contains("Timer Flag: false ( Enabled = false )"));
    }
}
