//! Cron-like schedule lines and their expansion into concrete entries.
//!
//! A schedule line has the form `minute hour date month weekday command...`.
//! Each time field is either `*` or a comma separated list of integers; a
//! field that fails to parse degrades to `*` instead of rejecting the line.
//! The month field is accepted but never constrains anything.

use core::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};

const WEEKDAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// What a schedule entry does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Wake the host (programmed into the RTC alarm)
    PowerOn,
    /// Shut the host down (polled while running)
    PowerOff,
}

impl Command {
    /// Normalizes free command text: `on` in any case powers on, anything
    /// else powers off.
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("on") {
            Command::PowerOn
        } else {
            Command::PowerOff
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PowerOn => write!(f, "Startup"),
            Command::PowerOff => write!(f, "Shutdown"),
        }
    }
}

/// One time field of a schedule line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    /// `*`, matches any value
    Any,
    /// Explicit values
    List(Vec<u32>),
}

impl Field {
    /// Parses `*` or `a,b,c`. Any malformed value turns the whole field into
    /// [`Field::Any`].
    pub fn parse(token: &str) -> Self {
        if token == "*" {
            return Field::Any;
        }
        token
            .split(',')
            .map(str::parse::<u32>)
            .collect::<Result<Vec<_>, _>>()
            .map_or(Field::Any, Field::List)
    }

    /// Expanded values, `None` standing for the wildcard.
    pub fn values(&self) -> Vec<Option<u32>> {
        match self {
            Field::Any => vec![None],
            Field::List(values) => values.iter().copied().map(Some).collect(),
        }
    }
}

/// One concrete rule from the expansion of a [`ScheduleLine`].
///
/// `None` is a wildcard. Weekday is 0 = Sunday ... 6 = Saturday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub minute: Option<u32>,
    pub hour: Option<u32>,
    pub date: Option<u32>,
    pub month: Option<u32>,
    pub weekday: Option<u32>,
    pub command: Command,
}

impl ScheduleEntry {
    /// Returns true if every pinned field equals the matching field of `at`.
    ///
    /// Seconds are not compared.
    pub fn matches(&self, at: &NaiveDateTime) -> bool {
        fn field_matches(field: Option<u32>, value: u32) -> bool {
            field.map_or(true, |f| f == value)
        }

        field_matches(self.minute, at.minute())
            && field_matches(self.hour, at.hour())
            && field_matches(self.date, at.day())
            && field_matches(self.month, at.month())
            && field_matches(self.weekday, at.weekday().num_days_from_sunday())
    }
}

/// A parsed schedule line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleLine {
    raw: String,
    minute: Field,
    hour: Field,
    date: Field,
    weekday: Field,
    command_text: String,
    command: Command,
}

impl ScheduleLine {
    /// Parses a line, returning `None` when it has fewer than six tokens.
    pub fn parse(raw: &str) -> Option<Self> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        if tokens.len() < 6 {
            return None;
        }
        let command_text = tokens[5..].join(" ");
        Some(Self {
            raw: raw.to_string(),
            minute: Field::parse(tokens[0]),
            hour: Field::parse(tokens[1]),
            date: Field::parse(tokens[2]),
            // tokens[3] is the month, accepted but not used
            weekday: Field::parse(tokens[4]),
            command: Command::parse(&command_text),
            command_text,
        })
    }

    /// The line as it was read.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn command(&self) -> Command {
        self.command
    }

    /// The command text as written in the line.
    pub fn command_text(&self) -> &str {
        &self.command_text
    }

    /// True when the minute field is literally `*`.
    pub fn every_minute(&self) -> bool {
        self.raw.split_whitespace().next() == Some("*")
    }

    /// Expands the line into one entry per combination of field values.
    pub fn entries(&self) -> Vec<ScheduleEntry> {
        let mut result = Vec::new();
        for minute in self.minute.values() {
            for hour in self.hour.values() {
                for date in self.date.values() {
                    for weekday in self.weekday.values() {
                        result.push(ScheduleEntry {
                            minute,
                            hour,
                            date,
                            month: None,
                            weekday,
                            command: self.command,
                        });
                    }
                }
            }
        }
        result
    }

    /// Human readable form, e.g. `Shutdown | Daily: 1am`.
    pub fn describe(&self) -> String {
        format!(
            "{} | {}",
            self.command,
            describe_schedule(&Field::Any, &self.weekday, &self.date, &self.hour, &self.minute)
        )
    }
}

/// English ordinal suffix for `value`.
pub fn ordinal_suffix(value: u32) -> &'static str {
    match (value % 10, value % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

/// 12-hour clock text. A missing minute reads as on the hour.
fn describe_hour_minute(hour: u32, minute: Option<u32>) -> String {
    let (display, suffix) = match hour {
        0 => (12, "am"),
        12 => (12, "pm"),
        h if h < 12 => (h, "am"),
        h => (h - 12, "pm"),
    };
    match minute.filter(|m| *m > 0) {
        Some(m) => format!("{}:{:02}{}", display, m, suffix),
        None => match hour {
            0 => "12mn".to_string(),
            12 => "12nn".to_string(),
            _ => format!("{}{}", display, suffix),
        },
    }
}

fn name_or_number(names: &[&str], index: Option<usize>, value: u32) -> String {
    index
        .and_then(|i| names.get(i))
        .map_or_else(|| value.to_string(), |name| (*name).to_string())
}

/// Describes a schedule in words, e.g. `Weekly: on Mon,at 9:30am`.
pub fn describe_schedule(
    months: &Field,
    weekdays: &Field,
    dates: &Field,
    hours: &Field,
    minutes: &Field,
) -> String {
    let mut prefix = "";
    let mut has_date = false;
    let mut has_month = false;

    let mut month_dates = Vec::new();
    for month in months.values() {
        let month_name =
            month.map(|m| name_or_number(&MONTH_NAMES, (m as usize).checked_sub(1), m));
        for date in dates.values() {
            match (date, &month_name) {
                (Some(d), Some(name)) => {
                    has_date = true;
                    has_month = true;
                    month_dates.push(format!("{} {}{}", name, d, ordinal_suffix(d)));
                }
                (Some(d), None) => {
                    has_date = true;
                    month_dates.push(format!("{}{}", d, ordinal_suffix(d)));
                }
                (None, Some(name)) => month_dates.push(name.clone()),
                (None, None) => {}
            }
        }
    }

    let mut month_date_text = String::new();
    if !month_dates.is_empty() {
        month_date_text = month_dates.join(",");
        if has_month {
            prefix = "Annually:";
        } else {
            prefix = "Monthly:";
            month_date_text.push_str(" of the Month");
        }
        month_date_text = format!(" Every {}", month_date_text);
    }

    let weekday_names: Vec<String> = weekdays
        .values()
        .into_iter()
        .flatten()
        .map(|w| name_or_number(&WEEKDAY_NAMES, Some(w as usize), w))
        .collect();
    let mut weekday_text = String::new();
    if !weekday_names.is_empty() {
        has_date = true;
        if prefix.is_empty() {
            prefix = "Weekly:";
            weekday_text = format!(" on {}", weekday_names.join(","));
        } else {
            weekday_text = format!(",on {}", weekday_names.join(","));
        }
    }

    let mut has_hour = false;
    let mut has_minute = false;
    let mut times = Vec::new();
    for hour in hours.values() {
        for minute in minutes.values() {
            match hour {
                Some(h) => {
                    has_hour = true;
                    has_minute |= minute.is_some();
                    times.push(describe_hour_minute(h, minute));
                }
                None => {
                    if let Some(m) = minute {
                        has_minute = true;
                        times.push(format!("{}{}", m, ordinal_suffix(m)));
                    }
                }
            }
        }
    }

    let mut time_text = if times.is_empty() {
        "Every minute".to_string()
    } else if has_hour {
        let mut text = if has_date {
            format!("at {}", times.join(","))
        } else {
            format!("Daily: {}", times.join(","))
        };
        if !has_minute {
            text.push_str(" every minute");
        }
        text
    } else if *minutes == Field::List(vec![0]) {
        "At the start of every hour".to_string()
    } else {
        format!("Hourly: At {} minute", times.join(","))
    };
    if !prefix.is_empty() {
        time_text.insert(0, ',');
    }

    format!("{}{}{}{}", prefix, month_date_text, weekday_text, time_text)
        .trim()
        .to_string()
}
