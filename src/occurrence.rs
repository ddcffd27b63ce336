//! Next-occurrence search for schedule entries.
//!
//! Given a reference instant, finds the first instant strictly after it at
//! which an entry fires. The search works on a trial date/time:
//!
//! 1. seed the trial from the entry and the reference instant,
//! 2. repair a date that does not exist in the trial month,
//! 3. align a pinned weekday,
//! 4. step the finest wildcard field forward until the trial is in the
//!    future.
//!
//! Step 4 walks the granularities minute, hour, date, month and year in
//! order. Each step either finishes or carries into the next coarser one.
//!
//! A pinned weekday whose entry leaves the hour or minute open only matches
//! whole days after the reference day once that day's slot has passed: the
//! next candidate is the same weekday a week later at the first free minute.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Timelike};
use log::debug;

use crate::schedule::{Command, ScheduleEntry};

/// Entries that do not fire within this many years are ignored.
///
/// Long enough for any leap day to come around.
pub const SEARCH_HORIZON_YEARS: i32 = 12;

/// Number of days in a month, or 0 for a month outside 1-12.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if NaiveDate::from_ymd_opt(year, 2, 29).is_some() => 29,
        2 => 28,
        _ => 0,
    }
}

fn is_leap_year(year: i32) -> bool {
    days_in_month(year, 2) == 29
}

/// Field granularities from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Granularity {
    Minute,
    Hour,
    Date,
    Month,
    Year,
}

impl Granularity {
    fn coarser(self) -> Option<Self> {
        match self {
            Granularity::Minute => Some(Granularity::Hour),
            Granularity::Hour => Some(Granularity::Date),
            Granularity::Date => Some(Granularity::Month),
            Granularity::Month => Some(Granularity::Year),
            Granularity::Year => None,
        }
    }

    fn is_pinned(self, entry: &ScheduleEntry) -> bool {
        match self {
            Granularity::Minute => entry.minute.is_some(),
            Granularity::Hour => entry.hour.is_some(),
            Granularity::Date => entry.date.is_some(),
            Granularity::Month => entry.month.is_some(),
            Granularity::Year => false,
        }
    }
}

/// Result of advancing one granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Done,
    Carry,
}

/// Calendar fields of a trial instant. Unlike `NaiveDateTime` this can
/// briefly hold a date the month does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Trial {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
}

impl Trial {
    fn from_datetime(at: &NaiveDateTime) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
            day: at.day(),
            hour: at.hour(),
            minute: at.minute(),
        }
    }

    fn to_datetime(self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|d| d.and_hms_opt(self.hour, self.minute, 0))
    }

    fn next_month(&mut self) {
        if self.month < 12 {
            self.month += 1;
        } else {
            self.month = 1;
            self.year += 1;
        }
    }

    fn clear_open_time(&mut self, entry: &ScheduleEntry) {
        if entry.hour.is_none() {
            self.hour = 0;
        }
        if entry.minute.is_none() {
            self.minute = 0;
        }
    }

    /// Advances one granularity. A pinned granularity carries unchanged.
    pub(crate) fn step(&mut self, granularity: Granularity, entry: &ScheduleEntry) -> Step {
        if granularity.is_pinned(entry) {
            return Step::Carry;
        }
        match granularity {
            Granularity::Minute if self.minute < 59 => {
                self.minute += 1;
                Step::Done
            }
            Granularity::Minute => {
                self.minute = 0;
                Step::Carry
            }
            Granularity::Hour if self.hour < 23 => {
                self.hour += 1;
                Step::Done
            }
            Granularity::Hour => {
                self.hour = 0;
                Step::Carry
            }
            Granularity::Date if self.day < days_in_month(self.year, self.month) => {
                self.day += 1;
                Step::Done
            }
            Granularity::Date => {
                self.day = 1;
                Step::Carry
            }
            Granularity::Month => {
                self.next_month();
                while self.day > days_in_month(self.year, self.month) {
                    self.next_month();
                }
                Step::Done
            }
            Granularity::Year => {
                self.year += 1;
                if self.month == 2 && self.day == 29 {
                    while !is_leap_year(self.year) {
                        self.year += 1;
                    }
                }
                Step::Done
            }
        }
    }

    /// Advances the finest field that can move, carrying as needed.
    pub(crate) fn advance(&mut self, entry: &ScheduleEntry) {
        let mut granularity = Granularity::Minute;
        while self.step(granularity, entry) == Step::Carry {
            match granularity.coarser() {
                Some(coarser) => granularity = coarser,
                None => break,
            }
        }
    }
}

fn is_feasible(entry: &ScheduleEntry) -> bool {
    entry.minute.map_or(true, |m| m <= 59)
        && entry.hour.map_or(true, |h| h <= 23)
        && entry.date.map_or(true, |d| (1..=31).contains(&d))
        && entry.month.map_or(true, |m| (1..=12).contains(&m))
        && entry.weekday.map_or(true, |w| w <= 6)
}

/// Seeds the trial. Wildcards take the reference value until a pinned field
/// lands ahead of it; after that they take their minimum.
fn seed(entry: &ScheduleEntry, now: &NaiveDateTime) -> Trial {
    let mut ahead = false;
    let mut decided = false;
    let mut pick = |pinned: Option<u32>, current: u32, minimum: u32| match pinned {
        Some(value) => {
            if !decided && value != current {
                decided = true;
                ahead = value > current;
            }
            value
        }
        None if ahead => minimum,
        None => current,
    };

    let month = pick(entry.month, now.month(), 1);
    let day = pick(entry.date, now.day(), 1);
    let hour = pick(entry.hour, now.hour(), 0);
    let minute = pick(entry.minute, now.minute(), 0);
    Trial {
        year: now.year(),
        month,
        day,
        hour,
        minute,
    }
}

/// Moves a trial date the month does not have onto a real date, or reports
/// the entry as infeasible.
fn repair_date(trial: &mut Trial, entry: &ScheduleEntry) -> bool {
    let last = days_in_month(trial.year, trial.month);
    if trial.day <= last {
        return true;
    }
    if entry.date.is_none() {
        trial.day = last;
        return true;
    }
    if entry.month.is_none() {
        trial.clear_open_time(entry);
        while trial.day > days_in_month(trial.year, trial.month) {
            trial.next_month();
        }
        return true;
    }
    if trial.day == 29 && trial.month == 2 {
        trial.clear_open_time(entry);
        while !is_leap_year(trial.year) {
            trial.year += 1;
        }
        return true;
    }
    false
}

fn beyond_horizon(at: &NaiveDateTime, now: &NaiveDateTime) -> bool {
    at.year() - now.year() >= SEARCH_HORIZON_YEARS
}

/// Steps a pinned weekday onto its target day, then week by week until the
/// entry matches.
fn align_weekday(
    mut at: NaiveDateTime,
    weekday: u32,
    entry: &ScheduleEntry,
    now: &NaiveDateTime,
) -> Option<NaiveDateTime> {
    let current = at.weekday().num_days_from_sunday();
    if current != weekday || at <= *now {
        let mut trial = Trial::from_datetime(&at);
        trial.clear_open_time(entry);
        at = trial.to_datetime()?;
        let offset = match (weekday + 7 - current) % 7 {
            0 => 7,
            days => days,
        };
        at = at.checked_add_days(Days::new(u64::from(offset)))?;
    }

    while !entry.matches(&at) && !beyond_horizon(&at, now) {
        at = at.checked_add_days(Days::new(7))?;
    }
    if beyond_horizon(&at, now) {
        return None;
    }
    Some(at)
}

/// Finds the first instant strictly after `now` at which `entry` fires.
///
/// Returns `None` when the entry cannot fire within
/// [`SEARCH_HORIZON_YEARS`].
pub fn next_occurrence(entry: &ScheduleEntry, now: &NaiveDateTime) -> Option<NaiveDateTime> {
    if !is_feasible(entry) {
        debug!("entry {:?} can never fire", entry);
        return None;
    }

    let mut trial = seed(entry, now);
    if !repair_date(&mut trial, entry) {
        debug!("entry {:?} has no valid date", entry);
        return None;
    }

    if let Some(weekday) = entry.weekday {
        let at = align_weekday(trial.to_datetime()?, weekday, entry, now)?;
        trial = Trial::from_datetime(&at);
    }

    let mut at = trial.to_datetime()?;
    while at <= *now {
        trial.advance(entry);
        at = trial.to_datetime()?;
        if beyond_horizon(&at, now) {
            return None;
        }
    }
    Some(at)
}

/// Finds the nearest power-on occurrence over all entries.
///
/// Power-off entries are skipped. On a tie the earlier entry wins.
pub fn next_power_on<'a>(
    entries: &'a [ScheduleEntry],
    now: &NaiveDateTime,
) -> Option<(&'a ScheduleEntry, NaiveDateTime)> {
    let mut best: Option<(&ScheduleEntry, NaiveDateTime)> = None;
    for entry in entries.iter().filter(|e| e.command == Command::PowerOn) {
        let Some(at) = next_occurrence(entry, now) else {
            continue;
        };
        if best.map_or(true, |(_, best_at)| at < best_at) {
            best = Some((entry, at));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn entry(
        minute: Option<u32>,
        hour: Option<u32>,
        date: Option<u32>,
        weekday: Option<u32>,
    ) -> ScheduleEntry {
        ScheduleEntry {
            minute,
            hour,
            date,
            month: None,
            weekday,
            command: Command::PowerOn,
        }
    }

    /// First matching minute strictly after `now`, day by day then minute by
    /// minute.
    fn brute_force(entry: &ScheduleEntry, now: &NaiveDateTime) -> Option<NaiveDateTime> {
        let mut day = now.date();
        for _ in 0..(366 * SEARCH_HORIZON_YEARS) {
            let midnight = day.and_hms_opt(0, 0, 0).unwrap();
            let day_matches = entry.date.map_or(true, |d| d == day.day())
                && entry.month.map_or(true, |m| m == day.month())
                && entry
                    .weekday
                    .map_or(true, |w| w == day.weekday().num_days_from_sunday());
            if day_matches {
                for minute in 0..(24 * 60) {
                    let t = midnight + TimeDelta::minutes(minute);
                    if t > *now && entry.matches(&t) {
                        return Some(t);
                    }
                }
            }
            day = day.succ_opt().unwrap();
        }
        None
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2023, 1), 31);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2100, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2023, 4), 30);
        assert_eq!(days_in_month(2023, 12), 31);
        assert_eq!(days_in_month(2023, 13), 0);
    }

    #[test]
    fn test_granularity_steps() {
        let wild = entry(None, None, None, None);
        let mut trial = Trial::from_datetime(&at(2023, 12, 31, 23, 58));

        assert_eq!(trial.step(Granularity::Minute, &wild), Step::Done);
        assert_eq!(trial.minute, 59);
        assert_eq!(trial.step(Granularity::Minute, &wild), Step::Carry);
        assert_eq!(trial.minute, 0);
        assert_eq!(trial.step(Granularity::Hour, &wild), Step::Carry);
        assert_eq!(trial.hour, 0);
        assert_eq!(trial.step(Granularity::Date, &wild), Step::Carry);
        assert_eq!(trial.day, 1);
        assert_eq!(trial.step(Granularity::Month, &wild), Step::Done);
        assert_eq!((trial.year, trial.month), (2024, 1));

        // pinned fields carry without changing
        let pinned = entry(Some(5), Some(6), None, None);
        let before = trial;
        assert_eq!(trial.step(Granularity::Minute, &pinned), Step::Carry);
        assert_eq!(trial.step(Granularity::Hour, &pinned), Step::Carry);
        assert_eq!(trial, before);
    }

    #[test]
    fn test_month_step_skips_short_months() {
        let date31 = entry(Some(0), Some(0), Some(31), None);
        let mut trial = Trial::from_datetime(&at(2023, 3, 31, 0, 0));
        assert_eq!(trial.step(Granularity::Month, &date31), Step::Done);
        assert_eq!((trial.year, trial.month, trial.day), (2023, 5, 31));
    }

    #[test]
    fn test_year_step_finds_leap_day() {
        let leap = ScheduleEntry {
            month: Some(2),
            ..entry(Some(0), Some(0), Some(29), None)
        };
        let mut trial = Trial::from_datetime(&at(2024, 2, 29, 0, 0));
        assert_eq!(trial.step(Granularity::Year, &leap), Step::Done);
        assert_eq!(trial.year, 2028);
    }

    #[test]
    fn test_advance_carries_to_next_day() {
        let e = entry(None, Some(1), None, None);
        let mut trial = Trial::from_datetime(&at(2024, 1, 15, 1, 59));
        trial.advance(&e);
        assert_eq!(trial.to_datetime(), Some(at(2024, 1, 16, 1, 0)));
    }

    #[test]
    fn test_daily_entry_after_its_time() {
        let e = entry(Some(0), Some(1), None, None);
        let next = next_occurrence(&e, &at(2024, 1, 15, 2, 0));
        assert_eq!(next, Some(at(2024, 1, 16, 1, 0)));
    }

    #[test]
    fn test_daily_entry_before_its_time() {
        let e = entry(Some(0), Some(1), None, None);
        let next = next_occurrence(&e, &at(2024, 1, 15, 0, 30));
        assert_eq!(next, Some(at(2024, 1, 15, 1, 0)));
    }

    #[test]
    fn test_exact_time_is_not_strictly_after() {
        let e = entry(Some(0), Some(1), None, None);
        let next = next_occurrence(&e, &at(2024, 1, 15, 1, 0));
        assert_eq!(next, Some(at(2024, 1, 16, 1, 0)));
    }

    #[test]
    fn test_weekly_entry_from_wednesday() {
        // 2024-01-17 is a Wednesday
        let monday = entry(Some(30), Some(9), None, Some(1));
        let next = next_occurrence(&monday, &at(2024, 1, 17, 12, 0)).unwrap();
        assert_eq!(next, at(2024, 1, 22, 9, 30));
        assert_eq!(next.weekday().num_days_from_sunday(), 1);
    }

    #[test]
    fn test_weekly_entry_same_day_later() {
        // 2024-01-15 is a Monday
        let monday = entry(Some(30), Some(9), None, Some(1));
        assert_eq!(
            next_occurrence(&monday, &at(2024, 1, 15, 8, 0)),
            Some(at(2024, 1, 15, 9, 30))
        );
        assert_eq!(
            next_occurrence(&monday, &at(2024, 1, 15, 9, 30)),
            Some(at(2024, 1, 22, 9, 30))
        );
    }

    #[test]
    fn test_weekday_with_open_time_moves_to_next_week() {
        // Monday, any minute of 9am, checked at 9:30 on a Monday
        let monday = entry(None, Some(9), None, Some(1));
        assert_eq!(
            next_occurrence(&monday, &at(2024, 1, 15, 9, 30)),
            Some(at(2024, 1, 22, 9, 0))
        );
    }

    #[test]
    fn test_date_31_skips_short_months() {
        let e = entry(Some(0), Some(7), Some(31), None);
        let next = next_occurrence(&e, &at(2023, 3, 31, 8, 0)).unwrap();
        assert_eq!(next, at(2023, 5, 31, 7, 0));

        let mut now = at(2023, 1, 1, 0, 0);
        for _ in 0..30 {
            let next = next_occurrence(&e, &now).unwrap();
            assert!(![4, 6, 9, 11].contains(&next.month()));
            assert_eq!(next.day(), 31);
            now = next;
        }
    }

    #[test]
    fn test_leap_day_only_in_leap_years() {
        let e = ScheduleEntry {
            month: Some(2),
            ..entry(Some(0), Some(12), Some(29), None)
        };
        let next = next_occurrence(&e, &at(2023, 3, 1, 0, 0)).unwrap();
        assert_eq!(next, at(2024, 2, 29, 12, 0));

        let next = next_occurrence(&e, &at(2024, 2, 29, 12, 0)).unwrap();
        assert_eq!(next, at(2028, 2, 29, 12, 0));

        let next = next_occurrence(&e, &at(2097, 1, 1, 0, 0)).unwrap();
        assert_eq!(next, at(2104, 2, 29, 12, 0));
    }

    #[test]
    fn test_infeasible_entries() {
        let now = at(2024, 1, 15, 0, 0);
        assert_eq!(next_occurrence(&entry(Some(60), None, None, None), &now), None);
        assert_eq!(next_occurrence(&entry(None, Some(24), None, None), &now), None);
        assert_eq!(next_occurrence(&entry(None, None, Some(32), None), &now), None);
        assert_eq!(next_occurrence(&entry(None, None, Some(0), None), &now), None);
        assert_eq!(next_occurrence(&entry(None, None, None, Some(7)), &now), None);

        // April 31st
        let e = ScheduleEntry {
            month: Some(4),
            ..entry(Some(0), Some(0), Some(31), None)
        };
        assert_eq!(next_occurrence(&e, &at(2024, 4, 1, 0, 0)), None);
    }

    #[test]
    fn test_weekday_and_date_together() {
        // Monday the 28th of February
        let e = ScheduleEntry {
            month: Some(2),
            ..entry(Some(0), Some(0), Some(28), Some(1))
        };
        assert_eq!(
            next_occurrence(&e, &at(2024, 1, 1, 0, 0)),
            Some(at(2028, 2, 28, 0, 0))
        );

        // Monday the 31st
        let e = entry(Some(0), Some(0), Some(31), Some(1));
        assert_eq!(
            next_occurrence(&e, &at(2024, 1, 1, 0, 0)),
            Some(at(2025, 3, 31, 0, 0))
        );
    }

    #[test]
    fn test_weekday_beyond_horizon() {
        // The next Monday the 29th of February is in 2044
        let e = ScheduleEntry {
            month: Some(2),
            ..entry(Some(0), Some(0), Some(29), Some(1))
        };
        assert_eq!(next_occurrence(&e, &at(2024, 3, 1, 0, 0)), None);
    }

    #[test]
    fn test_next_power_on_picks_minimum() {
        let now = at(2024, 1, 15, 12, 0);
        let entries = [
            entry(Some(0), Some(18), None, None),
            ScheduleEntry {
                command: Command::PowerOff,
                ..entry(Some(0), Some(13), None, None)
            },
            entry(Some(30), Some(14), None, None),
            entry(Some(0), Some(8), None, None),
        ];
        let (winner, when) = next_power_on(&entries, &now).unwrap();
        assert_eq!(winner, &entries[2]);
        assert_eq!(when, at(2024, 1, 15, 14, 30));
    }

    #[test]
    fn test_next_power_on_tie_keeps_first() {
        let now = at(2024, 1, 15, 12, 0);
        let entries = [
            entry(Some(0), Some(13), None, None),
            entry(Some(0), Some(13), None, Some(1)),
        ];
        let (winner, _) = next_power_on(&entries, &now).unwrap();
        assert!(std::ptr::eq(winner, &entries[0]));
    }

    #[test]
    fn test_next_power_on_none() {
        let now = at(2024, 1, 15, 12, 0);
        let off = ScheduleEntry {
            command: Command::PowerOff,
            ..entry(Some(0), Some(1), None, None)
        };
        assert_eq!(next_power_on(&[off], &now), None);
        assert_eq!(next_power_on(&[], &now), None);
    }

    #[test]
    fn test_matches_brute_force() {
        let entries = [
            entry(None, None, None, None),
            entry(Some(0), None, None, None),
            entry(Some(45), None, None, None),
            entry(None, Some(3), None, None),
            entry(None, Some(23), None, None),
            entry(Some(0), Some(1), None, None),
            entry(Some(59), Some(23), None, None),
            entry(None, None, Some(1), None),
            entry(Some(15), None, Some(20), None),
            entry(None, Some(6), Some(31), None),
            entry(Some(0), Some(0), Some(29), None),
            entry(Some(30), Some(9), Some(15), None),
            entry(Some(30), Some(9), None, Some(1)),
            entry(Some(0), Some(0), None, Some(0)),
            entry(Some(59), Some(23), None, Some(6)),
            entry(Some(10), Some(20), Some(13), Some(5)),
        ];
        let references = [
            at(2024, 1, 15, 2, 0),
            at(2024, 1, 31, 23, 59),
            at(2023, 2, 28, 23, 59),
            at(2024, 2, 28, 12, 30),
            at(2024, 4, 30, 6, 15),
            at(2024, 12, 31, 23, 59),
            at(2024, 3, 20, 9, 30),
            at(2024, 6, 15, 0, 0),
            at(2024, 9, 13, 20, 10) + TimeDelta::seconds(30),
        ];
        for e in &entries {
            for now in &references {
                let expected = brute_force(e, now);
                let found = next_occurrence(e, now);
                assert_eq!(found, expected, "entry {:?} from {}", e, now);
                if let Some(found) = found {
                    assert!(found > *now);
                }
            }
        }
    }
}
