//! The wake/shutdown service loop.
//!
//! Once started, the loop keeps exactly one hardware alarm armed for the
//! nearest power-on entry and shuts the host down when a power-off entry
//! matches the current minute. Every tick it:
//!
//! 1. clears the latched alarm and timer flags,
//! 2. re-arms the alarm if the armed time has been reached, or otherwise
//! 3. checks the power-off entries against the current minute.
//!
//! Bus faults never stop the loop; they are logged and the tick moves on.
//! Power-off entries are only polled while the host runs, they are never
//! programmed into the alarm.

use std::{io, process::Command as Process, time::Duration};

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::{
    alarm::AlarmFields,
    occurrence::next_power_on,
    schedule::{Command, ScheduleEntry},
    timezone::{convert_alarm, Direction, UtcOffset},
    EventFlag, PCF8563,
};

/// Time between two ticks. Ticks fall on minute boundaries.
pub const TICK: Duration = Duration::from_secs(60);

/// Time left from `now` until the next minute boundary.
pub fn until_next_tick(now: &NaiveDateTime) -> Duration {
    let elapsed = Duration::new(u64::from(now.second()), now.nanosecond() % 1_000_000_000);
    TICK.saturating_sub(elapsed)
}

/// What the service needs from the host it runs on.
pub trait Host {
    /// Local wall clock time.
    fn now(&self) -> NaiveDateTime;

    /// Local time minus UTC, in seconds.
    fn utc_offset(&self) -> i32;

    /// Sets the host clock to a local time.
    fn set_system_time(&mut self, local: &NaiveDateTime) -> io::Result<()>;

    /// Powers the host off.
    fn shutdown(&mut self) -> io::Result<()>;

    /// Blocks for `duration`.
    fn sleep(&mut self, duration: Duration);
}

/// [`Host`] backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

fn run_command(program: &str, args: &[&str]) -> io::Result<()> {
    let status = Process::new(program).args(args).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("{} exited with {}", program, status)))
    }
}

impl Host for SystemHost {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn utc_offset(&self) -> i32 {
        Local::now().offset().local_minus_utc()
    }

    fn set_system_time(&mut self, local: &NaiveDateTime) -> io::Result<()> {
        let text = local.format("%Y-%m-%dT%H:%M:%S").to_string();
        run_command("date", &["-s", &text])
    }

    fn shutdown(&mut self) -> io::Result<()> {
        run_command("shutdown", &["-h", "now"])
    }

    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// State of the service loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// No alarm armed; the reference is re-evaluated on the next tick.
    Idle { reference: NaiveDateTime },
    /// Alarm armed to fire at the reference time (local).
    Armed { reference: NaiveDateTime },
    /// A power-off entry matched and the host was shut down.
    Stopped,
}

impl ServiceState {
    /// The reference time, or `None` once stopped.
    pub fn reference(&self) -> Option<NaiveDateTime> {
        match self {
            ServiceState::Idle { reference } | ServiceState::Armed { reference } => {
                Some(*reference)
            }
            ServiceState::Stopped => None,
        }
    }
}

/// The service loop over an RTC and a host.
pub struct Service<I2C: I2c, H: Host> {
    rtc: PCF8563<I2C>,
    host: H,
    entries: Vec<ScheduleEntry>,
    state: ServiceState,
}

impl<I2C: I2c, H: Host> Service<I2C, H> {
    /// Creates an idle service referenced to the host's current time.
    pub fn new(rtc: PCF8563<I2C>, host: H, entries: Vec<ScheduleEntry>) -> Self {
        let reference = host.now();
        Self {
            rtc,
            host,
            entries,
            state: ServiceState::Idle { reference },
        }
    }

    /// Current state of the loop.
    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Returns the driver and the host.
    pub fn into_parts(self) -> (PCF8563<I2C>, H) {
        (self.rtc, self.host)
    }

    /// Sets the host clock from the RTC. Failures are logged only.
    pub fn sync_host_clock(&mut self) {
        let utc = match self.rtc.datetime() {
            Ok(utc) => utc,
            Err(e) => {
                warn!("unable to read RTC time: {}", e);
                return;
            }
        };
        let local = utc + TimeDelta::seconds(i64::from(self.host.utc_offset()));
        match self.host.set_system_time(&local) {
            Ok(()) => info!("host clock set to {} from RTC", local),
            Err(e) => warn!("unable to set host clock: {}", e),
        }
    }

    /// Syncs the host clock and arms the first alarm.
    pub fn start(&mut self) {
        self.sync_host_clock();
        let now = self.host.now();
        self.rearm(now);
    }

    fn program_alarm(&mut self, entry: &ScheduleEntry, at: &NaiveDateTime, now: &NaiveDateTime) -> bool {
        let local = match AlarmFields::for_occurrence(entry, at) {
            Ok(local) => local,
            Err(e) => {
                warn!("cannot build alarm for {:?}: {}", entry, e);
                return false;
            }
        };
        let offset = UtcOffset::from_seconds(self.host.utc_offset());
        let utc = convert_alarm(local, offset, Direction::ToUtc, now.date());
        match self.rtc.set_alarm(&utc) {
            Ok(()) => true,
            Err(e) => {
                warn!("unable to program alarm: {}", e);
                false
            }
        }
    }

    /// Arms the alarm for the next power-on after `now`, or clears it when
    /// nothing is scheduled.
    pub fn rearm(&mut self, now: NaiveDateTime) {
        let next = next_power_on(&self.entries, &now).map(|(entry, at)| (*entry, at));
        self.state = match next {
            Some((entry, at)) => {
                if self.program_alarm(&entry, &at, &now) {
                    info!("next power on at {}", at);
                    ServiceState::Armed { reference: at }
                } else {
                    ServiceState::Idle { reference: now }
                }
            }
            None => {
                info!("no power on scheduled");
                if let Err(e) = self.rtc.clear_alarm() {
                    warn!("unable to clear alarm: {}", e);
                }
                ServiceState::Idle { reference: now }
            }
        };
    }

    fn clear_flags(&mut self) {
        for flag in [EventFlag::Alarm, EventFlag::Timer] {
            if let Err(e) = self.rtc.clear_event_flag(flag) {
                warn!("unable to clear {:?} flag: {}", flag, e);
            }
        }
    }

    /// Runs one tick and returns the new state.
    pub fn tick(&mut self) -> ServiceState {
        let Some(reference) = self.state.reference() else {
            return self.state;
        };
        self.clear_flags();

        let now = self.host.now();
        if reference <= now {
            self.rearm(now);
            return self.state;
        }

        let minute = now.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(now);
        let power_off = self
            .entries
            .iter()
            .filter(|e| e.command == Command::PowerOff)
            .any(|e| e.matches(&minute));
        if power_off {
            info!("power off scheduled at {}, shutting down", minute);
            if let Err(e) = self.host.shutdown() {
                warn!("shutdown failed: {}", e);
            }
            self.state = ServiceState::Stopped;
        }
        self.state
    }

    /// Starts the service and ticks until a power-off entry stops it.
    pub fn run(&mut self) {
        self.start();
        while self.tick() != ServiceState::Stopped {
            let now = self.host.now();
            self.host.sleep(until_next_tick(&now));
        }
    }
}
