use anyhow::{Context, Result};
use chrono::{NaiveDateTime, TimeDelta};
use clap::{Parser, Subcommand};
use linux_embedded_hal::I2cdev;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use pcf8563_wake::{
    config::{ScheduleConfig, DEFAULT_CONFIG_PATH},
    service::{Host, Service, SystemHost},
    status::{describe_alarm, describe_control_status},
    timezone::UtcOffset,
    EventFlag, PCF8563, DEFAULT_ADDRESS,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// I2C bus device
    #[arg(long, default_value = "/dev/i2c-1")]
    bus: String,

    /// RTC address, hex (0x51) or decimal
    #[arg(long, default_value_t = DEFAULT_ADDRESS, value_parser = parse_address)]
    address: u8,

    /// Schedule file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Disarm the alarm and the countdown timer
    #[command(name = "CLEAN", alias = "clean")]
    Clean,
    /// Clear pending alarm and timer flags before power off
    #[command(name = "SHUTDOWN", alias = "shutdown")]
    Shutdown,
    /// Write the host clock to the RTC
    #[command(name = "UPDATERTCTIME", alias = "updatertctime")]
    UpdateRtcTime,
    /// Print the RTC time in local time
    #[command(name = "GETRTCTIME", alias = "getrtctime")]
    GetRtcTime,
    /// List the configured schedules
    #[command(name = "GETSCHEDULELIST", alias = "getschedulelist")]
    GetScheduleList,
    /// Describe one schedule by its list index
    #[command(name = "SHOWSCHEDULE", alias = "showschedule")]
    ShowSchedule {
        /// Index as printed by GETSCHEDULELIST
        index: usize,
    },
    /// Remove one schedule by its list index
    #[command(name = "REMOVESCHEDULE", alias = "removeschedule")]
    RemoveSchedule {
        /// Index as printed by GETSCHEDULELIST
        index: usize,
    },
    /// Print the flag, alarm and timer registers
    #[command(name = "STATUS", alias = "status")]
    Status,
    /// Keep the wake alarm armed and shut down on schedule
    #[command(name = "SERVICE", alias = "service")]
    Service,
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address {:?}: {}", s, e))
}

fn open_rtc(cli: &Cli) -> Result<PCF8563<I2cdev>> {
    let i2c = I2cdev::new(&cli.bus).with_context(|| format!("opening I2C bus {}", cli.bus))?;
    debug!("opened {} for RTC at {:#04x}", cli.bus, cli.address);
    Ok(PCF8563::new(i2c, cli.address))
}

fn to_local(utc: NaiveDateTime, host: &impl Host) -> NaiveDateTime {
    utc + TimeDelta::seconds(i64::from(host.utc_offset()))
}

fn print_rtc_time(rtc: &mut PCF8563<I2cdev>, host: &SystemHost) -> Result<()> {
    let utc = rtc.datetime().context("reading RTC time")?;
    println!("RTC Time: {}", to_local(utc, host));
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let cli = Cli::parse();
    let host = SystemHost;

    match &cli.command {
        Commands::Clean => {
            let mut rtc = open_rtc(&cli)?;
            rtc.clear_alarm().context("clearing alarm")?;
            rtc.clear_timer().context("clearing timer")?;
        }
        Commands::Shutdown => {
            let mut rtc = open_rtc(&cli)?;
            for flag in [EventFlag::Alarm, EventFlag::Timer] {
                if rtc.clear_event_flag(flag)? {
                    info!("cleared pending {:?} flag", flag);
                }
            }
        }
        Commands::UpdateRtcTime => {
            let mut rtc = open_rtc(&cli)?;
            let utc = host.now() - TimeDelta::seconds(i64::from(host.utc_offset()));
            rtc.set_datetime(&utc).context("writing RTC time")?;
            print_rtc_time(&mut rtc, &host)?;
        }
        Commands::GetRtcTime => {
            let mut rtc = open_rtc(&cli)?;
            print_rtc_time(&mut rtc, &host)?;
        }
        Commands::GetScheduleList => {
            let config = ScheduleConfig::load(&cli.config)?;
            let listed = config.listed();
            if listed.is_empty() {
                println!("  No Existing Schedules");
            }
            for (index, line) in listed {
                println!("  {}.  {}", index, line.describe());
            }
        }
        Commands::ShowSchedule { index } => {
            let config = ScheduleConfig::load(&cli.config)?;
            match config.get_listed(*index) {
                Some(line) => println!("   {}", line.describe()),
                None => println!("   Invalid Schedule"),
            }
        }
        Commands::RemoveSchedule { index } => {
            let mut config = ScheduleConfig::load(&cli.config)?;
            if config.remove_listed(*index) {
                config.save(&cli.config)?;
                info!("removed schedule {}", index);
            } else {
                warn!("no schedule at index {}", index);
            }
        }
        Commands::Status => {
            let mut rtc = open_rtc(&cli)?;
            let status = rtc.control_status2().context("reading control status")?;
            println!("{}", describe_control_status(status));
            let alarm = rtc.alarm().context("reading alarm")?;
            let offset = UtcOffset::from_seconds(host.utc_offset());
            println!("Alarm: {}", describe_alarm(&alarm, offset, host.now().date()));
            let timer = rtc.timer_setting().context("reading timer")?;
            println!("Timer: {}", timer.describe(true));
        }
        Commands::Service => {
            let config = ScheduleConfig::load(&cli.config)?;
            let entries = config.entries();
            info!("starting service with {} schedule entries", entries.len());
            let rtc = open_rtc(&cli)?;
            Service::new(rtc, host, entries).run();
            info!("service stopped");
        }
    }
    Ok(())
}
