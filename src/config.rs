//! Schedule configuration file.
//!
//! One schedule line per row in the form
//! `minute hour date month weekday command`. Rows starting with `#` are
//! comments. Rows that are too short to be a schedule are dropped on load.

use std::{fs, io, path::Path};

use log::debug;

use crate::schedule::{ScheduleEntry, ScheduleLine};

/// Default location of the schedule file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/argoneonrtc.conf";

/// Display index of the first listed schedule. Index 1 is reserved for
/// creating a new schedule.
pub const FIRST_LISTED_INDEX: usize = 2;

const HEADER: &str = "\
#
# Argon RTC Configuration
# - Follows cron general format, but with only * and csv support
# - Each row follows the following format:
#      min hour date month dayOfWeek Command
#      e.g. Shutdown daily at 1am
#            0 1 * * * off
#           Shutdown daily at 1am and 1pm
#            0 1,13 * * * off
# - Commands are currently on or off only
# - Limitations
#      Requires MINUTE value
#      Month values are ignored (edge cases not supported)
#
";

/// Errors reading or writing the schedule file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("schedule file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// The schedule lines of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleConfig {
    lines: Vec<ScheduleLine>,
}

/// Trims a row, turns tabs into spaces and drops anything that is not
/// printable ASCII.
fn clean_line(raw: &str) -> String {
    raw.trim()
        .replace('\t', " ")
        .chars()
        .filter(|c| (' '..='~').contains(c))
        .collect()
}

impl ScheduleConfig {
    /// Builds a configuration from file contents.
    pub fn parse(contents: &str) -> Self {
        let lines = contents
            .lines()
            .map(clean_line)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| ScheduleLine::parse(&line))
            .collect();
        Self { lines }
    }

    /// Loads the schedule file. A missing file is an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config = Self::parse(&contents);
                debug!("loaded {} schedule lines from {}", config.lines.len(), path.display());
                Ok(config)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("no schedule file at {}", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Writes the header followed by every line.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        fs::write(path, self.render()).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// File contents as written by [`ScheduleConfig::save`].
    pub fn render(&self) -> String {
        let mut out = String::from(HEADER);
        for line in &self.lines {
            out.push_str(line.raw());
            out.push('\n');
        }
        out
    }

    pub fn lines(&self) -> &[ScheduleLine] {
        &self.lines
    }

    /// Lines shown to the user, paired with their display index. Lines that
    /// fire every minute are loaded but not listed.
    pub fn listed(&self) -> Vec<(usize, &ScheduleLine)> {
        self.lines
            .iter()
            .filter(|line| !line.every_minute())
            .enumerate()
            .map(|(i, line)| (i + FIRST_LISTED_INDEX, line))
            .collect()
    }

    /// The listed line at `display_index`, if any.
    pub fn get_listed(&self, display_index: usize) -> Option<&ScheduleLine> {
        self.listed()
            .into_iter()
            .find(|(index, _)| *index == display_index)
            .map(|(_, line)| line)
    }

    /// Removes the listed line at `display_index`. Returns false, leaving the
    /// configuration unchanged, when no line has that index.
    pub fn remove_listed(&mut self, display_index: usize) -> bool {
        let Some(target) = display_index.checked_sub(FIRST_LISTED_INDEX) else {
            return false;
        };
        let position = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.every_minute())
            .nth(target)
            .map(|(position, _)| position);
        match position {
            Some(position) => {
                self.lines.remove(position);
                true
            }
            None => false,
        }
    }

    /// Every schedule entry of every line, in file order.
    pub fn entries(&self) -> Vec<ScheduleEntry> {
        self.lines.iter().flat_map(ScheduleLine::entries).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::Command;

    const SAMPLE: &str = "\
# comment
0 1 * * * off

\t30\t7 * * 1,2,3,4,5 on\r
* 5 * * * off
0 1 *
15 12 1 * * \u{e9}On
";

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("pcf8563-wake-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_parse_skips_comments_and_short_lines() {
        let config = ScheduleConfig::parse(SAMPLE);
        let raws: Vec<&str> = config.lines().iter().map(|l| l.raw()).collect();
        assert_eq!(
            raws,
            vec!["0 1 * * * off", "30 7 * * 1,2,3,4,5 on", "* 5 * * * off", "15 12 1 * * On"]
        );
    }

    #[test]
    fn test_listing_hides_every_minute_lines() {
        let config = ScheduleConfig::parse(SAMPLE);
        let listed: Vec<(usize, &str)> = config
            .listed()
            .into_iter()
            .map(|(i, l)| (i, l.raw()))
            .collect();
        assert_eq!(
            listed,
            vec![
                (2, "0 1 * * * off"),
                (3, "30 7 * * 1,2,3,4,5 on"),
                (4, "15 12 1 * * On"),
            ]
        );
        assert_eq!(config.get_listed(3).map(|l| l.raw()), Some("30 7 * * 1,2,3,4,5 on"));
        assert!(config.get_listed(1).is_none());
        assert!(config.get_listed(5).is_none());
    }

    #[test]
    fn test_hidden_lines_still_expand() {
        let config = ScheduleConfig::parse(SAMPLE);
        let entries = config.entries();
        // 1 + 5 + 1 + 1
        assert_eq!(entries.len(), 8);
        assert_eq!(entries.iter().filter(|e| e.command == Command::PowerOn).count(), 6);
        assert!(entries.iter().any(|e| e.minute.is_none() && e.hour == Some(5)));
    }

    #[test]
    fn test_remove_listed() {
        let mut config = ScheduleConfig::parse(SAMPLE);
        assert!(config.remove_listed(4));
        assert!(!config.remove_listed(4));
        assert!(!config.remove_listed(1));
        assert!(!config.remove_listed(0));
        assert!(config.remove_listed(2));
        let raws: Vec<&str> = config.lines().iter().map(|l| l.raw()).collect();
        assert_eq!(raws, vec!["30 7 * * 1,2,3,4,5 on", "* 5 * * * off"]);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let config = ScheduleConfig::load(temp_path("missing")).unwrap();
        assert!(config.lines().is_empty());
        assert!(config.listed().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("save");
        let config = ScheduleConfig::parse(SAMPLE);
        config.save(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("#\n# Argon RTC Configuration\n"));
        assert!(written.contains("#            0 1,13 * * * off\n"));
        assert!(written.ends_with("15 12 1 * * On\n"));

        let loaded = ScheduleConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_commented_wake_and_shutdown_lines() {
        let config = ScheduleConfig::parse(
            "# shut down daily at 1am\n\
             0 1 * * * off\n\
             # wake at 7:30 on weekdays\n\
             30 7 * * 1,2,3,4,5 on\n",
        );
        let commands: Vec<Command> = config.lines().iter().map(|l| l.command()).collect();
        assert_eq!(commands, vec![Command::PowerOff, Command::PowerOn]);

        // text after the command is part of it
        let trailing = ScheduleConfig::parse("30 7 * * * on # wake\n");
        assert_eq!(trailing.lines()[0].command_text(), "on # wake");
        assert_eq!(trailing.lines()[0].command(), Command::PowerOff);
    }
}
