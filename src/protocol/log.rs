use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

use crate::protocol::message::LogEvent;

/// Severity of a log record.
///
/// Levels follow the integer scale used by the controller's logging framework:
/// a lower integer is more severe, `Off` (0) sits above everything and `Trace`
/// (600) is the least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    /// No logging at all. As a filter threshold it suppresses every record.
    Off,
    /// The application cannot continue.
    Fatal,
    /// A failure affecting functionality.
    Error,
    /// A potential issue or unexpected situation.
    Warn,
    /// Informational progress messages.
    Info,
    /// Detailed messages useful for debugging.
    Debug,
    /// The most fine-grained messages.
    Trace,
}

impl Level {
    /// Every level, most severe first.
    pub const ALL: [Level; 7] = [
        Level::Off,
        Level::Fatal,
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Debug,
        Level::Trace,
    ];

    /// Integer value of the level on the wire.
    pub fn int_level(self) -> i32 {
        match self {
            Level::Off => 0,
            Level::Fatal => 100,
            Level::Error => 200,
            Level::Warn => 300,
            Level::Info => 400,
            Level::Debug => 500,
            Level::Trace => 600,
        }
    }

    /// Maps an arbitrary integer level to the closest standard level.
    ///
    /// Picks the least severe standard level whose integer is still `<=` the
    /// given value; everything above `Trace` collapses onto `Trace` and
    /// negative values onto `Off`.
    pub fn from_int(value: i32) -> Level {
        let mut level = Level::Off;
        for candidate in Level::ALL {
            if candidate.int_level() > value {
                break;
            }
            level = candidate;
        }
        level
    }

    /// Upper-case name, as persisted in the view properties.
    pub fn name(self) -> &'static str {
        match self {
            Level::Off => "OFF",
            Level::Fatal => "FATAL",
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    /// Three letter tag used when dumping records to a file.
    pub fn tag(self) -> &'static str {
        match self {
            Level::Fatal | Level::Error => "ERR",
            Level::Warn => "WRN",
            Level::Info => "INF",
            Level::Debug => "DBG",
            Level::Trace => "TRC",
            Level::Off => "???",
        }
    }

    /// Parses the short keywords accepted by `set level`.
    pub fn from_keyword(keyword: &str) -> Option<Level> {
        match keyword.to_ascii_lowercase().as_str() {
            "off" => Some(Level::Off),
            "err" => Some(Level::Error),
            "warn" => Some(Level::Warn),
            "info" => Some(Level::Info),
            "debug" => Some(Level::Debug),
            "trace" => Some(Level::Trace),
            _ => None,
        }
    }

    /// True when `self` is strictly less severe than `threshold`.
    pub fn is_less_severe_than(self, threshold: Level) -> bool {
        self.int_level() > threshold.int_level()
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a level name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown level '{0}'")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

/// A log record received from the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: Level,
    /// Milliseconds since the Unix epoch.
    pub timestamp_millis: i64,
    pub logger_name: String,
    pub text: String,
}

impl LogRecord {
    pub fn new(
        level: Level,
        timestamp_millis: i64,
        logger_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        LogRecord {
            level,
            timestamp_millis,
            logger_name: logger_name.into(),
            text: text.into(),
        }
    }

    /// Line shown in the terminal: `[<time> ][<logger> ]<text>`.
    pub fn console_line(&self, show_time: bool, show_logger_name: bool) -> String {
        let mut line = String::with_capacity(self.text.len() + 20);
        self.decorate(&mut line, show_time, show_logger_name);
        line.push_str(&self.text);
        line
    }

    /// Line written by `dump`: `[<TAG>] [<time> ][<logger> ]<text>\n`.
    pub fn dump_line(&self, show_time: bool, show_logger_name: bool) -> String {
        let mut line = String::with_capacity(self.text.len() + 26);
        line.push('[');
        line.push_str(self.level.tag());
        line.push_str("] ");
        self.decorate(&mut line, show_time, show_logger_name);
        line.push_str(&self.text);
        line.push('\n');
        line
    }

    fn decorate(&self, line: &mut String, show_time: bool, show_logger_name: bool) {
        if show_time {
            line.push_str(&format_time(self.timestamp_millis));
            line.push(' ');
        }
        if show_logger_name {
            line.push_str(&self.logger_name);
            line.push(' ');
        }
    }
}

impl From<LogEvent> for LogRecord {
    fn from(event: LogEvent) -> Self {
        LogRecord {
            level: Level::from_int(event.level),
            timestamp_millis: event.time_millis,
            logger_name: event.logger_name,
            text: event.message,
        }
    }
}

/// Formats an epoch timestamp as `HH:mm:ss.SSS` in the host's time zone.
pub fn format_time(timestamp_millis: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_millis).earliest() {
        Some(time) => time.format("%H:%M:%S%.3f").to_string(),
        None => "??:??:??.???".to_string(),
    }
}
