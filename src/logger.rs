use std::fs::{File, OpenOptions, create_dir_all};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use crate::protocol::log::{Level, LogRecord};
use crate::terminal::{Console, StyledText, Tone};

/// Global logger instance
static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();

const LOG_FILE_MAX_SIZE: u64 = 1024 * 1024; // 1MB
const LOG_FILE_MAX_COUNT: usize = 5;
const LOGGER_NAME: &str = "devctl";

/// File-based log writer with rotation
#[derive(Debug)]
pub struct LogFileWriter {
    path: PathBuf,
    current_file: Option<File>,
    current_size: u64,
}

impl LogFileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent)?;
        }
        Ok(LogFileWriter {
            path,
            current_file: None,
            current_size: 0,
        })
    }

    fn archived_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn rotate_logs(&mut self) -> Result<(), std::io::Error> {
        self.current_file = None;

        for i in (1..LOG_FILE_MAX_COUNT).rev() {
            let old_path = self.archived_path(i);
            if old_path.exists() {
                if i == LOG_FILE_MAX_COUNT - 1 {
                    std::fs::remove_file(&old_path)?;
                } else {
                    std::fs::rename(&old_path, self.archived_path(i + 1))?;
                }
            }
        }

        if self.path.exists() {
            std::fs::rename(&self.path, self.archived_path(1))?;
        }

        self.current_size = 0;
        Ok(())
    }

    fn ensure_file_open(&mut self) -> Result<(), std::io::Error> {
        if self.current_file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.current_size = file.metadata().map(|m| m.len()).unwrap_or(0);
            self.current_file = Some(file);
        }
        Ok(())
    }

    pub fn write_log(&mut self, record: &LogRecord) -> Result<(), std::io::Error> {
        self.ensure_file_open()?;

        let line = record.dump_line(true, true);
        let bytes = line.as_bytes();

        if self.current_size + bytes.len() as u64 > LOG_FILE_MAX_SIZE {
            self.rotate_logs()?;
            self.ensure_file_open()?;
        }

        if let Some(ref mut file) = self.current_file {
            file.write_all(bytes)?;
            file.flush()?;
            self.current_size += bytes.len() as u64;
        }

        Ok(())
    }
}

/// Where diagnostics are printed
#[derive(Clone)]
pub enum LoggerMode {
    /// Straight to stderr, used before the terminal exists
    Standalone,
    /// Above the prompt of the running console
    Console(Arc<dyn Console>),
}

/// Process-wide diagnostics logger.
///
/// Operator-facing output (tables, command errors) does not go through here;
/// this only carries the client's own diagnostics.
pub struct Logger {
    mode: Mutex<LoggerMode>,
    threshold: Mutex<Level>,
    file_writer: Mutex<Option<LogFileWriter>>,
}

impl Logger {
    pub fn new_standalone() -> Self {
        Logger {
            mode: Mutex::new(LoggerMode::Standalone),
            threshold: Mutex::new(Level::Warn),
            file_writer: Mutex::new(None),
        }
    }

    pub fn set_console_mode(&self, console: Arc<dyn Console>) {
        if let Ok(mut mode) = self.mode.lock() {
            *mode = LoggerMode::Console(console);
        }
    }

    pub fn set_standalone_mode(&self) {
        if let Ok(mut mode) = self.mode.lock() {
            *mode = LoggerMode::Standalone;
        }
    }

    pub fn set_threshold(&self, level: Level) {
        if let Ok(mut threshold) = self.threshold.lock() {
            *threshold = level;
        }
    }

    pub fn threshold(&self) -> Level {
        self.threshold.lock().map(|t| *t).unwrap_or(Level::Warn)
    }

    /// Mirrors every diagnostic into a rotating file at `path`.
    pub fn enable_file(&self, path: impl Into<PathBuf>) -> Result<(), std::io::Error> {
        let writer = LogFileWriter::new(path)?;
        if let Ok(mut file_writer) = self.file_writer.lock() {
            *file_writer = Some(writer);
        }
        Ok(())
    }

    pub fn log(&self, level: Level, msg: String) {
        if level == Level::Off || level.is_less_severe_than(self.threshold()) {
            return;
        }
        let record = LogRecord::new(
            level,
            chrono::Local::now().timestamp_millis(),
            LOGGER_NAME,
            msg,
        );

        if let Ok(mut file_writer) = self.file_writer.lock() {
            if let Some(writer) = file_writer.as_mut() {
                if let Err(e) = writer.write_log(&record) {
                    eprintln!("Failed to write to log file: {}", e);
                }
            }
        }

        let console = match self.mode.lock() {
            Ok(mode) => match &*mode {
                LoggerMode::Standalone => None,
                LoggerMode::Console(console) => Some(console.clone()),
            },
            Err(_) => None,
        };
        match console {
            Some(console) => {
                let tone = Tone::for_level(level).unwrap_or(Tone::Plain);
                console.print_above(StyledText::styled(tone, record.dump_line(false, false).trim_end()));
            }
            None => {
                eprint!("{}", record.dump_line(true, false));
                let _ = std::io::stderr().flush();
            }
        }
    }

    pub fn error(&self, msg: String) {
        self.log(Level::Error, msg);
    }

    pub fn warn(&self, msg: String) {
        self.log(Level::Warn, msg);
    }

    pub fn info(&self, msg: String) {
        self.log(Level::Info, msg);
    }

    pub fn debug(&self, msg: String) {
        self.log(Level::Debug, msg);
    }

    pub fn trace(&self, msg: String) {
        self.log(Level::Trace, msg);
    }
}

/// Initialize the global logger in standalone mode
pub fn init_standalone(threshold: Level) {
    let _ = GLOBAL_LOGGER.set(Logger::new_standalone());
    get_logger().set_threshold(threshold);
}

/// Get the global logger instance
pub fn get_logger() -> &'static Logger {
    GLOBAL_LOGGER.get_or_init(Logger::new_standalone)
}

/// Route the global logger above the console prompt
pub fn set_console_mode(console: Arc<dyn Console>) {
    get_logger().set_console_mode(console);
}

pub fn set_standalone_mode() {
    get_logger().set_standalone_mode();
}

pub fn enable_file(path: impl Into<PathBuf>) -> Result<(), std::io::Error> {
    get_logger().enable_file(path)
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().error(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().warn(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().info(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().debug(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        $crate::logger::get_logger().trace(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::recording::RecordingConsole;

    #[test]
    fn threshold_drops_less_severe_messages() {
        let console = Arc::new(RecordingConsole::new());
        let logger = Logger::new_standalone();
        logger.set_console_mode(console.clone());
        logger.set_threshold(Level::Info);

        logger.debug("hidden".to_string());
        logger.info("shown".to_string());
        logger.error("also shown".to_string());

        let printed = console.printed_lines();
        assert_eq!(printed.len(), 2);
        assert!(printed[0].ends_with("shown"));
        assert!(printed[1].starts_with("[ERR]"));
    }

    #[test]
    fn file_writer_rotates_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devctl.log");
        let mut writer = LogFileWriter::new(&path).unwrap();

        let text = "x".repeat(64 * 1024);
        let record = LogRecord::new(Level::Warn, 0, "devctl", text);
        for _ in 0..20 {
            writer.write_log(&record).unwrap();
        }

        assert!(path.exists());
        assert!(writer.archived_path(1).exists());
        assert!(std::fs::metadata(&path).unwrap().len() <= LOG_FILE_MAX_SIZE);
    }

    #[test]
    fn file_mirror_keeps_every_message_above_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("devctl.log");
        let logger = Logger::new_standalone();
        logger.set_console_mode(Arc::new(RecordingConsole::new()));
        logger.enable_file(&path).unwrap();
        logger.warn("socket closed".to_string());

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("[WRN] "));
        assert!(contents.ends_with("devctl socket closed\n"));
    }
}
