//! Bounded in-memory log buffer and the filtered view rendered from it.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::config::{FilterBy, ViewConfig, ViewSettings};
use crate::protocol::LogRecord;
use crate::terminal::Terminal;

/// Maximum number of records kept; older records are evicted first.
pub const MAX_MESSAGES: usize = 10_000;

const OVERRIDE_PROMPT: &str = "Override? (yes/no)> ";

/// Insertion-ordered ring of log records with FIFO eviction.
#[derive(Debug)]
pub struct LogBuffer {
    records: Mutex<VecDeque<LogRecord>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        LogBuffer::with_capacity(MAX_MESSAGES)
    }
}

impl LogBuffer {
    pub fn new() -> Self {
        LogBuffer::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        LogBuffer {
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, record: LogRecord) {
        let mut records = self.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Stable copy of the records in insertion order.
    pub fn snapshot(&self) -> Vec<LogRecord> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<LogRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Whether `record` passes the level threshold and substring filter.
pub fn should_output(record: &LogRecord, settings: &ViewSettings) -> bool {
    if record.level.is_less_severe_than(settings.filter_level) {
        return false;
    }
    match settings.filter_by {
        FilterBy::None => true,
        FilterBy::ByLoggerName => record.logger_name.contains(&settings.filter_string),
        FilterBy::ByText => record.text.contains(&settings.filter_string),
    }
}

/// Maps text onto ISO-8859-1, replacing characters outside it with `?`.
fn latin1(text: &str) -> impl Iterator<Item = u8> + '_ {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
}

/// The log buffer together with the view settings used to render it.
///
/// Records arriving from the network are rendered live while `live` is set.
/// A redraw clears `live` and holds `render` for the whole pass, so no live
/// record is interleaved with the redrawn output.
pub struct LogView {
    buffer: LogBuffer,
    config: ViewConfig,
    live: AtomicBool,
    render: Mutex<()>,
}

/// Restores live rendering when dropped.
pub struct LivePause<'a> {
    view: &'a LogView,
}

impl Drop for LivePause<'_> {
    fn drop(&mut self) {
        self.view.live.store(true, Ordering::SeqCst);
    }
}

impl LogView {
    pub fn new(buffer: LogBuffer, config: ViewConfig) -> Self {
        LogView {
            buffer,
            config,
            live: AtomicBool::new(true),
            render: Mutex::new(()),
        }
    }

    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Stops live rendering until the returned guard is dropped.
    pub fn pause_live(&self) -> LivePause<'_> {
        self.live.store(false, Ordering::SeqCst);
        LivePause { view: self }
    }

    /// Appends a record and renders it if live updates are on and it passes
    /// the filter.
    pub fn ingest(&self, record: LogRecord, terminal: &Terminal) {
        let settings = self.config.snapshot();
        let visible = should_output(&record, &settings);
        let line = visible.then(|| {
            record.console_line(settings.show_time, settings.show_logger_name)
        });
        let level = record.level;
        self.buffer.push(record);

        if let Some(line) = line {
            if self.is_live() {
                let _render = self.render.lock().unwrap_or_else(PoisonError::into_inner);
                if self.is_live() {
                    terminal.print_level(level, &line);
                }
            }
        }
    }

    /// Renders every buffered record that passes the current filter.
    pub fn redraw(&self, terminal: &Terminal) {
        let _render = self.render.lock().unwrap_or_else(PoisonError::into_inner);
        let settings = self.config.snapshot();
        for record in self.buffer.snapshot() {
            if should_output(&record, &settings) {
                terminal.print_level(
                    record.level,
                    &record.console_line(settings.show_time, settings.show_logger_name),
                );
            }
        }
    }

    /// Redraws with live rendering suspended for the duration.
    pub fn silent_redraw(&self, terminal: &Terminal) {
        let _pause = self.pause_live();
        self.redraw(terminal);
    }

    /// `<count>/<capacity> <percent>%`
    pub fn buffer_usage(&self) -> String {
        let count = self.buffer.len();
        let capacity = self.buffer.capacity();
        let percent = count as f64 / capacity as f64 * 100.0;
        format!("{}/{} {:.1}%", count, capacity, percent)
    }

    /// Writes the filtered buffer to `path` in ISO-8859-1.
    ///
    /// An existing file is only replaced after the operator answers `yes`.
    /// Outcome and failures are reported on the terminal.
    pub async fn dump_to_file(&self, path: &Path, terminal: &Terminal) {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let answer = terminal
                .read_line_async(OVERRIDE_PROMPT.to_string())
                .await
                .unwrap_or_default();
            if !answer.trim().eq_ignore_ascii_case("yes") {
                return;
            }
        }

        let start = Instant::now();
        let settings = self.config.snapshot();
        let mut entries = 0usize;
        let mut contents = Vec::new();
        for record in self.buffer.snapshot() {
            if should_output(&record, &settings) {
                let line = record.dump_line(settings.show_time, settings.show_logger_name);
                contents.extend(latin1(&line));
                entries += 1;
            }
        }

        match tokio::fs::write(path, contents).await {
            Ok(()) => terminal.print_info(&format!(
                "wrote {} log entries in {}ms",
                entries,
                start.elapsed().as_millis()
            )),
            Err(e) => terminal.print_error(&format!("Could not dump log {}", e)),
        }
    }
}
