//! Terminal façade shared by the command loop and the network reader.
//!
//! A [`Console`] is the line-editor backend: it reads lines, prints above the
//! prompt and knows which of its two editors is active. [`Terminal`] wraps a
//! console with the interactive gate and the coloured print helpers the rest
//! of the crate uses.

use crossterm::style::Stylize;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::protocol::Level;

mod art;
pub mod completion;
pub mod device_table;
pub mod line_editor;
#[cfg(test)]
pub(crate) mod recording;

pub use line_editor::LineEditorConsole;

/// Which vocabulary (and line editor) receives the next operator line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalMode {
    General,
    Device,
}

/// Colouring of one piece of printed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Plain,
    /// Bold red.
    Error,
    /// Bold yellow.
    Warning,
    /// Green.
    Info,
    /// Cyan.
    Debug,
    /// Blue.
    Trace,
    /// White, used for table headers.
    Heading,
    /// Green row of a connected device.
    Connected,
    /// Yellow row of a disconnected device.
    Disconnected,
    /// Bold cyan, used for the pin diagram.
    Highlight,
    /// Blue banner.
    Banner,
}

impl Tone {
    /// Tone used to print a log record of the given level.
    /// `Off` records are never printed.
    pub fn for_level(level: Level) -> Option<Tone> {
        match level {
            Level::Fatal | Level::Error => Some(Tone::Error),
            Level::Warn => Some(Tone::Warning),
            Level::Info => Some(Tone::Info),
            Level::Debug => Some(Tone::Debug),
            Level::Trace => Some(Tone::Trace),
            Level::Off => None,
        }
    }

    fn paint(self, text: &str) -> String {
        match self {
            Tone::Plain => text.to_string(),
            Tone::Error => text.red().bold().to_string(),
            Tone::Warning => text.yellow().bold().to_string(),
            Tone::Info | Tone::Connected => text.green().to_string(),
            Tone::Debug => text.cyan().to_string(),
            Tone::Trace | Tone::Banner => text.blue().to_string(),
            Tone::Heading => text.white().to_string(),
            Tone::Disconnected => text.yellow().to_string(),
            Tone::Highlight => text.cyan().bold().to_string(),
        }
    }
}

/// Text made of differently coloured segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyledText {
    segments: Vec<(Tone, String)>,
}

impl StyledText {
    pub fn new() -> Self {
        StyledText::default()
    }

    pub fn styled(tone: Tone, text: impl Into<String>) -> Self {
        let mut styled = StyledText::new();
        styled.push(tone, text);
        styled
    }

    pub fn push(&mut self, tone: Tone, text: impl Into<String>) -> &mut Self {
        self.segments.push((tone, text.into()));
        self
    }

    pub fn segments(&self) -> &[(Tone, String)] {
        &self.segments
    }

    /// The text without any styling.
    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|(_, text)| text.as_str()).collect()
    }

    /// The text with ANSI escape sequences applied per segment.
    /// Multi-line segments are painted line by line.
    pub fn to_ansi(&self) -> String {
        let mut out = String::new();
        for (tone, text) in &self.segments {
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                if !line.is_empty() {
                    out.push_str(&tone.paint(line));
                }
            }
        }
        out
    }
}

/// Failure of a line read.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("input interrupted")]
    Interrupted,
    #[error("end of input")]
    Eof,
    #[error("terminal error: {0}")]
    Io(#[from] io::Error),
}

/// Line-editor backend behind the [`Terminal`] façade.
///
/// Implementations must tolerate `print_above` from one thread while another
/// thread is blocked in `read_line`.
pub trait Console: Send + Sync {
    /// Reads one line from the active editor. Blocks.
    fn read_line(&self, prompt: &str) -> Result<String, ReadError>;
    /// Prints above the prompt without corrupting the line being edited.
    fn print_above(&self, text: StyledText);
    /// Writes straight to the terminal; only used before any prompt is shown.
    fn write_raw(&self, text: &str);
    fn mode(&self) -> TerminalMode;
    /// Toggles the active editor between general and device.
    fn switch_reader(&self);
    fn clear_screen(&self);
}

/// Boolean gate parking the foreground command loop while the controller
/// drives a dialog through the background reader.
#[derive(Debug, Default)]
pub struct InteractiveGate {
    interactive: Mutex<bool>,
    released: Notify,
}

impl InteractiveGate {
    pub fn new() -> Self {
        InteractiveGate::default()
    }

    /// Sets the gate. Clearing a set gate wakes every waiter.
    pub fn set_interactive(&self, interactive: bool) {
        let mut guard = self
            .interactive
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let was_interactive = *guard;
        *guard = interactive;
        drop(guard);
        if was_interactive && !interactive {
            self.released.notify_waiters();
        }
    }

    pub fn is_interactive(&self) -> bool {
        *self
            .interactive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns once the gate is clear; immediately if it already is.
    pub async fn wait_until_released(&self) {
        loop {
            // Registered before the check so a release in between is not lost.
            let notified = self.released.notified();
            if !self.is_interactive() {
                return;
            }
            notified.await;
        }
    }
}

type ReadTask = JoinHandle<Result<String, ReadError>>;

/// Command read whose caller stopped waiting. Put back into the terminal's
/// slot on drop so the next command read resumes it.
struct PendingRead<'a> {
    slot: &'a Mutex<Option<ReadTask>>,
    task: Option<ReadTask>,
}

impl PendingRead<'_> {
    async fn join(&mut self) -> Result<String, ReadError> {
        let Some(task) = self.task.as_mut() else {
            return Err(ReadError::Eof);
        };
        let joined = task.await;
        self.task = None;
        joined.unwrap_or_else(|e| Err(ReadError::Io(io::Error::other(e))))
    }
}

impl Drop for PendingRead<'_> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        }
    }
}

/// The façade: a console plus the interactive gate.
pub struct Terminal {
    console: Arc<dyn Console>,
    gate: InteractiveGate,
    pending: Mutex<Option<ReadTask>>,
}

impl Terminal {
    pub fn new(console: Arc<dyn Console>) -> Self {
        Terminal {
            console,
            gate: InteractiveGate::new(),
            pending: Mutex::new(None),
        }
    }

    fn spawn_read(&self, prompt: String) -> ReadTask {
        let console = self.console.clone();
        tokio::task::spawn_blocking(move || console.read_line(&prompt))
    }

    /// Line read that runs the blocking editor on the blocking pool.
    pub async fn read_line_async(&self, prompt: String) -> Result<String, ReadError> {
        self.spawn_read(prompt)
            .await
            .unwrap_or_else(|e| Err(ReadError::Io(io::Error::other(e))))
    }

    /// Reads an operator command.
    ///
    /// The editor cannot be interrupted, so a read whose future is dropped
    /// keeps running and the next call returns its line instead of
    /// starting a second read with `prompt`.
    pub async fn read_command(&self, prompt: String) -> Result<String, ReadError> {
        let task = self.take_pending().unwrap_or_else(|| self.spawn_read(prompt));
        let mut read = PendingRead {
            slot: &self.pending,
            task: Some(task),
        };
        read.join().await
    }

    fn take_pending(&self) -> Option<ReadTask> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn has_pending_read(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Waits for an abandoned command read so the editor gives the terminal
    /// back before the process exits. The line is discarded.
    pub async fn finish_pending_read(&self) {
        let Some(task) = self.take_pending() else {
            return;
        };
        self.print_warning("Press Enter to exit");
        if let Ok(Err(e)) = task.await {
            crate::log_debug!("Pending read ended with {}", e);
        }
    }

    pub fn mode(&self) -> TerminalMode {
        self.console.mode()
    }

    pub fn switch_reader(&self) {
        self.console.switch_reader();
    }

    /// Switches to `mode` if it is not already active.
    pub fn set_mode(&self, mode: TerminalMode) {
        if self.console.mode() != mode {
            self.console.switch_reader();
        }
    }

    pub fn set_interactive(&self, interactive: bool) {
        self.gate.set_interactive(interactive);
    }

    pub fn is_interactive(&self) -> bool {
        self.gate.is_interactive()
    }

    pub async fn wait_until_released(&self) {
        self.gate.wait_until_released().await;
    }

    pub fn print_above(&self, text: StyledText) {
        self.console.print_above(text);
    }

    pub fn print_error(&self, text: &str) {
        self.print_above(StyledText::styled(Tone::Error, text));
    }

    pub fn print_warning(&self, text: &str) {
        self.print_above(StyledText::styled(Tone::Warning, text));
    }

    pub fn print_info(&self, text: &str) {
        self.print_above(StyledText::styled(Tone::Info, text));
    }

    pub fn print_debug(&self, text: &str) {
        self.print_above(StyledText::styled(Tone::Debug, text));
    }

    pub fn print_trace(&self, text: &str) {
        self.print_above(StyledText::styled(Tone::Trace, text));
    }

    /// Prints `text` in the colour of `level`; `Off` prints nothing.
    pub fn print_level(&self, level: Level, text: &str) {
        if let Some(tone) = Tone::for_level(level) {
            self.print_above(StyledText::styled(tone, text));
        }
    }

    pub fn print_header(&self) {
        let mut header = StyledText::new();
        header
            .push(Tone::Banner, art::BANNER)
            .push(Tone::Plain, format!("  version {}\n", env!("CARGO_PKG_VERSION")));
        self.print_above(header);
    }

    pub fn print_pin_diagram(&self) {
        self.print_above(StyledText::styled(Tone::Highlight, art::PIN_DIAGRAM));
    }

    pub fn clear(&self) {
        self.console.clear_screen();
    }

    pub fn write_raw(&self, text: &str) {
        self.console.write_raw(text);
    }
}
