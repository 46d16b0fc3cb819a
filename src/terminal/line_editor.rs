use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::{Config, Editor, ExternalPrinter};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::completion::{CommandHelper, CommandTree};
use super::{Console, ReadError, StyledText, TerminalMode};
use crate::log_warn;

pub const GENERAL_HISTORY_FILE: &str = "general.hist";
pub const DEVICE_HISTORY_FILE: &str = "device.hist";
const HISTORY_CAPACITY: usize = 1000;

type Printer = Box<dyn ExternalPrinter + Send>;

/// One editor with its completion tree, history file and printer.
struct Reader {
    editor: Mutex<Editor<CommandHelper, FileHistory>>,
    printer: Mutex<Printer>,
    history_path: PathBuf,
}

impl Reader {
    fn new(tree: CommandTree, history_path: PathBuf) -> Result<Self, ReadlineError> {
        let config = Config::builder()
            .max_history_size(HISTORY_CAPACITY)?
            .auto_add_history(true)
            .build();
        let mut editor = Editor::<CommandHelper, FileHistory>::with_config(config)?;
        editor.set_helper(Some(CommandHelper::new(tree)));
        if history_path.exists() {
            if let Err(e) = editor.load_history(&history_path) {
                log_warn!("Could not load history {}: {}", history_path.display(), e);
            }
        }
        let printer: Printer = Box::new(editor.create_external_printer()?);
        Ok(Reader {
            editor: Mutex::new(editor),
            printer: Mutex::new(printer),
            history_path,
        })
    }

    fn read_line(&self, prompt: &str) -> Result<String, ReadError> {
        let mut editor = self.editor.lock().unwrap_or_else(PoisonError::into_inner);
        let line = match editor.readline(prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => return Err(ReadError::Interrupted),
            Err(ReadlineError::Eof) => return Err(ReadError::Eof),
            Err(ReadlineError::Io(e)) => return Err(ReadError::Io(e)),
            Err(e) => return Err(ReadError::Io(std::io::Error::other(e))),
        };
        if let Err(e) = editor.save_history(&self.history_path) {
            log_warn!("Could not save history {}: {}", self.history_path.display(), e);
        }
        Ok(line)
    }

    fn print(&self, text: String) {
        let mut printer = self.printer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = printer.print(text) {
            eprintln!("Failed to print above prompt: {}", e);
        }
    }
}

/// Terminal console backed by two rustyline editors, one per command
/// vocabulary, sharing the process terminal.
pub struct LineEditorConsole {
    general: Reader,
    device: Reader,
    mode: Mutex<TerminalMode>,
}

impl LineEditorConsole {
    /// Creates both editors, loading their history from `state_dir`.
    pub fn new(state_dir: &Path) -> Result<Self, ReadlineError> {
        Ok(LineEditorConsole {
            general: Reader::new(CommandTree::general(), state_dir.join(GENERAL_HISTORY_FILE))?,
            device: Reader::new(CommandTree::device(), state_dir.join(DEVICE_HISTORY_FILE))?,
            mode: Mutex::new(TerminalMode::General),
        })
    }

    fn active(&self) -> &Reader {
        match self.mode() {
            TerminalMode::General => &self.general,
            TerminalMode::Device => &self.device,
        }
    }
}

impl Console for LineEditorConsole {
    fn read_line(&self, prompt: &str) -> Result<String, ReadError> {
        self.active().read_line(prompt)
    }

    fn print_above(&self, text: StyledText) {
        let mut ansi = text.to_ansi();
        ansi.push('\n');
        self.active().print(ansi);
    }

    fn write_raw(&self, text: &str) {
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }

    fn mode(&self) -> TerminalMode {
        *self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn switch_reader(&self) {
        let mut mode = self.mode.lock().unwrap_or_else(PoisonError::into_inner);
        *mode = match *mode {
            TerminalMode::General => TerminalMode::Device,
            TerminalMode::Device => TerminalMode::General,
        };
    }

    fn clear_screen(&self) {
        let mut stdout = std::io::stdout();
        if let Err(e) = execute!(stdout, Clear(ClearType::All), MoveTo(0, 0)) {
            log_warn!("Could not clear screen: {}", e);
        }
    }
}
