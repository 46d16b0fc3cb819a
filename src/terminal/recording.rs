use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use super::{Console, ReadError, StyledText, TerminalMode};

/// Console double: answers prompts from a script and records everything
/// printed through it.
///
/// A blocking console waits for the next answer instead of reporting end of
/// input, and holds a lock for the whole read like a real line editor.
#[derive(Default)]
pub(crate) struct RecordingConsole {
    blocking: bool,
    reading: Mutex<()>,
    answered: Condvar,
    answers: Mutex<VecDeque<Result<String, ReadError>>>,
    prompts: Mutex<Vec<String>>,
    printed: Mutex<Vec<StyledText>>,
    raw: Mutex<String>,
    mode: Mutex<Option<TerminalMode>>,
    clears: Mutex<usize>,
}

impl RecordingConsole {
    pub(crate) fn new() -> Self {
        RecordingConsole::default()
    }

    pub(crate) fn blocking() -> Self {
        RecordingConsole {
            blocking: true,
            ..RecordingConsole::default()
        }
    }

    pub(crate) fn with_answers<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let console = RecordingConsole::new();
        for answer in answers {
            console.push_answer(answer);
        }
        console
    }

    pub(crate) fn push_answer(&self, answer: impl Into<String>) {
        self.answers.lock().unwrap().push_back(Ok(answer.into()));
        self.answered.notify_all();
    }

    pub(crate) fn push_error(&self, error: ReadError) {
        self.answers.lock().unwrap().push_back(Err(error));
        self.answered.notify_all();
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub(crate) fn printed(&self) -> Vec<StyledText> {
        self.printed.lock().unwrap().clone()
    }

    pub(crate) fn printed_lines(&self) -> Vec<String> {
        self.printed().iter().map(StyledText::plain_text).collect()
    }

    pub(crate) fn raw(&self) -> String {
        self.raw.lock().unwrap().clone()
    }

    pub(crate) fn clears(&self) -> usize {
        *self.clears.lock().unwrap()
    }

    pub(crate) fn forget_output(&self) {
        self.printed.lock().unwrap().clear();
    }
}

impl Console for RecordingConsole {
    fn read_line(&self, prompt: &str) -> Result<String, ReadError> {
        let _reading = self.reading.lock().unwrap();
        self.prompts.lock().unwrap().push(prompt.to_string());
        let mut answers = self.answers.lock().unwrap();
        loop {
            match answers.pop_front() {
                Some(answer) => return answer,
                None if !self.blocking => return Err(ReadError::Eof),
                None => answers = self.answered.wait(answers).unwrap(),
            }
        }
    }

    fn print_above(&self, text: StyledText) {
        self.printed.lock().unwrap().push(text);
    }

    fn write_raw(&self, text: &str) {
        self.raw.lock().unwrap().push_str(text);
    }

    fn mode(&self) -> TerminalMode {
        self.mode.lock().unwrap().unwrap_or(TerminalMode::General)
    }

    fn switch_reader(&self) {
        let mut mode = self.mode.lock().unwrap();
        *mode = Some(match mode.unwrap_or(TerminalMode::General) {
            TerminalMode::General => TerminalMode::Device,
            TerminalMode::Device => TerminalMode::General,
        });
    }

    fn clear_screen(&self) {
        *self.clears.lock().unwrap() += 1;
    }
}
