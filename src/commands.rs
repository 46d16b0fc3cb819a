//! Operator command loop.
//!
//! Lines are split on whitespace and the lower-cased first token selects the
//! verb from the vocabulary of the current terminal mode. Validation errors
//! are printed in red and never leave the loop.

use std::path::Path;
use std::sync::Arc;

use crate::buffer::LogView;
use crate::config::{ConfigError, FilterBy};
use crate::network::{Outbound, Session, SessionState};
use crate::protocol::{ClientMessage, Level};
use crate::terminal::{ReadError, StyledText, Terminal, TerminalMode, Tone};

const GENERAL_PROMPT: &str = "devctl> ";

const GENERAL_HELP: &str = "\
clear [buffer]                      clear the screen or the log buffer
config device <id>                  configure a device
dump <path>                         write the filtered buffer to a file
filter logname|text <s> | off       filter by logger name or text
show buffer|devices|diagram         buffer usage, device list, pin diagram
set level off|err|warn|info|debug|trace
set time on|off                     show timestamps
set logname on|off                  show logger names
reconnect                           drop the connection and discover again
switch                              toggle the line editor
quit                                leave";

const DEVICE_HELP: &str = "\
add sink|task                       start the sink or task dialog
remove sink|task <id>               remove a sink or task
remove device                       remove the device
set id <n>                          assign a new id
set description <text>              set the description
reset                               reset the device
exit                                end device configuration";

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Reconnect,
    Quit,
}

/// Why the command loop of a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The operator asked to rediscover the controller.
    Reconnect,
    /// The inbound task lost the connection.
    Closed,
    /// The operator quit or closed the input.
    Quit,
}

pub struct CommandDispatcher {
    terminal: Arc<Terminal>,
    view: Arc<LogView>,
    device: Option<i32>,
}

impl CommandDispatcher {
    pub fn new(terminal: Arc<Terminal>, view: Arc<LogView>) -> Self {
        CommandDispatcher {
            terminal,
            view,
            device: None,
        }
    }

    pub fn prompt(&self) -> String {
        match (self.terminal.mode(), self.device) {
            (TerminalMode::General, _) => GENERAL_PROMPT.to_string(),
            (TerminalMode::Device, Some(id)) => format!("device {}> ", id),
            (TerminalMode::Device, None) => "device> ".to_string(),
        }
    }

    /// Reads and executes operator lines until the session ends.
    pub async fn run(&mut self, session: &Session) -> SessionEnd {
        loop {
            tokio::select! {
                _ = self.terminal.wait_until_released() => {}
                _ = session.closed() => return SessionEnd::Closed,
            }
            if session.state() == SessionState::Closed {
                return SessionEnd::Closed;
            }

            let read = tokio::select! {
                read = self.terminal.read_command(self.prompt()) => read,
                _ = session.closed() => return SessionEnd::Closed,
            };
            let line = match read {
                Ok(line) => line,
                Err(ReadError::Interrupted) | Err(ReadError::Eof) => return SessionEnd::Quit,
                Err(ReadError::Io(e)) => {
                    self.terminal.print_error(&format!("Terminal error {}", e));
                    return SessionEnd::Quit;
                }
            };

            match self.execute(&line, session.outbound()).await {
                Flow::Continue => {}
                Flow::Reconnect => return SessionEnd::Reconnect,
                Flow::Quit => return SessionEnd::Quit,
            }
        }
    }

    /// Executes one operator line.
    pub async fn execute(&mut self, line: &str, outbound: &Outbound) -> Flow {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Flow::Continue;
        }
        match self.terminal.mode() {
            TerminalMode::General => self.execute_general(&tokens, outbound).await,
            TerminalMode::Device => {
                self.execute_device(&tokens, outbound).await;
                Flow::Continue
            }
        }
    }

    async fn execute_general(&mut self, tokens: &[&str], outbound: &Outbound) -> Flow {
        let verb = tokens[0].to_lowercase();
        match verb.as_str() {
            "clear" => match tokens {
                [_] => self.terminal.clear(),
                [_, what] if what.eq_ignore_ascii_case("buffer") => self.view.buffer().clear(),
                [_, what] => self.unknown_option("clear", what),
                _ => {
                    self.terminal.print_error(&format!(
                        "expected at most 2 arguments but got {}",
                        tokens.len()
                    ));
                }
            },
            "config" => {
                if !self.expect_args(tokens, 3) {
                    return Flow::Continue;
                }
                if !tokens[1].eq_ignore_ascii_case("device") {
                    self.unknown_option("config", tokens[1]);
                    return Flow::Continue;
                }
                let Some(id) = self.parse_number("device id", tokens[2]) else {
                    return Flow::Continue;
                };
                let request = ClientMessage::ConfigDeviceRequest { device_id: id };
                if outbound.send_or_report(&request, &self.terminal).await {
                    self.device = Some(id);
                    self.terminal.set_mode(TerminalMode::Device);
                }
            }
            "dump" => {
                if self.expect_args(tokens, 2) {
                    self.view
                        .dump_to_file(Path::new(tokens[1]), &self.terminal)
                        .await;
                }
            }
            "filter" => self.filter(tokens),
            "show" => {
                if !self.expect_args(tokens, 2) {
                    return Flow::Continue;
                }
                match tokens[1].to_lowercase().as_str() {
                    "buffer" => self.terminal.print_info(&self.view.buffer_usage()),
                    "devices" => {
                        outbound
                            .send_or_report(&ClientMessage::DeviceListRequest, &self.terminal)
                            .await;
                    }
                    "diagram" => self.terminal.print_pin_diagram(),
                    _ => self.unknown_option("show", tokens[1]),
                }
            }
            "set" => self.set_view(tokens),
            "reconnect" | "switch" | "help" | "quit" => {
                if !self.expect_args(tokens, 1) {
                    return Flow::Continue;
                }
                match verb.as_str() {
                    "reconnect" => return Flow::Reconnect,
                    "quit" => return Flow::Quit,
                    "switch" => self.terminal.switch_reader(),
                    _ => self.help(GENERAL_HELP),
                }
            }
            _ => self.terminal.print_error(&format!("Unknown option {}", tokens[0])),
        }
        Flow::Continue
    }

    fn filter(&self, tokens: &[&str]) {
        if tokens.len() < 2 {
            self.expected_at_least(2, tokens.len());
            return;
        }
        let config = self.view.config();
        let written = match tokens[1].to_lowercase().as_str() {
            "logname" | "text" => {
                if tokens.len() < 3 {
                    self.expected_at_least(3, tokens.len());
                    return;
                }
                let filter_by = if tokens[1].eq_ignore_ascii_case("text") {
                    FilterBy::ByText
                } else {
                    FilterBy::ByLoggerName
                };
                config.set_filter(filter_by, tokens[2..].join(" "))
            }
            "off" => config.set_filter_by(FilterBy::None),
            _ => {
                self.unknown_option("filter", tokens[1]);
                return;
            }
        };
        self.report_config(written);
        self.view.silent_redraw(&self.terminal);
    }

    fn set_view(&self, tokens: &[&str]) {
        if !self.expect_args(tokens, 3) {
            return;
        }
        let config = self.view.config();
        let value = tokens[2];
        let written = match tokens[1].to_lowercase().as_str() {
            "level" => match Level::from_keyword(value) {
                Some(level) => config.set_filter_level(level),
                None => {
                    self.terminal
                        .print_error(&format!("Unknown level '{}'", value));
                    return;
                }
            },
            "time" => match self.parse_switch(value) {
                Some(on) => config.set_show_time(on),
                None => return,
            },
            "logname" => match self.parse_switch(value) {
                Some(on) => config.set_show_logger_name(on),
                None => return,
            },
            _ => {
                self.unknown_option("set", tokens[1]);
                return;
            }
        };
        self.report_config(written);
        self.view.silent_redraw(&self.terminal);
    }

    async fn execute_device(&mut self, tokens: &[&str], outbound: &Outbound) {
        let verb = tokens[0].to_lowercase();
        match verb.as_str() {
            "add" => {
                if !self.expect_args(tokens, 2) {
                    return;
                }
                let request = match tokens[1].to_lowercase().as_str() {
                    "sink" => ClientMessage::AddSinkRequest,
                    "task" => ClientMessage::AddTaskRequest,
                    _ => {
                        self.unknown_option("add", tokens[1]);
                        return;
                    }
                };
                // The controller drives the dialog from here and releases
                // the gate with SwitchToNonInteractiveRequest.
                self.terminal.set_interactive(true);
                if !outbound.send_or_report(&request, &self.terminal).await {
                    self.terminal.set_interactive(false);
                }
            }
            "remove" => {
                if tokens.len() < 2 {
                    self.expected_at_least(2, tokens.len());
                    return;
                }
                match tokens[1].to_lowercase().as_str() {
                    "sink" | "task" => {
                        if !self.expect_args(tokens, 3) {
                            return;
                        }
                        let is_sink = tokens[1].eq_ignore_ascii_case("sink");
                        let what = if is_sink { "sink id" } else { "task id" };
                        let Some(id) = self.parse_number(what, tokens[2]) else {
                            return;
                        };
                        let request = if is_sink {
                            ClientMessage::RemoveSinkRequest { id }
                        } else {
                            ClientMessage::RemoveTaskRequest { id }
                        };
                        outbound.send_or_report(&request, &self.terminal).await;
                    }
                    "device" => {
                        if !self.expect_args(tokens, 2) {
                            return;
                        }
                        if outbound
                            .send_or_report(&ClientMessage::RemoveDeviceRequest, &self.terminal)
                            .await
                        {
                            self.leave_device();
                        }
                    }
                    _ => self.unknown_option("remove", tokens[1]),
                }
            }
            "set" => {
                if tokens.len() < 3 {
                    self.expected_at_least(3, tokens.len());
                    return;
                }
                match tokens[1].to_lowercase().as_str() {
                    "id" => {
                        if !self.expect_args(tokens, 3) {
                            return;
                        }
                        let Some(id) = self.parse_number("id", tokens[2]) else {
                            return;
                        };
                        if outbound
                            .send_or_report(&ClientMessage::SetIdRequest { id }, &self.terminal)
                            .await
                        {
                            self.device = Some(id);
                        }
                    }
                    "description" => {
                        let description = tokens[2..].join(" ");
                        outbound
                            .send_or_report(
                                &ClientMessage::SetDescriptionRequest { description },
                                &self.terminal,
                            )
                            .await;
                    }
                    _ => self.unknown_option("set", tokens[1]),
                }
            }
            "reset" | "exit" | "help" if !self.expect_args(tokens, 1) => {}
            "reset" => {
                outbound
                    .send_or_report(&ClientMessage::DeviceResetRequest, &self.terminal)
                    .await;
            }
            "exit" => {
                outbound
                    .send_or_report(&ClientMessage::EndConfigureDeviceRequest, &self.terminal)
                    .await;
                self.leave_device();
            }
            "help" => self.help(DEVICE_HELP),
            _ => self
                .terminal
                .print_error(&format!("Unknown option {}", tokens[0])),
        }
    }

    /// The new setting applies even when it could not be saved.
    fn report_config(&self, written: Result<(), ConfigError>) {
        if let Err(e) = written {
            self.terminal.print_error(&e.to_string());
        }
    }

    fn leave_device(&mut self) {
        self.device = None;
        self.terminal.set_mode(TerminalMode::General);
    }

    fn help(&self, text: &str) {
        self.terminal.print_above(StyledText::styled(Tone::Plain, text));
    }

    fn expect_args(&self, tokens: &[&str], expected: usize) -> bool {
        if tokens.len() != expected {
            self.terminal.print_error(&format!(
                "expected {} arguments but got {}",
                expected,
                tokens.len()
            ));
            return false;
        }
        true
    }

    fn expected_at_least(&self, expected: usize, got: usize) {
        self.terminal.print_error(&format!(
            "expected at least {} arguments but got {}",
            expected, got
        ));
    }

    fn unknown_option(&self, verb: &str, option: &str) {
        self.terminal
            .print_error(&format!("Unknown {} option {}", verb, option));
    }

    fn parse_number(&self, what: &str, token: &str) -> Option<i32> {
        match token.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                self.terminal
                    .print_error(&format!("Invalid {} {} expected a number", what, token));
                None
            }
        }
    }

    fn parse_switch(&self, token: &str) -> Option<bool> {
        match token.to_lowercase().as_str() {
            "on" => Some(true),
            "off" => Some(false),
            _ => {
                self.terminal
                    .print_error(&format!("Expected 'on' or 'off' but got {}", token));
                None
            }
        }
    }
}
