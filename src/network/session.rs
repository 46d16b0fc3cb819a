use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use crate::buffer::LogView;
use crate::protocol::frame::{encode_frame, read_frame, write_frame};
use crate::protocol::message::decode;
use crate::protocol::{ClientMessage, Inbound, LogRecord, ProtocolError, ServerMessage};
use crate::terminal::device_table::render_device_table;
use crate::terminal::{Terminal, TerminalMode};
use crate::{log_debug, log_trace};

/// Lifecycle of the link to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Discovering,
    Connected,
    Closed,
}

/// Write side of a session. Each frame is written whole under the lock, so
/// replies from the inbound task never interleave with operator commands.
#[derive(Clone)]
pub struct Outbound {
    writer: Arc<Mutex<OwnedWriteHalf>>,
}

impl Outbound {
    fn new(writer: OwnedWriteHalf) -> Self {
        Outbound {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    pub async fn send(&self, message: &ClientMessage) -> Result<(), ProtocolError> {
        let frame = encode_frame(message)?;
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, &frame).await
    }

    /// Sends `message`, printing a red error naming the operation on failure.
    pub async fn send_or_report(&self, message: &ClientMessage, terminal: &Terminal) -> bool {
        match self.send(message).await {
            Ok(()) => true,
            Err(e) => {
                terminal.print_error(&format!("Could not send {}. {}", message.operation(), e));
                false
            }
        }
    }

    async fn shutdown(&self) {
        use tokio::io::AsyncWriteExt;
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            log_debug!("Shutdown of session stream failed: {}", e);
        }
    }
}

/// One attached TCP connection and its inbound task.
pub struct Session {
    state: watch::Receiver<SessionState>,
    outbound: Outbound,
    reader: JoinHandle<()>,
}

impl Session {
    /// Splits `stream`, marks the session connected and spawns the task
    /// dispatching inbound envelopes.
    pub fn start(
        stream: TcpStream,
        state: watch::Sender<SessionState>,
        terminal: Arc<Terminal>,
        view: Arc<LogView>,
        switch_on_release: bool,
    ) -> Session {
        let (read_half, write_half) = stream.into_split();
        let outbound = Outbound::new(write_half);
        state.send_replace(SessionState::Connected);
        let receiver = state.subscribe();

        let runner = InboundRunner {
            outbound: outbound.clone(),
            terminal,
            view,
            switch_on_release,
            state,
        };
        let reader = tokio::spawn(runner.run(read_half));

        Session {
            state: receiver,
            outbound,
            reader,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Resolves once the inbound task has marked the session closed.
    pub async fn closed(&self) {
        let mut state = self.state.clone();
        // An error means the sender is gone, which only happens after close.
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }

    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Shuts the write half and stops the inbound task.
    pub async fn close(self) {
        self.outbound.shutdown().await;
        self.reader.abort();
        let _ = self.reader.await;
    }
}

struct InboundRunner {
    outbound: Outbound,
    terminal: Arc<Terminal>,
    view: Arc<LogView>,
    switch_on_release: bool,
    state: watch::Sender<SessionState>,
}

impl InboundRunner {
    async fn run(self, mut reader: OwnedReadHalf) {
        loop {
            let inbound = match read_frame(&mut reader).await.and_then(|body| decode(&body)) {
                Ok(inbound) => inbound,
                Err(e) => {
                    self.terminal.print_error(&format!("Connection lost {}", e));
                    break;
                }
            };
            match inbound {
                Inbound::Message(message) => self.dispatch(message).await,
                Inbound::Unhandled(tag) => {
                    self.terminal
                        .print_error(&format!("Unhandled message {}", tag));
                }
            }
        }

        self.terminal.print_warning("Output runner stopped");
        self.state.send_replace(SessionState::Closed);
        self.terminal.set_interactive(false);
    }

    async fn dispatch(&self, message: ServerMessage) {
        log_trace!("Received {}", message.tag());
        match message {
            ServerMessage::LogEvent(event) => {
                self.view.ingest(LogRecord::from(event), &self.terminal);
            }
            ServerMessage::DeviceListResponse { device_list } => {
                self.terminal.print_above(render_device_table(&device_list));
            }
            ServerMessage::ConsoleRequest { request } => {
                let response = match self.terminal.read_line_async(format!("{}>", request)).await {
                    Ok(line) => line,
                    Err(e) => {
                        self.terminal.print_error(&format!("Could not read answer. {}", e));
                        String::new()
                    }
                };
                self.outbound
                    .send_or_report(&ClientMessage::ConsoleResponse { response }, &self.terminal)
                    .await;
            }
            ServerMessage::SwitchToNonInteractiveRequest => {
                self.terminal.set_interactive(false);
                if self.switch_on_release {
                    self.terminal.set_mode(TerminalMode::General);
                }
            }
        }
    }
}
