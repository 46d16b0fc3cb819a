use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::buffer::LogView;
use crate::commands::{CommandDispatcher, SessionEnd};
use crate::network::{DiscoveryConfig, Session, SessionState, discover};
use crate::terminal::{Terminal, TerminalMode};
use crate::{log_error, log_info};

/// Exit code after the operator leaves or the connection is lost.
pub const EXIT_NORMAL: i32 = 1;
/// Exit code when no controller could be reached and reconnect is off.
pub const EXIT_NO_CONNECTION: i32 = 7;

const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub discovery: DiscoveryConfig,
    /// Retry failed discovery and rediscover after a lost connection.
    pub reconnect: bool,
    /// Return to the general reader when the controller ends a dialog.
    pub switch_on_release: bool,
}

/// Discovery, session and command loop, repeated while reconnecting.
pub struct App {
    terminal: Arc<Terminal>,
    view: Arc<LogView>,
    config: AppConfig,
    state: watch::Sender<SessionState>,
}

impl App {
    pub fn new(terminal: Arc<Terminal>, view: Arc<LogView>, config: AppConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Discovering);
        App {
            terminal,
            view,
            config,
            state,
        }
    }

    /// Runs until the operator quits, returning the process exit code.
    pub async fn run(&self) -> i32 {
        let mut reconnect = self.config.reconnect;
        let mut started = Instant::now();
        self.terminal.write_raw("Waiting for connection");

        loop {
            self.state.send_replace(SessionState::Discovering);
            let stream = match discover(&self.config.discovery, &self.terminal).await {
                Ok(stream) => stream,
                Err(e) => {
                    self.terminal.write_raw("\n");
                    log_error!("{}", e);
                    if reconnect {
                        self.terminal.print_warning("Re-attempting");
                        tokio::time::sleep(RETRY_DELAY).await;
                        continue;
                    }
                    self.terminal.print_error("Could not get connection");
                    return EXIT_NO_CONNECTION;
                }
            };

            self.terminal.clear();
            self.terminal.print_header();
            self.terminal.print_info(&format!(
                "Connection established (took {}ms) ",
                started.elapsed().as_millis()
            ));

            let session = Session::start(
                stream,
                self.state.clone(),
                self.terminal.clone(),
                self.view.clone(),
                self.config.switch_on_release,
            );
            let mut dispatcher = CommandDispatcher::new(self.terminal.clone(), self.view.clone());
            let end = dispatcher.run(&session).await;
            session.close().await;
            self.state.send_replace(SessionState::Closed);

            // A new session always starts in the general vocabulary.
            self.terminal.set_interactive(false);
            self.terminal.set_mode(TerminalMode::General);

            match end {
                SessionEnd::Reconnect => reconnect = true,
                SessionEnd::Closed if reconnect => {}
                SessionEnd::Closed => {
                    self.terminal.finish_pending_read().await;
                    return EXIT_NORMAL;
                }
                SessionEnd::Quit => return EXIT_NORMAL,
            }
            log_info!("Rediscovering controller");
            started = Instant::now();
            self.terminal.write_raw("Waiting for connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::LogBuffer;
    use crate::config::ViewConfig;
    use crate::protocol::ClientMessage;
    use crate::protocol::frame::read_frame;
    use crate::terminal::recording::RecordingConsole;
    use std::net::Ipv4Addr;
    use tokio::net::{TcpListener, TcpStream, UdpSocket};

    fn app(console: &Arc<RecordingConsole>, dir: &std::path::Path, config: AppConfig) -> App {
        let terminal = Arc::new(Terminal::new(console.clone()));
        let view = Arc::new(LogView::new(LogBuffer::new(), ViewConfig::load_or_default(dir)));
        App::new(terminal, view, config)
    }

    /// Answers `hellos` discovery broadcasts with the listener's port.
    fn spawn_responder(responder: UdpSocket, tcp_port: u16, hellos: usize) {
        tokio::spawn(async move {
            let mut buf = [0u8; 64];
            for _ in 0..hellos {
                let (_, from) = responder.recv_from(&mut buf).await.unwrap();
                let reply = format!("PORT={}", tcp_port);
                responder.send_to(reply.as_bytes(), from).await.unwrap();
            }
        });
    }

    async fn loopback(hellos: usize) -> (TcpListener, DiscoveryConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = DiscoveryConfig {
            bind_port: 0,
            broadcast: Ipv4Addr::LOCALHOST,
            service_port: responder.local_addr().unwrap().port(),
            timeout: Duration::from_millis(200),
        };
        spawn_responder(responder, listener.local_addr().unwrap().port(), hellos);
        (listener, config)
    }

    #[tokio::test]
    async fn unreachable_controller_exits_with_seven() {
        let occupied = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        let config = AppConfig {
            discovery: DiscoveryConfig {
                bind_port: occupied.local_addr().unwrap().port(),
                ..DiscoveryConfig::default()
            },
            ..AppConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let console = Arc::new(RecordingConsole::new());
        assert_eq!(app(&console, dir.path(), config).run().await, EXIT_NO_CONNECTION);
        assert_eq!(
            console.printed_lines().last().unwrap(),
            "Could not get connection"
        );
    }

    #[tokio::test]
    async fn quit_after_connecting_exits_normally() {
        let (listener, discovery) = loopback(1).await;
        let dir = tempfile::tempdir().unwrap();
        let console = Arc::new(RecordingConsole::with_answers(["quit"]));
        let app = app(&console, dir.path(), AppConfig {
            discovery,
            ..AppConfig::default()
        });
        let mut state = app.state.subscribe();

        let accept = tokio::spawn(async move { listener.accept().await.unwrap().0 });
        assert_eq!(app.run().await, EXIT_NORMAL);
        let _controller = accept.await.unwrap();

        assert!(console.raw().starts_with("Waiting for connection"));
        assert_eq!(console.clears(), 1);
        assert!(
            console
                .printed_lines()
                .iter()
                .any(|line| line.starts_with("Connection established (took "))
        );
        assert_eq!(*state.borrow_and_update(), SessionState::Closed);
    }

    #[tokio::test]
    async fn reconnect_discovers_again_and_keeps_the_buffer() {
        let (listener, discovery) = loopback(2).await;
        let dir = tempfile::tempdir().unwrap();
        let console = Arc::new(RecordingConsole::with_answers(["reconnect", "quit"]));
        let app = app(&console, dir.path(), AppConfig {
            discovery,
            ..AppConfig::default()
        });
        app.view.buffer().push(crate::protocol::LogRecord::new(
            crate::protocol::Level::Info,
            0,
            "core",
            "kept",
        ));

        let accept = tokio::spawn(async move {
            let first = listener.accept().await.unwrap().0;
            let second = listener.accept().await.unwrap().0;
            (first, second)
        });
        assert_eq!(app.run().await, EXIT_NORMAL);
        let _controllers = accept.await.unwrap();

        assert_eq!(console.clears(), 2);
        assert_eq!(app.view.buffer().len(), 1);
        assert_eq!(console.prompts(), vec!["devctl> ", "devctl> "]);
    }

    async fn next_message(controller: &mut TcpStream) -> ClientMessage {
        let body = tokio::time::timeout(Duration::from_secs(2), read_frame(controller))
            .await
            .unwrap()
            .unwrap();
        let value: serde_json::Value = rmp_serde::from_slice(&body).unwrap();
        serde_json::from_value(value).unwrap()
    }

    async fn wait_for_prompts(console: &RecordingConsole, count: usize) {
        while console.prompts().len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn line_typed_across_a_lost_connection_reaches_the_next_controller() {
        let (listener, discovery) = loopback(2).await;
        let dir = tempfile::tempdir().unwrap();
        let console = Arc::new(RecordingConsole::blocking());
        let app = app(&console, dir.path(), AppConfig {
            discovery,
            reconnect: true,
            ..AppConfig::default()
        });

        let controllers = {
            let console = console.clone();
            async move {
                let first = listener.accept().await.unwrap().0;
                wait_for_prompts(&console, 1).await;
                drop(first);

                let mut second = listener.accept().await.unwrap().0;
                console.push_answer("show devices");
                let request = next_message(&mut second).await;
                console.push_answer("quit");
                (request, second)
            }
        };
        let (code, (request, _second)) = tokio::time::timeout(Duration::from_secs(10), async {
            tokio::join!(app.run(), controllers)
        })
        .await
        .expect("app should quit");

        assert_eq!(code, EXIT_NORMAL);
        assert_eq!(request, ClientMessage::DeviceListRequest);
        // the prompt shown before the loss served the first line
        assert_eq!(console.prompts(), vec!["devctl> ", "devctl> "]);
    }
}
