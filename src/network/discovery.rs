use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;

use crate::protocol::message::PROTOCOL_VERSION;
use crate::terminal::Terminal;
use crate::{log_debug, log_info, log_warn};

/// Payload broadcast to find the controller.
pub const HELLO: &[u8] = b"CLI-HELLO";
const PORT_MARKER: &str = "PORT=";
const MAX_DATAGRAM: usize = 256;

/// Parameters of the broadcast rendezvous.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Local UDP port the hello is sent from (0 picks any free port).
    pub bind_port: u16,
    pub broadcast: Ipv4Addr,
    /// UDP port the controller listens on for hellos.
    pub service_port: u16,
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            bind_port: 9999,
            broadcast: Ipv4Addr::BROADCAST,
            service_port: 5000,
            timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("Could not open discovery socket on port {port}: {source}")]
    Bind { port: u16, source: io::Error },
    #[error("Discovery socket error: {0}")]
    Socket(#[from] io::Error),
    #[error("Could not connect to {addr}: {source}")]
    Connect { addr: SocketAddr, source: io::Error },
}

/// Extracts the TCP port announced in a discovery reply.
///
/// Uses the text after the last `PORT=` and parses its leading decimal
/// digits. Returns `None` when there is no marker or no valid port.
pub fn parse_service_port(reply: &str) -> Option<u16> {
    let start = reply.rfind(PORT_MARKER)? + PORT_MARKER.len();
    let digits: String = reply[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Broadcasts hellos until a controller answers, then connects to the
/// announced TCP port on the replying host.
///
/// Each receive timeout prints a liveness dot. Malformed replies are logged
/// and ignored.
pub async fn discover(
    config: &DiscoveryConfig,
    terminal: &Terminal,
) -> Result<TcpStream, DiscoveryError> {
    let bind_addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.bind_port);
    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|source| DiscoveryError::Bind {
            port: config.bind_port,
            source,
        })?;
    socket.set_broadcast(true)?;
    let target = SocketAddrV4::new(config.broadcast, config.service_port);
    log_debug!("Discovering controller via {} (protocol v{})", target, PROTOCOL_VERSION);

    let mut buf = [0u8; MAX_DATAGRAM];
    loop {
        socket.send_to(HELLO, target).await?;

        let (len, from) = match timeout(config.timeout, socket.recv_from(&mut buf)).await {
            Ok(received) => received?,
            Err(_) => {
                terminal.write_raw(".");
                continue;
            }
        };

        let reply = String::from_utf8_lossy(&buf[..len]);
        let Some(port) = parse_service_port(&reply) else {
            log_warn!("Ignoring discovery reply from {}: {:?}", from, reply);
            continue;
        };

        let addr = SocketAddr::new(from.ip(), port);
        log_info!("Controller found at {}", addr);
        return TcpStream::connect(addr)
            .await
            .map_err(|source| DiscoveryError::Connect { addr, source });
    }
}
