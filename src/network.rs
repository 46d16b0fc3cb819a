//! Finding the controller and talking to it.
//!
//! [`discovery`] performs the UDP broadcast rendezvous and opens the TCP
//! stream; [`session`] owns that stream, dispatching inbound envelopes on a
//! background task and serializing outbound frames.

pub mod discovery;
pub mod session;

pub use discovery::{DiscoveryConfig, DiscoveryError, discover};
pub use session::{Outbound, Session, SessionState};
