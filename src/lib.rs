//! Terminal console for a network device controller.
//!
//! The console finds the controller with a UDP broadcast, attaches over TCP
//! and shows the controller's log stream in a filterable, bounded buffer.
//! Operators administer devices through the same connection.

pub mod app;
pub mod buffer;
pub mod commands;
pub mod config;
pub mod logger;
pub mod network;
pub mod protocol;
pub mod terminal;

pub use app::{App, AppConfig, EXIT_NO_CONNECTION, EXIT_NORMAL};
