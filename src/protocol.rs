//! Wire protocol spoken with the device controller.

pub mod error;
pub mod frame;
pub mod log;
pub mod message;

pub use error::ProtocolError;
pub use log::{Level, LogRecord};
pub use message::{ClientMessage, DeviceData, Inbound, LogEvent, ServerMessage};
