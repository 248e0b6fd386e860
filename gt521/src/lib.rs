//! # gt521
//!
//! Async driver for GT-521Fxx fingerprint sensor modules.
//!
//! ## Features
//!
//! - Type-safe command, response and data frames
//! - Async/await API using Tokio
//! - One command on the wire at a time, with per-command timeouts
//! - Persistent store for the line speed and enrolled slots
//!
//! ## Quick Start
//!
//! ```no_run
//! use gt521::Reader;
//!
//! #[tokio::main]
//! async fn main() -> gt521::Result<()> {
//!     // Open the module
//!     let mut reader = Reader::serial("/dev/ttyUSB0")?;
//!     let info = reader.open().await?;
//!     println!("{}", info);
//!
//!     // Blink
//!     reader.led_on().await?;
//!     reader.led_off().await?;
//!
//!     reader.close().await?;
//!     Ok(())
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod reader;
pub mod store;

#[cfg(test)]
mod testing;

// Re-exports
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use error::{Error, Result};
pub use queue::{CommandRequest, Reply};
pub use reader::Reader;
pub use store::{FingerprintStore, StoreError};

// Re-export types
pub use gt521_core::{Command, DataPacket, ErrorCode, PacketKind, ResponsePacket};
pub use gt521_transport::{SerialTransport, Transport, available_ports};
pub use gt521_types::{BaudRate, DeviceInfo};
