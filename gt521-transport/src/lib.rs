//! Transport layer for the GT-521Fxx protocol
//!
//! Provides byte-stream communication with the sensor module.

pub mod error;
pub mod serial;

pub use error::{Error, Result};
pub use serial::{SerialTransport, available_ports};

use async_trait::async_trait;
use bytes::BytesMut;

/// Transport trait for byte-stream links to the device
///
/// The dispatcher is the only writer. It calls [`flush`](Transport::flush)
/// immediately before every [`send`](Transport::send).
#[async_trait]
pub trait Transport: Send {
    /// Open the link
    async fn open(&mut self) -> Result<()>;

    /// Close the link
    async fn close(&mut self) -> Result<()>;

    /// Check if open
    fn is_open(&self) -> bool;

    /// Write raw bytes and wait until they are transmitted
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Discard data received but not read and written but not transmitted
    async fn flush(&mut self) -> Result<()>;

    /// Wait for the next inbound chunk
    ///
    /// Must be cancel-safe: the dispatcher races it against other events
    /// and drops the future when another branch wins.
    async fn receive(&mut self) -> Result<BytesMut>;

    /// Change the line speed of an open link
    async fn reconfigure(&mut self, baud_rate: u32) -> Result<()>;

    /// Name of the underlying port
    fn port_name(&self) -> String;
}
