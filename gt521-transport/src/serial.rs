//! Serial transport
//!
//! GT-521Fxx modules talk 8N1 without flow control over a UART, usually
//! behind a USB bridge.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use gt521_core::constants::DEFAULT_BAUD_RATE;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortBuilderExt, SerialStream,
    StopBits,
};
use tracing::{debug, trace, warn};

use crate::{Transport, error::*};

/// Default read chunk capacity
const READ_BUFFER_SIZE: usize = 1024;

/// List the names of serial ports present on this machine
pub fn available_ports() -> Result<Vec<String>> {
    let mut names: Vec<String> = tokio_serial::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .collect();
    names.sort();
    Ok(names)
}

/// Serial transport for GT-521Fxx modules
pub struct SerialTransport {
    path: String,
    baud_rate: u32,
    timeout: Duration,
    stream: Option<SerialStream>,
}

impl SerialTransport {
    /// Create new serial transport at the power-on baud rate
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(100),
            stream: None,
        }
    }

    /// Set the baud rate used when opening
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the driver-level I/O timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current line speed
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    fn stream(&mut self) -> Result<&mut SerialStream> {
        self.stream.as_mut().ok_or(Error::NotOpen)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(Error::AlreadyOpen);
        }

        debug!("Opening {} at {} baud...", self.path, self.baud_rate);

        let stream = tokio_serial::new(&self.path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.timeout)
            .open_native_async()?;

        debug!("Opened {}", self.path);

        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            debug!("Closing {}...", self.path);
            let _ = AsyncWriteExt::shutdown(&mut stream).await;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream()?;

        trace!("Sending {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        AsyncWriteExt::write_all(&mut *stream, data).await?;
        AsyncWriteExt::flush(&mut *stream).await?;

        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        let stream = self.stream()?;
        stream.clear(ClearBuffer::All)?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<BytesMut> {
        let stream = self.stream()?;

        let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);
        let n = AsyncReadExt::read_buf(stream, &mut buf).await?;

        if n == 0 {
            return Err(Error::ConnectionClosed);
        }

        trace!("Received {} bytes: {:02X?}", n, &buf[..n.min(32)]);

        Ok(buf)
    }

    async fn reconfigure(&mut self, baud_rate: u32) -> Result<()> {
        let stream = self.stream()?;
        stream.set_baud_rate(baud_rate)?;

        debug!("Baud rate changed {} -> {}", self.baud_rate, baud_rate);
        self.baud_rate = baud_rate;
        Ok(())
    }

    fn port_name(&self) -> String {
        self.path.clone()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_open() {
            warn!("Serial transport dropped while still open");
        }
    }
}
