//! High-level reader interface

use std::time::Duration;

use gt521_core::constants::{DEFAULT_TIMEOUT_MS, DEVICE_INFO_FRAME_SIZE, OPEN_WITH_INFO, led};
use gt521_core::{Command, ErrorCode};
use gt521_transport::{SerialTransport, Transport};
use gt521_types::{BaudRate, DeviceInfo};
use tracing::{debug, info, warn};

use crate::dispatcher::{Dispatcher, DispatcherHandle};
use crate::error::{Error, Result};
use crate::queue::{CommandRequest, Reply};
use crate::store::{DEFAULT_STORE_PATH, FingerprintStore};

/// GT-521Fxx fingerprint reader
///
/// High-level interface over a sensor module. Commands are serialized by a
/// background dispatcher task, so the async methods may be awaited
/// concurrently from one task.
///
/// # Examples
///
/// ```no_run
/// use gt521::Reader;
///
/// #[tokio::main]
/// async fn main() -> gt521::Result<()> {
///     let mut reader = Reader::serial("/dev/ttyUSB0")?;
///
///     let info = reader.open().await?;
///     println!("Device: {}", info);
///
///     reader.led_on().await?;
///     reader.led_off().await?;
///
///     reader.close().await?;
///     Ok(())
/// }
/// ```
pub struct Reader {
    transport: Option<Box<dyn Transport>>,
    dispatcher: Option<DispatcherHandle>,
    store: FingerprintStore,
    timeout: Duration,
    device_info: Option<DeviceInfo>,
}

impl Reader {
    /// Create a reader over any transport, with an in-memory store
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_store(transport, FingerprintStore::in_memory())
    }

    pub fn with_store(transport: impl Transport + 'static, store: FingerprintStore) -> Self {
        Self {
            transport: Some(Box::new(transport)),
            dispatcher: None,
            store,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            device_info: None,
        }
    }

    /// Create a reader on a serial port
    ///
    /// The port is opened at the baud rate remembered in the default store.
    pub fn serial(path: impl Into<String>) -> Result<Self> {
        let store = FingerprintStore::open(DEFAULT_STORE_PATH)?;
        let transport = SerialTransport::new(path).with_baud_rate(store.baud_rate().as_u32());
        Ok(Self::with_store(transport, store))
    }

    /// Set command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if open and the link is still up
    pub fn is_open(&self) -> bool {
        self.dispatcher
            .as_ref()
            .is_some_and(DispatcherHandle::is_running)
    }

    /// Information reported by the last successful [`open`](Self::open)
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    /// Open the port and initialize the module
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The port cannot be opened
    /// - The module does not answer in time
    /// - The device info frame is missing or malformed
    ///
    /// On error the reader is left closed.
    pub async fn open(&mut self) -> Result<DeviceInfo> {
        let mut transport = self
            .transport
            .take()
            .ok_or(gt521_transport::Error::AlreadyOpen)?;

        info!("Opening {}...", transport.port_name());

        if let Err(err) = transport.open().await {
            self.transport = Some(transport);
            return Err(err.into());
        }

        let handle = Dispatcher::spawn(transport);
        let request = CommandRequest::new(Command::Open, OPEN_WITH_INFO)
            .expect_data(DEVICE_INFO_FRAME_SIZE)
            .with_timeout(self.timeout);

        let result = handle.execute(request).await.and_then(|reply| decode_info(&reply));
        let info = match result {
            Ok(info) => info,
            Err(err) => {
                warn!("Open failed: {}", err);
                self.release(handle).await?;
                return Err(err);
            }
        };

        info!("Opened: {}", info);

        self.dispatcher = Some(handle);
        self.device_info = Some(info.clone());
        Ok(info)
    }

    /// Close the module and the port
    pub async fn close(&mut self) -> Result<()> {
        let Some(handle) = self.dispatcher.take() else {
            return Ok(());
        };

        info!("Closing...");

        if let Err(err) = handle.execute(self.request(Command::Close, 0)).await {
            warn!("Close command failed: {}", err);
        }
        self.device_info = None;
        self.release(handle).await?;

        info!("Closed");
        Ok(())
    }

    /// Execute a command
    ///
    /// Low-level entry point for commands without a dedicated method.
    pub async fn execute(&self, request: CommandRequest) -> Result<Reply> {
        let handle = self.dispatcher.as_ref().ok_or(Error::NotOpen)?;
        handle.execute(request).await
    }

    pub async fn led_on(&self) -> Result<()> {
        self.command(Command::CmosLed, led::ON).await?;
        Ok(())
    }

    pub async fn led_off(&self) -> Result<()> {
        self.command(Command::CmosLed, led::OFF).await?;
        Ok(())
    }

    /// Switch the module and the port to another line speed
    ///
    /// The port follows the module before any later command is sent. The new
    /// rate is remembered in the store.
    pub async fn change_baud_rate(&self, baud_rate: u32) -> Result<BaudRate> {
        let handle = self.dispatcher.as_ref().ok_or(Error::NotOpen)?;
        let rate =
            BaudRate::try_from(baud_rate).map_err(|_| Error::UnsupportedBaudRate(baud_rate))?;

        let request = self
            .request(Command::ChangeBaudRate, rate.as_u32())
            .then_reconfigure(rate.as_u32());
        handle.execute(request).await?;

        if let Err(err) = self.store.set_baud_rate(rate) {
            warn!("Could not remember {}: {}", rate, err);
        }

        info!("Switched to {}", rate);
        Ok(rate)
    }

    /// Check whether a finger is on the sensor
    pub async fn is_finger_pressed(&self) -> Result<bool> {
        match self.command(Command::IsPressFinger, 0).await {
            Ok(reply) => Ok(reply.param() == Some(0)),
            Err(err) if err.error_code() == Some(ErrorCode::FingerNotPressed) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Number of enrolled fingerprints
    pub async fn enroll_count(&self) -> Result<u32> {
        let reply = self.command(Command::GetEnrollCount, 0).await?;
        Ok(reply.param().unwrap_or_default())
    }

    /// Check whether slot `id` holds a fingerprint
    pub async fn check_enrolled(&self, id: u32) -> Result<bool> {
        let enrolled = match self.command(Command::CheckEnrolled, id).await {
            Ok(_) => true,
            Err(err) if err.error_code() == Some(ErrorCode::SlotNotUsed) => false,
            Err(err) => return Err(err),
        };

        let recorded = if enrolled {
            self.store.mark_used(id)
        } else {
            self.store.mark_free(id)
        };
        if let Err(err) = recorded {
            warn!(id, "Could not record slot state: {}", err);
        }
        Ok(enrolled)
    }

    /// Delete the fingerprint in slot `id`
    pub async fn delete_id(&self, id: u32) -> Result<()> {
        self.command(Command::DeleteId, id).await?;
        if let Err(err) = self.store.mark_free(id) {
            warn!(id, "Could not record slot state: {}", err);
        }
        debug!(id, "Deleted fingerprint");
        Ok(())
    }

    /// Delete every enrolled fingerprint
    pub async fn delete_all(&self) -> Result<()> {
        self.command(Command::DeleteAll, 0).await?;
        if let Err(err) = self.store.clear_slots() {
            warn!("Could not record slot state: {}", err);
        }
        debug!("Deleted all fingerprints");
        Ok(())
    }

    fn request(&self, command: Command, param: u32) -> CommandRequest {
        CommandRequest::new(command, param).with_timeout(self.timeout)
    }

    async fn command(&self, command: Command, param: u32) -> Result<Reply> {
        self.execute(self.request(command, param)).await
    }

    /// Stop the dispatcher and close the port, keeping the transport for reuse
    async fn release(&mut self, handle: DispatcherHandle) -> Result<()> {
        let mut transport = handle.shutdown().await?;
        let result = transport.close().await;
        self.transport = Some(transport);
        result.map_err(Error::from)
    }
}

fn decode_info(reply: &Reply) -> Result<DeviceInfo> {
    let payload = reply.payload().ok_or_else(|| {
        gt521_types::Error::Parse("open reply carries no device info".to_owned())
    })?;
    Ok(DeviceInfo::decode(payload)?)
}

impl Drop for Reader {
    fn drop(&mut self) {
        if self.dispatcher.is_some() {
            warn!("Reader dropped while still open");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, Event, FakeDevice};
    use async_trait::async_trait;
    use bytes::BytesMut;
    use gt521_core::{AckCode, CommandPacket, DataPacket, ResponsePacket};
    use gt521_transport::Result as TransportResult;
    use mockall::mock;
    use pretty_assertions::assert_eq;

    mock! {
        Port {}

        #[async_trait]
        impl Transport for Port {
            async fn open(&mut self) -> TransportResult<()>;
            async fn close(&mut self) -> TransportResult<()>;
            fn is_open(&self) -> bool;
            async fn send(&mut self, data: &[u8]) -> TransportResult<()>;
            async fn flush(&mut self) -> TransportResult<()>;
            async fn receive(&mut self) -> TransportResult<BytesMut>;
            async fn reconfigure(&mut self, baud_rate: u32) -> TransportResult<()>;
            fn port_name(&self) -> String;
        }
    }

    fn ack(param: u32) -> ResponsePacket {
        ResponsePacket::new(param, AckCode::Ack)
    }

    fn info_frame() -> DataPacket {
        let mut payload = vec![0x00, 0x01, 0x02, 0x03, 0x20, 0x4E, 0x00, 0x00];
        payload.extend((0..16).map(|i| if i % 2 == 0 { 0xAA } else { 0x55 }));
        DataPacket::new(&payload)
    }

    async fn opened() -> (Reader, FakeDevice) {
        let (transport, mut device) = testing::pair();
        let mut reader = Reader::new(transport);

        let (info, ()) = tokio::join!(reader.open(), async {
            device.next_command().await;
            device.respond(&ack(0));
            device.send_data(&info_frame());
        });
        info.unwrap();
        (reader, device)
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_reads_device_info() {
        let (transport, mut device) = testing::pair();
        let mut reader = Reader::new(transport);
        assert!(!reader.is_open());

        let (info, command) = tokio::join!(reader.open(), async {
            let command = device.next_command().await;
            device.respond(&ack(0));
            device.send_data(&info_frame());
            command
        });

        assert_eq!(command, CommandPacket::new(Command::Open, 1));
        assert_eq!(
            info.unwrap(),
            DeviceInfo::new("3020100", 20000, "aa55".repeat(8))
        );
        assert!(reader.is_open());
        assert!(reader.device_info().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_timeout_leaves_reader_closed() {
        let (transport, mut device) = testing::pair();
        let mut reader = Reader::new(transport).with_timeout(Duration::from_millis(50));

        let (result, _) = tokio::join!(reader.open(), device.next_command());

        assert!(result.unwrap_err().is_timeout());
        assert!(!reader.is_open());
        assert_eq!(device.events().last(), Some(&Event::Close));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_twice() {
        let (mut reader, _device) = opened().await;
        assert!(matches!(
            reader.open().await,
            Err(Error::Transport(gt521_transport::Error::AlreadyOpen))
        ));
    }

    #[tokio::test]
    async fn test_change_baud_rate_not_open() {
        let mut port = MockPort::new();
        port.expect_open().never();
        port.expect_send().never();
        port.expect_reconfigure().never();

        let reader = Reader::new(port);
        let err = reader.change_baud_rate(19200).await.unwrap_err();

        assert!(matches!(err, Error::NotOpen));
        assert!(err.is_protocol_violation());
    }

    #[tokio::test]
    async fn test_commands_need_open() {
        let mut port = MockPort::new();
        port.expect_send().never();

        let reader = Reader::new(port);
        assert!(matches!(reader.led_on().await, Err(Error::NotOpen)));
        assert!(matches!(reader.enroll_count().await, Err(Error::NotOpen)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_baud_rate_unsupported() {
        let (reader, mut device) = opened().await;

        let err = reader.change_baud_rate(14400).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedBaudRate(14400)));
        assert!(device.try_next_command().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_baud_rate() {
        let (reader, mut device) = opened().await;

        let (rate, command) = tokio::join!(reader.change_baud_rate(115200), async {
            let command = device.next_command().await;
            device.respond(&ack(0));
            command
        });

        assert_eq!(rate.unwrap(), BaudRate::B115200);
        assert_eq!(command, CommandPacket::new(Command::ChangeBaudRate, 115200));
        assert_eq!(device.events().last(), Some(&Event::Reconfigure(115200)));
        assert_eq!(reader.store().baud_rate(), BaudRate::B115200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_baud_rate_with_queued_command() {
        let (reader, mut device) = opened().await;

        let (rate, lit, ()) = tokio::join!(reader.change_baud_rate(57600), reader.led_on(), async {
            device.next_command().await;
            device.respond(&ack(0));
            device.next_command().await;
            device.respond(&ack(0));
        });
        rate.unwrap();
        lit.unwrap();

        let events = device.events();
        let position = |event: &Event| events.iter().position(|e| e == event).unwrap();
        let reconfigured = position(&Event::Reconfigure(57600));
        let led_sent = position(&Event::Send(
            CommandPacket::new(Command::CmosLed, 1).to_bytes(),
        ));
        assert!(reconfigured < led_sent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_led() {
        let (reader, mut device) = opened().await;

        let (result, command) = tokio::join!(reader.led_on(), async {
            let command = device.next_command().await;
            device.respond(&ack(0));
            command
        });
        result.unwrap();
        assert_eq!(command, CommandPacket::new(Command::CmosLed, 1));

        let (result, command) = tokio::join!(reader.led_off(), async {
            let command = device.next_command().await;
            device.respond(&ack(0));
            command
        });
        result.unwrap();
        assert_eq!(command, CommandPacket::new(Command::CmosLed, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finger_and_enroll_queries() {
        let (reader, mut device) = opened().await;

        let (pressed, ()) = tokio::join!(reader.is_finger_pressed(), async {
            device.next_command().await;
            device.respond(&ack(0));
        });
        assert!(pressed.unwrap());

        let (pressed, ()) = tokio::join!(reader.is_finger_pressed(), async {
            device.next_command().await;
            device.respond(&ack(1));
        });
        assert!(!pressed.unwrap());

        let (count, ()) = tokio::join!(reader.enroll_count(), async {
            device.next_command().await;
            device.respond(&ack(12));
        });
        assert_eq!(count.unwrap(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrollment_bookkeeping() {
        let (reader, mut device) = opened().await;

        let (enrolled, ()) = tokio::join!(reader.check_enrolled(3), async {
            device.next_command().await;
            device.respond(&ack(0));
        });
        assert!(enrolled.unwrap());
        assert!(reader.store().is_used(3));

        let (enrolled, ()) = tokio::join!(reader.check_enrolled(3), async {
            device.next_command().await;
            device.respond(&ResponsePacket::new(0x1004, AckCode::Nack));
        });
        assert!(!enrolled.unwrap());
        assert!(!reader.store().is_used(3));

        reader.store().mark_used(5).unwrap();
        let (result, command) = tokio::join!(reader.delete_id(5), async {
            let command = device.next_command().await;
            device.respond(&ack(0));
            command
        });
        result.unwrap();
        assert_eq!(command, CommandPacket::new(Command::DeleteId, 5));
        assert!(!reader.store().is_used(5));

        let (enrolled, ()) = tokio::join!(reader.check_enrolled(250), async {
            device.next_command().await;
            device.respond(&ack(0));
        });
        assert!(enrolled.unwrap());
        assert!(reader.store().is_used(250));

        let (result, ()) = tokio::join!(reader.delete_id(500), async {
            device.next_command().await;
            device.respond(&ack(0));
        });
        result.unwrap();
        assert!(!reader.store().is_used(500));

        reader.store().mark_used(1).unwrap();
        let (result, ()) = tokio::join!(reader.delete_all(), async {
            device.next_command().await;
            device.respond(&ack(0));
        });
        result.unwrap();
        assert_eq!(reader.store().available_slot(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close() {
        let (mut reader, mut device) = opened().await;

        let (result, command) = tokio::join!(reader.close(), async {
            let command = device.next_command().await;
            device.respond(&ack(0));
            command
        });

        result.unwrap();
        assert_eq!(command.command(), Command::Close);
        assert!(!reader.is_open());
        assert_eq!(device.events().last(), Some(&Event::Close));
        assert!(matches!(reader.led_on().await, Err(Error::NotOpen)));
    }
}
