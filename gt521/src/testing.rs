//! In-process stand-in for a sensor module

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use gt521_core::{CommandPacket, DataPacket, ResponsePacket};
use gt521_transport::{Error, Result, Transport};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Transport call observed by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Open,
    Close,
    Flush,
    Send(Bytes),
    Reconfigure(u32),
}

pub(crate) struct FakeTransport {
    open: bool,
    events: Arc<Mutex<Vec<Event>>>,
    fail_sends: Arc<AtomicBool>,
    written: mpsc::UnboundedSender<Bytes>,
    incoming: mpsc::UnboundedReceiver<Bytes>,
}

/// Device side of a [`FakeTransport`]
pub(crate) struct FakeDevice {
    events: Arc<Mutex<Vec<Event>>>,
    fail_sends: Arc<AtomicBool>,
    written: mpsc::UnboundedReceiver<Bytes>,
    incoming: mpsc::UnboundedSender<Bytes>,
}

pub(crate) fn pair() -> (FakeTransport, FakeDevice) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let fail_sends = Arc::new(AtomicBool::new(false));
    let (written_tx, written_rx) = mpsc::unbounded_channel();
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

    let transport = FakeTransport {
        open: false,
        events: events.clone(),
        fail_sends: fail_sends.clone(),
        written: written_tx,
        incoming: incoming_rx,
    };
    let device = FakeDevice {
        events,
        fail_sends,
        written: written_rx,
        incoming: incoming_tx,
    };
    (transport, device)
}

impl FakeDevice {
    /// Wait for the next frame the host writes
    pub(crate) async fn next_command(&mut self) -> CommandPacket {
        let frame = self.written.recv().await.expect("transport dropped");
        CommandPacket::decode(frame).expect("host wrote a malformed frame")
    }

    /// Frame written but not yet consumed, if any
    pub(crate) fn try_next_command(&mut self) -> Option<CommandPacket> {
        let frame = self.written.try_recv().ok()?;
        CommandPacket::decode(frame).ok()
    }

    /// Push raw bytes towards the host as one chunk
    pub(crate) fn send_raw(&self, bytes: &[u8]) {
        self.incoming
            .send(Bytes::copy_from_slice(bytes))
            .expect("transport dropped");
    }

    pub(crate) fn respond(&self, response: &ResponsePacket) {
        self.send_raw(response.as_bytes());
    }

    pub(crate) fn send_data(&self, data: &DataPacket) {
        self.send_raw(data.as_bytes());
    }

    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl FakeTransport {
    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.open { Ok(()) } else { Err(Error::NotOpen) }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&mut self) -> Result<()> {
        if self.open {
            return Err(Error::AlreadyOpen);
        }
        self.record(Event::Open);
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.record(Event::Close);
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "line unplugged",
            )));
        }
        let frame = Bytes::copy_from_slice(data);
        self.record(Event::Send(frame.clone()));
        let _ = self.written.send(frame);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.record(Event::Flush);
        Ok(())
    }

    async fn receive(&mut self) -> Result<BytesMut> {
        self.ensure_open()?;
        let chunk = self.incoming.recv().await.ok_or(Error::ConnectionClosed)?;
        Ok(BytesMut::from(&chunk[..]))
    }

    async fn reconfigure(&mut self, baud_rate: u32) -> Result<()> {
        self.ensure_open()?;
        self.record(Event::Reconfigure(baud_rate));
        Ok(())
    }

    fn port_name(&self) -> String {
        "fake".to_owned()
    }
}
