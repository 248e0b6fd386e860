//! Command queue
//!
//! Serializes commands so that exactly one is on the wire at a time. The
//! queue does no I/O: every operation that makes a new command the head
//! returns a [`Transmission`] for the dispatcher to write.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use gt521_core::constants::DEFAULT_TIMEOUT_MS;
use gt521_core::{Command, CommandPacket, DataPacket, Packet, PacketKind, ResponsePacket};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Parameters of a command to issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub command: Command,
    pub param: u32,

    /// Frame kind that completes the command
    pub expect: PacketKind,

    /// Total size of the expected data frame, header and checksum included
    pub data_len: usize,

    pub timeout: Duration,

    /// Line speed to switch the transport to once the command succeeds
    pub reconfigure: Option<u32>,
}

impl CommandRequest {
    /// Request completed by a single response frame
    pub fn new(command: Command, param: u32) -> Self {
        Self {
            command,
            param,
            expect: PacketKind::Response,
            data_len: 0,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            reconfigure: None,
        }
    }

    /// Wait for a data frame of `data_len` bytes after the response
    pub fn expect_data(mut self, data_len: usize) -> Self {
        self.expect = PacketKind::Data;
        self.data_len = data_len;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reconfigure the transport after success, before the next command goes out
    pub fn then_reconfigure(mut self, baud_rate: u32) -> Self {
        self.reconfigure = Some(baud_rate);
        self
    }
}

/// Frames collected by a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub response: Option<ResponsePacket>,
    pub data: Option<DataPacket>,
}

impl Reply {
    /// Parameter of the response frame
    pub fn param(&self) -> Option<u32> {
        self.response.as_ref().map(ResponsePacket::param)
    }

    /// Low 16 bits of the response parameter
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(ResponsePacket::status)
    }

    /// Payload of the data frame
    pub fn payload(&self) -> Option<&[u8]> {
        self.data.as_ref().map(DataPacket::payload)
    }
}

/// Sending half of a command's single-assignment result
pub type Completion = oneshot::Sender<Result<Reply>>;

/// A command owned by the queue from submission until it terminates
#[derive(Debug)]
pub struct PendingCommand {
    id: u64,
    packet: CommandPacket,
    expect: PacketKind,
    data_len: usize,
    timeout: Duration,
    reconfigure: Option<u32>,
    succeeded: bool,
    deadline: Option<Instant>,
    completion: Option<Completion>,
    response: Option<ResponsePacket>,
    data: Option<DataPacket>,
}

impl PendingCommand {
    /// Build the wire frame and arm the deadline
    pub fn new(id: u64, request: CommandRequest, completion: Completion) -> Self {
        Self {
            id,
            packet: CommandPacket::new(request.command, request.param),
            expect: request.expect,
            data_len: request.data_len,
            timeout: request.timeout,
            reconfigure: request.reconfigure,
            succeeded: false,
            deadline: Some(Instant::now() + request.timeout),
            completion: Some(completion),
            response: None,
            data: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn packet(&self) -> &CommandPacket {
        &self.packet
    }

    pub fn expect(&self) -> PacketKind {
        self.expect
    }

    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Pending deadline, cleared once the command settles
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Line speed to apply now that the command has succeeded
    pub fn reconfigure_after(&self) -> Option<u32> {
        self.reconfigure.filter(|_| self.succeeded)
    }

    pub fn is_settled(&self) -> bool {
        self.completion.is_none()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }

    /// Record an incoming frame
    ///
    /// Returns true once the command has terminated. A response carrying a
    /// known device error ends the command whatever kind it waits for.
    pub fn add_packet(&mut self, packet: Packet) -> bool {
        if self.is_settled() {
            return true;
        }

        let kind = packet.kind();
        if let Err(err) = packet.check() {
            debug!(id = self.id, "Rejecting {} frame: {}", kind, err);
            self.fail(err.into());
            return true;
        }

        match packet {
            Packet::Response(response) => self.response = Some(response),
            Packet::Data(data) => self.data = Some(data),
        }

        if kind == self.expect {
            self.succeed();
        }
        self.is_settled()
    }

    /// Resolve with the frames collected so far
    pub fn succeed(&mut self) -> bool {
        if self.is_settled() {
            return false;
        }
        let reply = Reply {
            response: self.response.take(),
            data: self.data.take(),
        };
        self.succeeded = true;
        self.settle(Ok(reply))
    }

    pub fn fail(&mut self, err: Error) -> bool {
        self.settle(Err(err))
    }

    /// Deliver the result; only the first call has any effect
    fn settle(&mut self, result: Result<Reply>) -> bool {
        let Some(completion) = self.completion.take() else {
            return false;
        };
        self.deadline = None;

        if completion.send(result).is_err() {
            debug!(id = self.id, "Caller went away before completion");
        }
        true
    }
}

/// Frame to put on the wire for the new head of the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub id: u64,
    pub command: Command,
    pub frame: Bytes,
}

/// FIFO of pending commands, head is in flight
#[derive(Debug, Default)]
pub struct CommandQueue {
    commands: VecDeque<PendingCommand>,
    next_id: u64,
    reconfigure: Option<u32>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Command currently in flight
    pub fn head(&self) -> Option<&PendingCommand> {
        self.commands.front()
    }

    /// Data frame size the parser should look for
    pub fn expected_data_len(&self) -> usize {
        self.head().map_or(0, PendingCommand::data_len)
    }

    /// Line speed requested by the command that just succeeded
    ///
    /// Must be applied before the next transmission goes out.
    pub fn take_reconfigure(&mut self) -> Option<u32> {
        self.reconfigure.take()
    }

    /// Earliest deadline over all pending commands
    pub fn next_deadline(&self) -> Option<Instant> {
        self.commands.iter().filter_map(PendingCommand::deadline).min()
    }

    /// Append a command; transmit it at once if nothing else is pending
    pub fn enqueue(&mut self, request: CommandRequest, completion: Completion) -> Option<Transmission> {
        let id = self.next_id;
        self.next_id += 1;

        let command = PendingCommand::new(id, request, completion);
        debug!(id, command = %command.packet.command(), pending = self.commands.len(), "Enqueued");

        self.commands.push_back(command);
        if self.commands.len() == 1 {
            self.transmission()
        } else {
            None
        }
    }

    /// Route a parsed frame to the head
    pub fn dispatch(&mut self, packet: Packet) -> Option<Transmission> {
        let Some(head) = self.commands.front_mut() else {
            debug!("Dropping {} frame, no command in flight", packet.kind());
            return None;
        };

        if head.add_packet(packet) {
            self.pop_head()
        } else {
            None
        }
    }

    /// Fail the head, e.g. after a write error
    pub fn fail_head(&mut self, err: Error) -> Option<Transmission> {
        let head = self.commands.front_mut()?;
        head.fail(err);
        self.pop_head()
    }

    /// Fail and drop every command whose deadline has passed
    ///
    /// Waiting commands expire too, not just the head.
    pub fn expire(&mut self, now: Instant) -> Option<Transmission> {
        let head_id = self.head().map(PendingCommand::id);

        self.commands.retain_mut(|command| {
            if !command.is_expired(now) {
                return true;
            }
            warn!(id = command.id, command = %command.packet.command(), "Command timed out");
            let millis = command.timeout.as_millis() as u64;
            command.fail(gt521_core::Error::Timeout { millis }.into());
            false
        });

        if self.head().map(PendingCommand::id) != head_id {
            self.transmission()
        } else {
            None
        }
    }

    /// Fail every pending command
    pub fn close(&mut self, mut reason: impl FnMut() -> Error) {
        for mut command in self.commands.drain(..) {
            command.fail(reason());
        }
    }

    fn pop_head(&mut self) -> Option<Transmission> {
        if let Some(done) = self.commands.pop_front() {
            debug!(id = done.id, pending = self.commands.len(), "Dequeued");
            if let Some(baud_rate) = done.reconfigure_after() {
                self.reconfigure = Some(baud_rate);
            }
        }
        self.transmission()
    }

    fn transmission(&self) -> Option<Transmission> {
        self.head().map(|head| Transmission {
            id: head.id,
            command: head.packet.command(),
            frame: head.packet.to_bytes(),
        })
    }
}
