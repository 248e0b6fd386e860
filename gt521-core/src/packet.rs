//! GT-521Fxx frame structures and encoding/decoding
//!
//! # Frame Structures
//!
//! ```text
//! Command / Response (12 bytes)
//! ┌──────────┬──────────┬──────────────┬──────────────┬──────────┐
//! │  Start   │ DeviceID │  Parameter   │ Opcode / Ack │ Checksum │
//! │ 55 AA    │  LE u16  │    LE u32    │   LE u16     │  LE u16  │
//! └──────────┴──────────┴──────────────┴──────────────┴──────────┘
//!
//! Data (N bytes)
//! ┌──────────┬──────────┬──────────────────────────────┬──────────┐
//! │  Start   │ DeviceID │           Payload            │ Checksum │
//! │ 5A A5    │  LE u16  │          N - 6 bytes         │  LE u16  │
//! └──────────┴──────────┴──────────────────────────────┴──────────┘
//! ```
//!
//! The checksum is the byte sum of everything before it, truncated to 16
//! bits. Validity is computed once when a frame is built or decoded.

use byteorder::{ByteOrder, LittleEndian};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::Command,
    constants::{
        ACK, CHECKSUM_SIZE, COMMAND_START, DATA_HEADER_SIZE, DATA_START, DEVICE_ID, FRAME_SIZE,
        MIN_DATA_FRAME_SIZE, NACK, RESPONSE_START,
    },
    error::{Error, ErrorCode, Result},
};

/// Kind of a frame
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Command,
    Response,
    Data,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => f.write_str("Command"),
            Self::Response => f.write_str("Response"),
            Self::Data => f.write_str("Data"),
        }
    }
}

/// Ack/nack code carried by a response frame
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum AckCode {
    Ack = ACK,
    Nack = NACK,
}

/// Checksum state captured at construction
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Integrity {
    calculated: u16,
    received: u16,
}

impl Integrity {
    fn of(frame: &[u8]) -> Self {
        let (calculated, received) = checksum::split(frame).unwrap_or((0, 1));
        Self {
            calculated,
            received,
        }
    }

    fn is_valid(self) -> bool {
        self.calculated == self.received
    }

    fn check(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::ChecksumInvalid {
                expected: self.calculated,
                received: self.received,
            })
        }
    }
}

fn ensure_start(buf: &[u8], expected: [u8; 2]) -> Result<()> {
    let actual = [buf[0], buf[1]];
    if actual != expected {
        return Err(Error::InvalidStartCode { expected, actual });
    }
    Ok(())
}

fn ensure_len(buf: &[u8], expected: usize) -> Result<()> {
    if buf.len() < expected {
        return Err(Error::FrameTooShort {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// Host to device command frame
///
/// # Examples
///
/// ```
/// use gt521_core::{Command, CommandPacket};
///
/// let packet = CommandPacket::new(Command::CmosLed, 1);
/// assert_eq!(
///     packet.as_bytes(),
///     &[0x55, 0xAA, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x12, 0x00, 0x13, 0x01]
/// );
/// assert!(packet.is_valid());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CommandPacket {
    command: Command,
    param: u32,
    raw: Bytes,
    integrity: Integrity,
}

impl CommandPacket {
    /// Frame size in bytes
    pub const SIZE: usize = FRAME_SIZE;

    /// Build a command frame
    pub fn new(command: Command, param: u32) -> Self {
        let mut buf = BytesMut::with_capacity(Self::SIZE);

        buf.put_slice(&COMMAND_START);
        buf.put_u16_le(DEVICE_ID);
        buf.put_u32_le(param);
        buf.put_u8(command.into());
        buf.put_u8(0);
        let sum = checksum::calculate(&buf);
        buf.put_u16_le(sum);

        let raw = buf.freeze();
        Self {
            command,
            param,
            integrity: Integrity::of(&raw),
            raw,
        }
    }

    /// Decode a command frame from the first 12 bytes of `buf`
    ///
    /// The checksum is recorded, not enforced: check [`is_valid`](Self::is_valid).
    pub fn decode(buf: impl Into<Bytes>) -> Result<Self> {
        let mut raw: Bytes = buf.into();
        ensure_len(&raw, Self::SIZE)?;
        ensure_start(&raw, COMMAND_START)?;
        raw.truncate(Self::SIZE);

        let command = Command::try_from(raw[8])?;
        let param = LittleEndian::read_u32(&raw[4..8]);

        Ok(Self {
            command,
            param,
            integrity: Integrity::of(&raw),
            raw,
        })
    }

    pub fn command(&self) -> Command {
        self.command
    }

    pub fn param(&self) -> u32 {
        self.param
    }

    pub fn kind(&self) -> PacketKind {
        PacketKind::Command
    }

    /// Checksum field as carried in the frame
    pub fn checksum(&self) -> u16 {
        self.integrity.received
    }

    pub fn is_valid(&self) -> bool {
        self.integrity.is_valid()
    }

    /// Raw frame bytes, ready for the wire
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Cheap clone of the raw frame
    pub fn to_bytes(&self) -> Bytes {
        self.raw.clone()
    }
}

impl fmt::Debug for CommandPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandPacket")
            .field("command", &self.command)
            .field("param", &format!("0x{:08X}", self.param))
            .field("checksum", &format!("0x{:04X}", self.checksum()))
            .field("raw", &hex::encode(&self.raw))
            .finish()
    }
}

impl fmt::Display for CommandPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command[{}](param={})", self.command, self.param)
    }
}

/// Device to host response frame
#[derive(Clone, PartialEq, Eq)]
pub struct ResponsePacket {
    raw: Bytes,
    integrity: Integrity,
}

impl ResponsePacket {
    /// Frame size in bytes
    pub const SIZE: usize = FRAME_SIZE;

    /// Build a response frame as the device would send it
    ///
    /// # Examples
    ///
    /// ```
    /// use gt521_core::{AckCode, ResponsePacket};
    ///
    /// let response = ResponsePacket::new(0, AckCode::Ack);
    /// assert!(response.check().is_ok());
    /// ```
    pub fn new(param: u32, ack: AckCode) -> Self {
        let mut buf = BytesMut::with_capacity(Self::SIZE);

        buf.put_slice(&RESPONSE_START);
        buf.put_u16_le(DEVICE_ID);
        buf.put_u32_le(param);
        buf.put_u16_le(ack as u16);
        let sum = checksum::calculate(&buf);
        buf.put_u16_le(sum);

        Self::from_frame(buf.freeze())
    }

    /// Decode a response frame from the first 12 bytes of `buf`
    pub fn decode(buf: impl Into<Bytes>) -> Result<Self> {
        let mut raw: Bytes = buf.into();
        ensure_len(&raw, Self::SIZE)?;
        ensure_start(&raw, RESPONSE_START)?;
        raw.truncate(Self::SIZE);
        Ok(Self::from_frame(raw))
    }

    /// Wrap an already framed 12-byte buffer
    pub(crate) fn from_frame(raw: Bytes) -> Self {
        debug_assert_eq!(raw.len(), Self::SIZE);
        Self {
            integrity: Integrity::of(&raw),
            raw,
        }
    }

    /// Full 32-bit parameter (offset 4)
    pub fn param(&self) -> u32 {
        LittleEndian::read_u32(&self.raw[4..8])
    }

    /// Status field: low half of the parameter (offset 4)
    pub fn status(&self) -> u16 {
        LittleEndian::read_u16(&self.raw[4..6])
    }

    /// Raw ack/nack code (offset 8)
    pub fn ack_code(&self) -> u16 {
        LittleEndian::read_u16(&self.raw[8..10])
    }

    pub fn is_nack(&self) -> bool {
        self.ack_code() == NACK
    }

    /// Status mapped through the device error table
    pub fn error_code(&self) -> Option<ErrorCode> {
        ErrorCode::try_from(self.status()).ok()
    }

    /// Evaluate the response
    ///
    /// Fails on a bad checksum, a tabulated error status, or a nack.
    pub fn check(&self) -> Result<()> {
        self.integrity.check()?;

        if let Some(code) = self.error_code() {
            return Err(Error::DeviceError(code));
        }
        if self.is_nack() {
            return Err(Error::DeviceNack {
                code: self.status(),
            });
        }
        Ok(())
    }

    pub fn kind(&self) -> PacketKind {
        PacketKind::Response
    }

    pub fn checksum(&self) -> u16 {
        self.integrity.received
    }

    pub fn is_valid(&self) -> bool {
        self.integrity.is_valid()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

impl fmt::Debug for ResponsePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponsePacket")
            .field("param", &format!("0x{:08X}", self.param()))
            .field("ack", &format!("0x{:02X}", self.ack_code()))
            .field("valid", &self.is_valid())
            .field("raw", &hex::encode(&self.raw))
            .finish()
    }
}

impl fmt::Display for ResponsePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response[{}](param={})",
            if self.is_nack() { "NACK" } else { "ACK" },
            self.param()
        )
    }
}

/// Device to host data frame
#[derive(Clone, PartialEq, Eq)]
pub struct DataPacket {
    raw: Bytes,
    integrity: Integrity,
}

impl DataPacket {
    /// Header + checksum overhead
    pub const OVERHEAD: usize = MIN_DATA_FRAME_SIZE;

    /// Build a data frame carrying `payload`
    pub fn new(payload: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(Self::OVERHEAD + payload.len());

        buf.put_slice(&DATA_START);
        buf.put_u16_le(DEVICE_ID);
        buf.put_slice(payload);
        let sum = checksum::calculate(&buf);
        buf.put_u16_le(sum);

        Self::from_frame(buf.freeze())
    }

    /// Decode a data frame spanning the whole of `buf`
    pub fn decode(buf: impl Into<Bytes>) -> Result<Self> {
        let raw: Bytes = buf.into();
        ensure_len(&raw, Self::OVERHEAD)?;
        ensure_start(&raw, DATA_START)?;
        Ok(Self::from_frame(raw))
    }

    /// Wrap an already framed buffer of at least 6 bytes
    pub(crate) fn from_frame(raw: Bytes) -> Self {
        debug_assert!(raw.len() >= Self::OVERHEAD);
        Self {
            integrity: Integrity::of(&raw),
            raw,
        }
    }

    /// Payload between header and checksum
    pub fn payload(&self) -> &[u8] {
        &self.raw[DATA_HEADER_SIZE..self.raw.len() - CHECKSUM_SIZE]
    }

    /// Payload as a cheap `Bytes` slice
    pub fn payload_bytes(&self) -> Bytes {
        self.raw.slice(DATA_HEADER_SIZE..self.raw.len() - CHECKSUM_SIZE)
    }

    /// A data frame succeeds iff its checksum is valid
    pub fn check(&self) -> Result<()> {
        self.integrity.check()
    }

    pub fn kind(&self) -> PacketKind {
        PacketKind::Data
    }

    pub fn checksum(&self) -> u16 {
        self.integrity.received
    }

    pub fn is_valid(&self) -> bool {
        self.integrity.is_valid()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Total frame size
    pub fn size(&self) -> usize {
        self.raw.len()
    }
}

impl fmt::Debug for DataPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataPacket")
            .field("payload_len", &self.payload().len())
            .field("checksum", &format!("0x{:04X}", self.checksum()))
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl fmt::Display for DataPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Data(len={})", self.payload().len())
    }
}

/// A device-originated frame, as produced by the stream parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Response(ResponsePacket),
    Data(DataPacket),
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::Response(_) => PacketKind::Response,
            Self::Data(_) => PacketKind::Data,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Self::Response(p) => p.is_valid(),
            Self::Data(p) => p.is_valid(),
        }
    }

    pub fn check(&self) -> Result<()> {
        match self {
            Self::Response(p) => p.check(),
            Self::Data(p) => p.check(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Response(p) => p.as_bytes(),
            Self::Data(p) => p.as_bytes(),
        }
    }
}

impl From<ResponsePacket> for Packet {
    fn from(packet: ResponsePacket) -> Self {
        Self::Response(packet)
    }
}

impl From<DataPacket> for Packet {
    fn from(packet: DataPacket) -> Self {
        Self::Data(packet)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(p) => fmt::Display::fmt(p, f),
            Self::Data(p) => fmt::Display::fmt(p, f),
        }
    }
}
