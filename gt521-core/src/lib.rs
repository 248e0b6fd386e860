//! # gt521-core
//!
//! Core protocol implementation for GT-521Fxx fingerprint sensor modules.
//!
//! This crate provides the low-level protocol primitives:
//! - Command, response and data frames with checksum validation
//! - Byte-stream parsing into frames
//! - Command opcodes and the device error table
//! - Protocol constants

pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod packet;
pub mod parser;

pub use command::Command;
pub use error::{Error, ErrorCode, Result};
pub use packet::{AckCode, CommandPacket, DataPacket, Packet, PacketKind, ResponsePacket};
pub use parser::StreamParser;
