//! Error types for gt521-core

use std::fmt;

/// Result type alias for gt521 protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Status codes the device reports in the response parameter field
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    Timeout = 0x1001,
    InvalidBaudrate = 0x1002,
    InvalidPosition = 0x1003,
    SlotNotUsed = 0x1004,
    SlotAlreadyUsed = 0x1005,
    CommunicationError = 0x1006,
    VerifyFailed = 0x1007,
    IdentifyFailed = 0x1008,
    DatabaseFull = 0x1009,
    DatabaseEmpty = 0x1010,
    TurnError = 0x100A,
    BadFinger = 0x100B,
    EnrollFailed = 0x100C,
    Unsupported = 0x100D,
    DeviceError = 0x100E,
    CaptureCanceled = 0x100F,
    InvalidParameter = 0x1011,
    FingerNotPressed = 0x1012,
}

impl ErrorCode {
    /// Human readable description
    pub fn description(self) -> &'static str {
        match self {
            Self::Timeout => "capture timeout",
            Self::InvalidBaudrate => "invalid baud rate",
            Self::InvalidPosition => "slot id out of range",
            Self::SlotNotUsed => "slot is not used",
            Self::SlotAlreadyUsed => "slot is already used",
            Self::CommunicationError => "communication error",
            Self::VerifyFailed => "1:1 verification failed",
            Self::IdentifyFailed => "1:N identification failed",
            Self::DatabaseFull => "database is full",
            Self::DatabaseEmpty => "database is empty",
            Self::TurnError => "enrollment out of order",
            Self::BadFinger => "finger image too bad",
            Self::EnrollFailed => "enrollment failed",
            Self::Unsupported => "command not supported",
            Self::DeviceError => "device error",
            Self::CaptureCanceled => "capture canceled",
            Self::InvalidParameter => "invalid parameter",
            Self::FingerNotPressed => "finger is not pressed",
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        code as u16
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0x1001 => Ok(Self::Timeout),
            0x1002 => Ok(Self::InvalidBaudrate),
            0x1003 => Ok(Self::InvalidPosition),
            0x1004 => Ok(Self::SlotNotUsed),
            0x1005 => Ok(Self::SlotAlreadyUsed),
            0x1006 => Ok(Self::CommunicationError),
            0x1007 => Ok(Self::VerifyFailed),
            0x1008 => Ok(Self::IdentifyFailed),
            0x1009 => Ok(Self::DatabaseFull),
            0x1010 => Ok(Self::DatabaseEmpty),
            0x100A => Ok(Self::TurnError),
            0x100B => Ok(Self::BadFinger),
            0x100C => Ok(Self::EnrollFailed),
            0x100D => Ok(Self::Unsupported),
            0x100E => Ok(Self::DeviceError),
            0x100F => Ok(Self::CaptureCanceled),
            0x1011 => Ok(Self::InvalidParameter),
            0x1012 => Ok(Self::FingerNotPressed),
            _ => Err(Error::UnknownErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.description(), *self as u16)
    }
}

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame failed its checksum
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumInvalid {
        expected: u16,
        received: u16,
    },

    /// Device answered with a nack and an untabulated status
    #[error("Device nack (status 0x{code:04X})")]
    DeviceNack {
        code: u16,
    },

    /// Device reported a tabulated error status
    #[error("Device error: {0}")]
    DeviceError(ErrorCode),

    /// No satisfying frame arrived before the command deadline
    #[error("Timeout waiting for response after {millis}ms")]
    Timeout {
        millis: u64,
    },

    /// Buffer is too short to be a frame
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        expected: usize,
        actual: usize,
    },

    /// Buffer does not start with the expected start bytes
    #[error("Invalid start code: expected {expected:02X?}, got {actual:02X?}")]
    InvalidStartCode {
        expected: [u8; 2],
        actual: [u8; 2],
    },

    /// Unknown command opcode
    #[error("Unknown command code: 0x{0:02X}")]
    UnknownCommand(u8),

    /// Status value outside the device error table
    #[error("Unknown error code: 0x{0:04X}")]
    UnknownErrorCode(u16),
}

impl Error {
    /// Check if error is recoverable (retry might succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::ChecksumInvalid { .. }
                | Self::DeviceError(
                    ErrorCode::Timeout
                        | ErrorCode::CommunicationError
                        | ErrorCode::BadFinger
                        | ErrorCode::FingerNotPressed
                        | ErrorCode::CaptureCanceled
                )
        )
    }

    /// Device error code, if the device reported one
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::DeviceError(code) => Some(*code),
            _ => None,
        }
    }
}
