//! High-level error types

use gt521_core::ErrorCode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] gt521_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] gt521_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] gt521_types::Error),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Reader not open")]
    NotOpen,

    #[error("Unsupported baud rate: {0}")]
    UnsupportedBaudRate(u32),

    #[error("Dispatcher task failed: {0}")]
    Dispatcher(#[from] tokio::task::JoinError),
}

impl Error {
    /// Operation rejected before anything reached the wire
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::NotOpen | Self::UnsupportedBaudRate(_))
    }

    /// Command ran out of time waiting for the device
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Core(gt521_core::Error::Timeout { .. }))
    }

    /// Device error code, if the device reported one
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Core(err) => err.error_code(),
            _ => None,
        }
    }
}
