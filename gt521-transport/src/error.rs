//! Transport errors

use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Port not open")]
    NotOpen,

    #[error("Port already open")]
    AlreadyOpen,

    #[error("Connection closed by remote")]
    ConnectionClosed,

    #[error("Serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
