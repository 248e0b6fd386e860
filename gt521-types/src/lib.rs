//! Type definitions for gt521

pub mod baud_rate;
pub mod device_info;
pub mod error;

pub use baud_rate::BaudRate;
pub use device_info::DeviceInfo;
pub use error::{Error, Result};
