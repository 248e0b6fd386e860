//! Device information structures

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Device information
///
/// Returned in the data frame of an Open command issued with the info flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Firmware version, hex without leading zeros
    pub firmware_version: String,

    /// Maximum size of the ISO template area
    pub iso_area_max_size: u32,

    /// Device serial number, lower-case hex
    pub serial_number: String,
}

impl DeviceInfo {
    /// Fixed part of the payload: firmware + area size
    pub const HEADER_SIZE: usize = 8;

    pub fn new(
        firmware_version: impl Into<String>,
        iso_area_max_size: u32,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            firmware_version: firmware_version.into(),
            iso_area_max_size,
            serial_number: serial_number.into(),
        }
    }

    /// Decode the data payload of an Open reply
    ///
    /// ```text
    /// 0..4   firmware version (LE u32)
    /// 4..8   ISO area max size (LE u32)
    /// 8..    serial number
    /// ```
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::HEADER_SIZE {
            return Err(Error::Parse(format!(
                "device info needs at least {} bytes, got {}",
                Self::HEADER_SIZE,
                payload.len()
            )));
        }

        let firmware = LittleEndian::read_u32(&payload[0..4]);
        let iso_area_max_size = LittleEndian::read_u32(&payload[4..8]);

        Ok(Self {
            firmware_version: format!("{:x}", firmware),
            iso_area_max_size,
            serial_number: hex::encode(&payload[Self::HEADER_SIZE..]),
        })
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device[SN: {}, FW: {}, ISO area: {}]",
            self.serial_number, self.firmware_version, self.iso_area_max_size
        )
    }
}
