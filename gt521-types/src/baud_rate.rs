//! Serial line speeds the module accepts

use std::fmt;

use crate::error::{Error, Result};

/// Supported baud rate
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum BaudRate {
    B9600 = 9600,
    B19200 = 19200,
    B38400 = 38400,
    B57600 = 57600,
    B115200 = 115200,
}

impl BaudRate {
    /// All supported rates, slowest first
    pub const ALL: [BaudRate; 5] = [
        Self::B9600,
        Self::B19200,
        Self::B38400,
        Self::B57600,
        Self::B115200,
    ];

    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl Default for BaudRate {
    /// Power-on rate of the module
    fn default() -> Self {
        Self::B9600
    }
}

impl From<BaudRate> for u32 {
    fn from(rate: BaudRate) -> u32 {
        rate as u32
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|rate| rate.as_u32() == value)
            .ok_or_else(|| Error::Validation(format!("unsupported baud rate: {}", value)))
    }
}

impl fmt::Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} baud", self.as_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion() {
        assert_eq!(BaudRate::try_from(19200).unwrap(), BaudRate::B19200);
        assert_eq!(u32::from(BaudRate::B115200), 115200);
        assert_eq!(BaudRate::default(), BaudRate::B9600);
    }

    #[test]
    fn test_unsupported() {
        assert!(matches!(BaudRate::try_from(14400), Err(Error::Validation(_))));
        assert!(BaudRate::try_from(0).is_err());
    }
}
