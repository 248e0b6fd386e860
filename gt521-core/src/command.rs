//! GT-521Fxx command opcodes

use std::fmt;

use crate::error::{Error, Result};

/// Command opcodes
///
/// Carried in byte 8 of a command frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    // Session
    Open = 0x01,
    Close = 0x02,
    UsbInternalCheck = 0x03,
    ChangeBaudRate = 0x04,
    SetIapMode = 0x05,

    // Sensor
    CmosLed = 0x12,

    // Enrollment
    GetEnrollCount = 0x20,
    CheckEnrolled = 0x21,
    EnrollStart = 0x22,
    Enroll1 = 0x23,
    Enroll2 = 0x24,
    Enroll3 = 0x25,
    IsPressFinger = 0x26,

    // Database
    DeleteId = 0x40,
    DeleteAll = 0x41,

    // Matching
    Verify = 0x50,
    Identify = 0x51,
    VerifyTemplate = 0x52,
    IdentifyTemplate = 0x53,

    // Imaging
    CaptureFinger = 0x60,
    MakeTemplate = 0x61,
    GetImage = 0x62,
    GetRawImage = 0x63,

    // Templates
    GetTemplate = 0x70,
    SetTemplate = 0x71,
    GetDatabaseStart = 0x72,
    GetDatabaseEnd = 0x73,

    // Settings
    SetSecurityLevel = 0xF0,
    GetSecurityLevel = 0xF1,
    EnterStandbyMode = 0xF9,
}

impl Command {
    /// Get command name
    pub fn name(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Close => "Close",
            Self::UsbInternalCheck => "UsbInternalCheck",
            Self::ChangeBaudRate => "ChangeBaudRate",
            Self::SetIapMode => "SetIapMode",
            Self::CmosLed => "CmosLed",
            Self::GetEnrollCount => "GetEnrollCount",
            Self::CheckEnrolled => "CheckEnrolled",
            Self::EnrollStart => "EnrollStart",
            Self::Enroll1 => "Enroll1",
            Self::Enroll2 => "Enroll2",
            Self::Enroll3 => "Enroll3",
            Self::IsPressFinger => "IsPressFinger",
            Self::DeleteId => "DeleteId",
            Self::DeleteAll => "DeleteAll",
            Self::Verify => "Verify",
            Self::Identify => "Identify",
            Self::VerifyTemplate => "VerifyTemplate",
            Self::IdentifyTemplate => "IdentifyTemplate",
            Self::CaptureFinger => "CaptureFinger",
            Self::MakeTemplate => "MakeTemplate",
            Self::GetImage => "GetImage",
            Self::GetRawImage => "GetRawImage",
            Self::GetTemplate => "GetTemplate",
            Self::SetTemplate => "SetTemplate",
            Self::GetDatabaseStart => "GetDatabaseStart",
            Self::GetDatabaseEnd => "GetDatabaseEnd",
            Self::SetSecurityLevel => "SetSecurityLevel",
            Self::GetSecurityLevel => "GetSecurityLevel",
            Self::EnterStandbyMode => "EnterStandbyMode",
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> u8 {
        cmd as u8
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Open),
            0x02 => Ok(Self::Close),
            0x03 => Ok(Self::UsbInternalCheck),
            0x04 => Ok(Self::ChangeBaudRate),
            0x05 => Ok(Self::SetIapMode),
            0x12 => Ok(Self::CmosLed),
            0x20 => Ok(Self::GetEnrollCount),
            0x21 => Ok(Self::CheckEnrolled),
            0x22 => Ok(Self::EnrollStart),
            0x23 => Ok(Self::Enroll1),
            0x24 => Ok(Self::Enroll2),
            0x25 => Ok(Self::Enroll3),
            0x26 => Ok(Self::IsPressFinger),
            0x40 => Ok(Self::DeleteId),
            0x41 => Ok(Self::DeleteAll),
            0x50 => Ok(Self::Verify),
            0x51 => Ok(Self::Identify),
            0x52 => Ok(Self::VerifyTemplate),
            0x53 => Ok(Self::IdentifyTemplate),
            0x60 => Ok(Self::CaptureFinger),
            0x61 => Ok(Self::MakeTemplate),
            0x62 => Ok(Self::GetImage),
            0x63 => Ok(Self::GetRawImage),
            0x70 => Ok(Self::GetTemplate),
            0x71 => Ok(Self::SetTemplate),
            0x72 => Ok(Self::GetDatabaseStart),
            0x73 => Ok(Self::GetDatabaseEnd),
            0xF0 => Ok(Self::SetSecurityLevel),
            0xF1 => Ok(Self::GetSecurityLevel),
            0xF9 => Ok(Self::EnterStandbyMode),
            _ => Err(Error::UnknownCommand(value)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_conversion() {
        assert_eq!(u8::from(Command::Open), 0x01);
        assert_eq!(u8::from(Command::EnterStandbyMode), 0xF9);
        assert_eq!(Command::try_from(0x12).unwrap(), Command::CmosLed);
    }

    #[test]
    fn test_command_display() {
        assert_eq!(Command::ChangeBaudRate.to_string(), "ChangeBaudRate(0x04)");
    }

    #[test]
    fn test_unknown_command() {
        assert!(matches!(
            Command::try_from(0x99),
            Err(Error::UnknownCommand(0x99))
        ));
    }
}
