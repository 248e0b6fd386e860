//! Protocol constants

/// Start bytes of command frames (host to device)
pub const COMMAND_START: [u8; 2] = [0x55, 0xAA];

/// Start bytes of response frames (device to host)
pub const RESPONSE_START: [u8; 2] = [0x55, 0xAA];

/// Start bytes of data frames (device to host)
pub const DATA_START: [u8; 2] = [0x5A, 0xA5];

/// Fixed device identifier carried at offset 2
pub const DEVICE_ID: u16 = 0x0001;

/// Command and response frames are always 12 bytes
pub const FRAME_SIZE: usize = 12;

/// Data frame header: start bytes + device id
pub const DATA_HEADER_SIZE: usize = 4;

/// Trailing checksum size
pub const CHECKSUM_SIZE: usize = 2;

/// Smallest data frame: header + checksum, empty payload
pub const MIN_DATA_FRAME_SIZE: usize = DATA_HEADER_SIZE + CHECKSUM_SIZE;

/// Ack code in the response frame
pub const ACK: u16 = 0x30;

/// Nack code in the response frame
pub const NACK: u16 = 0x31;

/// Default per-command timeout (milliseconds)
pub const DEFAULT_TIMEOUT_MS: u64 = 1500;

/// Baud rate the module powers up with
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Baud rates accepted by the ChangeBaudRate command
pub const SUPPORTED_BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Open parameter asking the device to reply with its info block
pub const OPEN_WITH_INFO: u32 = 1;

/// Length of the data frame returned by Open with info:
/// 4 header + 4 firmware + 4 iso area size + 16 serial + 2 checksum
pub const DEVICE_INFO_FRAME_SIZE: usize = 30;

/// CmosLed parameters
pub mod led {
    pub const OFF: u32 = 0;
    pub const ON: u32 = 1;
}
