//! GT-521Fxx checksum algorithm
//!
//! Every frame ends with a little-endian u16 holding the byte sum of all
//! preceding bytes, truncated to 16 bits.

use byteorder::{ByteOrder, LittleEndian};
use tracing::trace;

use crate::constants::CHECKSUM_SIZE;

/// Calculate the checksum of `bytes`
///
/// # Algorithm
///
/// ```text
/// sum(bytes) mod 65536
/// ```
///
/// # Examples
///
/// ```
/// use gt521_core::checksum;
///
/// // Open command, param 0
/// let frame = [0x55, 0xAA, 0x01, 0x00, 0, 0, 0, 0, 0x01, 0x00];
/// assert_eq!(checksum::calculate(&frame), 0x0101);
/// ```
pub fn calculate(bytes: &[u8]) -> u16 {
    let sum = bytes
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b)));

    trace!(
        len = bytes.len(),
        checksum = format!("0x{:04X}", sum),
        "Calculated checksum"
    );

    sum
}

/// Split a complete frame into `(calculated, received)` checksums
///
/// Returns `None` if the frame is too short to carry a checksum.
pub fn split(frame: &[u8]) -> Option<(u16, u16)> {
    if frame.len() < CHECKSUM_SIZE {
        return None;
    }

    let (body, tail) = frame.split_at(frame.len() - CHECKSUM_SIZE);
    Some((calculate(body), LittleEndian::read_u16(tail)))
}

/// Verify the trailing checksum of a complete frame
pub fn verify(frame: &[u8]) -> bool {
    matches!(split(frame), Some((calculated, received)) if calculated == received)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_checksum_empty() {
        assert_eq!(calculate(&[]), 0);
    }

    #[test]
    fn test_checksum_wraps() {
        // 300 * 0xFF = 76500 = 0x12AD4 -> 0x2AD4
        let bytes = vec![0xFF; 300];
        assert_eq!(calculate(&bytes), 0x2AD4);
    }

    #[test]
    fn test_verify_frame() {
        let frame = [0x55, 0xAA, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x12, 0x00, 0x13, 0x01];
        assert!(verify(&frame));

        let mut corrupted = frame;
        corrupted[4] ^= 0x01;
        assert!(!verify(&corrupted));
    }

    #[test]
    fn test_verify_too_short() {
        assert!(!verify(&[0x01]));
        assert_eq!(split(&[0x01]), None);
    }

    #[test]
    fn test_split_only_checksum() {
        // Two bytes: empty body sums to zero
        assert_eq!(split(&[0x00, 0x00]), Some((0, 0)));
    }

    proptest! {
        #[test]
        fn prop_appended_checksum_verifies(body in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut frame = body.clone();
            frame.extend_from_slice(&calculate(&body).to_le_bytes());
            prop_assert!(verify(&frame));
        }
    }
}
