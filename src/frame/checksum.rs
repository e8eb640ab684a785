// Masked CRC-32C over uncompressed frame data.
//
// The raw Castagnoli CRC is rotated right by 15 bits and offset by a constant
// so that data which itself embeds CRCs does not checksum to trivial values.

use crate::error::{Error, Result};

const MASK_DELTA: u32 = 0xa282_ead8;

/// Masked CRC-32C of `data`.
#[inline]
pub fn masked_crc(data: &[u8]) -> u32 {
    mask(crc32c::crc32c(data))
}

/// Apply the checksum mask to a raw CRC-32C value.
#[inline]
pub fn mask(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Check that `data` matches the masked checksum `expected`.
pub fn verify(expected: u32, data: &[u8]) -> Result<()> {
    if masked_crc(data) == expected {
        Ok(())
    } else {
        Err(Error::Corrupt("checksum mismatch"))
    }
}
