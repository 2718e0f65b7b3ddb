//! Tar header checksum.
//!
//! The `chksum` field (8 bytes at offset 148) holds the octal sum of all 512
//! header bytes, computed with the field itself filled with spaces.

/// Offset of the checksum field.
pub const CHECKSUM_OFFSET: usize = 148;
/// Length of the checksum field.
pub const CHECKSUM_LEN: usize = 8;

/// Unsigned byte sum of `header` with the checksum field taken as spaces.
pub fn header_checksum(header: &[u8]) -> u32 {
    header
        .iter()
        .enumerate()
        .map(|(i, &byte)| {
            if (CHECKSUM_OFFSET..CHECKSUM_OFFSET + CHECKSUM_LEN).contains(&i) {
                b' ' as u32
            } else {
                byte as u32
            }
        })
        .sum()
}

/// Format `sum` the way tar writers store it: six octal digits, NUL, space.
#[cfg(test)]
pub(crate) fn format_checksum(sum: u32) -> [u8; CHECKSUM_LEN] {
    let mut field = [0u8; CHECKSUM_LEN];
    let digits = format!("{:06o}", sum & 0o777_777);
    field[..6].copy_from_slice(digits.as_bytes());
    field[6] = 0;
    field[7] = b' ';
    field
}
