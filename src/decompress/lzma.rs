//! LZMA "alone" container decoding.
//!
//! The payload is a classic `.lzma` stream: 5 bytes of properties, an 8-byte
//! little-endian uncompressed size (`u64::MAX` when unknown), then the
//! compressed data. Decoding itself is delegated to `lzma-rs`.

use std::io::Cursor;

use super::{DecompressError, Result};

/// Size of the legacy container header.
pub const HEADER_SIZE: usize = 13;

/// Largest valid properties byte: `(pb * 5 + lp) * 9 + lc` with pb, lp ≤ 4, lc ≤ 8.
const MAX_PROPERTIES: u8 = 9 * 5 * 5 - 1;

/// Fields of the legacy container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaAloneHeader {
    pub properties: u8,
    pub dict_size: u32,
    /// `None` when the stream is terminated by an end marker instead.
    pub unpacked_size: Option<u64>,
}

impl LzmaAloneHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(DecompressError::Lzma(format!(
                "input too short for LZMA header: {} bytes",
                data.len()
            )));
        }

        let properties = data[0];
        if properties > MAX_PROPERTIES {
            return Err(DecompressError::Lzma(format!(
                "invalid properties byte 0x{:02X}",
                properties
            )));
        }

        let dict_size = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
        let size = u64::from_le_bytes([
            data[5], data[6], data[7], data[8], data[9], data[10], data[11], data[12],
        ]);

        Ok(Self {
            properties,
            dict_size,
            unpacked_size: (size != u64::MAX).then_some(size),
        })
    }
}

/// Decompress a complete LZMA "alone" stream.
pub fn decompress_lzma(data: &[u8]) -> Result<Vec<u8>> {
    let header = LzmaAloneHeader::parse(data)?;
    tracing::debug!(
        properties = header.properties,
        dict_size = header.dict_size,
        unpacked_size = ?header.unpacked_size,
        "LZMA header"
    );

    let capacity = header
        .unpacked_size
        .map_or(data.len() * 4, |size| size.min(1 << 30) as usize);
    let mut decompressed = Vec::with_capacity(capacity);
    let mut input = Cursor::new(data);
    lzma_rs::lzma_decompress(&mut input, &mut decompressed)
        .map_err(|e| DecompressError::Lzma(e.to_string()))?;

    Ok(decompressed)
}
