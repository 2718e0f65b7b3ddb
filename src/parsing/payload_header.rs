//! Payload header parser.
//!
//! After LZMA decompression the payload starts with five little-endian u32
//! values: the size of the BCJ2 output, then the sizes of the four streams
//! that follow the header back to back.

use std::fmt;

use crate::error::{PayloadError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Size of the reconstructed (tar) image.
    pub original_size: u32,
    /// Main, CALL, JMP and range coder stream sizes.
    pub stream_sizes: [u32; 4],
}

/// Declared stream sizes disagree with the bytes actually present.
///
/// Producer framing is authoritative, so this is only a warning: decoding
/// proceeds on the declared sizes, clipped to the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatch {
    pub declared: u64,
    pub available: u64,
}

impl fmt::Display for SizeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stream sizes declare {} bytes but {} follow the header",
            self.declared, self.available
        )
    }
}

impl PayloadHeader {
    /// Sum of the four declared stream sizes.
    pub fn declared_streams_len(&self) -> u64 {
        self.stream_sizes.iter().map(|&s| s as u64).sum()
    }

    /// Compare the declared sizes with the `available` bytes after the header.
    pub fn check_body(&self, available: usize) -> Option<SizeMismatch> {
        let declared = self.declared_streams_len();
        (declared != available as u64).then_some(SizeMismatch {
            declared,
            available: available as u64,
        })
    }
}

pub struct PayloadHeaderParser;

impl PayloadHeaderParser {
    pub const HEADER_SIZE: usize = 20;

    pub fn parse(buffer: &[u8]) -> Result<PayloadHeader> {
        if buffer.len() < Self::HEADER_SIZE {
            return Err(PayloadError::HeaderTooSmall { have: buffer.len() });
        }

        let word = |i: usize| {
            let at = i * 4;
            u32::from_le_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
        };

        Ok(PayloadHeader {
            original_size: word(0),
            stream_sizes: [word(1), word(2), word(3), word(4)],
        })
    }
}
