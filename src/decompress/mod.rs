//! Payload decoding stages.
//!
//! The producer compresses its tar image in two steps: a BCJ2 branch
//! converter splits x86 control-transfer targets out of the byte stream, and
//! the resulting four streams are packed behind a 20-byte header and run
//! through LZMA. This module inverts both steps.
//!
//! ## Decoders
//!
//! | Decoder | Input | Output |
//! |---------|-------|--------|
//! | [`decompress_lzma`] | LZMA "alone" container | header + 4 streams |
//! | [`Bcj2Decoder`] | 4 streams | flat tar image |
//!
//! ## BCJ2 streams
//!
//! | Stream | Name | Content |
//! |--------|------|---------|
//! | 0 | Main | Code with CALL/JMP targets removed |
//! | 1 | Call | `E8` targets, absolute, big-endian |
//! | 2 | Jump | `E9` and `0F 8x` targets, absolute, big-endian |
//! | 3 | Range coder | One adaptive bit per candidate opcode |
//!
//! ## Architecture
//!
//! ```text
//! Resource bytes
//!       ↓
//! ┌─────────────┐
//! │ LZMA        │ ← lzma-rs, legacy container
//! └─────────────┘
//!       ↓
//! ┌─────────────┐
//! │ Bcj2Streams │ ← 4 bounds-checked cursors over one buffer
//! └─────────────┘
//!       ↓
//! ┌─────────────┐
//! │ RangeDecoder│ ← is this opcode followed by a converted target?
//! └─────────────┘
//!       ↓
//! ┌─────────────┐
//! │ Bcj2Decoder │ ← copy runs + absolute → relative rebasing
//! └─────────────┘
//!       ↓
//! Tar image
//! ```
//!
//! Running out of input inside the BCJ2 stage is not an error: the decoder
//! returns [`DecodeOutcome::Partial`] with whatever it produced and a
//! [`StreamExhausted`] diagnostic.

mod bcj2;
mod lzma;
mod range_coder;
mod streams;


pub use bcj2::{Bcj2Decoder, DecodeOutcome, StreamPositions};
pub use lzma::decompress_lzma;
pub use range_coder::{ProbabilityModel, RangeDecoder, NUM_PROBS};
pub use streams::{Bcj2Streams, ByteCursor};

use std::fmt;

/// Identifies one of the four BCJ2 input streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamId {
    /// Stream 0: main bytecode.
    Main,
    /// Stream 1: CALL targets.
    Call,
    /// Stream 2: JMP and Jcc targets.
    Jump,
    /// Stream 3: range coder bits.
    RangeCoder,
}

impl StreamId {
    /// Index of the stream in the payload header.
    pub fn index(self) -> usize {
        match self {
            Self::Main => 0,
            Self::Call => 1,
            Self::Jump => 2,
            Self::RangeCoder => 3,
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Main => "main",
            Self::Call => "CALL",
            Self::Jump => "JMP",
            Self::RangeCoder => "range coder",
        };
        write!(f, "{} stream", name)
    }
}

/// An input stream ran dry before the output was complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamExhausted {
    /// Stream that had no more bytes.
    pub stream: StreamId,
    /// Read offset within that stream when it ran dry.
    pub offset: usize,
    /// Output bytes produced at that point.
    pub output_position: usize,
}

impl fmt::Display for StreamExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} exhausted at offset {} (output position 0x{:X})",
            self.stream, self.offset, self.output_position
        )
    }
}

impl std::error::Error for StreamExhausted {}

/// Decompression errors.
#[derive(Debug)]
pub enum DecompressError {
    /// The LZMA stage rejected its input.
    Lzma(String),
}

impl fmt::Display for DecompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lzma(msg) => write!(f, "LZMA decompression failed: {}", msg),
        }
    }
}

impl std::error::Error for DecompressError {}

pub type Result<T> = std::result::Result<T, DecompressError>;
