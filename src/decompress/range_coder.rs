//! Adaptive binary range decoder used by BCJ2.
//!
//! LZMA-style bit decoder: 32-bit `code`/`range` registers, 11-bit
//! probabilities, shift-by-5 adaptation. Every constant here must match the
//! encoder bit for bit; a single off-by-one desyncs the rest of the stream.

use super::ByteCursor;

/// Range coder constants.
const NUM_BIT_MODEL_TOTAL_BITS: u32 = 11;
const BIT_MODEL_TOTAL: u32 = 1 << NUM_BIT_MODEL_TOTAL_BITS;
const NUM_MOVE_BITS: u32 = 5;
const TOP_VALUE: u32 = 1 << 24;

/// Initial probability (50%).
pub const INITIAL_PROB: u16 = (BIT_MODEL_TOTAL >> 1) as u16;

/// Bytes consumed from the range coder stream before the first bit.
pub const SEED_BYTES: usize = 5;

/// Number of probability slots: 256 `E8` contexts, one `E9`, one Jcc.
pub const NUM_PROBS: usize = 256 + 2;

/// Probability slot for `E9` (JMP near).
pub const JUMP_CONTEXT: usize = 256;

/// Probability slot for `0F 8x` (Jcc near).
pub const JCC_CONTEXT: usize = 257;

/// Per-session table of adaptive bit probabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbabilityModel {
    probs: [u16; NUM_PROBS],
}

impl ProbabilityModel {
    pub fn new() -> Self {
        Self {
            probs: [INITIAL_PROB; NUM_PROBS],
        }
    }

    /// Current probability of a 0 bit in `slot`, out of 2048.
    #[inline]
    pub fn get(&self, slot: usize) -> u16 {
        self.probs[slot]
    }

    #[inline]
    pub fn slot_mut(&mut self, slot: usize) -> &mut u16 {
        &mut self.probs[slot]
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.probs
    }
}

impl Default for ProbabilityModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Range decoder state.
#[derive(Debug, Clone)]
pub struct RangeDecoder {
    code: u32,
    range: u32,
}

impl RangeDecoder {
    /// Seed the decoder from the first 5 bytes of `input`.
    ///
    /// The first byte is always 0 from a conforming encoder and is shifted
    /// out of `code` by the remaining four. Returns `None` if fewer than 5
    /// bytes are available.
    pub fn new(input: &mut ByteCursor<'_>) -> Option<Self> {
        let mut code = 0u32;
        for _ in 0..SEED_BYTES {
            code = (code << 8) | input.read_byte()? as u32;
        }
        Some(Self {
            code,
            range: 0xFFFF_FFFF,
        })
    }

    /// Decode one bit against `prob` and adapt it.
    ///
    /// Returns `None` if normalization needed a byte and `input` had none.
    #[inline(always)]
    pub fn decode_bit(&mut self, prob: &mut u16, input: &mut ByteCursor<'_>) -> Option<bool> {
        let p = *prob as u32;
        let bound = (self.range >> NUM_BIT_MODEL_TOTAL_BITS).wrapping_mul(p);

        let bit = if self.code < bound {
            self.range = bound;
            *prob = (p + ((BIT_MODEL_TOTAL - p) >> NUM_MOVE_BITS)) as u16;
            false
        } else {
            self.range = self.range.wrapping_sub(bound);
            self.code = self.code.wrapping_sub(bound);
            *prob = (p - (p >> NUM_MOVE_BITS)) as u16;
            true
        };

        self.normalize(input)?;
        Some(bit)
    }

    #[inline(always)]
    fn normalize(&mut self, input: &mut ByteCursor<'_>) -> Option<()> {
        while self.range < TOP_VALUE {
            let byte = input.read_byte()?;
            self.range <<= 8;
            self.code = (self.code << 8) | byte as u32;
        }
        Some(())
    }

    /// Debug method to get internal state
    #[cfg(test)]
    pub fn debug_state(&self) -> (u32, u32) {
        (self.code, self.range)
    }
}
