//! BCJ2 decoder for x86 code.
//!
//! Merges the four BCJ2 streams back into the original byte sequence. The
//! main stream holds everything except converted CALL/JMP/Jcc targets; for
//! every candidate opcode one range-coded bit says whether a target was
//! pulled out. Pulled targets are stored as absolute big-endian addresses
//! and are rebased here to the little-endian relative displacement the
//! instruction expects.

use std::fmt;

use super::range_coder::{ProbabilityModel, RangeDecoder, JCC_CONTEXT, JUMP_CONTEXT};
use super::{Bcj2Streams, StreamExhausted, StreamId};

/// CALL rel32.
const OPCODE_CALL: u8 = 0xE8;
/// JMP rel32.
const OPCODE_JMP: u8 = 0xE9;
/// First byte of the two-byte Jcc rel32 opcodes.
const OPCODE_JCC_PREFIX: u8 = 0x0F;

/// Whether `b` (preceded by `prev`) may start a converted branch target.
#[inline(always)]
pub fn is_candidate(prev: u8, b: u8) -> bool {
    (b & 0xFE) == OPCODE_CALL || (prev == OPCODE_JCC_PREFIX && (b & 0xF0) == 0x80)
}

/// Probability slot for candidate opcode `b` preceded by `prev`.
#[inline(always)]
pub fn context_index(prev: u8, b: u8) -> usize {
    match b {
        OPCODE_CALL => prev as usize,
        OPCODE_JMP => JUMP_CONTEXT,
        _ => JCC_CONTEXT,
    }
}

/// Result of a decode session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// The output reached the declared size.
    Complete(Vec<u8>),
    /// An input stream ran dry first. `data` holds everything produced up
    /// to that point.
    Partial {
        data: Vec<u8>,
        exhausted: StreamExhausted,
    },
}

impl DecodeOutcome {
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Complete(data) | Self::Partial { data, .. } => data,
        }
    }

    pub fn into_data(self) -> Vec<u8> {
        match self {
            Self::Complete(data) | Self::Partial { data, .. } => data,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    pub fn exhausted(&self) -> Option<&StreamExhausted> {
        match self {
            Self::Complete(_) => None,
            Self::Partial { exhausted, .. } => Some(exhausted),
        }
    }
}

/// Read position and length of each input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPositions {
    /// `(position, length)` in header order: main, call, jump, range coder.
    pub streams: [(usize, usize); 4],
}

impl StreamPositions {
    pub fn get(&self, stream: StreamId) -> (usize, usize) {
        self.streams[stream.index()]
    }
}

impl fmt::Display for StreamPositions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [main, call, jump, rc] = self.streams;
        write!(
            f,
            "main {}/{}, CALL {}/{}, JMP {}/{}, range coder {}/{}",
            main.0, main.1, call.0, call.1, jump.0, jump.1, rc.0, rc.1
        )
    }
}

/// Decoder state between steps.
#[derive(Debug, Clone, Copy)]
enum State {
    /// Copying literal bytes from the main stream.
    Copying,
    /// A candidate opcode was copied; decide whether a target follows.
    Resolving(u8),
}

/// One BCJ2 decode session.
///
/// A session owns its probability model and borrows its streams; it is
/// meant to be run once with [`decode`](Self::decode).
pub struct Bcj2Decoder<'a> {
    streams: Bcj2Streams<'a>,
    probs: ProbabilityModel,
    prev_byte: u8,
}

impl<'a> Bcj2Decoder<'a> {
    pub fn new(streams: Bcj2Streams<'a>) -> Self {
        Self {
            streams,
            probs: ProbabilityModel::new(),
            prev_byte: 0,
        }
    }

    /// Probability model as it currently stands.
    pub fn model(&self) -> &ProbabilityModel {
        &self.probs
    }

    /// How far each stream has been read.
    pub fn positions(&self) -> StreamPositions {
        let s = &self.streams;
        StreamPositions {
            streams: [
                (s.main.position(), s.main.len()),
                (s.call.position(), s.call.len()),
                (s.jump.position(), s.jump.len()),
                (s.range_coder.position(), s.range_coder.len()),
            ],
        }
    }

    /// Decode up to `out_size` bytes.
    ///
    /// The range coder is seeded first, so even `out_size == 0` needs the
    /// five seed bytes to report [`DecodeOutcome::Complete`].
    pub fn decode(&mut self, out_size: usize) -> DecodeOutcome {
        // Output can never outgrow the literal and address streams combined
        let [main, call, jump, _] = self.streams.lengths();
        let mut output = Vec::with_capacity(out_size.min(main + call + jump));

        let mut coder = match RangeDecoder::new(&mut self.streams.range_coder) {
            Some(coder) => coder,
            None => return self.partial(output, StreamId::RangeCoder),
        };

        let mut state = State::Copying;
        while output.len() < out_size {
            match state {
                State::Copying => match self.copy_run(&mut output, out_size) {
                    Some(opcode) => state = State::Resolving(opcode),
                    None if output.len() == out_size => break,
                    None => return self.partial(output, StreamId::Main),
                },
                State::Resolving(opcode) => {
                    state = State::Copying;

                    let slot = context_index(self.prev_byte, opcode);
                    let is_target = match coder
                        .decode_bit(self.probs.slot_mut(slot), &mut self.streams.range_coder)
                    {
                        Some(bit) => bit,
                        None => return self.partial(output, StreamId::RangeCoder),
                    };

                    if !is_target {
                        self.prev_byte = opcode;
                        continue;
                    }

                    let (source, stream) = if opcode == OPCODE_CALL {
                        (&mut self.streams.call, StreamId::Call)
                    } else {
                        (&mut self.streams.jump, StreamId::Jump)
                    };
                    let target = match source.read_u32_be() {
                        Some(target) => target,
                        None => return self.partial(output, stream),
                    };

                    let dest = target.wrapping_sub((output.len() as u32).wrapping_add(4));
                    for byte in dest.to_le_bytes() {
                        output.push(byte);
                        if output.len() == out_size {
                            // Declared size may end inside an address
                            return DecodeOutcome::Complete(output);
                        }
                    }
                    self.prev_byte = (dest >> 24) as u8;
                }
            }
        }

        DecodeOutcome::Complete(output)
    }

    /// Copy literal bytes until a candidate opcode, the end of the main
    /// stream, or a full output.
    ///
    /// The candidate byte itself is copied (it is part of the instruction)
    /// and returned; `prev_byte` is left at the byte before it so the caller
    /// can select the `E8` context.
    #[inline]
    fn copy_run(&mut self, output: &mut Vec<u8>, out_size: usize) -> Option<u8> {
        let input = self.streams.main.remaining();
        let limit = input.len().min(out_size - output.len());

        let mut prev = self.prev_byte;
        let mut copied = 0;
        let mut opcode = None;
        for &b in &input[..limit] {
            copied += 1;
            if is_candidate(prev, b) {
                opcode = Some(b);
                break;
            }
            prev = b;
        }

        output.extend_from_slice(&input[..copied]);
        self.streams.main.advance(copied);
        self.prev_byte = prev;
        opcode
    }

    fn partial(&self, data: Vec<u8>, stream: StreamId) -> DecodeOutcome {
        let cursor = match stream {
            StreamId::Main => &self.streams.main,
            StreamId::Call => &self.streams.call,
            StreamId::Jump => &self.streams.jump,
            StreamId::RangeCoder => &self.streams.range_coder,
        };
        let exhausted = cursor.exhausted(data.len());
        DecodeOutcome::Partial { data, exhausted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Range coder stream that decodes every bit as 0.
    const ALL_ZERO_BITS: [u8; 16] = [0; 16];

    #[test]
    fn test_candidates() {
        assert!(is_candidate(0x00, 0xE8));
        assert!(is_candidate(0x00, 0xE9));
        assert!(!is_candidate(0x00, 0xEA));
        assert!(is_candidate(0x0F, 0x80));
        assert!(is_candidate(0x0F, 0x8F));
        assert!(!is_candidate(0x0F, 0x90));
        assert!(!is_candidate(0x0E, 0x85));
    }

    #[test]
    fn test_context_selection() {
        for prev in 0..=255u8 {
            assert_eq!(context_index(prev, 0xE8), prev as usize);
            assert_eq!(context_index(prev, 0xE9), 256);
        }
        for b in 0x80..=0x8Fu8 {
            assert_eq!(context_index(0x0F, b), 257);
        }
    }

    #[test]
    fn test_empty_output_after_seed() {
        let seed = [0u8; 5];
        let streams = Bcj2Streams::new(&[], &[], &[], &seed);
        let mut decoder = Bcj2Decoder::new(streams);
        assert_eq!(decoder.decode(0), DecodeOutcome::Complete(Vec::new()));
        assert!(decoder.model().as_slice().iter().all(|&p| p == 1024));
    }

    #[test]
    fn test_short_seed_is_partial() {
        let seed = [0u8; 3];
        let streams = Bcj2Streams::new(b"abc", &[], &[], &seed);
        let mut decoder = Bcj2Decoder::new(streams);
        let outcome = decoder.decode(3);
        assert!(outcome.data().is_empty());
        let exhausted = outcome.exhausted().unwrap();
        assert_eq!(exhausted.stream, StreamId::RangeCoder);
        assert_eq!(exhausted.offset, 3);
    }

    #[test]
    fn test_plain_copy() {
        let main = b"no branches in here";
        let streams = Bcj2Streams::new(main, &[], &[], &ALL_ZERO_BITS);
        let mut decoder = Bcj2Decoder::new(streams);
        let outcome = decoder.decode(main.len());
        assert_eq!(outcome, DecodeOutcome::Complete(main.to_vec()));
        // No candidate was seen, so no bit was decoded
        assert_eq!(decoder.positions().get(StreamId::RangeCoder), (5, 16));
    }

    #[test]
    fn test_unconverted_call_is_literal() {
        // Bit 0: E8 stays a literal and the following bytes come from main
        let main = [0x55, 0xE8, 0x01, 0x02, 0x03, 0x04, 0xC3];
        let streams = Bcj2Streams::new(&main, &[], &[], &ALL_ZERO_BITS);
        let mut decoder = Bcj2Decoder::new(streams);
        let outcome = decoder.decode(main.len());
        assert_eq!(outcome.into_data(), main.to_vec());
        // Context 0x55 adapted toward 0, others untouched
        assert!(decoder.model().get(0x55) > 1024);
        assert_eq!(decoder.model().get(0x00), 1024);
    }

    #[test]
    fn test_main_stream_exhaustion_is_partial() {
        let main = b"short";
        let streams = Bcj2Streams::new(main, &[], &[], &ALL_ZERO_BITS);
        let mut decoder = Bcj2Decoder::new(streams);
        let outcome = decoder.decode(100);
        assert_eq!(outcome.data(), main);
        assert_eq!(
            outcome.exhausted(),
            Some(&StreamExhausted {
                stream: StreamId::Main,
                offset: 5,
                output_position: 5,
            })
        );
    }

    #[test]
    fn test_output_full_on_candidate_byte() {
        // The last output byte is E8: done, no bit decoded
        let main = [0x90, 0xE8];
        let streams = Bcj2Streams::new(&main, &[], &[], &[0; 5]);
        let mut decoder = Bcj2Decoder::new(streams);
        assert_eq!(decoder.decode(2), DecodeOutcome::Complete(main.to_vec()));
    }

    #[test]
    fn test_positions_display() {
        let streams = Bcj2Streams::new(b"ab", &[], &[], &[0; 5]);
        let mut decoder = Bcj2Decoder::new(streams);
        decoder.decode(2);
        assert_eq!(
            decoder.positions().to_string(),
            "main 2/2, CALL 0/0, JMP 0/0, range coder 5/5"
        );
    }
}
