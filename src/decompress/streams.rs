//! Byte cursors for the four BCJ2 input streams.
//!
//! All four cursors borrow from the single post-LZMA buffer; nothing is
//! copied.

use super::{StreamExhausted, StreamId};

/// Sequential, bounds-checked reader over one stream.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    stream: StreamId,
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(stream: StreamId, data: &'a [u8]) -> Self {
        Self {
            stream,
            data,
            pos: 0,
        }
    }

    /// Read one byte and advance.
    #[inline]
    pub fn read_byte(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// Read a big-endian u32. Consumes nothing unless all 4 bytes are present.
    #[inline]
    pub fn read_u32_be(&mut self) -> Option<u32> {
        let bytes = self.data.get(self.pos..self.pos + 4)?;
        self.pos += 4;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Unread part of the stream.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Skip ahead by `count` bytes, clamped to the end of the stream.
    #[inline]
    pub fn advance(&mut self, count: usize) {
        self.pos = (self.pos + count).min(self.data.len());
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Total stream length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Diagnostic for this cursor running dry while the output held
    /// `output_position` bytes.
    pub fn exhausted(&self, output_position: usize) -> StreamExhausted {
        StreamExhausted {
            stream: self.stream,
            offset: self.pos,
            output_position,
        }
    }
}

/// The four BCJ2 input streams.
#[derive(Debug, Clone)]
pub struct Bcj2Streams<'a> {
    pub main: ByteCursor<'a>,
    pub call: ByteCursor<'a>,
    pub jump: ByteCursor<'a>,
    pub range_coder: ByteCursor<'a>,
}

impl<'a> Bcj2Streams<'a> {
    pub fn new(main: &'a [u8], call: &'a [u8], jump: &'a [u8], range_coder: &'a [u8]) -> Self {
        Self {
            main: ByteCursor::new(StreamId::Main, main),
            call: ByteCursor::new(StreamId::Call, call),
            jump: ByteCursor::new(StreamId::Jump, jump),
            range_coder: ByteCursor::new(StreamId::RangeCoder, range_coder),
        }
    }

    /// Split a concatenated body into streams of the declared sizes.
    ///
    /// Sizes are taken as-is, but every slice is clipped to `body`: a stream
    /// that runs past the end of the buffer is shortened, and streams that
    /// start past it are empty.
    pub fn split(body: &'a [u8], sizes: [u32; 4]) -> Self {
        let mut offset = 0usize;
        let mut slices: [&'a [u8]; 4] = [&[]; 4];
        for (slice, &size) in slices.iter_mut().zip(sizes.iter()) {
            let start = offset.min(body.len());
            let end = offset.saturating_add(size as usize).min(body.len());
            *slice = &body[start..end];
            offset = offset.saturating_add(size as usize);
        }
        Self::new(slices[0], slices[1], slices[2], slices[3])
    }

    /// Lengths of the (clipped) streams, in header order.
    pub fn lengths(&self) -> [usize; 4] {
        [
            self.main.len(),
            self.call.len(),
            self.jump.len(),
            self.range_coder.len(),
        ]
    }
}
