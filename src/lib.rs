//! Installer payload unpacker.
//!
//! Recovers the files packed into the compressed payload resource of a
//! meta-installer setup executable. The producer tars the files, runs the
//! tar image through a BCJ2 branch converter, frames the four BCJ2 streams
//! behind a 20-byte header and LZMA-compresses the result. This crate
//! inverts those steps:
//!
//! 1. [`decompress::decompress_lzma`] - LZMA "alone" container
//! 2. [`pipeline::unpack_payload`] - stream header + [`Bcj2Decoder`]
//! 3. [`TarExtractor`] - ustar image to files on disk
//!
//! [`extract_resource`] runs all three.
//!
//! ## Features
//! - `cli` (default) - the `omaha-extract` binary

mod byte_search;
mod checksum;
pub mod decompress;
pub mod error;
pub mod extract;
pub mod parsing;
pub mod pipeline;

pub use decompress::{Bcj2Decoder, Bcj2Streams, DecodeOutcome, DecompressError, StreamExhausted, StreamId};
pub use error::PayloadError;
pub use extract::{ExtractSummary, StopReason, TarEntries, TarEntry, TarExtractor};
pub use parsing::{PayloadHeader, PayloadHeaderParser, TarHeader, TarHeaderParser};
pub use pipeline::{extract_payload_bytes, extract_resource, ExtractOptions, ExtractReport, TarOutput};
