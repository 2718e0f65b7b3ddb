//! Error types for payload unpacking.
//!
//! This module provides the [`PayloadError`] type which covers the fatal
//! failures of the unpacking pipeline.
//!
//! ## Error Categories
//!
//! | Category | Errors | Description |
//! |----------|--------|-------------|
//! | Framing | [`HeaderTooSmall`] | Decompressed payload too short for its header |
//! | Archive | [`TarMagicMismatch`], [`InvalidTarHeader`] | Tar header rejected |
//! | Decompression | [`Decompress`] | LZMA stage failed |
//! | I/O | [`PathIo`], [`BufferTooSmall`] | Read/write errors |
//!
//! Running out of BCJ2 input is deliberately *not* in this list: it produces
//! a partial [`DecodeOutcome`](crate::decompress::DecodeOutcome) instead.
//! Archive errors are likewise reported per header and end the tar scan
//! rather than the whole run.
//!
//! [`HeaderTooSmall`]: PayloadError::HeaderTooSmall
//! [`TarMagicMismatch`]: PayloadError::TarMagicMismatch
//! [`InvalidTarHeader`]: PayloadError::InvalidTarHeader
//! [`Decompress`]: PayloadError::Decompress
//! [`PathIo`]: PayloadError::PathIo
//! [`BufferTooSmall`]: PayloadError::BufferTooSmall

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::decompress::DecompressError;

/// Error type for payload operations.
#[derive(Debug)]
pub enum PayloadError {
    /// The decompressed payload is shorter than the 20-byte stream header.
    HeaderTooSmall {
        /// Number of bytes available.
        have: usize,
    },

    /// A fixed-size structure did not fit in the provided buffer.
    BufferTooSmall {
        /// Number of bytes needed.
        needed: usize,
        /// Number of bytes available.
        have: usize,
    },

    /// A tar header carries neither the POSIX nor the GNU `ustar` magic.
    ///
    /// The `[u8; 8]` is the raw magic + version field at offset 257.
    TarMagicMismatch([u8; 8]),

    /// A tar header field could not be parsed.
    InvalidTarHeader(String),

    /// The LZMA stage failed.
    Decompress(DecompressError),

    /// An I/O error on a specific file or directory.
    PathIo {
        path: PathBuf,
        source: io::Error,
    },
}

impl PayloadError {
    /// Attach `path` to an I/O error.
    pub fn at_path(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::PathIo {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HeaderTooSmall { have } => {
                write!(f, "Payload too small for stream header: {} of 20 bytes", have)
            }
            Self::BufferTooSmall { needed, have } => {
                write!(f, "Buffer too small: need {} bytes, have {}", needed, have)
            }
            Self::TarMagicMismatch(found) => {
                write!(f, "Bad tar magic: {:?}", String::from_utf8_lossy(found))
            }
            Self::InvalidTarHeader(msg) => write!(f, "Invalid tar header: {}", msg),
            Self::Decompress(e) => write!(f, "{}", e),
            Self::PathIo { path, source } => write!(f, "{}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for PayloadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decompress(e) => Some(e),
            Self::PathIo { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

impl From<DecompressError> for PayloadError {
    fn from(e: DecompressError) -> Self {
        Self::Decompress(e)
    }
}

pub type Result<T> = std::result::Result<T, PayloadError>;
