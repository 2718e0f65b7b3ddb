//! Fixed-layout header parsers.

pub mod payload_header;
pub mod tar_header;

pub use payload_header::{PayloadHeader, PayloadHeaderParser, SizeMismatch};
pub use tar_header::{EntryKind, TarBlock, TarHeader, TarHeaderParser};
