//! ustar header parser.
//!
//! Each archive member starts with a 512-byte header block followed by its
//! content, padded to the next 512-byte boundary. Only the fields needed to
//! extract plain files and directories are decoded. Both the POSIX magic
//! (`"ustar\0"`) and the old GNU one (`"ustar  \0"`) are accepted and parse
//! to the same [`TarHeader`].

use crate::checksum::{header_checksum, CHECKSUM_LEN, CHECKSUM_OFFSET};
use crate::error::{PayloadError, Result};

/// Header and content alignment.
pub const BLOCK_SIZE: usize = 512;

const NAME_OFFSET: usize = 0;
const NAME_LEN: usize = 100;
const SIZE_OFFSET: usize = 0x7C;
const SIZE_LEN: usize = 12;
const TYPEFLAG_OFFSET: usize = 156;
const MAGIC_OFFSET: usize = 257;
const PREFIX_OFFSET: usize = 345;
const PREFIX_LEN: usize = 155;

const USTAR_MAGIC: &[u8; 5] = b"ustar";
const GNU_MAGIC: &[u8; 8] = b"ustar  \0";

/// Type flag of a directory entry.
pub const DIRECTORY_TYPE: u8 = b'5';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarHeader {
    /// Full member name (`prefix/name` when a prefix is present), unsanitized.
    pub name: String,
    /// Content size in bytes.
    pub size: u64,
    /// From the type flag, or a trailing `/` on the name.
    pub kind: EntryKind,
    /// Whether the stored checksum matches the header bytes.
    pub checksum_valid: bool,
}

impl TarHeader {
    /// Content plus padding up to the next block boundary.
    pub fn padded_size(&self) -> u64 {
        if self.size == 0 {
            0
        } else {
            self.size + (self.size.wrapping_neg() & (BLOCK_SIZE as u64 - 1))
        }
    }

    /// Member name made safe to join onto an output directory.
    pub fn sanitized_name(&self) -> String {
        sanitize_name(&self.name)
    }
}

/// One parsed header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TarBlock {
    /// Zeroed magic field: no more members.
    EndOfArchive,
    Entry(TarHeader),
}

pub struct TarHeaderParser;

impl TarHeaderParser {
    pub const HEADER_SIZE: usize = BLOCK_SIZE;

    pub fn parse(buffer: &[u8]) -> Result<TarBlock> {
        if buffer.len() < Self::HEADER_SIZE {
            return Err(PayloadError::BufferTooSmall {
                needed: Self::HEADER_SIZE,
                have: buffer.len(),
            });
        }
        let header = &buffer[..Self::HEADER_SIZE];

        let magic = &header[MAGIC_OFFSET..MAGIC_OFFSET + 5];
        if magic.iter().all(|&b| b == 0) {
            return Ok(TarBlock::EndOfArchive);
        }
        if magic != USTAR_MAGIC && &header[MAGIC_OFFSET..MAGIC_OFFSET + 8] != GNU_MAGIC {
            let mut found = [0u8; 8];
            found.copy_from_slice(&header[MAGIC_OFFSET..MAGIC_OFFSET + 8]);
            return Err(PayloadError::TarMagicMismatch(found));
        }

        let mut name = c_string(&header[NAME_OFFSET..NAME_OFFSET + NAME_LEN]);
        let prefix = c_string(&header[PREFIX_OFFSET..PREFIX_OFFSET + PREFIX_LEN]);
        if !prefix.is_empty() {
            name = format!("{}/{}", prefix, name);
        }
        if name.is_empty() {
            return Err(PayloadError::InvalidTarHeader("empty entry name".into()));
        }

        let size_field = &header[SIZE_OFFSET..SIZE_OFFSET + SIZE_LEN];
        let size = parse_octal(size_field).ok_or_else(|| {
            PayloadError::InvalidTarHeader(format!(
                "size field is not octal: {:?}",
                String::from_utf8_lossy(size_field)
            ))
        })?;

        let typeflag = header[TYPEFLAG_OFFSET];
        let kind = if typeflag == DIRECTORY_TYPE || name.ends_with('/') {
            EntryKind::Directory
        } else {
            EntryKind::File
        };

        let stored = parse_octal(&header[CHECKSUM_OFFSET..CHECKSUM_OFFSET + CHECKSUM_LEN]);
        let checksum_valid = stored == Some(header_checksum(header) as u64);

        Ok(TarBlock::Entry(TarHeader {
            name,
            size,
            kind,
            checksum_valid,
        }))
    }
}

/// Parse an ASCII octal field. Surrounding spaces and trailing NULs are
/// ignored; an empty field is 0. Returns `None` on any other character or
/// on overflow.
pub fn parse_octal(field: &[u8]) -> Option<u64> {
    let end = field
        .iter()
        .rposition(|&b| b != 0 && b != b' ')
        .map_or(0, |i| i + 1);
    let digits = field[..end].trim_ascii();

    digits.iter().try_fold(0u64, |acc, &b| {
        if !(b'0'..=b'7').contains(&b) {
            return None;
        }
        acc.checked_mul(8)?.checked_add((b - b'0') as u64)
    })
}

/// Strip leading `/` and replace every `..` with `_`.
///
/// Applied to every member regardless of archive contents, so no name can
/// address anything outside the extraction root.
pub fn sanitize_name(name: &str) -> String {
    name.trim_start_matches('/').replace("..", "_")
}

/// NUL-terminated field as text, trimmed.
fn c_string(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).trim().to_string()
}
