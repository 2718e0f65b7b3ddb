//! End-to-end unpacking of an installer payload resource.
//!
//! ```text
//! resource file → LZMA → 20-byte header + 4 streams → BCJ2 → tar image → files
//! ```
//!
//! Only a missing or unreadable resource, an LZMA failure, a payload too
//! short for its header, and I/O errors while writing are fatal. Everything
//! else (size mismatches, a partial BCJ2 decode, a damaged tar image) is
//! logged, carried in the [`ExtractReport`], and extraction proceeds with
//! what is there.

use std::fs;
use std::path::{Path, PathBuf};

use crate::byte_search::find_bytes;
use crate::decompress::{decompress_lzma, Bcj2Decoder, Bcj2Streams, DecodeOutcome, StreamExhausted, StreamPositions};
use crate::error::{PayloadError, Result};
use crate::extract::{ExtractSummary, StopReason, TarEntries, TarExtractor};
use crate::parsing::{EntryKind, PayloadHeader, PayloadHeaderParser, SizeMismatch};

/// File name of the intermediate tar image when it is kept.
pub const TAR_IMAGE_NAME: &str = "_payload.tar";

const TAR_MAGIC: &[u8] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;

/// Options for [`extract_resource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Directory the archive is extracted into.
    pub output_dir: PathBuf,
    /// Write the decoded tar image to `output_dir/_payload.tar`.
    pub keep_tar_image: bool,
    /// When the image does not start with a tar header, look for the first
    /// `ustar` magic and start there.
    pub scan_for_magic: bool,
    /// List entries instead of writing them.
    pub list_only: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("extracted"),
            keep_tar_image: false,
            scan_for_magic: true,
            list_only: false,
        }
    }
}

/// Result of the header and BCJ2 stages.
#[derive(Debug)]
pub struct UnpackedPayload {
    pub header: PayloadHeader,
    pub size_mismatch: Option<SizeMismatch>,
    pub outcome: DecodeOutcome,
    pub positions: StreamPositions,
}

/// Parse the stream header of a decompressed payload and run BCJ2 over it.
pub fn unpack_payload(decompressed: &[u8]) -> Result<UnpackedPayload> {
    let header = PayloadHeaderParser::parse(decompressed)?;
    let body = &decompressed[PayloadHeaderParser::HEADER_SIZE..];
    let [main, call, jump, rc] = header.stream_sizes;
    tracing::debug!(
        "stream header: original {} bytes, main {}, CALL {}, JMP {}, range coder {}",
        header.original_size,
        main,
        call,
        jump,
        rc
    );

    let size_mismatch = header.check_body(body.len());
    if let Some(mismatch) = &size_mismatch {
        tracing::warn!("size mismatch: {}", mismatch);
    }

    let mut decoder = Bcj2Decoder::new(Bcj2Streams::split(body, header.stream_sizes));
    let outcome = decoder.decode(header.original_size as usize);
    let positions = decoder.positions();

    match outcome.exhausted() {
        None => tracing::info!("BCJ2 decoded {} bytes", outcome.data().len()),
        Some(exhausted) => {
            tracing::warn!(
                "BCJ2 decode incomplete: {} of {} bytes ({})",
                outcome.data().len(),
                header.original_size,
                exhausted
            );
            tracing::warn!("stream positions: {}", positions);
        }
    }

    Ok(UnpackedPayload {
        header,
        size_mismatch,
        outcome,
        positions,
    })
}

/// Offset of the first tar header in `image`.
///
/// A well-formed image has the magic of its first header at offset 257 and
/// starts at 0. Otherwise the first `ustar` that could belong to a header is
/// reported, and used as the start when `scan` is set.
pub fn locate_tar(image: &[u8], scan: bool) -> usize {
    if image.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len()) == Some(TAR_MAGIC) {
        tracing::debug!("tar magic found at the expected position");
        return 0;
    }

    tracing::warn!("no tar magic at offset {}", TAR_MAGIC_OFFSET);
    let found = image
        .get(TAR_MAGIC_OFFSET..)
        .and_then(|tail| find_bytes(tail, TAR_MAGIC));
    match found {
        Some(start) if scan => {
            tracing::warn!(
                "found 'ustar' at offset {}, extracting from 0x{:X}",
                start + TAR_MAGIC_OFFSET,
                start
            );
            start
        }
        Some(start) => {
            tracing::warn!("found 'ustar' at offset {}", start + TAR_MAGIC_OFFSET);
            0
        }
        None => 0,
    }
}

/// One entry as reported by listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub path: String,
    pub size: u64,
    pub kind: EntryKind,
    pub offset: usize,
}

/// List the members of `image` starting at `offset`.
pub fn list_entries(image: &[u8], offset: usize) -> (Vec<ListedEntry>, StopReason) {
    let mut entries = TarEntries::new(image, offset);
    let listed = entries
        .by_ref()
        .map(|entry| ListedEntry {
            size: entry.header.size,
            kind: entry.header.kind,
            offset: entry.offset,
            path: entry.path,
        })
        .collect();
    let stop = entries
        .stop_reason()
        .cloned()
        .unwrap_or(StopReason::EndOfImage { offset: entries.position() });
    (listed, stop)
}

/// What the tar stage did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TarOutput {
    Extracted(ExtractSummary),
    Listed {
        entries: Vec<ListedEntry>,
        stop: StopReason,
    },
}

impl TarOutput {
    pub fn stop_reason(&self) -> &StopReason {
        match self {
            Self::Extracted(summary) => &summary.stop,
            Self::Listed { stop, .. } => stop,
        }
    }
}

/// Everything learned while unpacking one resource.
#[derive(Debug)]
pub struct ExtractReport {
    pub header: PayloadHeader,
    pub size_mismatch: Option<SizeMismatch>,
    /// Set when the BCJ2 stage ran out of input.
    pub exhausted: Option<StreamExhausted>,
    pub positions: StreamPositions,
    /// Length of the decoded tar image.
    pub image_len: usize,
    /// Where the tar scan started.
    pub tar_offset: usize,
    /// Location of the kept tar image, if any.
    pub tar_image: Option<PathBuf>,
    pub tar: TarOutput,
}

/// Unpack an in-memory resource.
pub fn extract_payload_bytes(raw: &[u8], options: &ExtractOptions) -> Result<ExtractReport> {
    let decompressed = decompress_lzma(raw)?;
    tracing::info!(
        "LZMA: {} -> {} bytes",
        raw.len(),
        decompressed.len()
    );

    let UnpackedPayload {
        header,
        size_mismatch,
        outcome,
        positions,
    } = unpack_payload(&decompressed)?;
    drop(decompressed);

    let exhausted = outcome.exhausted().cloned();
    let image = outcome.into_data();
    let tar_offset = locate_tar(&image, options.scan_for_magic);

    let (tar_image, tar) = if options.list_only {
        let (entries, stop) = list_entries(&image, tar_offset);
        (None, TarOutput::Listed { entries, stop })
    } else {
        let tar_image = if options.keep_tar_image {
            Some(write_tar_image(&options.output_dir, &image)?)
        } else {
            None
        };
        let summary = TarExtractor::new(&options.output_dir).extract(&image, tar_offset)?;
        (tar_image, TarOutput::Extracted(summary))
    };

    Ok(ExtractReport {
        header,
        size_mismatch,
        exhausted,
        positions,
        image_len: image.len(),
        tar_offset,
        tar_image,
        tar,
    })
}

/// Read the resource at `path` and unpack it.
pub fn extract_resource(path: impl AsRef<Path>, options: &ExtractOptions) -> Result<ExtractReport> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|e| PayloadError::at_path(path, e))?;
    tracing::info!("read {} bytes from {}", raw.len(), path.display());
    extract_payload_bytes(&raw, options)
}

fn write_tar_image(dir: &Path, image: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| PayloadError::at_path(dir, e))?;
    let path = dir.join(TAR_IMAGE_NAME);
    fs::write(&path, image).map_err(|e| PayloadError::at_path(&path, e))?;
    tracing::info!("saved tar image to {}", path.display());
    Ok(path)
}
