//! Tar image extraction.
//!
//! [`TarEntries`] walks the header blocks of an in-memory ustar image and
//! yields one [`TarEntry`] per member, borrowing its content. The walk stops
//! at the end-of-archive block, at the end of the image, or at the first
//! header it cannot parse; [`TarEntries::stop_reason`] says which.
//!
//! [`TarExtractor`] writes the entries below an output directory. Each file
//! is written and closed before the next header is looked at.

use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{PayloadError, Result};
use crate::parsing::tar_header::{EntryKind, TarBlock, TarHeader, TarHeaderParser, BLOCK_SIZE};

/// Why a scan over the image ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// End-of-archive block at `offset`.
    EndOfArchive { offset: usize },
    /// No complete header block fits at `offset`.
    EndOfImage { offset: usize },
    /// Header at `offset` has no ustar magic.
    BadMagic { offset: usize, found: [u8; 8] },
    /// Header at `offset` could not be parsed.
    InvalidHeader { offset: usize, reason: String },
}

impl StopReason {
    /// Whether the archive ended the way archives are supposed to.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::EndOfArchive { .. } | Self::EndOfImage { .. })
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfArchive { offset } => write!(f, "end of archive at 0x{:X}", offset),
            Self::EndOfImage { offset } => write!(f, "end of image at 0x{:X}", offset),
            Self::BadMagic { offset, found } => write!(
                f,
                "bad magic at 0x{:X}: {:?}",
                offset,
                String::from_utf8_lossy(found)
            ),
            Self::InvalidHeader { offset, reason } => {
                write!(f, "invalid header at 0x{:X}: {}", offset, reason)
            }
        }
    }
}

/// One archive member.
#[derive(Debug, Clone)]
pub struct TarEntry<'a> {
    pub header: TarHeader,
    /// Sanitized relative path.
    pub path: String,
    /// Offset of the header block in the image.
    pub offset: usize,
    /// File content; empty for directories. Shorter than `header.size` if
    /// the image ends early.
    pub content: &'a [u8],
}

impl TarEntry<'_> {
    pub fn is_dir(&self) -> bool {
        self.header.kind == EntryKind::Directory
    }

    pub fn is_truncated(&self) -> bool {
        !self.is_dir() && (self.content.len() as u64) < self.header.size
    }
}

/// Iterator over the members of a tar image.
pub struct TarEntries<'a> {
    image: &'a [u8],
    pos: usize,
    stop: Option<StopReason>,
}

impl<'a> TarEntries<'a> {
    /// Start scanning at `offset`.
    pub fn new(image: &'a [u8], offset: usize) -> Self {
        Self {
            image,
            pos: offset,
            stop: None,
        }
    }

    /// Set once the iterator has returned `None`.
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop.as_ref()
    }

    /// Offset of the next header block.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn finish(&mut self, reason: StopReason) -> Option<TarEntry<'a>> {
        tracing::debug!("tar scan stopped: {}", reason);
        self.stop = Some(reason);
        None
    }
}

impl<'a> Iterator for TarEntries<'a> {
    type Item = TarEntry<'a>;

    fn next(&mut self) -> Option<TarEntry<'a>> {
        if self.stop.is_some() {
            return None;
        }

        let offset = self.pos;
        if offset
            .checked_add(BLOCK_SIZE)
            .map_or(true, |end| end > self.image.len())
        {
            return self.finish(StopReason::EndOfImage { offset });
        }

        let header = match TarHeaderParser::parse(&self.image[offset..]) {
            Ok(TarBlock::Entry(header)) => header,
            Ok(TarBlock::EndOfArchive) => {
                return self.finish(StopReason::EndOfArchive { offset });
            }
            Err(PayloadError::TarMagicMismatch(found)) => {
                return self.finish(StopReason::BadMagic { offset, found });
            }
            Err(e) => {
                return self.finish(StopReason::InvalidHeader {
                    offset,
                    reason: e.to_string(),
                });
            }
        };

        if !header.checksum_valid {
            tracing::warn!(
                "header checksum mismatch for {:?} at 0x{:X}",
                header.name,
                offset
            );
        }

        let data_start = offset + BLOCK_SIZE;
        let content = if header.kind == EntryKind::Directory {
            &[][..]
        } else {
            let size = usize::try_from(header.size).unwrap_or(usize::MAX);
            let end = data_start.saturating_add(size).min(self.image.len());
            &self.image[data_start..end]
        };

        let padded = usize::try_from(header.padded_size()).unwrap_or(usize::MAX);
        self.pos = data_start.saturating_add(padded);

        let entry = TarEntry {
            path: header.sanitized_name(),
            header,
            offset,
            content,
        };
        if entry.is_truncated() {
            tracing::warn!(
                "{} is truncated: {} of {} bytes present",
                entry.path,
                entry.content.len(),
                entry.header.size
            );
        }
        Some(entry)
    }
}

/// Totals of one extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes_written: u64,
    /// Entries that could not be mapped to an output path.
    pub skipped: usize,
    pub stop: StopReason,
}

/// Writes tar members below a root directory.
#[derive(Debug, Clone)]
pub struct TarExtractor {
    root: PathBuf,
}

impl TarExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Output location for a sanitized member name.
    ///
    /// Only plain path components are kept, so the result always lies
    /// below the root.
    pub fn output_path(&self, name: &str) -> PathBuf {
        let mut path = self.root.clone();
        for component in Path::new(name).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        path
    }

    /// Extract every member of `image`, starting at `offset`.
    pub fn extract(&self, image: &[u8], offset: usize) -> Result<ExtractSummary> {
        fs::create_dir_all(&self.root).map_err(|e| PayloadError::at_path(&self.root, e))?;

        let mut entries = TarEntries::new(image, offset);
        let mut files = 0;
        let mut directories = 0;
        let mut bytes_written = 0u64;
        let mut skipped = 0;

        for entry in entries.by_ref() {
            let path = self.output_path(&entry.path);

            if entry.is_dir() {
                fs::create_dir_all(&path).map_err(|e| PayloadError::at_path(&path, e))?;
                tracing::debug!("[DIR]  {}", entry.path);
                directories += 1;
                continue;
            }

            // Names such as "." or "sub/." resolve to a directory
            if path == self.root || path.is_dir() {
                tracing::warn!(
                    "skipping file entry with no usable name at 0x{:X}: {:?}",
                    entry.offset,
                    entry.header.name
                );
                skipped += 1;
                continue;
            }

            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| PayloadError::at_path(parent, e))?;
            }
            fs::write(&path, entry.content).map_err(|e| PayloadError::at_path(&path, e))?;
            tracing::debug!("[FILE] {} ({} bytes)", entry.path, entry.content.len());
            files += 1;
            bytes_written += entry.content.len() as u64;
        }

        let stop = entries
            .stop_reason()
            .cloned()
            .unwrap_or(StopReason::EndOfImage { offset: entries.position() });
        if !stop.is_clean() {
            tracing::warn!("tar scan ended early: {}", stop);
        }
        tracing::info!(
            "{} file(s), {} dir(s) extracted to {}",
            files,
            directories,
            self.root.display()
        );

        Ok(ExtractSummary {
            files,
            directories,
            bytes_written,
            skipped,
            stop,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::parsing::tar_header::tests::build_header;

    /// Assemble a tar image from `(name, content, typeflag)` members.
    pub(crate) fn tar_image(members: &[(&str, &[u8], u8)]) -> Vec<u8> {
        let mut image = Vec::new();
        for &(name, content, typeflag) in members {
            image.extend_from_slice(&build_header(name, content.len() as u64, typeflag));
            image.extend_from_slice(content);
            let pad = content.len().wrapping_neg() & (BLOCK_SIZE - 1);
            image.resize(image.len() + pad, 0);
        }
        image.resize(image.len() + 2 * BLOCK_SIZE, 0);
        image
    }

    #[test]
    fn test_single_file() {
        let image = tar_image(&[("a.txt", b"hello", b'0')]);
        assert_eq!(image.len(), 512 + 512 + 1024);

        let dir = tempfile::tempdir().unwrap();
        let summary = TarExtractor::new(dir.path()).extract(&image, 0).unwrap();

        assert_eq!(summary.files, 1);
        assert_eq!(summary.bytes_written, 5);
        assert_eq!(summary.stop, StopReason::EndOfArchive { offset: 1024 });
        assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"hello");
    }

    #[test]
    fn test_directory_entry() {
        let image = tar_image(&[("sub/", b"", b'5'), ("sub/inner.bin", &[1, 2, 3], b'0')]);

        let dir = tempfile::tempdir().unwrap();
        let summary = TarExtractor::new(dir.path()).extract(&image, 0).unwrap();

        assert_eq!(summary.directories, 1);
        assert_eq!(summary.files, 1);
        assert!(dir.path().join("sub").is_dir());
        assert_eq!(fs::read(dir.path().join("sub/inner.bin")).unwrap(), [1, 2, 3]);
        // Directory consumed no content: the file header follows immediately
        assert_eq!(summary.stop, StopReason::EndOfArchive { offset: 1536 });
    }

    #[test]
    fn test_empty_directory() {
        let image = tar_image(&[("sub/", b"", b'5')]);
        let dir = tempfile::tempdir().unwrap();
        TarExtractor::new(dir.path()).extract(&image, 0).unwrap();
        let sub = dir.path().join("sub");
        assert!(sub.is_dir());
        assert_eq!(fs::read_dir(sub).unwrap().count(), 0);
    }

    #[test]
    fn test_path_traversal_is_confined() {
        let image = tar_image(&[
            ("../../etc/passwd", b"root", b'0'),
            ("/abs/file", b"x", b'0'),
        ]);

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("out");
        let summary = TarExtractor::new(&root).extract(&image, 0).unwrap();
        assert_eq!(summary.files, 2);

        assert_eq!(fs::read(root.join("_/_/etc/passwd")).unwrap(), b"root");
        assert_eq!(fs::read(root.join("abs/file")).unwrap(), b"x");
        assert!(!dir.path().join("etc").exists());
    }

    #[test]
    fn test_entries_naming_a_directory_are_skipped() {
        let image = tar_image(&[
            ("sub/", b"", b'5'),
            ("sub/.", b"x", b'0'),
            (".", b"z", b'0'),
            ("after", b"y", b'0'),
        ]);

        let dir = tempfile::tempdir().unwrap();
        let summary = TarExtractor::new(dir.path()).extract(&image, 0).unwrap();

        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.directories, 1);
        assert_eq!(summary.files, 1);
        assert!(dir.path().join("sub").is_dir());
        assert_eq!(fs::read(dir.path().join("after")).unwrap(), b"y");
        assert!(matches!(summary.stop, StopReason::EndOfArchive { .. }));
    }

    #[test]
    fn test_output_path_stays_under_root() {
        let extractor = TarExtractor::new("/tmp/root");
        assert_eq!(extractor.output_path("a/./b"), Path::new("/tmp/root/a/b"));
        assert_eq!(extractor.output_path(""), Path::new("/tmp/root"));
    }

    #[test]
    fn test_entries_listing() {
        let image = tar_image(&[
            ("one", &[0xAA; 600], b'0'),
            ("dir/", b"", b'5'),
            ("two", b"", b'0'),
        ]);
        let mut entries = TarEntries::new(&image, 0);
        let listed: Vec<(String, usize, bool)> = entries
            .by_ref()
            .map(|e| (e.path.clone(), e.content.len(), e.is_dir()))
            .collect();

        assert_eq!(
            listed,
            vec![
                ("one".to_string(), 600, false),
                ("dir/".to_string(), 0, true),
                ("two".to_string(), 0, false),
            ]
        );
        assert_eq!(
            entries.stop_reason(),
            Some(&StopReason::EndOfArchive { offset: 512 + 1024 + 512 + 512 })
        );
    }

    #[test]
    fn test_bad_magic_stops_scan() {
        let mut image = tar_image(&[("first", b"1", b'0'), ("second", b"2", b'0')]);
        image[1024 + 257..1024 + 265].copy_from_slice(b"notatar!");

        let mut entries = TarEntries::new(&image, 0);
        assert_eq!(entries.by_ref().count(), 1);
        assert!(matches!(
            entries.stop_reason(),
            Some(StopReason::BadMagic { offset: 1024, .. })
        ));
        assert!(!entries.stop_reason().unwrap().is_clean());
    }

    #[test]
    fn test_truncated_image() {
        let mut image = tar_image(&[("big", &[7u8; 2000], b'0')]);
        image.truncate(512 + 100);

        let entries: Vec<_> = TarEntries::new(&image, 0).collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_truncated());
        assert_eq!(entries[0].content.len(), 100);
    }

    #[test]
    fn test_image_without_end_marker() {
        let image = build_header("lonely", 0, b'0');
        let mut entries = TarEntries::new(&image, 0);
        assert_eq!(entries.by_ref().count(), 1);
        assert_eq!(
            entries.stop_reason(),
            Some(&StopReason::EndOfImage { offset: 512 })
        );
    }

    #[test]
    fn test_start_offset() {
        let mut image = vec![0xCC; 300];
        image.extend_from_slice(&tar_image(&[("late.txt", b"late", b'0')]));

        let dir = tempfile::tempdir().unwrap();
        let summary = TarExtractor::new(dir.path()).extract(&image, 300).unwrap();
        assert_eq!(summary.files, 1);
        assert_eq!(fs::read(dir.path().join("late.txt")).unwrap(), b"late");
    }
}
