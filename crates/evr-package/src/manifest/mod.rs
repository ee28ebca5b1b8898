//! Binary manifest codec
//!
//! A manifest indexes every file stored in a package set. The layout is
//! little-endian throughout:
//!
//! - Header (192 bytes): package count, reserved fields and three section
//!   descriptors, with 16 bytes of padding after the first two
//! - FrameContents: 32-byte records locating each file in a frame
//! - Metadata: 40-byte records, one per file
//! - Frames: 16-byte records locating compressed frames in package files
//!
//! On disk the manifest is wrapped in a compressed container, see
//! [`crate::container`].
//!
//! # Usage
//!
//! ```rust
//! use evr_package::manifest::{FrameContent, FileMetadata, Frame, Manifest, SymbolKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut manifest = Manifest::new();
//! let key = SymbolKey::new(0x10, 0x20);
//! manifest.push_file(
//!     FrameContent { type_symbol: 0x10, file_symbol: 0x20, size: 4, alignment: 1, ..Default::default() },
//!     FileMetadata::for_key(key),
//! );
//! manifest.push_frame(Frame { package_index: 0, offset: 0, compressed_size: 13, length: 4 });
//!
//! let data = manifest.build()?;
//! let parsed = Manifest::parse(&data)?;
//! assert_eq!(parsed, manifest);
//! # Ok(())
//! # }
//! ```

mod entry;
mod header;

pub use entry::{
    FILE_METADATA_SIZE, FRAME_CONTENT_SIZE, FRAME_SIZE, FileMetadata, Frame, FrameContent,
    SymbolKey,
};
pub use header::{HEADER_SIZE, Header, Section};

use crate::container;
use crate::error::{PackageError, Result};
use binrw::{BinRead, BinWrite};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Parsed manifest: header plus the three record arrays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub header: Header,
    pub frame_contents: Vec<FrameContent>,
    pub metadata: Vec<FileMetadata>,
    pub frames: Vec<Frame>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

impl Manifest {
    /// Empty manifest with element sizes filled in
    pub fn new() -> Self {
        Self {
            header: Header {
                frame_contents: Section::empty(FRAME_CONTENT_SIZE),
                metadata: Section::empty(FILE_METADATA_SIZE),
                frames: Section::empty(FRAME_SIZE),
                ..Header::default()
            },
            frame_contents: Vec::new(),
            metadata: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Parse a manifest from raw (uncontained) bytes.
    ///
    /// Array lengths come from each section's `element_count`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let actual = data.len() as u64;
        if actual < HEADER_SIZE {
            return Err(PackageError::TruncatedData {
                expected: HEADER_SIZE,
                actual,
            });
        }

        let mut cursor = Cursor::new(data);
        let header = Header::read(&mut cursor)?;

        let expected = Self::declared_len(&header).ok_or(PackageError::TruncatedData {
            expected: u64::MAX,
            actual,
        })?;
        if actual < expected {
            return Err(PackageError::TruncatedData { expected, actual });
        }

        let mut frame_contents = Vec::with_capacity(header.frame_contents.element_count as usize);
        for _ in 0..header.frame_contents.element_count {
            frame_contents.push(FrameContent::read(&mut cursor)?);
        }

        let mut metadata = Vec::with_capacity(header.metadata.element_count as usize);
        for _ in 0..header.metadata.element_count {
            metadata.push(FileMetadata::read(&mut cursor)?);
        }

        let mut frames = Vec::with_capacity(header.frames.element_count as usize);
        for _ in 0..header.frames.element_count {
            frames.push(Frame::read(&mut cursor)?);
        }

        if header.frame_contents.count != header.frame_contents.element_count {
            debug!(
                "FrameContents count {} differs from element count {}",
                header.frame_contents.count, header.frame_contents.element_count
            );
        }

        Ok(Self {
            header,
            frame_contents,
            metadata,
            frames,
        })
    }

    /// Serialize to raw bytes: Header, FrameContents, Metadata, Frames.
    ///
    /// Section bookkeeping is recomputed from the arrays before writing.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut header = self.header;
        header
            .frame_contents
            .sync(FRAME_CONTENT_SIZE, self.frame_contents.len() as u64);
        header
            .metadata
            .sync(FILE_METADATA_SIZE, self.metadata.len() as u64);
        header.frames.sync(FRAME_SIZE, self.frames.len() as u64);

        let len = Self::declared_len(&header).unwrap_or(HEADER_SIZE);
        let mut buffer = Vec::with_capacity(len as usize);
        let mut cursor = Cursor::new(&mut buffer);

        header.write(&mut cursor)?;
        for fc in &self.frame_contents {
            fc.write(&mut cursor)?;
        }
        for md in &self.metadata {
            md.write(&mut cursor)?;
        }
        for frame in &self.frames {
            frame.write(&mut cursor)?;
        }

        Ok(buffer)
    }

    fn declared_len(header: &Header) -> Option<u64> {
        let fc = header
            .frame_contents
            .element_count
            .checked_mul(FRAME_CONTENT_SIZE)?;
        let md = header
            .metadata
            .element_count
            .checked_mul(FILE_METADATA_SIZE)?;
        let fr = header.frames.element_count.checked_mul(FRAME_SIZE)?;
        HEADER_SIZE.checked_add(fc)?.checked_add(md)?.checked_add(fr)
    }

    pub fn package_count(&self) -> u32 {
        self.header.package_count
    }

    pub fn file_count(&self) -> usize {
        self.frame_contents.len()
    }

    /// Append a file record pair
    pub fn push_file(&mut self, content: FrameContent, metadata: FileMetadata) {
        self.frame_contents.push(content);
        self.header.frame_contents.grow(1);
        self.metadata.push(metadata);
        self.header.metadata.grow(1);
    }

    /// Append a frame, returning its index
    pub fn push_frame(&mut self, frame: Frame) -> u32 {
        let index = self.frames.len() as u32;
        self.frames.push(frame);
        self.header.frames.grow(1);
        index
    }

    /// Map from key to position in `frame_contents`
    pub fn content_lookup(&self) -> HashMap<SymbolKey, usize> {
        self.frame_contents
            .iter()
            .enumerate()
            .map(|(i, fc)| (fc.key(), i))
            .collect()
    }

    /// Positions in `frame_contents` grouped by frame, each sorted by data offset
    pub fn contents_by_frame(&self) -> HashMap<u32, Vec<usize>> {
        let mut grouped: HashMap<u32, Vec<usize>> = HashMap::new();
        for (i, fc) in self.frame_contents.iter().enumerate() {
            grouped.entry(fc.frame_index).or_default().push(i);
        }
        for indices in grouped.values_mut() {
            indices.sort_by_key(|&i| self.frame_contents[i].data_offset);
        }
        grouped
    }

    /// Check that every file points at a valid frame and that the files of
    /// each frame tile its decompressed range without overlap.
    pub fn verify_layout(&self) -> Result<()> {
        for (frame_index, indices) in self.contents_by_frame() {
            let frame = self.frames.get(frame_index as usize).ok_or(
                PackageError::InvalidFrameIndex {
                    index: frame_index,
                    count: self.frames.len(),
                },
            )?;

            let mut cursor = 0u64;
            for i in indices {
                let fc = &self.frame_contents[i];
                if u64::from(fc.data_offset) < cursor {
                    return Err(PackageError::OverlappingContent {
                        frame: frame_index,
                        offset: fc.data_offset,
                    });
                }
                cursor = fc.end();
            }

            if cursor > u64::from(frame.length) {
                return Err(PackageError::SizeMismatch {
                    frame: frame_index,
                    expected: cursor,
                    actual: u64::from(frame.length),
                });
            }
        }
        Ok(())
    }
}

/// Read a contained manifest file from disk
pub fn read_file(path: &Path) -> Result<Manifest> {
    let data = std::fs::read(path)?;
    let raw = container::decode(&data)?;
    let manifest = Manifest::parse(&raw)?;
    debug!(
        "Loaded manifest {}: {} files, {} frames, {} packages",
        path.display(),
        manifest.file_count(),
        manifest.frames.len(),
        manifest.package_count()
    );
    Ok(manifest)
}

/// Write a manifest to disk inside a compressed container
pub fn write_file(path: &Path, manifest: &Manifest, level: i32) -> Result<()> {
    let raw = manifest.build()?;
    let data = container::encode(&raw, level)?;
    std::fs::write(path, data)?;
    debug!("Wrote manifest {} ({} bytes raw)", path.display(), raw.len());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_manifest() -> Manifest {
        let mut manifest = Manifest::new();
        manifest.header.package_count = 2;
        manifest.header.reserved1 = 524288;
        manifest.header.frames.reserved2 = 4294967296;
        manifest.push_file(
            FrameContent {
                type_symbol: 100,
                file_symbol: 200,
                frame_index: 0,
                data_offset: 0,
                size: 1024,
                alignment: 1,
            },
            FileMetadata::for_key(SymbolKey::new(100, 200)),
        );
        manifest.push_file(
            FrameContent {
                type_symbol: 101,
                file_symbol: 201,
                frame_index: 1,
                data_offset: 0,
                size: 2048,
                alignment: 1,
            },
            FileMetadata {
                asset_type: 7,
                ..FileMetadata::for_key(SymbolKey::new(101, 201))
            },
        );
        manifest.push_frame(Frame {
            package_index: 0,
            offset: 0,
            compressed_size: 512,
            length: 1024,
        });
        manifest.push_frame(Frame {
            package_index: 1,
            offset: 0,
            compressed_size: 1024,
            length: 2048,
        });
        manifest
    }

    #[test]
    fn test_round_trip() {
        let manifest = sample_manifest();
        let data = manifest.build().unwrap();
        assert_eq!(data.len() as u64, HEADER_SIZE + 2 * 32 + 2 * 40 + 2 * 16);

        let parsed = Manifest::parse(&data).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_truncated_header() {
        let err = Manifest::parse(&[0u8; 100]).unwrap_err();
        assert!(matches!(
            err,
            PackageError::TruncatedData {
                expected: 192,
                actual: 100
            }
        ));
    }

    #[test]
    fn test_truncated_section() {
        let data = sample_manifest().build().unwrap();
        let err = Manifest::parse(&data[..data.len() - 1]).unwrap_err();
        assert!(matches!(err, PackageError::TruncatedData { .. }));
    }

    #[test]
    fn test_absurd_element_count_is_truncation() {
        let mut data = sample_manifest().build().unwrap();
        // frames.element_count
        data[184..192].copy_from_slice(&u64::MAX.to_le_bytes());
        let err = Manifest::parse(&data).unwrap_err();
        assert!(matches!(err, PackageError::TruncatedData { .. }));
    }

    #[test]
    fn test_element_count_is_authoritative() {
        // count and element_count diverge in shipped manifests; the array
        // length follows element_count and count survives unchanged
        let mut manifest = sample_manifest();
        manifest.header.metadata.count = 5;
        let data = manifest.build().unwrap();

        let parsed = Manifest::parse(&data).unwrap();
        assert_eq!(parsed.metadata.len(), 2);
        assert_eq!(parsed.header.metadata.count, 5);
        assert_eq!(parsed.header.metadata.element_count, 2);
    }

    #[test]
    fn test_build_repairs_drifted_bookkeeping() {
        let mut manifest = sample_manifest();
        manifest.frames.push(Frame::default());
        let parsed = Manifest::parse(&manifest.build().unwrap()).unwrap();

        assert_eq!(parsed.frames.len(), 3);
        assert_eq!(parsed.header.frames.element_count, 3);
        assert_eq!(parsed.header.frames.count, 3);
        assert_eq!(parsed.header.frames.length, 48);
    }

    #[test]
    fn test_contents_by_frame_sorted() {
        let mut manifest = Manifest::new();
        for (offset, file) in [(10u32, 1i64), (0, 2), (5, 3)] {
            manifest.push_file(
                FrameContent {
                    file_symbol: file,
                    data_offset: offset,
                    size: 5,
                    ..FrameContent::default()
                },
                FileMetadata::default(),
            );
        }
        let grouped = manifest.contents_by_frame();
        assert_eq!(grouped[&0], vec![1, 2, 0]);
    }

    #[test]
    fn test_verify_layout() {
        let mut manifest = sample_manifest();
        manifest.verify_layout().unwrap();

        manifest.frame_contents[0].size = 2000;
        assert!(matches!(
            manifest.verify_layout(),
            Err(PackageError::SizeMismatch { frame: 0, .. })
        ));

        manifest.frame_contents[0].frame_index = 9;
        assert!(matches!(
            manifest.verify_layout(),
            Err(PackageError::InvalidFrameIndex { index: 9, .. })
        ));
    }

    #[test]
    fn test_verify_layout_overlap() {
        let mut manifest = sample_manifest();
        manifest.frame_contents[1].frame_index = 0;
        manifest.frame_contents[1].data_offset = 100;
        manifest.frame_contents[1].size = 10;
        assert!(matches!(
            manifest.verify_layout(),
            Err(PackageError::OverlappingContent {
                frame: 0,
                offset: 100
            })
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest");
        let manifest = sample_manifest();

        write_file(&path, &manifest, 1).unwrap();
        let loaded = read_file(&path).unwrap();
        assert_eq!(loaded, manifest);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;
        use proptest::test_runner::TestCaseError;

        fn frame_content() -> impl Strategy<Value = FrameContent> {
            (any::<i64>(), any::<i64>(), any::<[u32; 4]>()).prop_map(|(t, f, [a, b, c, d])| {
                FrameContent {
                    type_symbol: t,
                    file_symbol: f,
                    frame_index: a,
                    data_offset: b,
                    size: c,
                    alignment: d,
                }
            })
        }

        fn file_metadata() -> impl Strategy<Value = FileMetadata> {
            any::<[i64; 5]>().prop_map(|[t, f, r1, r2, asset]| FileMetadata {
                type_symbol: t,
                file_symbol: f,
                reserved1: r1,
                reserved2: r2,
                asset_type: asset,
            })
        }

        fn frame() -> impl Strategy<Value = Frame> {
            any::<[u32; 4]>().prop_map(|[p, o, c, l]| Frame {
                package_index: p,
                offset: o,
                compressed_size: c,
                length: l,
            })
        }

        fn manifest() -> impl Strategy<Value = Manifest> {
            (
                prop::collection::vec((frame_content(), file_metadata()), 0..32),
                prop::collection::vec(frame(), 0..32),
                any::<(u32, u32, u64)>(),
                any::<([u8; 16], [u8; 16])>(),
                any::<[u64; 4]>(),
                0u64..8,
            )
                .prop_map(
                    |(files, frames, (packages, r1, r2), (pad1, pad2), reserved, drift)| {
                        let mut manifest = Manifest::new();
                        manifest.header.package_count = packages;
                        manifest.header.reserved1 = r1;
                        manifest.header.reserved2 = r2;
                        manifest.header.padding1 = pad1;
                        manifest.header.padding2 = pad2;
                        manifest.header.frame_contents.reserved1 = reserved[0];
                        manifest.header.metadata.reserved2 = reserved[1];
                        manifest.header.frames.reserved1 = reserved[2];
                        manifest.header.frames.reserved2 = reserved[3];
                        for (content, metadata) in files {
                            manifest.push_file(content, metadata);
                        }
                        for frame in frames {
                            manifest.push_frame(frame);
                        }
                        // count may legitimately differ from element_count
                        manifest.header.metadata.count += drift;
                        manifest
                    },
                )
        }

        proptest! {
            /// Every header field and record survives build + parse
            #[test]
            fn manifest_round_trip(manifest in manifest()) {
                let data = manifest.build().map_err(|e| TestCaseError::fail(e.to_string()))?;
                let parsed = Manifest::parse(&data).map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(parsed, manifest);
            }

            /// Section lengths always agree with the element counts on disk
            #[test]
            fn sections_stay_consistent(manifest in manifest()) {
                let data = manifest.build().map_err(|e| TestCaseError::fail(e.to_string()))?;
                let parsed = Manifest::parse(&data).map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert!(parsed.header.frame_contents.is_consistent());
                prop_assert!(parsed.header.metadata.is_consistent());
                prop_assert!(parsed.header.frames.is_consistent());
            }
        }
    }
}
