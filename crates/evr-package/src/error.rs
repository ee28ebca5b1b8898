//! Error types for manifest, package and repack operations

use crate::manifest::SymbolKey;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for package operations
pub type Result<T> = std::result::Result<T, PackageError>;

/// Errors produced while decoding manifests or reading and writing packages
#[derive(Error, Debug)]
pub enum PackageError {
    /// Buffer shorter than the header or a declared section
    #[error("Truncated data: expected {expected} bytes, got {actual}")]
    TruncatedData { expected: u64, actual: u64 },

    /// Frame index outside of the manifest's frame table
    #[error("Invalid frame index {index} (manifest has {count} frames)")]
    InvalidFrameIndex { index: u32, count: usize },

    /// Package index outside of the opened package files
    #[error("Invalid package index {index} (package has {count} files)")]
    InvalidPackageIndex { index: u32, count: usize },

    /// A physical package file could not be opened
    #[error("Failed to open package {index} at {}: {source}", path.display())]
    OpenPackage {
        index: u32,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Fewer compressed bytes were available than the frame declares
    #[error("Short read on frame {frame}: expected {expected} bytes, got {actual}")]
    ShortRead {
        frame: u32,
        expected: u64,
        actual: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An input file could not be read from disk
    #[error("Failed to read input {}: {source}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decompress frame {frame}: {source}")]
    Decompress {
        frame: u32,
        #[source]
        source: io::Error,
    },

    #[error("Failed to compress frame {frame}: {source}")]
    Compress {
        frame: u32,
        #[source]
        source: io::Error,
    },

    /// Decompressed frame is shorter than a file's offset + size
    #[error("Frame {frame} too short: content needs {expected} bytes, frame has {actual}")]
    SizeMismatch {
        frame: u32,
        expected: u64,
        actual: u64,
    },

    /// Two files of one frame claim the same bytes
    #[error("Overlapping content in frame {frame} at offset {offset}")]
    OverlappingContent { frame: u32, offset: u32 },

    /// A file could not be re-read from its source package
    #[error("Corrupt source for {key}: {source}")]
    CorruptSource {
        key: SymbolKey,
        #[source]
        source: Box<PackageError>,
    },

    /// Invalid container magic bytes
    #[error("Invalid container magic: expected '5a535444', got '{}'", hex::encode(.0))]
    InvalidMagic([u8; 4]),

    #[error("Invalid container header length: expected 16, got {0}")]
    InvalidHeaderLength(u32),

    #[error("Container declares an empty {0} payload")]
    EmptyContainer(&'static str),

    /// A single frame does not fit in an empty package file
    #[error("Frame of {size} bytes exceeds the package size limit of {max} bytes")]
    FrameTooLarge { size: u64, max: u64 },

    #[error("File too large: {} ({size} bytes exceeds {max})", path.display())]
    FileTooLarge { path: PathBuf, size: u64, max: u64 },

    /// Repack output directory resolves to the source packages
    #[error("Repack output would overwrite the source packages in {}", .0.display())]
    OutputOverlapsSource(PathBuf),

    /// A frame queued for rebuilding came back unchanged
    #[error("Frame {0} was queued for rebuilding but was not rebuilt")]
    FrameNotRebuilt(u32),

    /// A pipeline task finished without delivering a result
    #[error("Frame task {0} terminated without a result")]
    WorkerLost(u32),

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    Binary(String),
}

impl PackageError {
    /// Whether this error reports content shorter than the manifest claims
    pub fn is_size_mismatch(&self) -> bool {
        matches!(self, Self::SizeMismatch { .. })
    }
}

impl From<binrw::Error> for PackageError {
    fn from(e: binrw::Error) -> Self {
        Self::Binary(e.to_string())
    }
}
