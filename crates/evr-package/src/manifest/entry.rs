//! Fixed-size manifest records

use binrw::{BinRead, BinWrite};
use std::fmt;

/// Encoded size of a [`FrameContent`] record
pub const FRAME_CONTENT_SIZE: u64 = 32;
/// Encoded size of a [`FileMetadata`] record
pub const FILE_METADATA_SIZE: u64 = 40;
/// Encoded size of a [`Frame`] record
pub const FRAME_SIZE: u64 = 16;

/// `(type symbol, file symbol)` pair addressing one logical file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolKey {
    pub type_symbol: i64,
    pub file_symbol: i64,
}

impl SymbolKey {
    pub const fn new(type_symbol: i64, file_symbol: i64) -> Self {
        Self {
            type_symbol,
            file_symbol,
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:x}/{:x}",
            self.type_symbol as u64, self.file_symbol as u64
        )
    }
}

/// Location of one file inside a frame's decompressed content
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct FrameContent {
    pub type_symbol: i64,
    pub file_symbol: i64,
    /// Index into the manifest's frame table
    pub frame_index: u32,
    /// Byte offset within the decompressed frame
    pub data_offset: u32,
    pub size: u32,
    /// Stored verbatim, no effect on decoding (usually 1)
    pub alignment: u32,
}

impl FrameContent {
    pub const fn key(&self) -> SymbolKey {
        SymbolKey::new(self.type_symbol, self.file_symbol)
    }

    /// Exclusive end of this file's range in the decompressed frame
    pub const fn end(&self) -> u64 {
        self.data_offset as u64 + self.size as u64
    }
}

/// Per-file metadata record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct FileMetadata {
    pub type_symbol: i64,
    pub file_symbol: i64,
    pub reserved1: i64,
    pub reserved2: i64,
    pub asset_type: i64,
}

impl FileMetadata {
    /// Metadata record with only the key filled in
    pub const fn for_key(key: SymbolKey) -> Self {
        Self {
            type_symbol: key.type_symbol,
            file_symbol: key.file_symbol,
            reserved1: 0,
            reserved2: 0,
            asset_type: 0,
        }
    }

    pub const fn key(&self) -> SymbolKey {
        SymbolKey::new(self.type_symbol, self.file_symbol)
    }
}

/// A zstd-compressed block inside one physical package file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct Frame {
    pub package_index: u32,
    pub offset: u32,
    pub compressed_size: u32,
    /// Decompressed size; zero marks a terminator frame
    pub length: u32,
}

impl Frame {
    /// Terminator frames carry bookkeeping only and no content
    pub const fn is_terminator(&self) -> bool {
        self.length == 0
    }

    /// Marker recording the end-of-data offset of one package file
    pub const fn terminator(package_index: u32, end_offset: u32) -> Self {
        Self {
            package_index,
            offset: end_offset,
            compressed_size: 0,
            length: 0,
        }
    }

    /// Exclusive end of the compressed bytes within the package file
    pub const fn end(&self) -> u64 {
        self.offset as u64 + self.compressed_size as u64
    }
}
