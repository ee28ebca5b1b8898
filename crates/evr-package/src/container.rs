//! Single-blob compressed container used for manifest files
//!
//! Layout (little-endian):
//!
//! - Magic: `ZSTD` (0x5A, 0x53, 0x54, 0x44)
//! - Header length: u32, always 16
//! - Uncompressed length: u64
//! - Compressed length: u64
//! - zstd stream of the payload

use crate::error::{PackageError, Result};
use binrw::{BinRead, BinWrite};
use std::io::Cursor;

/// Container magic bytes
pub const CONTAINER_MAGIC: [u8; 4] = *b"ZSTD";

/// Value of the header length field
pub const CONTAINER_HEADER_LENGTH: u32 = 16;

/// Encoded size of [`ContainerHeader`]
pub const CONTAINER_HEADER_SIZE: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct ContainerHeader {
    pub magic: [u8; 4],
    pub header_length: u32,
    /// Uncompressed payload size
    pub length: u64,
    /// Compressed payload size
    pub compressed_length: u64,
}

impl ContainerHeader {
    pub const fn new(length: u64, compressed_length: u64) -> Self {
        Self {
            magic: CONTAINER_MAGIC,
            header_length: CONTAINER_HEADER_LENGTH,
            length,
            compressed_length,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.magic != CONTAINER_MAGIC {
            return Err(PackageError::InvalidMagic(self.magic));
        }
        if self.header_length != CONTAINER_HEADER_LENGTH {
            return Err(PackageError::InvalidHeaderLength(self.header_length));
        }
        if self.length == 0 {
            return Err(PackageError::EmptyContainer("uncompressed"));
        }
        if self.compressed_length == 0 {
            return Err(PackageError::EmptyContainer("compressed"));
        }
        Ok(())
    }
}

/// Compress `data` and prefix it with a container header
pub fn encode(data: &[u8], level: i32) -> Result<Vec<u8>> {
    let compressed = zstd::bulk::compress(data, level)?;
    let header = ContainerHeader::new(data.len() as u64, compressed.len() as u64);

    let mut buffer = Vec::with_capacity(CONTAINER_HEADER_SIZE + compressed.len());
    header.write(&mut Cursor::new(&mut buffer))?;
    buffer.extend_from_slice(&compressed);
    Ok(buffer)
}

/// Validate the container header and return the decompressed payload
pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < CONTAINER_HEADER_SIZE {
        return Err(PackageError::TruncatedData {
            expected: CONTAINER_HEADER_SIZE as u64,
            actual: data.len() as u64,
        });
    }

    let header = ContainerHeader::read(&mut Cursor::new(data))?;
    header.validate()?;

    let payload = &data[CONTAINER_HEADER_SIZE..];
    if (payload.len() as u64) < header.compressed_length {
        return Err(PackageError::TruncatedData {
            expected: header.compressed_length,
            actual: payload.len() as u64,
        });
    }

    let decoded = zstd::stream::decode_all(&payload[..header.compressed_length as usize])?;
    if decoded.len() as u64 != header.length {
        return Err(PackageError::TruncatedData {
            expected: header.length,
            actual: decoded.len() as u64,
        });
    }

    Ok(decoded)
}
