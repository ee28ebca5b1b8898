//! Random access to the frames of a package set
//!
//! A package is the set of physical files `<base>_0 .. <base>_{n-1}` that a
//! manifest points into. [`Package::read_content`] resolves one file through
//! a single-frame decompression cache, so walking the files of a frame in
//! order decompresses it once. [`Package::extract`] writes every file out
//! to a directory tree.

mod extract;

pub use extract::{ExtractOptions, ExtractStats};

use crate::error::{PackageError, Result};
use crate::manifest::{Frame, FrameContent, Manifest};
use std::ffi::OsString;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
struct CachedFrame {
    index: u32,
    data: Vec<u8>,
}

/// Opened package set. Handles close on drop.
#[derive(Debug)]
pub struct Package {
    manifest: Manifest,
    files: Vec<File>,
    cache: Option<CachedFrame>,
}

impl Package {
    /// Open `<base_path>_0 .. <base_path>_{package_count - 1}`
    pub fn open(manifest: Manifest, base_path: &Path) -> Result<Self> {
        let count = manifest.package_count();
        let mut files = Vec::with_capacity(count as usize);
        for index in 0..count {
            let path = indexed_path(base_path, index);
            // Already opened handles drop with `files` on error
            let file = File::open(&path).map_err(|source| PackageError::OpenPackage {
                index,
                path,
                source,
            })?;
            files.push(file);
        }

        debug!(
            "Opened {} package files at {}",
            files.len(),
            base_path.display()
        );
        Ok(Self {
            manifest,
            files,
            cache: None,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn into_manifest(self) -> Manifest {
        self.manifest
    }

    /// Content of one file.
    ///
    /// Zero-length frames yield an empty slice.
    pub fn read_content(&mut self, content: &FrameContent) -> Result<&[u8]> {
        let frame = *self.frame(content.frame_index)?;
        if frame.is_terminator() {
            return Ok(&[]);
        }

        let cached = matches!(&self.cache, Some(c) if c.index == content.frame_index);
        if !cached {
            let mut compressed = Vec::new();
            self.read_frame(content.frame_index, &frame, &mut compressed)?;
            let mut data = Vec::new();
            decompress_into(content.frame_index, &compressed, frame.length, &mut data)?;
            self.cache = Some(CachedFrame {
                index: content.frame_index,
                data,
            });
        }

        let data = self
            .cache
            .as_ref()
            .map(|c| c.data.as_slice())
            .unwrap_or_default();
        slice_content(content, data)
    }

    /// Compressed bytes of one frame, empty for zero-length frames
    pub fn read_raw_frame(&self, index: u32) -> Result<Vec<u8>> {
        let frame = self.frame(index)?;
        let mut buffer = Vec::new();
        if !frame.is_terminator() {
            self.read_frame(index, frame, &mut buffer)?;
        }
        Ok(buffer)
    }

    pub(crate) fn frame(&self, index: u32) -> Result<&Frame> {
        self.manifest
            .frames
            .get(index as usize)
            .ok_or(PackageError::InvalidFrameIndex {
                index,
                count: self.manifest.frames.len(),
            })
    }

    /// Read the compressed bytes of `frame` into `buffer` without touching
    /// the cache. Safe to call from several threads at once.
    pub(crate) fn read_frame(&self, index: u32, frame: &Frame, buffer: &mut Vec<u8>) -> Result<()> {
        let file = self
            .files
            .get(frame.package_index as usize)
            .ok_or(PackageError::InvalidPackageIndex {
                index: frame.package_index,
                count: self.files.len(),
            })?;

        let expected = frame.compressed_size as usize;
        buffer.clear();
        buffer.resize(expected, 0);

        let mut filled = 0;
        while filled < expected {
            match read_at(file, &mut buffer[filled..], u64::from(frame.offset) + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        if filled < expected {
            return Err(PackageError::ShortRead {
                frame: index,
                expected: expected as u64,
                actual: filled as u64,
            });
        }
        Ok(())
    }
}

/// `<base>_<index>`
fn indexed_path(base: &Path, index: u32) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(format!("_{index}"));
    PathBuf::from(path)
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

/// Decompress a frame into `output`, which ends up holding exactly the
/// decompressed bytes.
pub(crate) fn decompress_into(
    index: u32,
    compressed: &[u8],
    length: u32,
    output: &mut Vec<u8>,
) -> Result<()> {
    output.clear();
    output.resize(length as usize, 0);
    let written = zstd::bulk::decompress_to_buffer(compressed, &mut output[..])
        .map_err(|source| PackageError::Decompress {
            frame: index,
            source,
        })?;
    output.truncate(written);
    Ok(())
}

/// Sub-slice of a decompressed frame holding one file
pub(crate) fn slice_content<'a>(content: &FrameContent, data: &'a [u8]) -> Result<&'a [u8]> {
    let end = content.end();
    if (data.len() as u64) < end {
        return Err(PackageError::SizeMismatch {
            frame: content.frame_index,
            expected: end,
            actual: data.len() as u64,
        });
    }
    Ok(&data[content.data_offset as usize..end as usize])
}
