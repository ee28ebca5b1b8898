//! Selective rewriting of frames touched by modified files
//!
//! Both variants share the per-frame work in [`FrameTask::process_frame`]:
//! untouched frames pass their compressed bytes straight through, touched
//! frames are decompressed, rebuilt with the replacement files spliced in
//! at their original positions and recompressed. Frames run in parallel
//! through [`crate::pipeline::run_ordered`] and are written in order.
//!
//! - [`repack`] writes a complete new package set and manifest.
//! - [`quick_repack`] appends only the rebuilt frames to the existing set.

mod full;
mod quick;

pub use full::repack;
pub use quick::{QuickRepackReport, quick_repack};

use crate::error::{PackageError, Result};
use crate::manifest::{Frame, FrameContent, SymbolKey};
use crate::package::{Package, decompress_into, slice_content};
use crate::pool::{FramePools, PooledBuffer};
use crate::source::{FileSource, InputFile};
use crate::writer::checked_length;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Result of processing one source frame
pub(crate) enum FrameOutcome {
    /// Unaffected frame; `data` is the original compressed bytes
    Passthrough { data: PooledBuffer, length: u32 },
    /// Zero-length frame that could not be read
    Marker,
    Rebuilt(RebuiltFrame),
}

impl FrameOutcome {
    /// The rebuilt frame, or an error for a frame `index` that was queued
    /// for rebuilding but came back as a passthrough or marker
    pub fn into_rebuilt(self, index: u32) -> Result<RebuiltFrame> {
        match self {
            Self::Rebuilt(frame) => Ok(frame),
            Self::Passthrough { .. } | Self::Marker => Err(PackageError::FrameNotRebuilt(index)),
        }
    }
}

pub(crate) struct RebuiltFrame {
    pub index: u32,
    pub data: PooledBuffer,
    /// Decompressed size
    pub length: u32,
    /// New file sizes, in the frame's data offset order
    pub sizes: Vec<u32>,
}

/// Everything a frame task reads. Shared read-only between tasks.
pub(crate) struct FrameTask {
    pub package: Package,
    /// Positions in `frame_contents` per frame, sorted by data offset
    pub by_frame: HashMap<u32, Vec<usize>>,
    pub replacements: HashMap<SymbolKey, FileSource>,
    pub affected: BTreeSet<u32>,
    pub pools: FramePools,
    pub compression_level: i32,
}

impl FrameTask {
    pub fn contents(&self) -> &[FrameContent] {
        &self.package.manifest().frame_contents
    }

    /// Files of `index` in data offset order
    pub fn frame_files(&self, index: u32) -> &[usize] {
        self.by_frame.get(&index).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn process_frame(&self, index: u32) -> Result<FrameOutcome> {
        let frame = *self.package.frame(index)?;
        if !self.affected.contains(&index) {
            return self.pass_through(index, &frame);
        }

        // A zero-length frame holds only empty files, nothing to decompress
        let mut decompressed = self.pools.decompressed.get(frame.length as usize);
        if frame.length > 0 {
            let mut read = self.pools.read.get(frame.compressed_size as usize);
            self.package.read_frame(index, &frame, &mut read)?;
            decompress_into(index, &read, frame.length, &mut decompressed)?;
        }

        let files = self.frame_files(index);
        let mut construction = self.pools.construction.get(decompressed.len());
        let mut sizes = Vec::with_capacity(files.len());
        for &position in files {
            let content = &self.contents()[position];
            match self.replacements.get(&content.key()) {
                Some(source) => {
                    let data = source.read()?;
                    construction.extend_from_slice(&data);
                    sizes.push(checked_length(data.len())?);
                }
                None => {
                    construction.extend_from_slice(slice_content(content, &decompressed)?);
                    sizes.push(content.size);
                }
            }
        }
        drop(decompressed);
        let length = checked_length(construction.len())?;

        let bound = zstd::zstd_safe::compress_bound(construction.len());
        let mut compressed = self.pools.compressed.get(bound);
        compressed.resize(bound, 0);
        let written =
            zstd::bulk::compress_to_buffer(&construction, &mut compressed[..], self.compression_level)
                .map_err(|source| PackageError::Compress {
                    frame: index,
                    source,
                })?;
        compressed.truncate(written);

        debug!("Rebuilt frame {}: {} -> {} bytes", index, length, written);
        Ok(FrameOutcome::Rebuilt(RebuiltFrame {
            index,
            data: compressed,
            length,
            sizes,
        }))
    }

    /// Original compressed bytes of an unaffected frame. A zero-length frame
    /// that cannot be read becomes a marker.
    fn pass_through(&self, index: u32, frame: &Frame) -> Result<FrameOutcome> {
        let mut read = self.pools.read.get(frame.compressed_size as usize);
        if frame.compressed_size > 0 {
            if let Err(e) = self.package.read_frame(index, frame, &mut read) {
                if frame.is_terminator() {
                    debug!("Unreadable zero-length frame {}: {}", index, e);
                    return Ok(FrameOutcome::Marker);
                }
                return Err(e);
            }
        }
        Ok(FrameOutcome::Passthrough {
            data: read,
            length: frame.length,
        })
    }

    /// Rewrite the offsets and sizes of a rebuilt frame's files in
    /// `contents`, pointing them at `frame_index`.
    pub fn apply_sizes(&self, rebuilt: &RebuiltFrame, frame_index: u32, contents: &mut [FrameContent]) {
        // Sizes sum to `rebuilt.length`, so the offset stays within u32
        let mut offset = 0u32;
        for (&position, &size) in self.frame_files(rebuilt.index).iter().zip(&rebuilt.sizes) {
            let content = &mut contents[position];
            content.frame_index = frame_index;
            content.data_offset = offset;
            content.size = size;
            offset += size;
        }
    }
}

/// Modified files that exist in the manifest, keyed by symbol. Later
/// entries win over earlier ones with the same key.
pub(crate) fn match_modified<'a>(
    lookup: &HashMap<SymbolKey, usize>,
    modified: &'a [Vec<InputFile>],
) -> HashMap<SymbolKey, &'a InputFile> {
    modified
        .iter()
        .flatten()
        .filter(|file| lookup.contains_key(&file.key))
        .map(|file| (file.key, file))
        .collect()
}

/// Bounded queue depth for the ordered pipeline
pub(crate) fn lookahead(multiplier: usize) -> usize {
    (rayon::current_num_threads() * multiplier).max(1)
}
