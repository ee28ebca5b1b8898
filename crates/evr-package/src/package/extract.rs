//! Extraction of a package set to a directory tree

use super::{Package, decompress_into, slice_content};
use crate::error::Result;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Controls the layout of extracted files
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Prefix each path with the frame index
    pub preserve_groups: bool,
    /// Name files by decimal file symbol instead of hex
    pub decimal_names: bool,
    /// Only extract these type symbols; empty means all
    pub type_filter: HashSet<i64>,
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preserve_groups(mut self, preserve: bool) -> Self {
        self.preserve_groups = preserve;
        self
    }

    pub fn decimal_names(mut self, decimal: bool) -> Self {
        self.decimal_names = decimal;
        self
    }

    pub fn type_filter(mut self, types: impl IntoIterator<Item = i64>) -> Self {
        self.type_filter = types.into_iter().collect();
        self
    }

    fn allows(&self, type_symbol: i64) -> bool {
        self.type_filter.is_empty() || self.type_filter.contains(&type_symbol)
    }

    fn file_dir(&self, output_dir: &Path, frame_index: u32, type_symbol: i64) -> PathBuf {
        let type_dir = format!("{:x}", type_symbol as u64);
        if self.preserve_groups {
            output_dir.join(frame_index.to_string()).join(type_dir)
        } else {
            output_dir.join(type_dir)
        }
    }

    fn file_name(&self, file_symbol: i64) -> String {
        if self.decimal_names {
            file_symbol.to_string()
        } else {
            format!("{:x}", file_symbol as u64)
        }
    }
}

/// Counters reported by [`Package::extract`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Frames decompressed
    pub frames: usize,
    /// Files written
    pub files: usize,
}

impl Package {
    /// Write every file to `output_dir/[frame/]type/file`.
    ///
    /// Each frame is read and decompressed once; terminator frames are
    /// skipped. The first failure aborts the extraction.
    pub fn extract(&self, output_dir: &Path, options: &ExtractOptions) -> Result<ExtractStats> {
        let by_frame = self.manifest.contents_by_frame();
        let mut compressed = Vec::new();
        let mut decompressed = Vec::new();
        let mut created_dirs: HashSet<PathBuf> = HashSet::new();
        let mut stats = ExtractStats::default();

        for (index, frame) in self.manifest.frames.iter().enumerate() {
            let index = index as u32;
            if frame.length == 0 || frame.compressed_size == 0 {
                continue;
            }

            let Some(contents) = by_frame.get(&index) else {
                continue;
            };
            let wanted: Vec<usize> = contents
                .iter()
                .copied()
                .filter(|&i| options.allows(self.manifest.frame_contents[i].type_symbol))
                .collect();
            if wanted.is_empty() {
                continue;
            }

            self.read_frame(index, frame, &mut compressed)?;
            decompress_into(index, &compressed, frame.length, &mut decompressed)?;
            stats.frames += 1;

            for i in wanted {
                let content = &self.manifest.frame_contents[i];
                let dir = options.file_dir(output_dir, index, content.type_symbol);
                if !created_dirs.contains(&dir) {
                    fs::create_dir_all(&dir)?;
                    created_dirs.insert(dir.clone());
                }

                let path = dir.join(options.file_name(content.file_symbol));
                fs::write(&path, slice_content(content, &decompressed)?)?;
                stats.files += 1;
            }
            debug!("Extracted frame {}", index);
        }

        info!(
            "Extracted {} files from {} frames to {}",
            stats.files,
            stats.frames,
            output_dir.display()
        );
        Ok(stats)
    }
}
