//! Package construction from grouped input files

use crate::config::{PackageConfig, manifest_path, manifests_dir, packages_dir};
use crate::error::{PackageError, Result};
use crate::manifest::{self, FileMetadata, FrameContent, Manifest};
use crate::source::{FileSource, InputFile};
use crate::writer::{PackageWriter, append_terminators, checked_length};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Builds a fresh package set and manifest under `output_dir`
pub struct Builder {
    output_dir: PathBuf,
    name: String,
    config: PackageConfig,
}

impl Builder {
    pub fn new(output_dir: impl Into<PathBuf>, name: impl Into<String>, config: PackageConfig) -> Self {
        Self {
            output_dir: output_dir.into(),
            name: name.into(),
            config,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Pack each non-empty group into one frame.
    ///
    /// Files are concatenated in group order. Package files are written to
    /// `output_dir/packages`; the returned manifest also carries one
    /// terminator per package file and a final empty frame.
    pub fn build(&self, groups: &[Vec<InputFile>]) -> Result<Manifest> {
        let packages_dir = packages_dir(&self.output_dir);
        let mut writer =
            PackageWriter::create(&packages_dir, &self.name, self.config.max_package_size)?;

        let mut manifest = Manifest::new();
        manifest.header.package_count = 1;

        let mut frame_data = Vec::new();
        for group in groups.iter().filter(|group| !group.is_empty()) {
            let frame_index = manifest.frames.len() as u32;
            frame_data.clear();

            for file in group {
                let data = read_input(file)?;
                manifest.push_file(
                    FrameContent {
                        type_symbol: file.key.type_symbol,
                        file_symbol: file.key.file_symbol,
                        frame_index,
                        data_offset: checked_length(frame_data.len())?,
                        size: checked_length(data.len())?,
                        alignment: 1,
                    },
                    FileMetadata::for_key(file.key),
                );
                frame_data.extend_from_slice(&data);
            }

            let compressed = zstd::bulk::compress(&frame_data, self.config.compression_level)
                .map_err(|source| PackageError::Compress {
                    frame: frame_index,
                    source,
                })?;
            writer.write_frame(&mut manifest, &compressed, checked_length(frame_data.len())?)?;
            debug!(
                "Frame {}: {} files, {} -> {} bytes",
                frame_index,
                group.len(),
                frame_data.len(),
                compressed.len()
            );
        }
        writer.finish()?;

        append_terminators(&mut manifest, &packages_dir, &self.name)?;
        info!(
            "Built {} files in {} frames across {} packages",
            manifest.file_count(),
            manifest.frames.len(),
            manifest.package_count()
        );
        Ok(manifest)
    }

    /// Write `manifest` to `output_dir/manifests/<name>`
    pub fn write_manifest(&self, manifest: &Manifest) -> Result<PathBuf> {
        std::fs::create_dir_all(manifests_dir(&self.output_dir))?;
        let path = manifest_path(&self.output_dir, &self.name);
        manifest::write_file(&path, manifest, self.config.compression_level)?;
        Ok(path)
    }
}

/// Read one input. Files re-read from a package whose frame is shorter than
/// the manifest claims are packed as empty.
fn read_input(file: &InputFile) -> Result<Vec<u8>> {
    match &file.source {
        FileSource::Path(_) => file.source.read(),
        FileSource::Package { .. } => match file.source.read() {
            Ok(data) => Ok(data),
            Err(e) if e.is_size_mismatch() => {
                warn!("Skipping corrupted file {}: {}", file.key, e);
                Ok(Vec::new())
            }
            Err(e) => Err(PackageError::CorruptSource {
                key: file.key,
                source: Box::new(e),
            }),
        },
    }
}
