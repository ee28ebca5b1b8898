use super::{FrameOutcome, FrameTask, lookahead, match_modified};
use crate::config::{PackageConfig, manifest_path, manifests_dir, packages_dir};
use crate::error::{PackageError, Result};
use crate::manifest::{self, Manifest};
use crate::package::Package;
use crate::pipeline::run_ordered;
use crate::pool::FramePools;
use crate::source::InputFile;
use crate::writer::{PackageWriter, append_terminators};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Rebuild the package set `name` from `data_dir` into `output_dir` with
/// `modified` files replacing their originals.
///
/// Unaffected frames are copied byte for byte. The new manifest is written
/// to `output_dir/manifests/<name>` and returned.
pub fn repack(
    manifest: &Manifest,
    modified: &[Vec<InputFile>],
    data_dir: &Path,
    output_dir: &Path,
    name: &str,
    config: &PackageConfig,
) -> Result<Manifest> {
    let source_packages = packages_dir(data_dir);
    let output_packages = packages_dir(output_dir);
    fs::create_dir_all(&output_packages)?;
    if fs::canonicalize(&source_packages)? == fs::canonicalize(&output_packages)? {
        return Err(PackageError::OutputOverlapsSource(output_packages));
    }

    let lookup = manifest.content_lookup();
    let matched = match_modified(&lookup, modified);
    let affected: BTreeSet<u32> = matched
        .keys()
        .filter_map(|key| lookup.get(key))
        .map(|&position| manifest.frame_contents[position].frame_index)
        .collect();
    info!(
        "Mapped {} modified files to {} frames",
        matched.len(),
        affected.len()
    );

    // Trailing terminators are regenerated, everything before them is kept
    let last_content = manifest.frames.iter().rposition(|frame| !frame.is_terminator());
    let last_referenced = manifest
        .frame_contents
        .iter()
        .map(|content| content.frame_index as usize)
        .max();
    let frame_count = match last_content.max(last_referenced) {
        Some(last) => (last + 1).min(manifest.frames.len()),
        None => 0,
    };

    let depth = lookahead(config.lookahead_multiplier);
    let task = Arc::new(FrameTask {
        package: Package::open(manifest.clone(), &source_packages.join(name))?,
        by_frame: manifest.contents_by_frame(),
        replacements: matched
            .into_iter()
            .map(|(key, file)| (key, file.source.clone()))
            .collect(),
        affected,
        pools: FramePools::new(depth),
        compression_level: config.compression_level,
    });

    let mut rebuilt = manifest.clone();
    rebuilt.frames = Vec::new();
    rebuilt.header.frames.clear();
    rebuilt.header.package_count = 0;

    let mut writer = PackageWriter::create(&output_packages, name, config.max_package_size)?;
    info!("Repacking {} frames", frame_count);

    let worker = Arc::clone(&task);
    run_ordered(
        0..frame_count as u32,
        depth,
        move |index| worker.process_frame(index),
        |outcome| {
            match outcome {
                FrameOutcome::Passthrough { data, length } => {
                    writer.write_frame(&mut rebuilt, &data, length)?;
                }
                FrameOutcome::Marker => {
                    writer.write_frame(&mut rebuilt, &[], 0)?;
                }
                FrameOutcome::Rebuilt(frame) => {
                    task.apply_sizes(&frame, frame.index, &mut rebuilt.frame_contents);
                    writer.write_frame(&mut rebuilt, &frame.data, frame.length)?;
                }
            }
            Ok(())
        },
    )?;
    writer.finish()?;

    append_terminators(&mut rebuilt, &output_packages, name)?;

    fs::create_dir_all(manifests_dir(output_dir))?;
    manifest::write_file(
        &manifest_path(output_dir, name),
        &rebuilt,
        config.compression_level,
    )?;
    info!(
        "Repacked {} frames into {} packages",
        frame_count,
        rebuilt.package_count()
    );
    Ok(rebuilt)
}
