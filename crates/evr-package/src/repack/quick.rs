use super::{FrameTask, lookahead, match_modified};
use crate::config::{PackageConfig, manifest_path, packages_dir};
use crate::error::Result;
use crate::manifest::{self, Manifest, SymbolKey};
use crate::package::Package;
use crate::pipeline::run_ordered;
use crate::pool::FramePools;
use crate::source::{FileSource, InputFile};
use crate::writer::PackageWriter;
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of a [`quick_repack`] run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuickRepackReport {
    /// Files whose content differs from the original
    pub changed_files: usize,
    /// Candidates skipped because they match the original byte for byte
    pub identical_files: usize,
    /// Frames appended to the package set
    pub frames_written: usize,
}

/// Apply `modified` files to the package set `name` in `data_dir` in place.
///
/// The first run saves the live manifest as `<name>.bak`; every run starts
/// from that backup, so repeating a run with the same files gives the same
/// result. Rebuilt frames are appended in packages past the original ones
/// and the affected files are repointed to them. Original frames are left
/// where they are.
pub fn quick_repack(
    data_dir: &Path,
    name: &str,
    modified: &[Vec<InputFile>],
    config: &PackageConfig,
) -> Result<QuickRepackReport> {
    let live_path = manifest_path(data_dir, name);
    let backup_path = with_suffix(&live_path, ".bak");
    let legacy_path = with_suffix(&live_path, "_original");

    if legacy_path.exists() && !backup_path.exists() {
        info!("Renaming legacy backup {}", legacy_path.display());
        fs::rename(&legacy_path, &backup_path)?;
    }

    let source = if backup_path.exists() {
        info!("Loading original manifest from {}", backup_path.display());
        let source = manifest::read_file(&backup_path)?;
        if let Ok(live) = manifest::read_file(&live_path)
            && backup_is_stale(&source, &live)
        {
            warn!(
                "{} has fewer frames or packages than its backup {}; the backup may predate an update",
                live_path.display(),
                backup_path.display()
            );
        }
        source
    } else {
        let source = manifest::read_file(&live_path)?;
        info!("Backing up original manifest to {}", backup_path.display());
        fs::copy(&live_path, &backup_path)?;
        source
    };
    let min_package_index = source.package_count();

    let packages = packages_dir(data_dir);
    let mut package = Package::open(source.clone(), &packages.join(name))?;

    let lookup = source.content_lookup();
    let matched = match_modified(&lookup, modified);

    // Cheap check first: only same-size candidates are compared byte for byte
    let mut candidates: Vec<(usize, &InputFile)> = matched
        .values()
        .filter_map(|file| lookup.get(&file.key).map(|&position| (position, *file)))
        .collect();
    candidates.sort_by_key(|&(position, _)| {
        let content = &source.frame_contents[position];
        (content.frame_index, content.data_offset)
    });

    let mut report = QuickRepackReport::default();
    let mut replacements: HashMap<SymbolKey, FileSource> = HashMap::new();
    let mut affected = BTreeSet::new();
    for (position, file) in candidates {
        let content = source.frame_contents[position];
        let data = file.source.read()?;
        let identical = data.len() == content.size as usize
            && package
                .read_content(&content)
                .is_ok_and(|original| original == data.as_slice());
        if identical {
            report.identical_files += 1;
            continue;
        }
        replacements.insert(file.key, file.source.clone());
        affected.insert(content.frame_index);
    }
    report.changed_files = replacements.len();

    if report.identical_files > 0 {
        info!("Skipped {} identical files", report.identical_files);
    }
    if replacements.is_empty() {
        info!("No files changed, restoring original manifest");
        fs::copy(&backup_path, &live_path)?;
        return Ok(report);
    }
    info!(
        "Rebuilding {} frames for {} changed files",
        affected.len(),
        report.changed_files
    );

    let depth = lookahead(config.quick_lookahead_multiplier);
    let frames: Vec<u32> = affected.iter().copied().collect();
    let task = Arc::new(FrameTask {
        package,
        by_frame: source.contents_by_frame(),
        replacements,
        affected,
        pools: FramePools::new(depth),
        compression_level: config.compression_level,
    });

    let mut updated = source;
    let mut writer = PackageWriter::create(&packages, name, config.max_package_size)?
        .with_min_package_index(min_package_index);

    let worker = Arc::clone(&task);
    run_ordered(
        frames,
        depth,
        move |index| worker.process_frame(index).map(|outcome| (index, outcome)),
        |(index, outcome)| {
            // Every dispatched frame is affected
            let frame = outcome.into_rebuilt(index)?;
            let new_index = updated.frames.len() as u32;
            task.apply_sizes(&frame, new_index, &mut updated.frame_contents);
            writer.write_frame(&mut updated, &frame.data, frame.length)?;
            debug!("Frame {} moved to {}", frame.index, new_index);
            report.frames_written += 1;
            Ok(())
        },
    )?;
    writer.finish()?;

    manifest::write_file(&live_path, &updated, config.compression_level)?;
    info!(
        "Updated {}: {} frames appended",
        live_path.display(),
        report.frames_written
    );
    Ok(report)
}

/// Quick repack only ever appends to the backup, so a live manifest
/// smaller than it was replaced by something else
fn backup_is_stale(backup: &Manifest, live: &Manifest) -> bool {
    live.frames.len() < backup.frames.len() || live.package_count() < backup.package_count()
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
