use crate::{ExtractArgs, prepare_output_dir};
use anyhow::{Context, Result};
use evr_package::config::{manifest_path, packages_dir};
use evr_package::{ExtractOptions, Package, manifest};
use tracing::debug;

pub fn handle(args: ExtractArgs) -> Result<()> {
    let manifest_file = manifest_path(&args.data, &args.package);
    let manifest = manifest::read_file(&manifest_file)
        .with_context(|| format!("Failed to read manifest {}", manifest_file.display()))?;
    debug!(
        "Manifest has {} files in {} frames across {} packages",
        manifest.file_count(),
        manifest.frames.len(),
        manifest.package_count()
    );

    let package = Package::open(manifest, &packages_dir(&args.data).join(&args.package))
        .context("Failed to open package files")?;

    prepare_output_dir(&args.output, args.force)?;

    let options = ExtractOptions::new()
        .preserve_groups(args.preserve_groups)
        .decimal_names(args.decimal_names)
        .type_filter(args.type_filter());
    let stats = package
        .extract(&args.output, &options)
        .context("Extraction failed")?;

    println!(
        "Extracted {} files from {} frames to {}",
        stats.files,
        stats.frames,
        args.output.display()
    );
    Ok(())
}
