use crate::{BuildArgs, prepare_output_dir};
use anyhow::{Context, Result, bail};
use evr_package::config::manifest_path;
use evr_package::{Builder, PackageConfig, manifest, quick_repack, repack, scan_files};
use std::path::Path;
use tracing::info;

pub fn handle(args: BuildArgs) -> Result<()> {
    let config = PackageConfig::default().with_compression_level(args.level);

    let groups = scan_files(&args.input)
        .with_context(|| format!("Failed to scan {}", args.input.display()))?;
    let file_count: usize = groups.iter().map(Vec::len).sum();
    info!("Found {file_count} files in {} groups", groups.len());

    match &args.data {
        Some(data) if manifest_path(data, &args.package).exists() => {
            if args.quick {
                handle_quick(&args, data, &groups, &config)
            } else {
                handle_repack(&args, data, &groups, &config)
            }
        }
        Some(data) if args.quick => bail!(
            "No manifest named {} in {}",
            args.package,
            data.display()
        ),
        _ => handle_build(&args, &groups, config),
    }
}

fn output_dir(args: &BuildArgs) -> Result<&Path> {
    args.output
        .as_deref()
        .context("An output directory is required")
}

fn handle_quick(
    args: &BuildArgs,
    data: &Path,
    groups: &[Vec<evr_package::InputFile>],
    config: &PackageConfig,
) -> Result<()> {
    let report = quick_repack(data, &args.package, groups, config).context("Quick repack failed")?;
    println!(
        "Quick repack: {} changed, {} identical, {} frames written",
        report.changed_files, report.identical_files, report.frames_written
    );
    Ok(())
}

fn handle_repack(
    args: &BuildArgs,
    data: &Path,
    groups: &[Vec<evr_package::InputFile>],
    config: &PackageConfig,
) -> Result<()> {
    let output = output_dir(args)?;
    prepare_output_dir(output, args.force)?;

    let source_path = manifest_path(data, &args.package);
    let source = manifest::read_file(&source_path)
        .with_context(|| format!("Failed to read manifest {}", source_path.display()))?;
    let rebuilt = repack(&source, groups, data, output, &args.package, config)
        .context("Repack failed")?;

    println!(
        "Repacked {} files into {} packages at {}",
        rebuilt.file_count(),
        rebuilt.package_count(),
        output.display()
    );
    Ok(())
}

fn handle_build(
    args: &BuildArgs,
    groups: &[Vec<evr_package::InputFile>],
    config: PackageConfig,
) -> Result<()> {
    let output = output_dir(args)?;
    prepare_output_dir(output, args.force)?;

    let builder = Builder::new(output, args.package.as_str(), config);
    let manifest = builder.build(groups).context("Build failed")?;
    let path = builder
        .write_manifest(&manifest)
        .context("Failed to write manifest")?;

    println!(
        "Built {} files into {} packages, manifest at {}",
        manifest.file_count(),
        manifest.package_count(),
        path.display()
    );
    Ok(())
}
