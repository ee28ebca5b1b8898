//! evrtools command-line library
//!
//! Argument definitions and command handlers for the `evrtools` binary.

pub mod commands;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};

/// Asset families that `--export` can select
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Textures,
    Tints,
}

impl ExportKind {
    /// Type symbols belonging to this family
    pub fn type_symbols(self) -> &'static [i64] {
        match self {
            Self::Textures => &[
                0xBEAC1969CB7B8861_u64 as i64,
                0x4A4C32C49300B8A0,
                0xE2EFE7289D5985B8_u64 as i64,
                0x489BB35D53CA50E9,
            ],
            Self::Tints => &[0x24CBFD54E9A7F2EA, 0x32F30FE361939DEE],
        }
    }
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Data directory holding manifests/ and packages/
    #[arg(short, long)]
    pub data: PathBuf,

    /// Package name (e.g. 48037dc70b0ecab2)
    #[arg(short, long)]
    pub package: String,

    /// Output directory
    #[arg(short, long)]
    pub output: PathBuf,

    /// Prefix extracted paths with the frame index
    #[arg(long)]
    pub preserve_groups: bool,

    /// Name files by decimal file symbol instead of hex
    #[arg(long)]
    pub decimal_names: bool,

    /// Only extract these asset families
    #[arg(long, value_enum, value_delimiter = ',')]
    pub export: Vec<ExportKind>,

    /// Only extract this type symbol (hex, repeatable)
    #[arg(long = "type", value_parser = parse_type_symbol)]
    pub types: Vec<i64>,

    /// Allow a non-empty output directory
    #[arg(short, long)]
    pub force: bool,
}

impl ExtractArgs {
    /// Combined type filter from `--export` and `--type`
    pub fn type_filter(&self) -> Vec<i64> {
        self.export
            .iter()
            .flat_map(|kind| kind.type_symbols().iter().copied())
            .chain(self.types.iter().copied())
            .collect()
    }
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Input directory laid out as <chunk>/<type>/<file>
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output directory (not needed with --quick)
    #[arg(short, long, required_unless_present = "quick")]
    pub output: Option<PathBuf>,

    /// Package name
    #[arg(short, long, default_value = "package")]
    pub package: String,

    /// Data directory of an existing package to repack
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Modify the existing package in place
    #[arg(short, long, requires = "data")]
    pub quick: bool,

    /// zstd compression level
    #[arg(short, long, default_value_t = evr_package::config::DEFAULT_COMPRESSION_LEVEL)]
    pub level: i32,

    /// Allow a non-empty output directory
    #[arg(short, long)]
    pub force: bool,
}

/// Parse a type symbol given in hex, with or without `0x`
pub fn parse_type_symbol(value: &str) -> std::result::Result<i64, String> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map(|symbol| symbol as i64)
        .map_err(|e| format!("invalid type symbol '{value}': {e}"))
}

/// Create `path` and refuse to reuse a non-empty directory unless forced
pub fn prepare_output_dir(path: &Path, force: bool) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create output directory {}", path.display()))?;

    if !force {
        let mut entries = fs::read_dir(path)
            .with_context(|| format!("Failed to read output directory {}", path.display()))?;
        if entries.next().is_some() {
            bail!(
                "Output directory {} is not empty (use --force to override)",
                path.display()
            );
        }
    }
    Ok(())
}
