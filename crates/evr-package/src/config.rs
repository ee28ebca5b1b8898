//! Build and repack configuration

use std::path::{Path, PathBuf};

/// Largest byte offset a frame may reach inside one package file
pub const MAX_PACKAGE_SIZE: u64 = i32::MAX as u64;

/// zstd level used for frames and manifests (fastest)
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 1;

/// Tunables shared by the builder and the repack pipelines
#[derive(Debug, Clone)]
pub struct PackageConfig {
    /// zstd compression level
    pub compression_level: i32,
    /// Rotation bound for a single package file
    pub max_package_size: u64,
    /// Full repack lookahead, in multiples of the worker count
    pub lookahead_multiplier: usize,
    /// Quick repack lookahead, in multiples of the worker count
    pub quick_lookahead_multiplier: usize,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            max_package_size: MAX_PACKAGE_SIZE,
            lookahead_multiplier: 16,
            quick_lookahead_multiplier: 4,
        }
    }
}

impl PackageConfig {
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    pub fn with_max_package_size(mut self, size: u64) -> Self {
        self.max_package_size = size;
        self
    }
}

/// Directory holding the physical package files of a data directory
pub fn packages_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("packages")
}

/// Directory holding the manifests of a data directory
pub fn manifests_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("manifests")
}

/// Path of the manifest for `name`
pub fn manifest_path(data_dir: &Path, name: &str) -> PathBuf {
    manifests_dir(data_dir).join(name)
}

/// Path of physical package file `index` (`<name>_<index>`)
pub fn package_file_path(packages_dir: &Path, name: &str, index: u32) -> PathBuf {
    packages_dir.join(format!("{name}_{index}"))
}
