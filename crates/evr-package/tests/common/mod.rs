#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use evr_package::config::{manifest_path, packages_dir};
use evr_package::{Builder, Manifest, Package, PackageConfig, SymbolKey, manifest, scan_files};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const NAME: &str = "pkg";

/// Write files as `<root>/<chunk>/<type hex>/<file hex>`
pub fn write_tree(root: &Path, files: &[(u32, SymbolKey, Vec<u8>)]) {
    for (chunk, key, data) in files {
        let dir = root
            .join(chunk.to_string())
            .join(format!("{:x}", key.type_symbol as u64));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{:x}", key.file_symbol as u64)), data).unwrap();
    }
}

/// Build `files` into a data directory, manifest included
pub fn build(data_dir: &Path, files: &[(u32, SymbolKey, Vec<u8>)], config: &PackageConfig) -> Manifest {
    let input = tempfile::tempdir().unwrap();
    write_tree(input.path(), files);
    let groups = scan_files(input.path()).unwrap();

    let builder = Builder::new(data_dir, NAME, config.clone());
    let manifest = builder.build(&groups).unwrap();
    builder.write_manifest(&manifest).unwrap();
    manifest
}

/// Open the package set described by the manifest on disk
pub fn open(data_dir: &Path) -> Package {
    let manifest = manifest::read_file(&manifest_path(data_dir, NAME)).unwrap();
    Package::open(manifest, &packages_dir(data_dir).join(NAME)).unwrap()
}

/// Content of every file in the package
pub fn contents(package: &mut Package) -> HashMap<SymbolKey, Vec<u8>> {
    let entries = package.manifest().frame_contents.clone();
    entries
        .iter()
        .map(|content| (content.key(), package.read_content(content).unwrap().to_vec()))
        .collect()
}

/// Incompressible bytes (xorshift)
pub fn noise(seed: u32, len: usize) -> Vec<u8> {
    let mut state = seed.max(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}
