//! Discovery of input files laid out as `<chunk>/<type>/<file>`

use crate::error::{PackageError, Result};
use crate::manifest::SymbolKey;
use crate::source::InputFile;
use std::collections::BTreeMap;
use std::path::{Component, Path};
use tracing::debug;
use walkdir::WalkDir;

/// Walk `input_dir` and group the files it holds by chunk number.
///
/// Accepted layouts are `<chunk>/<type>/<file>` and `<type>/<file>` (chunk
/// 0). A non-numeric chunk directory counts as chunk 0. Paths at other
/// depths or with unparseable symbols are ignored. Groups come back in
/// ascending chunk order; chunk numbers with no files produce no group.
pub fn scan_files(input_dir: &Path) -> Result<Vec<Vec<InputFile>>> {
    let mut chunks: BTreeMap<u64, Vec<InputFile>> = BTreeMap::new();

    for entry in WalkDir::new(input_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_default();
            PackageError::InputRead {
                path,
                source: e.into(),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(input_dir) else {
            continue;
        };
        let parts: Vec<&str> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();

        let (chunk, type_part, file_part) = match parts.as_slice() {
            [chunk, type_part, file_part] => (chunk.parse().unwrap_or(0u64), *type_part, *file_part),
            [type_part, file_part] => (0, *type_part, *file_part),
            _ => continue,
        };
        let (Some(type_symbol), Some(file_symbol)) =
            (parse_symbol(type_part), parse_symbol(file_part))
        else {
            debug!("Ignoring {}", entry.path().display());
            continue;
        };

        let size = entry
            .metadata()
            .map_err(|e| PackageError::InputRead {
                path: entry.path().to_path_buf(),
                source: e.into(),
            })?
            .len();
        let size = u32::try_from(size).map_err(|_| PackageError::FileTooLarge {
            path: entry.path().to_path_buf(),
            size,
            max: u64::from(u32::MAX),
        })?;

        chunks.entry(chunk).or_default().push(InputFile::from_path(
            SymbolKey::new(type_symbol, file_symbol),
            size,
            entry.path(),
        ));
    }

    let groups: Vec<Vec<InputFile>> = chunks.into_values().collect();
    debug!(
        "Scanned {} files in {} chunks under {}",
        groups.iter().map(Vec::len).sum::<usize>(),
        groups.len(),
        input_dir.display()
    );
    Ok(groups)
}

/// Symbol from a path component: extension dropped, hex `u64` first, then
/// decimal `i64`
pub fn parse_symbol(name: &str) -> Option<i64> {
    let stem = match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    };
    u64::from_str_radix(stem, 16)
        .map(|value| value as i64)
        .ok()
        .or_else(|| stem.parse::<i64>().ok())
}
