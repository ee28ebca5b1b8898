//! Where an input file's bytes come from

use crate::error::{PackageError, Result};
use crate::manifest::{FrameContent, SymbolKey};
use crate::package::Package;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// Origin of a file's content
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Plain file on disk
    Path(PathBuf),
    /// File stored in an already opened package
    Package {
        package: Arc<Mutex<Package>>,
        content: FrameContent,
    },
}

impl FileSource {
    /// Read the complete content
    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            Self::Path(path) => std::fs::read(path).map_err(|source| PackageError::InputRead {
                path: path.clone(),
                source,
            }),
            Self::Package { package, content } => {
                Ok(package.lock().read_content(content)?.to_vec())
            }
        }
    }
}

/// A file to pack, keyed by its symbols
#[derive(Debug, Clone)]
pub struct InputFile {
    pub key: SymbolKey,
    /// Size recorded when the file was discovered
    pub size: u32,
    pub source: FileSource,
}

impl InputFile {
    pub fn from_path(key: SymbolKey, size: u32, path: impl Into<PathBuf>) -> Self {
        Self {
            key,
            size,
            source: FileSource::Path(path.into()),
        }
    }

    /// File that lives in `package` at `content`
    pub fn from_package(package: &Arc<Mutex<Package>>, content: FrameContent) -> Self {
        Self {
            key: content.key(),
            size: content.size,
            source: FileSource::Package {
                package: Arc::clone(package),
                content,
            },
        }
    }
}
