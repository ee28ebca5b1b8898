//! Rotation-aware writer for physical package files

use crate::config::package_file_path;
use crate::error::{PackageError, Result};
use crate::manifest::{Frame, Manifest};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

struct OpenPackage {
    index: u32,
    writer: BufWriter<File>,
    offset: u64,
}

/// Appends compressed frames to `<name>_<index>` files, starting a new file
/// whenever the next frame would cross the size limit.
pub struct PackageWriter {
    packages_dir: PathBuf,
    name: String,
    max_package_size: u64,
    /// Lowest index this writer may write to
    min_package_index: u32,
    /// Indices already created (truncated) or protected in this run
    created: HashSet<u32>,
    current: Option<OpenPackage>,
}

impl PackageWriter {
    /// Create a writer for packages under `packages_dir`
    pub fn create(packages_dir: &Path, name: &str, max_package_size: u64) -> Result<Self> {
        fs::create_dir_all(packages_dir)?;
        debug!(
            "Creating package writer for {}/{}_*",
            packages_dir.display(),
            name
        );

        Ok(Self {
            packages_dir: packages_dir.to_path_buf(),
            name: name.to_string(),
            max_package_size,
            min_package_index: 0,
            created: HashSet::new(),
            current: None,
        })
    }

    /// Never write into packages below `index`; they hold original data
    pub fn with_min_package_index(mut self, index: u32) -> Self {
        self.min_package_index = index;
        self.created.extend(0..index);
        self
    }

    /// Append one compressed frame and record it in the manifest.
    ///
    /// Returns the index of the new frame.
    pub fn write_frame(&mut self, manifest: &mut Manifest, data: &[u8], length: u32) -> Result<u32> {
        let size = data.len() as u64;
        if size > self.max_package_size {
            return Err(PackageError::FrameTooLarge {
                size,
                max: self.max_package_size,
            });
        }

        let mut index = self
            .current
            .as_ref()
            .map_or(self.min_package_index, |open| open.index);
        let max_package_size = self.max_package_size;

        loop {
            let offset = self.open_package(index)?.offset;
            if offset + size <= max_package_size {
                break;
            }
            debug!("Package {} full at {} bytes, rotating", index, offset);
            index += 1;
        }
        let open = self.open_package(index)?;

        open.writer.write_all(data)?;
        let frame = Frame {
            package_index: open.index,
            offset: open.offset as u32,
            compressed_size: size as u32,
            length,
        };
        open.offset += size;

        manifest.header.package_count = manifest.header.package_count.max(frame.package_index + 1);
        Ok(manifest.push_frame(frame))
    }

    fn open_package(&mut self, index: u32) -> Result<&mut OpenPackage> {
        let open = match self.current.take() {
            Some(open) if open.index == index => open,
            previous => {
                if let Some(mut previous) = previous {
                    previous.writer.flush()?;
                }
                self.open_new(index)?
            }
        };
        Ok(self.current.insert(open))
    }

    fn open_new(&mut self, index: u32) -> Result<OpenPackage> {
        let path = package_file_path(&self.packages_dir, &self.name, index);
        let file = if self.created.insert(index) {
            debug!("Creating package {}", path.display());
            File::create(&path)
        } else {
            debug!("Appending to package {}", path.display());
            OpenOptions::new().create(true).append(true).open(&path)
        }
        .map_err(|source| PackageError::OpenPackage {
            index,
            path: path.clone(),
            source,
        })?;

        let offset = file.metadata()?.len();
        Ok(OpenPackage {
            index,
            writer: BufWriter::new(file),
            offset,
        })
    }

    /// Flush and close the open package file
    pub fn finish(&mut self) -> Result<()> {
        if let Some(mut open) = self.current.take() {
            open.writer.flush()?;
        }
        Ok(())
    }
}

/// Frame or file length as stored in the manifest
pub(crate) fn checked_length(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| PackageError::FrameTooLarge {
        size: len as u64,
        max: u64::from(u32::MAX),
    })
}

/// Append one end-of-data marker per package file, sized from disk, plus the
/// final empty frame.
pub fn append_terminators(manifest: &mut Manifest, packages_dir: &Path, name: &str) -> Result<()> {
    for index in 0..manifest.header.package_count {
        let path = package_file_path(packages_dir, name, index);
        let size = match fs::metadata(&path) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        manifest.push_frame(Frame::terminator(index, size as u32));
    }
    manifest.push_frame(Frame::default());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sequential_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::new();
        let mut writer = PackageWriter::create(dir.path(), "pkg", 1024).unwrap();

        assert_eq!(writer.write_frame(&mut manifest, &[1; 10], 40).unwrap(), 0);
        assert_eq!(writer.write_frame(&mut manifest, &[2; 20], 80).unwrap(), 1);
        writer.finish().unwrap();

        assert_eq!(manifest.package_count(), 1);
        assert_eq!(
            manifest.frames,
            vec![
                Frame {
                    package_index: 0,
                    offset: 0,
                    compressed_size: 10,
                    length: 40
                },
                Frame {
                    package_index: 0,
                    offset: 10,
                    compressed_size: 20,
                    length: 80
                },
            ]
        );
        let bytes = fs::read(dir.path().join("pkg_0")).unwrap();
        assert_eq!(bytes.len(), 30);
        assert_eq!(&bytes[10..], &[2; 20]);
    }

    #[test]
    fn test_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::new();
        let mut writer = PackageWriter::create(dir.path(), "pkg", 100).unwrap();

        writer.write_frame(&mut manifest, &[0; 60], 1).unwrap();
        // 60 + 40 == limit still fits
        writer.write_frame(&mut manifest, &[0; 40], 1).unwrap();
        writer.write_frame(&mut manifest, &[0; 1], 1).unwrap();
        writer.finish().unwrap();

        assert_eq!(manifest.package_count(), 2);
        assert_eq!(manifest.frames[1].package_index, 0);
        assert_eq!(manifest.frames[1].offset, 60);
        assert_eq!(manifest.frames[2].package_index, 1);
        assert_eq!(manifest.frames[2].offset, 0);
        for frame in &manifest.frames {
            assert!(frame.end() <= 100);
        }
    }

    #[test]
    fn test_frame_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::new();
        let mut writer = PackageWriter::create(dir.path(), "pkg", 10).unwrap();
        assert!(matches!(
            writer.write_frame(&mut manifest, &[0; 11], 1),
            Err(PackageError::FrameTooLarge { size: 11, max: 10 })
        ));
    }

    #[test]
    fn test_min_package_index_protects_originals() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pkg_0"), b"original").unwrap();
        fs::write(dir.path().join("pkg_1"), b"stale data").unwrap();

        let mut manifest = Manifest::new();
        manifest.header.package_count = 1;
        let mut writer = PackageWriter::create(dir.path(), "pkg", 1024)
            .unwrap()
            .with_min_package_index(1);
        writer.write_frame(&mut manifest, b"new", 3).unwrap();
        writer.finish().unwrap();

        assert_eq!(fs::read(dir.path().join("pkg_0")).unwrap(), b"original");
        // Unprotected packages are recreated, not appended to
        assert_eq!(fs::read(dir.path().join("pkg_1")).unwrap(), b"new");
        assert_eq!(manifest.package_count(), 2);
        assert_eq!(manifest.frames[0].package_index, 1);
        assert_eq!(manifest.frames[0].offset, 0);
    }

    #[test]
    fn test_checked_length() {
        assert_eq!(checked_length(0).unwrap(), 0);
        assert_eq!(checked_length(u32::MAX as usize).unwrap(), u32::MAX);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_checked_length_rejects_4gib() {
        assert!(matches!(
            checked_length(u32::MAX as usize + 1),
            Err(PackageError::FrameTooLarge { size: 4_294_967_296, .. })
        ));
    }

    #[test]
    fn test_terminators_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = Manifest::new();
        let mut writer = PackageWriter::create(dir.path(), "pkg", 50).unwrap();
        writer.write_frame(&mut manifest, &[0; 30], 1).unwrap();
        writer.write_frame(&mut manifest, &[0; 30], 1).unwrap();
        writer.finish().unwrap();

        append_terminators(&mut manifest, dir.path(), "pkg").unwrap();
        assert_eq!(
            &manifest.frames[2..],
            &[
                Frame::terminator(0, 30),
                Frame::terminator(1, 30),
                Frame::default()
            ]
        );
        assert_eq!(manifest.header.frames.element_count, 5);
    }
}
