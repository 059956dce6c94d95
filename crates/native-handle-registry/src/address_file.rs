//! Persistence of the slab base address.
//!
//! The file holds nothing but the decimal form of an address. Writes go
//! through a temp file, fsync and rename, so a reader never observes a
//! partially written number.

use crate::error::{RegistryError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process;
use tracing::debug;

/// Read the slab address persisted at `path`.
///
/// Returns `None` if the file doesn't exist, or `CorruptAddressFile` if its
/// content is not a decimal integer.
pub fn read_address(path: &Path) -> Result<Option<usize>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(RegistryError::io_with_path(e, path)),
    };

    let address = contents
        .trim()
        .parse::<usize>()
        .map_err(|_| RegistryError::CorruptAddressFile {
            path: path.to_path_buf(),
            contents: contents.clone(),
        })?;

    debug!("Read slab address {:#x} from {}", address, path.display());
    Ok(Some(address))
}

/// Persist `address` to `path` as a decimal string.
pub fn write_address(path: &Path, address: usize) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| RegistryError::io_with_path(e, parent))?;
        }
    }

    let temp_path = path.with_extension(format!("{}.tmp", process::id()));

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| RegistryError::io_with_path(e, &temp_path))?;

        file.write_all(address.to_string().as_bytes())
            .map_err(|e| RegistryError::io_with_path(e, &temp_path))?;

        file.sync_all()
            .map_err(|e| RegistryError::io_with_path(e, &temp_path))?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        RegistryError::io_with_path(e, path)
    })?;

    debug!("Wrote slab address {:#x} to {}", address, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.addr");

        write_address(&path, 0x7f00_dead_b000).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            0x7f00_dead_b000usize.to_string()
        );
        assert_eq!(read_address(&path).unwrap(), Some(0x7f00_dead_b000));
    }

    #[test]
    fn test_read_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.addr");

        assert_eq!(read_address(&path).unwrap(), None);
    }

    #[test]
    fn test_read_tolerates_trailing_newline() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.addr");
        fs::write(&path, "4096\n").unwrap();

        assert_eq!(read_address(&path).unwrap(), Some(4096));
    }

    #[test]
    fn test_read_corrupt_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.addr");
        fs::write(&path, "0xnot-a-number").unwrap();

        let err = read_address(&path).unwrap_err();
        assert!(err.is_fatal());
        match err {
            RegistryError::CorruptAddressFile { contents, .. } => {
                assert_eq!(contents, "0xnot-a-number");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_read_empty_file_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.addr");
        fs::write(&path, "").unwrap();

        assert!(matches!(
            read_address(&path),
            Err(RegistryError::CorruptAddressFile { .. })
        ));
    }

    #[test]
    fn test_write_into_file_parent_reports_path() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        let path = blocker.join("registry.addr");

        match write_address(&path, 8).unwrap_err() {
            RegistryError::Io {
                path: Some(reported),
                source,
                ..
            } => {
                assert!(reported.starts_with(&blocker));
                assert!(source.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_write_creates_directories_and_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("dir");
        let path = dir.join("registry.addr");

        write_address(&path, 8).unwrap();
        assert!(path.exists());

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
