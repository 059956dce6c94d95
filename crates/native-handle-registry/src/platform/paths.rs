//! Address file location.
//!
//! The file is namespaced by OS process id so that two processes sharing a
//! temp directory never read each other's slab address.

use crate::config::RegistryConfig;
use std::path::{Path, PathBuf};

/// Path of the address file for process `pid` inside `dir`.
///
/// Produces `{dir}/native_handle_registry_{pid}.addr`.
pub fn address_file_path(dir: &Path, pid: u32) -> PathBuf {
    dir.join(format!(
        "{}_{}.{}",
        RegistryConfig::ADDRESS_FILE_PREFIX,
        pid,
        RegistryConfig::ADDRESS_FILE_EXTENSION
    ))
}

/// Address file of the current process in the system temp directory.
///
/// # Platform Behavior
/// - **Linux/macOS**: `$TMPDIR` or `/tmp`
/// - **Windows**: `%TEMP%`
pub fn default_address_file() -> PathBuf {
    address_file_path(&std::env::temp_dir(), std::process::id())
}
