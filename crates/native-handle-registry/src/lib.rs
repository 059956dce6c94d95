//! Native Handle Registry - leak recovery for native handles across in-process
//! runtime restarts.
//!
//! Code that embeds a native library creates and destroys native handles.
//! When the runtime above it is torn down and restarted inside the same OS
//! process (a development hot-reload, for example), handles that were never
//! released would leak for the rest of the process's life. This crate keeps
//! their addresses in a fixed slab of native memory whose own address is
//! written to a small per-process file, so the next runtime instance can find
//! the slab again and release whatever is still in it.
//!
//! The registry only does anything in debug builds. In release and profile
//! builds every operation returns immediately.
//!
//! # Example
//!
//! ```rust,ignore
//! use native_handle_registry::{HandleRegistry, NativeHandle};
//!
//! let registry = HandleRegistry::new();
//! registry.ensure_initialized(|leaked| {
//!     for handle in leaked {
//!         my_lib_destroy(handle.addr() as *mut _);
//!     }
//! })?;
//!
//! let raw = my_lib_create();
//! registry.add(NativeHandle::from(raw)).await;
//! // ...
//! my_lib_destroy(raw);
//! registry.remove(NativeHandle::from(raw)).await;
//! ```

pub mod address_file;
pub mod barrier;
pub mod config;
pub mod error;
pub mod handle;
pub mod platform;
pub mod registry;
pub mod slab;

// Re-export commonly used types
pub use barrier::InitBarrier;
pub use config::{BuildMode, RegistryConfig};
pub use error::{RegistryError, Result};
pub use handle::NativeHandle;
pub use platform::{NativeAllocator, SystemAllocator};
pub use registry::{HandleRegistry, HandleRegistryBuilder, InitOutcome};
pub use slab::{ReferenceSlab, RestoreError};
