//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here rather than being
//! scattered through the registry.
//!
//! # Architecture
//!
//! - `alloc` - Zero-initialized native allocation for the slab
//! - `paths` - Location of the per-process address file

pub mod alloc;
pub mod paths;

// Re-export commonly used items
pub use alloc::{NativeAllocator, SystemAllocator};
pub use paths::{address_file_path, default_address_file};
