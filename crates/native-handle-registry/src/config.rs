//! Centralized configuration for the handle registry.
//!
//! Holds the fixed constants of the slab and its address file, and the
//! build-mode gate that decides whether the registry does anything at all.

/// Registry-level configuration.
pub struct RegistryConfig;

impl RegistryConfig {
    /// Number of handle cells in a slab.
    pub const DEFAULT_CAPACITY: usize = 512;
    pub const ADDRESS_FILE_PREFIX: &'static str = "native_handle_registry";
    pub const ADDRESS_FILE_EXTENSION: &'static str = "addr";
}

/// Build configuration the registry was compiled under.
///
/// The registry only tracks handles in [`BuildMode::Debug`]; in the other
/// modes every public operation returns immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildMode {
    Release,
    Profile,
    Debug,
}

impl BuildMode {
    /// The mode of the current build.
    ///
    /// - `debug_assertions` enabled: `Debug`
    /// - otherwise, with the `profile` feature: `Profile`
    /// - otherwise: `Release`
    pub const fn current() -> Self {
        if cfg!(debug_assertions) {
            BuildMode::Debug
        } else if cfg!(feature = "profile") {
            BuildMode::Profile
        } else {
            BuildMode::Release
        }
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, BuildMode::Debug)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Release => "release",
            BuildMode::Profile => "profile",
            BuildMode::Debug => "debug",
        }
    }
}

impl Default for BuildMode {
    fn default() -> Self {
        Self::current()
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_mode_matches_build() {
        let mode = BuildMode::current();
        #[cfg(debug_assertions)]
        assert_eq!(mode, BuildMode::Debug);
        #[cfg(not(debug_assertions))]
        assert_ne!(mode, BuildMode::Debug);
    }

    #[test]
    fn test_only_debug_is_active() {
        assert!(BuildMode::Debug.is_debug());
        assert!(!BuildMode::Profile.is_debug());
        assert!(!BuildMode::Release.is_debug());
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(BuildMode::Release.to_string(), "release");
        assert_eq!(BuildMode::Profile.to_string(), "profile");
        assert_eq!(BuildMode::Debug.to_string(), "debug");
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(RegistryConfig::DEFAULT_CAPACITY, 512);
    }
}
