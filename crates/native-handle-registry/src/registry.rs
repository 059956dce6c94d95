//! The handle registry: add, remove and restart recovery over one slab.
//!
//! # Thread Safety
//!
//! `HandleRegistry` is a cheap `Clone` around shared state. Calls may come
//! from any number of tasks, before or after initialization. Each call first
//! waits on the [`InitBarrier`], then takes the slab lock; lock acquisition
//! is FIFO, so operations that reach the lock are served in request order.

use crate::address_file::{read_address, write_address};
use crate::barrier::InitBarrier;
use crate::config::{BuildMode, RegistryConfig};
use crate::error::{RegistryError, Result};
use crate::handle::NativeHandle;
use crate::platform::{self, NativeAllocator, SystemAllocator};
use crate::slab::{ReferenceSlab, RestoreError};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What a call to [`HandleRegistry::ensure_initialized`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// The build mode is not `debug`; nothing was touched.
    Inactive,
    /// An earlier call already initialized (or is initializing) the registry.
    AlreadyInitialized,
    /// First run in this process: a new slab was allocated and its address
    /// persisted.
    Created { address: usize },
    /// A slab left by an earlier runtime instance was found and drained.
    Restored { address: usize, recovered: usize },
}

/// Restart-resilient registry of live native handles.
///
/// # Example
///
/// ```rust,ignore
/// let registry = HandleRegistry::builder().build()?;
/// registry.ensure_initialized(|leaked| {
///     for handle in leaked {
///         unsafe { my_lib_destroy(handle.addr() as *mut _) };
///     }
/// })?;
///
/// registry.add(handle).await;
/// // ...
/// registry.remove(handle).await;
/// ```
#[derive(Clone)]
pub struct HandleRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    mode: BuildMode,
    capacity: usize,
    address_file: PathBuf,
    allocator: Arc<dyn NativeAllocator>,
    /// Set before initialization does any work; cleared again if it fails.
    initialized: AtomicBool,
    barrier: InitBarrier,
    slab: OnceLock<Mutex<ReferenceSlab>>,
}

impl HandleRegistry {
    /// Create a builder for HandleRegistry.
    pub fn builder() -> HandleRegistryBuilder {
        HandleRegistryBuilder::new()
    }

    /// Registry with default settings for the current build and process.
    pub fn new() -> Self {
        Self::from_parts(
            BuildMode::current(),
            RegistryConfig::DEFAULT_CAPACITY,
            platform::default_address_file(),
            Arc::new(SystemAllocator),
        )
    }

    fn from_parts(
        mode: BuildMode,
        capacity: usize,
        address_file: PathBuf,
        allocator: Arc<dyn NativeAllocator>,
    ) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                mode,
                capacity,
                address_file,
                allocator,
                initialized: AtomicBool::new(false),
                barrier: InitBarrier::new(),
                slab: OnceLock::new(),
            }),
        }
    }

    pub fn mode(&self) -> BuildMode {
        self.inner.mode
    }

    /// Whether the mode gate lets this registry do anything.
    pub fn is_active(&self) -> bool {
        self.inner.mode.is_debug()
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Whether initialization has completed and the slab is usable.
    pub fn is_ready(&self) -> bool {
        self.inner.barrier.is_fulfilled()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn address_file(&self) -> &Path {
        &self.inner.address_file
    }

    /// Set up the slab, handing any handles left by a previous runtime
    /// instance to `release`.
    ///
    /// Only the first successful call does work. On a first run in this
    /// process a zeroed slab is allocated and its address written to the
    /// address file. If the file already exists, the slab at the recorded
    /// address is drained: every live cell is passed to `release` in slot
    /// order and zeroed. `release` runs exactly once, synchronously, before
    /// any waiting `add`/`remove` proceeds.
    ///
    /// A corrupt address file is an error rather than a reason to start over;
    /// a new slab would orphan the old one and every handle it tracks.
    pub fn ensure_initialized<F>(&self, release: F) -> Result<InitOutcome>
    where
        F: FnOnce(Vec<NativeHandle>),
    {
        if !self.is_active() {
            warn!(
                "Handle registry inactive in {} mode, skipping initialization",
                self.inner.mode
            );
            return Ok(InitOutcome::Inactive);
        }

        if self
            .inner
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(InitOutcome::AlreadyInitialized);
        }

        match self.initialize(release) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.inner.initialized.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    fn initialize<F>(&self, release: F) -> Result<InitOutcome>
    where
        F: FnOnce(Vec<NativeHandle>),
    {
        let path = &self.inner.address_file;
        let capacity = self.inner.capacity;

        let (mut slab, restored) = match read_address(path)? {
            None => {
                let slab = ReferenceSlab::allocate(self.inner.allocator.as_ref(), capacity)?;
                write_address(path, slab.address())?;
                info!(
                    "Allocated handle slab of {} cells at {:#x} ({})",
                    capacity,
                    slab.address(),
                    path.display()
                );
                (slab, false)
            }
            Some(address) => {
                let slab = ReferenceSlab::restore(address, capacity).map_err(|e| match e {
                    RestoreError::Unknown => RegistryError::InvalidAddress {
                        path: path.clone(),
                        address,
                    },
                    RestoreError::CapacityMismatch { recorded } => {
                        RegistryError::CapacityMismatch {
                            path: path.clone(),
                            address,
                            recorded,
                            requested: capacity,
                        }
                    }
                })?;
                (slab, true)
            }
        };

        let snapshot = slab.slots();
        let recovered = slab.drain();
        let address = slab.address();
        if restored {
            info!(
                "Restored handle slab at {:#x}, releasing {} handle(s) left by the previous runtime",
                address,
                recovered.len()
            );
        }

        let count = recovered.len();
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || release(recovered))) {
            // Put the handles back where they were so a retry, or the next
            // runtime, can still release them.
            slab.refill(&snapshot);
            self.inner.initialized.store(false, Ordering::SeqCst);
            warn!(
                "Release callback panicked, returned {} handle(s) to the slab at {:#x}",
                count, address
            );
            panic::resume_unwind(payload);
        }

        // Only this call passed the check-and-set, so the cell is empty.
        let _ = self.inner.slab.set(Mutex::new(slab));
        self.inner.barrier.fulfill();

        Ok(if restored {
            InitOutcome::Restored {
                address,
                recovered: count,
            }
        } else {
            InitOutcome::Created { address }
        })
    }

    /// Wait for the slab, or `None` if this registry is not tracking handles.
    async fn ready_slab(&self) -> Option<&Mutex<ReferenceSlab>> {
        if !self.is_active() || !self.is_initialized() {
            return None;
        }
        self.inner.barrier.wait().await;
        self.inner.slab.get()
    }

    /// Record a newly created native handle.
    ///
    /// Does nothing for the null handle or before `ensure_initialized` has
    /// been called. If every slot is taken the handle is dropped from
    /// tracking: leak recovery on the next restart gets weaker, nothing else
    /// breaks.
    pub async fn add(&self, handle: NativeHandle) {
        if handle.is_null() {
            return;
        }
        let Some(slab) = self.ready_slab().await else {
            return;
        };

        let mut slab = slab.lock().await;
        match slab.insert(handle) {
            Some(slot) => debug!("Tracking handle {} in slot {}", handle, slot),
            None => warn!(
                "Handle slab full ({} cells), not tracking {}",
                slab.capacity(),
                handle
            ),
        }
    }

    /// Forget a native handle that was released normally.
    ///
    /// Removing a handle that is not tracked is a no-op.
    pub async fn remove(&self, handle: NativeHandle) {
        if handle.is_null() {
            return;
        }
        let Some(slab) = self.ready_slab().await else {
            return;
        };

        let mut slab = slab.lock().await;
        if let Some(slot) = slab.remove(handle) {
            debug!("Released handle {} from slot {}", handle, slot);
        }
    }

    /// Blocking form of [`add`](Self::add) for callers outside any async
    /// executor. Must not be called from within an async task.
    pub fn add_blocking(&self, handle: NativeHandle) {
        futures::executor::block_on(self.add(handle));
    }

    /// Blocking form of [`remove`](Self::remove). Must not be called from
    /// within an async task.
    pub fn remove_blocking(&self, handle: NativeHandle) {
        futures::executor::block_on(self.remove(handle));
    }

    /// Snapshot of every slot in order; `None` marks a free slot.
    ///
    /// Empty when the registry is inactive or not initialized.
    pub async fn slots(&self) -> Vec<Option<NativeHandle>> {
        match self.ready_slab().await {
            Some(slab) => slab.lock().await.slots(),
            None => Vec::new(),
        }
    }

    /// Number of occupied slots.
    pub async fn tracked_count(&self) -> usize {
        match self.ready_slab().await {
            Some(slab) => slab.lock().await.occupied(),
            None => 0,
        }
    }

    /// Handles currently tracked, in slot order.
    pub async fn tracked_handles(&self) -> Vec<NativeHandle> {
        self.slots().await.into_iter().flatten().collect()
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("mode", &self.inner.mode)
            .field("capacity", &self.inner.capacity)
            .field("address_file", &self.inner.address_file)
            .field("initialized", &self.is_initialized())
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Builder for configuring a [`HandleRegistry`].
///
/// # Example
///
/// ```rust,ignore
/// let registry = HandleRegistry::builder()
///     .capacity(1024)
///     .address_dir("/run/user/1000")
///     .build()?;
/// ```
pub struct HandleRegistryBuilder {
    capacity: usize,
    address_dir: Option<PathBuf>,
    address_file: Option<PathBuf>,
    mode: BuildMode,
    allocator: Arc<dyn NativeAllocator>,
}

impl HandleRegistryBuilder {
    pub fn new() -> Self {
        Self {
            capacity: RegistryConfig::DEFAULT_CAPACITY,
            address_dir: None,
            address_file: None,
            mode: BuildMode::current(),
            allocator: Arc::new(SystemAllocator),
        }
    }

    /// Number of slab cells.
    ///
    /// Default: `512`
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Directory for the address file; the file name still carries the pid.
    ///
    /// Default: the system temp directory
    pub fn address_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.address_dir = Some(dir.into());
        self
    }

    /// Exact address file path. Takes precedence over `address_dir`.
    pub fn address_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.address_file = Some(path.into());
        self
    }

    /// Override the build-mode gate.
    ///
    /// Default: [`BuildMode::current()`]
    pub fn mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    /// Source of slab memory.
    ///
    /// Default: [`SystemAllocator`]
    pub fn allocator(mut self, allocator: Arc<dyn NativeAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn build(self) -> Result<HandleRegistry> {
        if self.capacity == 0 {
            return Err(RegistryError::Config {
                message: "Handle slab capacity must be at least 1".to_string(),
            });
        }

        let address_file = match (self.address_file, self.address_dir) {
            (Some(file), _) => file,
            (None, Some(dir)) => platform::address_file_path(&dir, std::process::id()),
            (None, None) => platform::default_address_file(),
        };

        Ok(HandleRegistry::from_parts(
            self.mode,
            self.capacity,
            address_file,
            self.allocator,
        ))
    }
}

impl Default for HandleRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
