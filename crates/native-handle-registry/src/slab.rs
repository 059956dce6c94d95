//! The reference slab: a fixed run of pointer-sized cells in native memory.
//!
//! A cell holding zero is free; any other value is a live handle. The layout
//! is deliberately nothing more than `[usize; capacity]` so the slab can be
//! found again from its base address alone, and so it can be inspected in a
//! debugger without any knowledge of this crate.
//!
//! Slot selection is first-fit on insert and first-match on remove. Callers
//! observe slot order when a restored slab is drained, so neither policy may
//! change.
//!
//! Every slab allocated in this process is entered in a process-wide ledger
//! of (base address, capacity). A slab can only be restored from an address
//! the ledger knows, with the capacity it was allocated with, so a stale or
//! mismatched address file can never widen the view past the allocation.
#![allow(unsafe_code)]

use crate::error::Result;
use crate::handle::NativeHandle;
use crate::platform::NativeAllocator;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Slabs allocated in this process, as (base address, capacity).
static ALLOCATED_SLABS: Mutex<Vec<(usize, usize)>> = Mutex::new(Vec::new());

fn allocated_slabs() -> MutexGuard<'static, Vec<(usize, usize)>> {
    // The ledger is only ever pushed to, so a poisoned lock still holds
    // consistent entries.
    ALLOCATED_SLABS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Why a recorded address could not be turned back into a slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreError {
    /// No slab was allocated at this address in this process.
    Unknown,
    /// The slab exists but was allocated with a different number of cells.
    CapacityMismatch { recorded: usize },
}

/// View over a slab living in process-lifetime native memory.
#[derive(Debug)]
pub struct ReferenceSlab {
    base: NonNull<usize>,
    capacity: usize,
}

// SAFETY: the slab is plain integers in memory that is never freed; moving the
// view to another thread moves no thread-affine state. Mutation requires
// `&mut self`, which the registry only hands out under its lock.
unsafe impl Send for ReferenceSlab {}

impl ReferenceSlab {
    /// Allocate a fresh, zeroed slab of `capacity` cells.
    pub fn allocate(allocator: &dyn NativeAllocator, capacity: usize) -> Result<Self> {
        let base = allocator.allocate_zeroed(capacity)?;
        allocated_slabs().push((base.as_ptr() as usize, capacity));
        Ok(Self { base, capacity })
    }

    /// Find the slab this process allocated at `address`.
    ///
    /// Fails unless [`allocate`](Self::allocate) handed out a slab of exactly
    /// `capacity` cells at that address earlier in this process.
    pub fn restore(address: usize, capacity: usize) -> std::result::Result<Self, RestoreError> {
        let recorded = allocated_slabs()
            .iter()
            .find(|&&(base, _)| base == address)
            .map(|&(_, cells)| cells)
            .ok_or(RestoreError::Unknown)?;
        if recorded != capacity {
            return Err(RestoreError::CapacityMismatch { recorded });
        }

        // SAFETY: the ledger entry proves `address` is the base of a live,
        // never-freed allocation of `capacity` cells made in this process.
        unsafe { Self::from_raw_address(address, capacity) }.ok_or(RestoreError::Unknown)
    }

    /// Reconstitute a slab from a previously recorded base address.
    ///
    /// Returns `None` if `address` is null or not aligned for `usize`.
    ///
    /// # Safety
    ///
    /// `address` must be the base of a slab of at least `capacity` cells that
    /// was allocated earlier in this same OS process and never freed. This
    /// holds only because a runtime restart tears down the managed runtime
    /// but keeps the process, and with it the address space, intact. An
    /// address recorded by any other process is meaningless here.
    unsafe fn from_raw_address(address: usize, capacity: usize) -> Option<Self> {
        if address % std::mem::align_of::<usize>() != 0 {
            return None;
        }
        let base = NonNull::new(address as *mut usize)?;
        Some(Self { base, capacity })
    }

    /// Base address to persist.
    pub fn address(&self) -> usize {
        self.base.as_ptr() as usize
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn cells(&self) -> &[usize] {
        // SAFETY: `base` points at `capacity` initialized cells for the life of
        // the process (see `allocate` and `from_raw_address`).
        unsafe { std::slice::from_raw_parts(self.base.as_ptr(), self.capacity) }
    }

    fn cells_mut(&mut self) -> &mut [usize] {
        // SAFETY: as in `cells`; `&mut self` guarantees this view is the only
        // one touching the memory for the duration of the borrow.
        unsafe { std::slice::from_raw_parts_mut(self.base.as_ptr(), self.capacity) }
    }

    /// Store `handle` in the first free cell.
    ///
    /// Returns the slot index, or `None` if the slab is full.
    pub fn insert(&mut self, handle: NativeHandle) -> Option<usize> {
        let cells = self.cells_mut();
        let slot = cells.iter().position(|&cell| cell == 0)?;
        cells[slot] = handle.addr();
        Some(slot)
    }

    /// Clear the first cell holding `handle`.
    ///
    /// Returns the slot index, or `None` if the handle is not present.
    pub fn remove(&mut self, handle: NativeHandle) -> Option<usize> {
        let cells = self.cells_mut();
        let slot = cells.iter().position(|&cell| cell == handle.addr())?;
        cells[slot] = 0;
        Some(slot)
    }

    /// Take every live handle out of the slab, in slot order.
    pub fn drain(&mut self) -> Vec<NativeHandle> {
        let mut recovered = Vec::new();
        for cell in self.cells_mut() {
            if *cell != 0 {
                recovered.push(NativeHandle::from_addr(*cell));
                *cell = 0;
            }
        }
        recovered
    }

    /// Every cell in slot order; `None` marks a free slot.
    pub fn slots(&self) -> Vec<Option<NativeHandle>> {
        self.cells()
            .iter()
            .map(|&cell| (cell != 0).then(|| NativeHandle::from_addr(cell)))
            .collect()
    }

    /// Write back cells captured by [`slots`](Self::slots), slot for slot.
    pub fn refill(&mut self, slots: &[Option<NativeHandle>]) {
        for (cell, slot) in self.cells_mut().iter_mut().zip(slots) {
            *cell = slot.map_or(0, NativeHandle::addr);
        }
    }

    pub fn occupied(&self) -> usize {
        self.cells().iter().filter(|&&cell| cell != 0).count()
    }
}
