//! # Locked Arena
//!
//! A global-friendly wrapper that serializes every operation on an [`Arena`]
//! behind a [`SpinLock`] and exposes it as a [`GlobalAlloc`].
//!
//! The lock exists for the day the kernel grows interrupts or more execution
//! contexts; on today's single-threaded kernel it is never contended. It does
//! **not** mask interrupts, so interrupt handlers must not allocate.

use crate::arena::Arena;
use crate::block::WORD_SIZE;
use crate::handle::Handle;
use core::alloc::{GlobalAlloc, Layout};
use core::ptr::{NonNull, null_mut};
use kernel_sync::SpinLock;
use log::warn;

/// An [`Arena`] slot guarded by a spin lock.
///
/// Starts empty so it can live in a `static`; the platform
/// [`attach`](Self::attach)es the arena once during boot.
///
/// # Logging
/// The arena logs through [`log`] while the lock is held (rejected handles,
/// exhaustion traces). The installed logger must therefore not allocate from
/// this heap, or it spins on its own lock.
pub struct LockedArena<'mem> {
    slot: SpinLock<Option<Arena<'mem>>>,
}

impl Default for LockedArena<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'mem> LockedArena<'mem> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slot: SpinLock::new(None),
        }
    }

    /// Install `arena` as the managed region.
    ///
    /// Returns `false` (and drops `arena` unused) if an arena is already
    /// attached; the first one stays in place for the kernel's lifetime.
    #[must_use]
    pub fn attach(&self, arena: Arena<'mem>) -> bool {
        let rejected = self.slot.with_lock(|slot| {
            if slot.is_some() {
                return Some(arena.base());
            }
            *slot = Some(arena);
            None
        });
        // Logged outside the lock.
        if let Some(base) = rejected {
            warn!("heap: arena already attached, ignoring {base:#x}");
            return false;
        }
        true
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.slot.with_lock(|slot| slot.is_some())
    }

    /// Whether some context currently holds the arena.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.slot.is_locked()
    }

    /// Run `f` with exclusive access to the arena.
    ///
    /// Returns `None` if no arena has been attached yet.
    pub fn with_arena<R>(&self, f: impl FnOnce(&mut Arena<'mem>) -> R) -> Option<R> {
        self.slot.with_lock(|slot| slot.as_mut().map(f))
    }

    /// Allocate through the arena and map the outcome to a raw pointer.
    fn alloc_with(
        &self,
        layout: Layout,
        f: impl FnOnce(&mut Arena<'mem>) -> Option<Handle>,
    ) -> *mut u8 {
        if layout.align() > WORD_SIZE {
            return null_mut();
        }
        self.with_arena(|arena| f(arena).and_then(|h| arena.as_ptr(h)))
            .flatten()
            .map_or(null_mut(), NonNull::as_ptr)
    }
}

/// Serves layouts aligned to at most [`WORD_SIZE`]; stricter alignments
/// yield null, as does an unattached or exhausted arena.
unsafe impl GlobalAlloc for LockedArena<'_> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        self.alloc_with(layout, |arena| arena.allocate(layout.size()).ok())
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        self.with_arena(|arena| arena.deallocate(Handle::from_ptr(ptr)));
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        self.alloc_with(layout, |arena| arena.allocate_zeroed(layout.size(), 1).ok())
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        self.alloc_with(layout, |arena| {
            arena.reallocate(Handle::from_ptr(ptr), new_size).ok()
        })
    }
}
