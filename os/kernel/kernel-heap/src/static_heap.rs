//! # Static Kernel Heap
//!
//! The kernel's one arena: a `.bss`-backed byte array of
//! [`KERNEL_HEAP_SIZE`] bytes behind a [`LockedArena`], attached lazily on
//! first use.

use crate::arena::Arena;
use crate::locked::LockedArena;
use core::sync::atomic::{AtomicBool, Ordering};
use kernel_info::memory::{KERNEL_HEAP_ALIGN, KERNEL_HEAP_SIZE};
use log::warn;

/// Heap storage with the alignment promised by [`KERNEL_HEAP_ALIGN`].
#[repr(align(16))]
struct HeapMem([u8; KERNEL_HEAP_SIZE]);

const _: () = assert!(align_of::<HeapMem>() == KERNEL_HEAP_ALIGN);

/// Backing storage for the kernel heap, placed in a dedicated `.bss` section.
#[cfg_attr(target_os = "none", unsafe(link_section = ".bss.heap"))]
static mut HEAP: HeapMem = HeapMem([0; KERNEL_HEAP_SIZE]);

/// The kernel heap.
pub static KERNEL_HEAP: LockedArena<'static> = LockedArena::new();

/// One-time attach flag.
static DID_INIT: AtomicBool = AtomicBool::new(false);

/// Attach the static storage to [`KERNEL_HEAP`] (idempotent).
pub fn ensure_init() {
    if DID_INIT.swap(true, Ordering::AcqRel) {
        return;
    }
    // Safety: `DID_INIT` lets exactly one caller through, so the storage is
    // handed to the arena once and never touched directly again.
    let arena =
        unsafe { Arena::from_raw_parts((&raw mut HEAP.0).cast::<u8>(), KERNEL_HEAP_SIZE) };
    if !KERNEL_HEAP.attach(arena) {
        warn!("heap: static storage unused, a platform region is already attached");
    }
}

/// The kernel heap, attached on first call.
#[must_use]
pub fn kernel_heap() -> &'static LockedArena<'static> {
    ensure_init();
    &KERNEL_HEAP
}

/// The kernel's global allocator.
///
/// All `alloc`/`dealloc` calls go through [`kernel_heap`].
pub struct KernelAllocator;

#[cfg(all(feature = "global-allocator", target_os = "none"))]
#[global_allocator]
static GLOBAL_ALLOCATOR: KernelAllocator = KernelAllocator;

unsafe impl core::alloc::GlobalAlloc for KernelAllocator {
    unsafe fn alloc(&self, layout: core::alloc::Layout) -> *mut u8 {
        unsafe { kernel_heap().alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: core::alloc::Layout) {
        unsafe { kernel_heap().dealloc(ptr, layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: core::alloc::Layout) -> *mut u8 {
        unsafe { kernel_heap().alloc_zeroed(layout) }
    }

    unsafe fn realloc(
        &self,
        ptr: *mut u8,
        layout: core::alloc::Layout,
        new_size: usize,
    ) -> *mut u8 {
        unsafe { kernel_heap().realloc(ptr, layout, new_size) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::alloc::{GlobalAlloc, Layout};

    #[test]
    fn kernel_heap_serves_allocations() {
        let heap = kernel_heap();
        assert!(heap.is_attached());
        ensure_init();

        let (len, handle) = heap
            .with_arena(|arena| (arena.len(), arena.allocate(128)))
            .unwrap();
        assert_eq!(len, KERNEL_HEAP_SIZE);
        let handle = handle.unwrap();

        heap.with_arena(|arena| {
            arena.deallocate(handle);
            assert_eq!(arena.check(), Ok(()));
        });

        let layout = Layout::from_size_align(64, 8).unwrap();
        let p = unsafe { KernelAllocator.alloc(layout) };
        assert!(!p.is_null());
        unsafe { KernelAllocator.dealloc(p, layout) };
    }
}
