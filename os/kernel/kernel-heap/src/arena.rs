//! # Arena State and Block Sequence
//!
//! The [`Arena`] owns one contiguous region and the block sequence laid over
//! it. Blocks are addressed by their offset from the arena base; only the
//! accessors in this module turn offsets into memory accesses.

use crate::block::{
    BlockHeader, MAX_BLOCK_SIZE, METADATA_SIZE, MIN_BLOCK_SIZE, RawHeader, WORD_SIZE,
};
use crate::error::AllocError;
use crate::handle::Handle;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use log::{debug, error, warn};

/// A fixed memory region carved into first-fit blocks.
///
/// # Invariants
/// - Blocks form one address-ordered sequence starting at offset 0; each
///   block's `next` is exactly `offset + size`, the last block ends at `len`.
/// - The block sizes sum to `len`.
/// - No two neighboring blocks are both free.
/// - Every block is at least [`MIN_BLOCK_SIZE`] bytes.
/// - `base` is word aligned and every block offset is a word multiple.
pub struct Arena<'mem> {
    /// Word-aligned start of the managed region.
    base: *mut u8,
    /// Managed length in bytes (a word multiple).
    len: usize,
    /// Lazily set on the first allocation request.
    initialized: bool,
    _memory: PhantomData<&'mem mut [u8]>,
}

// Safety: the arena has exclusive access to its region; raw pointers are only
// dereferenced through `&mut self` or while the owning lock is held.
unsafe impl Send for Arena<'_> {}

impl<'mem> Arena<'mem> {
    /// Manage `memory` as an arena.
    ///
    /// A misaligned start is rounded up to the word size and the length is
    /// rounded down to a word multiple; [`base`](Self::base) and
    /// [`len`](Self::len) report the effective region. The region is not
    /// touched until the first allocation.
    pub fn new(memory: &'mem mut [u8]) -> Self {
        // Safety: the slice is valid, writable and exclusively borrowed for 'mem.
        unsafe { Self::from_raw_parts(memory.as_mut_ptr(), memory.len()) }
    }

    /// Manage the region `[base, base + len)` as an arena.
    ///
    /// This is the entry point for platform-supplied fixed regions.
    ///
    /// # Safety
    /// - The memory range must be **valid**, **writable** and **exclusive** to
    ///   the arena for `'mem`.
    pub unsafe fn from_raw_parts(base: *mut u8, len: usize) -> Self {
        let pad = base.align_offset(WORD_SIZE);
        let (base, len) = if pad > len {
            (base, 0)
        } else {
            // Safety: `pad <= len`, so the result stays within the region.
            (unsafe { base.add(pad) }, (len - pad) & !(WORD_SIZE - 1))
        };
        Self {
            base,
            len,
            initialized: false,
            _memory: PhantomData,
        }
    }

    /// Address of the first managed byte.
    #[inline]
    #[must_use]
    pub fn base(&self) -> usize {
        self.base.addr()
    }

    /// Number of managed bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Indicates whether the initial block has been laid out.
    #[inline]
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Lay out a single free block spanning the whole arena (idempotent).
    ///
    /// Called implicitly by every allocation primitive.
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] if the arena cannot hold one minimum block
    /// (or exceeds the largest representable block). This is a boot
    /// configuration error.
    pub fn ensure_init(&mut self) -> Result<(), AllocError> {
        if self.initialized {
            return Ok(());
        }
        if self.len < MIN_BLOCK_SIZE || self.len as u64 > MAX_BLOCK_SIZE {
            error!(
                "heap arena of {} bytes at {:#x} cannot hold a single block",
                self.len,
                self.base()
            );
            return Err(AllocError::OutOfMemory);
        }
        self.write_header(0, BlockHeader::new(self.len, None, true));
        self.initialized = true;
        debug!(
            "heap arena initialized: {} bytes at {:#x}",
            self.len,
            self.base()
        );
        Ok(())
    }

    /// Read the header at `offset`.
    ///
    /// `offset` must be a word multiple with room for a header.
    #[inline]
    pub(crate) fn header(&self, offset: usize) -> BlockHeader {
        debug_assert!(offset + METADATA_SIZE <= self.len);
        debug_assert_eq!(offset % WORD_SIZE, 0);
        // Safety: in bounds per the checks above; the arena owns the region.
        let raw = unsafe { ptr::read_unaligned(self.base.add(offset).cast::<RawHeader>()) };
        BlockHeader::decode(raw)
    }

    #[inline]
    pub(crate) fn write_header(&mut self, offset: usize, header: BlockHeader) {
        debug_assert!(offset + METADATA_SIZE <= self.len);
        debug_assert_eq!(offset % WORD_SIZE, 0);
        // Safety: in bounds per the checks above; `&mut self` is exclusive.
        unsafe {
            ptr::write_unaligned(self.base.add(offset).cast::<RawHeader>(), header.encode());
        }
    }

    /// Pointer to the payload of the block at `offset`.
    #[inline]
    pub(crate) fn payload_ptr(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset + METADATA_SIZE <= self.len);
        // Safety: in bounds; derived from the region's base pointer.
        unsafe { self.base.add(offset + METADATA_SIZE) }
    }

    #[inline]
    pub(crate) fn handle_of(&self, offset: usize) -> Handle {
        Handle::from_ptr(self.payload_ptr(offset))
    }

    /// Pointer to the payload behind `handle`, if it names a live allocation.
    #[must_use]
    pub fn as_ptr(&self, handle: Handle) -> Option<NonNull<u8>> {
        let offset = self.block_of(handle).ok()?;
        NonNull::new(self.payload_ptr(offset))
    }

    /// First free block (in address order) of at least `needed` bytes.
    pub(crate) fn first_fit(&self, needed: usize) -> Option<usize> {
        let mut current = Some(0);
        while let Some(offset) = current {
            let header = self.header(offset);
            if header.free && header.size >= needed {
                return Some(offset);
            }
            current = header.next;
        }
        None
    }

    /// Shrink the block at `offset` to `needed` bytes if the remainder can
    /// form a block of its own.
    ///
    /// The remainder becomes a free block linked in directly after, and is
    /// merged with its successor when that one is free too.
    pub(crate) fn split(&mut self, offset: usize, needed: usize) {
        let header = self.header(offset);
        if header.size < needed + MIN_BLOCK_SIZE {
            return;
        }
        let rest = offset + needed;
        self.write_header(rest, BlockHeader::new(header.size - needed, header.next, true));
        self.write_header(
            offset,
            BlockHeader {
                size: needed,
                next: Some(rest),
                ..header
            },
        );
        self.coalesce_next(rest);
    }

    /// Merge the successor of the block at `offset` into it if the successor
    /// is free. Returns whether a merge happened.
    pub(crate) fn coalesce_next(&mut self, offset: usize) -> bool {
        let header = self.header(offset);
        let Some(next) = header.next else {
            return false;
        };
        let successor = self.header(next);
        if !successor.free {
            return false;
        }
        self.write_header(
            offset,
            BlockHeader {
                size: header.size + successor.size,
                next: successor.next,
                ..header
            },
        );
        true
    }

    /// The block whose `next` is `offset`, found by scanning from the base.
    pub(crate) fn predecessor(&self, offset: usize) -> Option<usize> {
        let mut current = Some(0);
        while let Some(candidate) = current {
            let header = self.header(candidate);
            if header.next == Some(offset) {
                return Some(candidate);
            }
            if candidate >= offset {
                return None;
            }
            current = header.next;
        }
        None
    }

    /// Mark the block at `offset` free and merge it with free neighbors.
    pub(crate) fn release(&mut self, offset: usize) {
        let header = self.header(offset);
        self.write_header(
            offset,
            BlockHeader {
                free: true,
                ..header
            },
        );
        self.coalesce_next(offset);
        if let Some(prev) = self.predecessor(offset)
            && self.header(prev).free
        {
            self.coalesce_next(prev);
        }
    }

    /// Recover the in-use block owning `handle`.
    ///
    /// # Errors
    /// [`AllocError::InvalidHandle`] when the handle lies outside the arena,
    /// is misaligned, does not sit behind a block header, or names a block
    /// that is already free (double free).
    pub(crate) fn block_of(&self, handle: Handle) -> Result<usize, AllocError> {
        if !self.initialized {
            return Err(AllocError::InvalidHandle);
        }
        let offset = handle
            .addr()
            .checked_sub(self.base())
            .and_then(|o| o.checked_sub(METADATA_SIZE))
            .ok_or(AllocError::InvalidHandle)?;
        if offset >= self.len
            || self.len - offset < MIN_BLOCK_SIZE
            || !offset.is_multiple_of(WORD_SIZE)
        {
            return Err(AllocError::InvalidHandle);
        }

        let header = self.header(offset);
        if !header.is_tagged() || header.size > self.len - offset {
            return Err(AllocError::InvalidHandle);
        }
        if header.free {
            warn!("heap: {handle} is already free");
            return Err(AllocError::InvalidHandle);
        }

        // The tag can be forged by payload bytes; debug builds confirm the
        // offset is a real block start.
        if cfg!(debug_assertions) && !self.blocks().any(|b| b.offset == offset) {
            return Err(AllocError::InvalidHandle);
        }

        Ok(offset)
    }
}
