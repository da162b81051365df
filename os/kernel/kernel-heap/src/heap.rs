//! # Allocation API
//!
//! The public operations on an [`Arena`]. Every operation leaves the block
//! sequence satisfying the arena invariants, whether it succeeds or fails.

use crate::arena::Arena;
use crate::block::block_size_for;
use crate::error::AllocError;
use crate::handle::Handle;
use core::{ptr, slice};
use log::{debug, trace, warn};

impl Arena<'_> {
    /// Allocate `size` bytes, first-fit.
    ///
    /// A zero-sized request returns [`Handle::NULL`]. The returned handle is
    /// aligned to [`WORD_SIZE`](crate::WORD_SIZE).
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] if no free block is large enough.
    pub fn allocate(&mut self, size: usize) -> Result<Handle, AllocError> {
        match self.allocate_block(size)? {
            Some(offset) => Ok(self.handle_of(offset)),
            None => Ok(Handle::NULL),
        }
    }

    /// Carve an in-use block for a `size` byte payload and return its offset,
    /// or `None` for a zero-sized request.
    fn allocate_block(&mut self, size: usize) -> Result<Option<usize>, AllocError> {
        if size == 0 {
            return Ok(None);
        }
        self.ensure_init()?;

        let needed = block_size_for(size).ok_or(AllocError::OutOfMemory)?;
        let Some(offset) = self.first_fit(needed) else {
            trace!("heap: no free block for {size} bytes");
            return Err(AllocError::OutOfMemory);
        };

        self.split(offset, needed);
        let mut header = self.header(offset);
        header.free = false;
        self.write_header(offset, header);

        trace!(
            "heap: allocated {size} bytes in block {offset:#x} ({} bytes)",
            header.size
        );
        Ok(Some(offset))
    }

    /// Free the allocation behind `handle`, merging it with free neighbors.
    ///
    /// [`Handle::NULL`] is a no-op. Handles that do not name a live
    /// allocation of this arena (foreign pointers, double frees) are ignored.
    pub fn deallocate(&mut self, handle: Handle) {
        if let Err(e) = self.try_deallocate(handle) {
            warn!("heap: ignoring deallocation of {handle}: {e}");
        }
    }

    /// Like [`deallocate`](Self::deallocate), but reports rejected handles.
    ///
    /// # Errors
    /// [`AllocError::InvalidHandle`] if `handle` is outside the arena, is not
    /// preceded by a tagged block header, or names a block that is already
    /// free. The arena is left untouched in that case.
    ///
    /// Release builds trust the header tag: payload bytes that happen to form
    /// a tagged in-use header are taken for a block. Debug builds also walk
    /// the block sequence and reject such handles.
    pub fn try_deallocate(&mut self, handle: Handle) -> Result<(), AllocError> {
        if handle.is_null() {
            return Ok(());
        }
        let offset = self.block_of(handle)?;
        self.release(offset);
        trace!("heap: freed {handle}");
        Ok(())
    }

    /// Resize the allocation behind `handle` to `new_size` bytes.
    ///
    /// - [`Handle::NULL`] allocates `new_size` bytes.
    /// - `new_size == 0` frees the allocation and returns [`Handle::NULL`].
    /// - If the block (or the block plus a free successor) is large enough,
    ///   it is resized in place and the same handle is returned.
    /// - Otherwise the contents move to a fresh block and the old one is freed.
    ///
    /// # Errors
    /// - [`AllocError::OutOfMemory`] if the allocation cannot grow; the
    ///   original handle and its contents stay valid and unchanged.
    /// - [`AllocError::InvalidHandle`] if `handle` does not name a live
    ///   allocation; nothing is changed.
    pub fn reallocate(&mut self, handle: Handle, new_size: usize) -> Result<Handle, AllocError> {
        if handle.is_null() {
            return self.allocate(new_size);
        }
        let offset = self.block_of(handle)?;
        if new_size == 0 {
            self.release(offset);
            return Ok(Handle::NULL);
        }

        let needed = block_size_for(new_size).ok_or(AllocError::OutOfMemory)?;
        let header = self.header(offset);
        if header.size >= needed {
            self.split(offset, needed);
            trace!("heap: resized {handle} in place to {new_size} bytes");
            return Ok(handle);
        }

        if let Some(next) = header.next {
            let successor = self.header(next);
            if successor.free && header.size + successor.size >= needed {
                self.coalesce_next(offset);
                self.split(offset, needed);
                debug!("heap: grew {handle} in place to {new_size} bytes");
                return Ok(handle);
            }
        }

        let Some(target) = self.allocate_block(new_size)? else {
            return Err(AllocError::OutOfMemory);
        };
        let count = header.payload_size().min(new_size);
        // Safety: both payloads are live, distinct blocks of this arena and
        // at least `count` bytes long.
        unsafe {
            ptr::copy_nonoverlapping(self.payload_ptr(offset), self.payload_ptr(target), count);
        }
        self.release(offset);
        let fresh = self.handle_of(target);
        trace!("heap: moved {handle} to {fresh} ({count} bytes copied)");
        Ok(fresh)
    }

    /// Allocate `count * element_size` bytes, all zero.
    ///
    /// A zero total returns [`Handle::NULL`].
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] if the product overflows or no free block
    /// is large enough.
    pub fn allocate_zeroed(
        &mut self,
        count: usize,
        element_size: usize,
    ) -> Result<Handle, AllocError> {
        let Some(total) = count.checked_mul(element_size) else {
            trace!("heap: {count} x {element_size} bytes overflows");
            return Err(AllocError::OutOfMemory);
        };
        let Some(offset) = self.allocate_block(total)? else {
            return Ok(Handle::NULL);
        };
        let len = self.header(offset).payload_size();
        // Safety: the payload of a live block spans `len` bytes.
        unsafe {
            ptr::write_bytes(self.payload_ptr(offset), 0, len);
        }
        Ok(self.handle_of(offset))
    }

    /// Allocate a copy of `bytes`.
    ///
    /// An empty input returns [`Handle::NULL`].
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] if no free block is large enough.
    pub fn duplicate(&mut self, bytes: &[u8]) -> Result<Handle, AllocError> {
        let handle = self.allocate(bytes.len())?;
        if let Some(dest) = self.payload_mut(handle, bytes.len()) {
            dest.copy_from_slice(bytes);
        }
        Ok(handle)
    }

    /// Payload capacity of the allocation behind `handle`.
    ///
    /// This is the requested size rounded up to the word size, or more when
    /// the block was too small to split.
    ///
    /// # Errors
    /// [`AllocError::InvalidHandle`] if `handle` does not name a live allocation.
    pub fn usable_size(&self, handle: Handle) -> Result<usize, AllocError> {
        let offset = self.block_of(handle)?;
        Ok(self.header(offset).payload_size())
    }

    /// The first `len` payload bytes of the allocation behind `handle`.
    ///
    /// Returns `None` if the handle is not live or `len` exceeds its capacity.
    #[must_use]
    pub fn payload(&self, handle: Handle, len: usize) -> Option<&[u8]> {
        let offset = self.block_of(handle).ok()?;
        if len > self.header(offset).payload_size() {
            return None;
        }
        // Safety: in bounds of a live payload; borrowed from `&self`.
        Some(unsafe { slice::from_raw_parts(self.payload_ptr(offset), len) })
    }

    /// Mutable view of the first `len` payload bytes behind `handle`.
    ///
    /// Returns `None` if the handle is not live or `len` exceeds its capacity.
    #[must_use]
    pub fn payload_mut(&mut self, handle: Handle, len: usize) -> Option<&mut [u8]> {
        let offset = self.block_of(handle).ok()?;
        if len > self.header(offset).payload_size() {
            return None;
        }
        // Safety: in bounds of a live payload; exclusively borrowed from `&mut self`.
        Some(unsafe { slice::from_raw_parts_mut(self.payload_ptr(offset), len) })
    }
}
