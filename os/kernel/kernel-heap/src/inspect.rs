//! # Heap Introspection
//!
//! Read-only walks over the block sequence: iteration, usage statistics, an
//! invariant checker and a log dump for debugging.

use crate::arena::Arena;
use crate::block::{BlockInfo, METADATA_SIZE, MIN_BLOCK_SIZE, WORD_SIZE};
use crate::error::InvariantViolation;
use log::info;

/// Iterator over the blocks of an [`Arena`] in address order.
pub struct Blocks<'a, 'mem> {
    arena: &'a Arena<'mem>,
    next: Option<usize>,
}

impl Iterator for Blocks<'_, '_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.next?;
        let header = self.arena.header(offset);
        // Stop on links that cannot be block starts rather than read past
        // the arena; `check` reports them.
        self.next = header.next.filter(|&n| {
            n > offset
                && n.is_multiple_of(WORD_SIZE)
                && n <= self.arena.len() - METADATA_SIZE
        });
        Some(BlockInfo {
            offset,
            total_size: header.size,
            is_free: header.free,
        })
    }
}

/// Usage summary of an [`Arena`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct HeapStats {
    pub arena_len: usize,
    pub block_count: usize,
    pub free_blocks: usize,
    pub used_blocks: usize,
    /// Total size of all free blocks, metadata included.
    pub free_bytes: usize,
    /// Total size of all in-use blocks, metadata included.
    pub used_bytes: usize,
    /// Payload capacity of the largest free block.
    pub largest_free: usize,
}

impl<'mem> Arena<'mem> {
    /// Walk the blocks in address order. Empty before the first allocation.
    #[must_use]
    pub const fn blocks(&self) -> Blocks<'_, 'mem> {
        Blocks {
            arena: self,
            next: if self.is_initialized() { Some(0) } else { None },
        }
    }

    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.blocks().fold(
            HeapStats {
                arena_len: self.len(),
                ..HeapStats::default()
            },
            |mut stats, block| {
                stats.block_count += 1;
                if block.is_free {
                    stats.free_blocks += 1;
                    stats.free_bytes += block.total_size;
                    stats.largest_free = stats.largest_free.max(block.payload_size());
                } else {
                    stats.used_blocks += 1;
                    stats.used_bytes += block.total_size;
                }
                stats
            },
        )
    }

    /// Verify the block sequence invariants.
    ///
    /// # Errors
    /// The first [`InvariantViolation`] found, in address order.
    pub fn check(&self) -> Result<(), InvariantViolation> {
        if !self.is_initialized() {
            return Ok(());
        }

        let mut offset = 0;
        let mut covered = 0;
        let mut previous_free: Option<usize> = None;
        loop {
            let header = self.header(offset);
            if !header.is_tagged() {
                return Err(InvariantViolation::BadTag {
                    offset,
                    tag: header.magic,
                });
            }
            if header.size < MIN_BLOCK_SIZE {
                return Err(InvariantViolation::Undersized {
                    offset,
                    size: header.size,
                });
            }
            if header.size > self.len() - offset {
                return Err(InvariantViolation::OutOfBounds {
                    offset,
                    size: header.size,
                });
            }
            if !(self.base() + offset + METADATA_SIZE).is_multiple_of(WORD_SIZE) {
                return Err(InvariantViolation::Misaligned { offset });
            }
            if header.free {
                if let Some(first) = previous_free {
                    return Err(InvariantViolation::AdjacentFree {
                        first,
                        second: offset,
                    });
                }
                previous_free = Some(offset);
            } else {
                previous_free = None;
            }

            covered += header.size;
            let end = offset + header.size;
            match header.next {
                Some(next) if next == end && end < self.len() => offset = next,
                None if end == self.len() => break,
                next => {
                    return Err(InvariantViolation::BrokenLink {
                        offset,
                        next: next.unwrap_or(usize::MAX),
                        expected: end,
                    });
                }
            }
        }

        if covered == self.len() {
            Ok(())
        } else {
            Err(InvariantViolation::SizeMismatch {
                covered,
                length: self.len(),
            })
        }
    }

    /// Log every block at `info` level.
    pub fn dump(&self) {
        let stats = self.stats();
        info!(
            "heap {:#x}+{:#x}: {} blocks, {} used ({} bytes), {} free ({} bytes)",
            self.base(),
            self.len(),
            stats.block_count,
            stats.used_blocks,
            stats.used_bytes,
            stats.free_blocks,
            stats.free_bytes
        );
        for block in self.blocks() {
            info!(
                "  [{:#010x}..{:#010x}) {:>8} bytes {}",
                block.offset,
                block.end(),
                block.total_size,
                if block.is_free { "free" } else { "used" }
            );
        }
    }
}
