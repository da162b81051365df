//! # Block Metadata
//!
//! Every block starts with a two-word header followed by its payload:
//!
//! ```text
//! +-----------------+-----------------+-------------------------------+
//! | BlockTag (u64)  | next (u64)      |  payload (size - METADATA)    |
//! +-----------------+-----------------+-------------------------------+
//! ^ block offset                      ^ handle = base + offset + METADATA_SIZE
//! ```
//!
//! `next` is the arena-relative offset of the following block, or [`NO_NEXT`]
//! for the last one. Because the header sits directly in front of the payload,
//! the owning block of a handle is recovered by subtraction alone.

use bitfield_struct::bitfield;
use kernel_info::memory::KERNEL_HEAP_MIN_SIZE;

/// The platform word; every payload is aligned to it.
pub const WORD_SIZE: usize = size_of::<usize>();

/// Bytes of metadata in front of every payload.
pub const METADATA_SIZE: usize = size_of::<RawHeader>();

/// Smallest payload a block may carry.
pub const MIN_PAYLOAD: usize = WORD_SIZE;

/// Smallest total size of any block, metadata included.
pub const MIN_BLOCK_SIZE: usize = METADATA_SIZE + MIN_PAYLOAD;

/// Largest block (and therefore arena) representable in a [`BlockTag`].
pub const MAX_BLOCK_SIZE: u64 = (1 << 48) - 1;

/// Tag written into every header; anything else is not one of ours.
pub(crate) const BLOCK_MAGIC: u8 = 0xB7;

/// Link value of the last block in the sequence.
pub(crate) const NO_NEXT: u64 = u64::MAX;

/// In-memory representation of a header: tag word, then link word.
pub(crate) type RawHeader = [u64; 2];

const _: () = {
    assert!(WORD_SIZE.is_power_of_two());
    assert!(METADATA_SIZE.is_multiple_of(WORD_SIZE));
    assert!(MIN_BLOCK_SIZE.is_multiple_of(WORD_SIZE));
    assert!(MIN_BLOCK_SIZE == KERNEL_HEAP_MIN_SIZE);
};

/// First header word: block state and total size.
#[bitfield(u64)]
pub(crate) struct BlockTag {
    /// Bit 0: the block is free.
    pub free: bool,

    /// Bits 1-7: reserved.
    #[bits(7, default = 0)]
    _reserved_1_7: u8,

    /// Bits 8-15: header tag, always [`BLOCK_MAGIC`] for a valid block.
    pub magic: u8,

    /// Bits 16-63: total block size in bytes, metadata included.
    #[bits(48)]
    pub size: u64,
}

/// Decoded block header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct BlockHeader {
    /// Total block size in bytes, metadata included.
    pub size: usize,
    /// Offset of the next block, if any.
    pub next: Option<usize>,
    pub free: bool,
    pub magic: u8,
}

impl BlockHeader {
    #[inline]
    pub const fn new(size: usize, next: Option<usize>, free: bool) -> Self {
        Self {
            size,
            next,
            free,
            magic: BLOCK_MAGIC,
        }
    }

    #[inline]
    pub const fn is_tagged(&self) -> bool {
        self.magic == BLOCK_MAGIC
    }

    /// Payload capacity in bytes.
    #[inline]
    pub const fn payload_size(&self) -> usize {
        self.size.saturating_sub(METADATA_SIZE)
    }

    pub fn encode(self) -> RawHeader {
        let tag = BlockTag::new()
            .with_free(self.free)
            .with_magic(self.magic)
            .with_size(widen(self.size));
        let next = self.next.map_or(NO_NEXT, widen);
        [tag.into_bits(), next]
    }

    pub fn decode(raw: RawHeader) -> Self {
        let tag = BlockTag::from_bits(raw[0]);
        let next = if raw[1] == NO_NEXT {
            None
        } else {
            Some(narrow(raw[1]))
        };
        Self {
            size: narrow(tag.size()),
            next,
            free: tag.free(),
            magic: tag.magic(),
        }
    }
}

/// Public view of one block, as yielded by [`Arena::blocks`](crate::Arena::blocks).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    /// Arena-relative offset of the block header.
    pub offset: usize,
    /// Total size in bytes, metadata included.
    pub total_size: usize,
    pub is_free: bool,
}

impl BlockInfo {
    #[inline]
    #[must_use]
    pub const fn payload_size(&self) -> usize {
        self.total_size - METADATA_SIZE
    }

    /// Offset one past the last byte of this block.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.total_size
    }
}

/// Total block size needed to serve a `requested` byte payload, or `None`
/// if the computation overflows.
#[inline]
pub(crate) const fn block_size_for(requested: usize) -> Option<usize> {
    match align_up(requested, WORD_SIZE) {
        Some(payload) => payload.checked_add(METADATA_SIZE),
        None => None,
    }
}

/// Align `value` upwards to `align` (must be a power of two).
#[inline]
pub(crate) const fn align_up(value: usize, align: usize) -> Option<usize> {
    match value.checked_add(align - 1) {
        Some(v) => Some(v & !(align - 1)),
        None => None,
    }
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn narrow(value: u64) -> usize {
    value as usize
}

#[inline]
const fn widen(value: usize) -> u64 {
    value as u64
}
