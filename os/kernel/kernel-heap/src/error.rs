/// Failure modes of the arena allocator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// No free block is large enough for the request, the request size
    /// overflows, or the arena is too small to hold a single block.
    #[error("out of memory")]
    OutOfMemory,
    /// The handle does not name a live allocation of this arena.
    #[error("invalid handle")]
    InvalidHandle,
}

/// Structural corruption detected by [`Arena::check`](crate::Arena::check).
///
/// Offsets are arena-relative byte offsets of the offending block header.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("block at {offset:#x} carries a foreign header tag {tag:#04x}")]
    BadTag { offset: usize, tag: u8 },
    #[error("block at {offset:#x} is {size} bytes, below the minimum block size")]
    Undersized { offset: usize, size: usize },
    #[error("block at {offset:#x} of {size} bytes runs past the arena end")]
    OutOfBounds { offset: usize, size: usize },
    #[error("block at {offset:#x} links to {next:#x}, expected {expected:#x}")]
    BrokenLink {
        offset: usize,
        next: usize,
        expected: usize,
    },
    #[error("blocks at {first:#x} and {second:#x} are adjacent and both free")]
    AdjacentFree { first: usize, second: usize },
    #[error("payload of block at {offset:#x} is not word aligned")]
    Misaligned { offset: usize },
    #[error("blocks cover {covered} bytes of a {length} byte arena")]
    SizeMismatch { covered: usize, length: usize },
}
