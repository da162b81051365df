//! # Memory Layout

/// Size of the kernel heap arena in bytes.
///
/// The arena is fixed for the lifetime of the kernel; it neither grows nor
/// shrinks after boot.
pub const KERNEL_HEAP_SIZE: usize = 0x0010_0000; // 1 MiB

/// Alignment of the kernel heap arena's base address.
///
/// Must be at least the platform word size so that the first block header
/// and every payload handed out are naturally aligned.
pub const KERNEL_HEAP_ALIGN: usize = 16;

/// Smallest arena the heap allocator accepts.
///
/// One two-word block header plus one word of payload; anything smaller
/// cannot hold a single allocation and is a boot configuration error. The
/// heap allocator asserts at compile time that its minimum block size agrees.
pub const KERNEL_HEAP_MIN_SIZE: usize = 16 + size_of::<usize>();

const _: () = {
    assert!(KERNEL_HEAP_ALIGN.is_power_of_two());
    assert!(KERNEL_HEAP_ALIGN >= size_of::<usize>());
    assert!(KERNEL_HEAP_SIZE.is_multiple_of(KERNEL_HEAP_ALIGN));
    assert!(KERNEL_HEAP_SIZE >= KERNEL_HEAP_MIN_SIZE);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_holds_at_least_one_block() {
        assert!(KERNEL_HEAP_SIZE >= KERNEL_HEAP_MIN_SIZE);
    }

    #[test]
    fn heap_alignment_covers_the_word_size() {
        assert_eq!(KERNEL_HEAP_ALIGN % size_of::<usize>(), 0);
    }
}
