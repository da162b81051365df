use kernel_heap::{AllocError, Arena, Handle, METADATA_SIZE, WORD_SIZE};

#[repr(align(16))]
struct Mem<const N: usize>([u8; N]);

impl<const N: usize> Mem<N> {
    const fn new() -> Self {
        Self([0; N])
    }
}

/// Small deterministic generator (xorshift64) so failures reproduce.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }
}

/// A live allocation and the byte pattern written into it.
struct Live {
    handle: Handle,
    len: usize,
    fill: u8,
}

fn assert_sound(arena: &Arena<'_>) {
    assert!(arena.is_initialized());
    assert_eq!(arena.check(), Ok(()));
    let covered: usize = arena.blocks().map(|b| b.total_size).sum();
    assert_eq!(covered, arena.len());
    let blocks: Vec<_> = arena.blocks().collect();
    for pair in blocks.windows(2) {
        assert!(!(pair[0].is_free && pair[1].is_free));
        assert_eq!(pair[0].end(), pair[1].offset);
    }
}

fn assert_contents(arena: &Arena<'_>, live: &[Live]) {
    for l in live {
        let bytes = arena.payload(l.handle, l.len).unwrap();
        assert!(bytes.iter().all(|&b| b == l.fill), "corrupted {:?}", l.handle);
    }
}

#[test]
fn random_workload_keeps_invariants_and_contents() {
    let mut mem = Mem::<{ 64 * 1024 }>::new();
    let mut arena = Arena::new(&mut mem.0);
    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
    let mut live: Vec<Live> = Vec::new();

    // The first draws may free or resize before anything was allocated.
    arena.ensure_init().unwrap();
    assert_sound(&arena);

    for step in 0..20_000u32 {
        match rng.below(10) {
            0..=4 => {
                let len = 1 + rng.below(700);
                match arena.allocate(len) {
                    Ok(handle) => {
                        assert!(handle.is_aligned_to(WORD_SIZE));
                        let fill = (step % 251) as u8;
                        arena.payload_mut(handle, len).unwrap().fill(fill);
                        live.push(Live { handle, len, fill });
                    }
                    Err(e) => assert_eq!(e, AllocError::OutOfMemory),
                }
            }
            5..=7 if !live.is_empty() => {
                let l = live.swap_remove(rng.below(live.len()));
                assert_eq!(arena.try_deallocate(l.handle), Ok(()));
            }
            8..=9 if !live.is_empty() => {
                let i = rng.below(live.len());
                let new_len = 1 + rng.below(1200);
                let old = &live[i];
                match arena.reallocate(old.handle, new_len) {
                    Ok(handle) => {
                        assert!(handle.is_aligned_to(WORD_SIZE));
                        let kept = old.len.min(new_len);
                        let fill = old.fill;
                        let bytes = arena.payload(handle, kept).unwrap();
                        assert!(bytes.iter().all(|&b| b == fill));
                        arena.payload_mut(handle, new_len).unwrap().fill(fill);
                        live[i] = Live {
                            handle,
                            len: new_len,
                            fill,
                        };
                    }
                    Err(e) => assert_eq!(e, AllocError::OutOfMemory),
                }
            }
            _ => {}
        }
        assert_sound(&arena);
    }
    assert_contents(&arena, &live);

    for l in live.drain(..) {
        arena.deallocate(l.handle);
        assert_sound(&arena);
    }
    assert_eq!(arena.blocks().count(), 1);
}

#[test]
fn zeroed_allocations_read_as_zero() {
    let mut mem = Mem::<4096>::new();
    let mut arena = Arena::new(&mut mem.0);

    // Dirty the arena first so zeroing is observable.
    let dirty = arena.allocate(1024).unwrap();
    arena.payload_mut(dirty, 1024).unwrap().fill(0xFF);
    arena.deallocate(dirty);

    let h = arena.allocate_zeroed(100, 3).unwrap();
    assert!(h.is_aligned_to(WORD_SIZE));
    let capacity = arena.usable_size(h).unwrap();
    assert!(capacity >= 300);
    assert!(arena.payload(h, capacity).unwrap().iter().all(|&b| b == 0));
}

#[test]
fn zeroed_allocation_overflow_is_out_of_memory() {
    let mut mem = Mem::<4096>::new();
    let mut arena = Arena::new(&mut mem.0);
    assert_eq!(
        arena.allocate_zeroed(usize::MAX, 2),
        Err(AllocError::OutOfMemory)
    );
    assert_eq!(
        arena.allocate_zeroed(usize::MAX / 2 + 1, 2),
        Err(AllocError::OutOfMemory)
    );
    assert_eq!(arena.allocate(usize::MAX), Err(AllocError::OutOfMemory));
    assert_eq!(arena.stats().used_blocks, 0);
}

#[test]
fn shrinking_never_moves() {
    let mut mem = Mem::<4096>::new();
    let mut arena = Arena::new(&mut mem.0);

    let h = arena.allocate(512).unwrap();
    let _pin = arena.allocate(16).unwrap();
    arena.payload_mut(h, 512).unwrap().fill(0xAB);

    for size in [512, 400, 128, 9, 1] {
        assert_eq!(arena.reallocate(h, size), Ok(h));
        assert!(arena.payload(h, size).unwrap().iter().all(|&b| b == 0xAB));
        assert_sound(&arena);
    }
    // The space given up by shrinking is free again and merged.
    assert_eq!(arena.stats().free_blocks, 2);
}

#[test]
fn growth_absorbs_a_free_successor() {
    let mut mem = Mem::<4096>::new();
    let mut arena = Arena::new(&mut mem.0);

    let h = arena.allocate(64).unwrap();
    let next = arena.allocate(256).unwrap();
    let _pin = arena.allocate(16).unwrap();
    arena.payload_mut(h, 64).unwrap().fill(0x11);
    arena.deallocate(next);

    let grown = arena.reallocate(h, 64 + 128).unwrap();
    assert_eq!(grown, h);
    assert!(arena.payload(h, 64).unwrap().iter().all(|&b| b == 0x11));
    assert_sound(&arena);

    // Exactly the combined size: no remainder is split off.
    let all = arena.reallocate(h, 64 + 256 + METADATA_SIZE).unwrap();
    assert_eq!(all, h);
    assert_eq!(arena.stats().free_blocks, 1);
    assert_sound(&arena);
}

#[test]
fn relocation_preserves_contents() {
    let mut mem = Mem::<4096>::new();
    let mut arena = Arena::new(&mut mem.0);

    let h = arena.allocate(40).unwrap();
    let _pin = arena.allocate(8).unwrap();
    let pattern: Vec<u8> = (0..40).collect();
    arena.payload_mut(h, 40).unwrap().copy_from_slice(&pattern);

    let moved = arena.reallocate(h, 1000).unwrap();
    assert_ne!(moved, h);
    assert_eq!(arena.payload(moved, 40).unwrap(), &pattern[..]);
    assert!(arena.payload(h, 1).is_none());
    assert_sound(&arena);
}

#[test]
fn failed_growth_leaves_the_original_intact() {
    let mut mem = Mem::<1024>::new();
    let mut arena = Arena::new(&mut mem.0);

    let h = arena.allocate(100).unwrap();
    let _pin = arena.allocate(8).unwrap();
    arena.payload_mut(h, 100).unwrap().fill(0x7E);
    let before: Vec<_> = arena.blocks().collect();

    assert_eq!(arena.reallocate(h, 4096), Err(AllocError::OutOfMemory));
    assert_eq!(arena.blocks().collect::<Vec<_>>(), before);
    assert!(arena.payload(h, 100).unwrap().iter().all(|&b| b == 0x7E));
}

#[test]
fn reallocating_a_stale_handle_is_rejected() {
    let mut mem = Mem::<1024>::new();
    let mut arena = Arena::new(&mut mem.0);

    let h = arena.allocate(32).unwrap();
    let _pin = arena.allocate(8).unwrap();
    arena.deallocate(h);
    assert_eq!(arena.reallocate(h, 64), Err(AllocError::InvalidHandle));
    assert_eq!(
        arena.reallocate(Handle::from_addr(8), 64),
        Err(AllocError::InvalidHandle)
    );
    assert_sound(&arena);
}
