//! # Kernel Heap
//!
//! The resident memory allocator of the kernel. It carves one fixed memory
//! region, handed over once at boot, into variable-sized allocations for every
//! other kernel subsystem.
//!
//! ## Design outline
//!
//! ```text
//! arena base                                                    base + len
//! ┌──────────┬──────────────┬──────────┬───────────┬──────────┬─────────────┐
//! │ header A │  payload A   │ header B │ payload B │ header C │  payload C  │
//! │  in use  │              │   free   │           │  in use  │             │
//! └──────────┴──────────────┴──────────┴───────────┴──────────┴─────────────┘
//!       │ next ─────────────────▲ │ next ────────────▲
//! ```
//!
//! - **Arena**: a single contiguous region ([`Arena`]); fixed base and length,
//!   never grown. Owned by value and passed explicitly, so independent arenas
//!   can coexist (e.g. in tests).
//! - **Blocks**: an intrusive, address-ordered, singly linked sequence covering
//!   the arena without gaps. Each block starts with a two-word header (size,
//!   free flag, tag, link to the next block) directly in front of its payload.
//!   Links are arena-relative offsets, not pointers.
//! - **Allocation**: first-fit over the physical sequence. The chosen block is
//!   split when the remainder can hold a block of its own, otherwise handed
//!   out whole.
//! - **Deallocation**: the block is marked free and coalesced with a free
//!   successor and a free predecessor. The predecessor is found by a linear
//!   scan from the base, which bounds this design to small heaps.
//! - **Reallocation**: shrinks and grows in place whenever the block (plus a
//!   free successor) suffices, and only copies otherwise.
//!
//! ## Invariants
//!
//! Before and after every public operation:
//! - the block sizes sum to the arena length,
//! - no two neighboring blocks are both free,
//! - every block holds at least [`MIN_BLOCK_SIZE`] bytes,
//! - every handle handed out is aligned to [`WORD_SIZE`].
//!
//! [`Arena::check`] verifies all of them.
//!
//! ## Handles
//!
//! A [`Handle`] is the payload address, a plain `usize`-sized value. The arena
//! validates every handle it is given: foreign addresses, addresses that are
//! not preceded by a tagged block header and double frees are rejected with
//! [`AllocError::InvalidHandle`] (and ignored by [`Arena::deallocate`]).
//!
//! The check is O(1) and relies on the header tag. Payload bytes can mimic a
//! tagged header, so in release builds a handle pointing just past such bytes
//! is accepted. Debug builds additionally walk the block sequence and reject
//! any handle that does not name a real block start.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_heap::Arena;
//!
//! let mut memory = [0u8; 4096];
//! let mut arena = Arena::new(&mut memory);
//!
//! let greeting = arena.duplicate(b"hello").unwrap();
//! let buffer = arena.allocate_zeroed(16, 4).unwrap();
//! let greeting = arena.reallocate(greeting, 256).unwrap();
//! assert_eq!(arena.payload(greeting, 5), Some(&b"hello"[..]));
//!
//! arena.deallocate(buffer);
//! arena.deallocate(greeting);
//! assert_eq!(arena.stats().used_blocks, 0);
//! assert!(arena.check().is_ok());
//! ```
//!
//! The kernel itself uses the `.bss`-backed [`KERNEL_HEAP`] through
//! [`kernel_heap`]; with the `global-allocator` feature on a bare-metal
//! target it is also installed as Rust's global allocator.
//!
//! ## Constraints & caveats
//! - Single region, fixed capacity, no paging.
//! - [`LockedArena`] serializes operations but does not mask interrupts;
//!   interrupt handlers must not allocate.
//! - Alignments beyond [`WORD_SIZE`] are not supported.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod arena;
mod block;
mod error;
mod handle;
mod heap;
mod inspect;
mod locked;
mod static_heap;

pub use arena::Arena;
pub use block::{BlockInfo, MAX_BLOCK_SIZE, METADATA_SIZE, MIN_BLOCK_SIZE, MIN_PAYLOAD, WORD_SIZE};
pub use error::{AllocError, InvariantViolation};
pub use handle::Handle;
pub use inspect::{Blocks, HeapStats};
pub use locked::LockedArena;
pub use static_heap::{KERNEL_HEAP, KernelAllocator, ensure_init, kernel_heap};
