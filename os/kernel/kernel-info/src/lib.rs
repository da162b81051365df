//! # Kernel Configuration
//!
//! Compile-time platform constants shared between the boot code and the
//! kernel's resident subsystems. The boot path hands the kernel exactly one
//! fixed memory region for its heap; this crate is the single source of truth
//! for the size and alignment of that region.
//!
//! ## Physical Memory Layout
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │     Low Memory (< 1MiB)         │
//!             │  (BIOS, VGA text buffer, ...)   │
//!             ├─────────────────────────────────┤ 0x0010_0000 (1 MiB)
//!             │       Kernel Image              │
//!             │   (Text, Data, BSS)             │
//!             │   └─ .bss.heap (the heap)       │
//!             └─────────────────────────────────┘
//! ```
//!
//! The heap lives inside the kernel image's `.bss`, so its base address is
//! fixed by the linker and its length by [`KERNEL_HEAP_SIZE`](memory::KERNEL_HEAP_SIZE).
//! Platforms that reserve a different region can hand its base and length to
//! the allocator directly; the allocator never discovers memory on its own.
//!
//! ## Configuration Management
//!
//! All values are `const` and validated by compile-time assertions, so an
//! invalid configuration fails the build instead of the boot.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
