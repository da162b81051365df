//! # Kernel synchronization primitives
//!
//! A single test-and-test-and-set [`SpinLock`] guarding the kernel's shared
//! state (today: the heap arena). It does not touch the interrupt flag.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{SpinLock, SpinLockGuard};
