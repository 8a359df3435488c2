//! Atomic bit operations over a shared word array.
//!
//! The pending bitmap lives in memory the host writes at any moment, so every
//! operation here is a single hardware read-modify-write (or load) with
//! `SeqCst` ordering. That makes each call a full barrier: no surrounding load
//! or store moves across it.

use std::sync::atomic::{AtomicUsize, Ordering};

const WORD_BITS: usize = usize::BITS as usize;

#[inline]
fn locate(index: usize) -> (usize, usize) {
    (index / WORD_BITS, 1usize << (index % WORD_BITS))
}

/// Number of bits addressable in `words`.
pub fn bit_capacity(words: &[AtomicUsize]) -> usize {
    words.len() * WORD_BITS
}

/// Atomically clear bit `index` and return whether it was set.
///
/// # Panics
/// Panics if `index` is outside `words`.
pub fn test_and_clear_bit(index: usize, words: &[AtomicUsize]) -> bool {
    let (word, mask) = locate(index);
    words[word].fetch_and(!mask, Ordering::SeqCst) & mask != 0
}

/// Atomically read bit `index` without modifying it.
///
/// # Panics
/// Panics if `index` is outside `words`.
pub fn test_bit(index: usize, words: &[AtomicUsize]) -> bool {
    let (word, mask) = locate(index);
    words[word].load(Ordering::SeqCst) & mask != 0
}

/// Atomically set bit `index` and return whether it was already set.
///
/// This is the peer's side of the pending flag.
///
/// # Panics
/// Panics if `index` is outside `words`.
pub fn set_bit(index: usize, words: &[AtomicUsize]) -> bool {
    let (word, mask) = locate(index);
    words[word].fetch_or(mask, Ordering::SeqCst) & mask != 0
}
