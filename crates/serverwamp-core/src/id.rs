//! ID generation utilities.
//!
//! WAMP session and publication ids are integers in `[1, 2^53]` so that they
//! survive a round trip through IEEE-754 doubles on JavaScript peers.

use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Largest identifier value (2^53).
pub const MAX_ID: u64 = 1 << 53;

/// Check if an id lies in the WAMP identifier range.
pub fn is_valid_id(id: u64) -> bool {
    (1..=MAX_ID).contains(&id)
}

/// Source of session and publication identifiers.
pub trait IdGenerator: Send + Sync {
    /// Return the next identifier in `[1, MAX_ID]`.
    fn next_id(&self) -> u64;
}

/// Uniformly random identifiers.
///
/// Hard to guess in practice, but not a cryptographic source.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn next_id(&self) -> u64 {
        rand::thread_rng().gen_range(1..=MAX_ID)
    }
}

/// Monotonic identifiers for deterministic tests.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    next: AtomicU64,
}

impl SequentialIdGenerator {
    /// Start counting at `first`, clamped into the id range.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first.clamp(1, MAX_ID)),
        }
    }
}

impl Default for SequentialIdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn next_id(&self) -> u64 {
        let mut current = self.next.load(Ordering::Relaxed);
        loop {
            let following = if current >= MAX_ID { 1 } else { current + 1 };
            match self.next.compare_exchange_weak(
                current,
                following,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(actual) => current = actual,
            }
        }
    }
}
