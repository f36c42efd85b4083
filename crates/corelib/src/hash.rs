//! Order-sensitive hash accumulation.
//!
//! Endpoint hashes may be compared between processes, so they cannot come
//! from `std`'s randomly seeded hashers. `HashCombiner` folds values with the
//! classic `h * 33 ^ v` step over wrapping `i32` arithmetic, which gives the
//! same result for the same sequence of values on every platform.

use std::net::IpAddr;

/// Initial value of every endpoint hash.
pub const HASH_SEED: i32 = 5381;

/// Accumulates values into a reproducible 32-bit hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCombiner(i32);

impl Default for HashCombiner {
    fn default() -> Self {
        Self::new()
    }
}

impl HashCombiner {
    /// Start from [`HASH_SEED`].
    pub fn new() -> Self {
        Self(HASH_SEED)
    }

    /// Start from an arbitrary seed.
    pub fn with_seed(seed: i32) -> Self {
        Self(seed)
    }

    #[inline]
    pub fn add_i32(&mut self, value: i32) -> &mut Self {
        self.0 = (self.0 << 5).wrapping_add(self.0) ^ value;
        self
    }

    pub fn add_i16(&mut self, value: i16) -> &mut Self {
        self.add_i32(i32::from(value))
    }

    pub fn add_u16(&mut self, value: u16) -> &mut Self {
        self.add_i32(i32::from(value))
    }

    pub fn add_bool(&mut self, value: bool) -> &mut Self {
        self.add_i32(i32::from(value))
    }

    /// Folds each character of `value` in order.
    pub fn add_str(&mut self, value: &str) -> &mut Self {
        for c in value.chars() {
            self.add_i32(c as i32);
        }
        self
    }

    /// Folds the canonical string form of an IP address.
    pub fn add_ip(&mut self, value: &IpAddr) -> &mut Self {
        self.add_str(&value.to_string())
    }

    pub fn finish(&self) -> i32 {
        self.0
    }
}
