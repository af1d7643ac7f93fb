// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Provides a seedable random-number generator, so that anything jittered
//! (sweep lengths, autoplay cadence, restart-point picks) can be replayed
//! exactly in tests.

use byteorder::{BigEndian, ByteOrder};

/// A pseudorandom number generator (PRNG) for applications that don't require
/// cryptographically secure random numbers.
#[derive(Debug)]
pub struct Rng(oorandom::Rand64);
impl Rng {
    /// Pass the same number to [Rng::new_with_seed()] to get the same stream
    /// back again. Good for reproducing test failures.
    pub fn new_with_seed(seed: u128) -> Self {
        Self(oorandom::Rand64::new(seed))
    }

    /// A fresh seed from the OS. Log it to be able to replay a run.
    pub fn generate_seed() -> anyhow::Result<u128> {
        let mut bytes = [0u8; 16];

        getrandom::getrandom(&mut bytes)?;
        Ok(BigEndian::read_u128(&bytes))
    }

    #[allow(missing_docs)]
    pub fn rand_u64(&mut self) -> u64 {
        self.0.rand_u64()
    }

    /// A value in `range`. An empty range yields its start.
    pub fn rand_range(&mut self, range: core::ops::Range<u64>) -> u64 {
        if range.is_empty() {
            return range.start;
        }
        self.0.rand_range(range)
    }

    /// A uniformly chosen element, or `None` if `items` is empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            None
        } else {
            items.get(self.rand_range(0..items.len() as u64) as usize)
        }
    }
}
