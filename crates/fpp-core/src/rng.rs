//! Seed-derivation helpers for bootstrap resampling.

use siphasher::sip::SipHasher13;
use std::hash::Hasher;

/// Derives the deterministic seed for a specific substream.
///
/// Substreams are derived by hashing `(master_seed, substream)` with
/// SipHash-1-3 configured with fixed zero keys. The rule is stable across
/// platforms so a bootstrap run with the same master seed asks the backend
/// for the same resamples in the same order.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(substream);
    hasher.finish()
}

/// Iterator over the per-iteration seeds of a bootstrap run.
#[derive(Debug, Clone)]
pub struct SubstreamSeeds {
    master_seed: u64,
    next: u64,
    end: u64,
}

impl SubstreamSeeds {
    /// Creates an iterator yielding `count` substream seeds of `master_seed`.
    pub fn new(master_seed: u64, count: u64) -> Self {
        Self {
            master_seed,
            next: 0,
            end: count,
        }
    }
}

impl Iterator for SubstreamSeeds {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.next >= self.end {
            return None;
        }
        let seed = derive_substream_seed(self.master_seed, self.next);
        self.next += 1;
        Some(seed)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SubstreamSeeds {}
