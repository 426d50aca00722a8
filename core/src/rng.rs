//! Seeded randomness for fixture generation.
//!
//! RULE: Fixture defaults never call a platform RNG. All randomness flows
//! through `FixtureRng` streams derived from one master seed, so a build
//! sequence that exposed a hidden dependency can be replayed exactly by
//! reusing the logged seed.
//!
//! Each stream is seeded from (master_seed XOR mixed stream index). Record
//! identities and attribute values draw from separate streams: adding an
//! attribute to a definition never changes the ids of the records built.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG stream.
pub struct FixtureRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl FixtureRng {
    /// Create a stream from the master seed and a stable stream index.
    pub fn new(master_seed: u64, stream_index: u64) -> Self {
        let derived_seed = master_seed ^ (stream_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Uniform draw in [0, n). Rejection sampling keeps small domains unbiased.
    /// Returns 0 when `n == 0`.
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        let zone = u64::MAX - (u64::MAX % n);
        loop {
            let v = self.inner.next_u64();
            if v < zone {
                return v % n;
            }
        }
    }

    /// Uniform draw in [min, max]. Bounds are swapped if given backwards.
    pub fn next_i64_between(&mut self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let span = hi.wrapping_sub(lo) as u64;
        if span == u64::MAX {
            return self.inner.next_u64() as i64;
        }
        lo.wrapping_add(self.next_u64_below(span + 1) as i64)
    }

    /// Pick one element uniformly. `None` for an empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = self.next_u64_below(items.len() as u64) as usize;
        items.get(index)
    }

    pub fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }
}

/// All fixture streams for one registry, indexed by stable slot.
pub struct RngBank {
    master_seed: u64,
}

impl RngBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn for_stream(&self, slot: StreamSlot) -> FixtureRng {
        FixtureRng::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stream slot assignments.
/// NEVER reorder or remove entries. Only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum StreamSlot {
    Identity = 0,
    Values = 1,
}

impl StreamSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Values => "values",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let bank = RngBank::new(12345);
        let mut a = bank.for_stream(StreamSlot::Values);
        let mut b = bank.for_stream(StreamSlot::Values);
        for _ in 0..32 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn streams_are_independent() {
        let bank = RngBank::new(12345);
        let mut ids = bank.for_stream(StreamSlot::Identity);
        let mut values = bank.for_stream(StreamSlot::Values);
        let diverged = (0..8).any(|_| ids.next_u64() != values.next_u64());
        assert!(diverged, "identity and value streams must not coincide");
    }

    #[test]
    fn bounded_draws_stay_in_bounds() {
        let mut rng = FixtureRng::new(7, 0);
        for _ in 0..1_000 {
            assert!(rng.next_u64_below(3) < 3);
            let v = rng.next_i64_between(-5, 5);
            assert!((-5..=5).contains(&v), "out of range: {v}");
        }
        assert_eq!(rng.next_u64_below(0), 0);
        assert_eq!(rng.next_i64_between(4, 4), 4);
    }

    #[test]
    fn pick_from_empty_is_none() {
        let mut rng = FixtureRng::new(7, 0);
        let empty: [u8; 0] = [];
        assert!(rng.pick(&empty).is_none());
        assert_eq!(rng.pick(&["only"]), Some(&"only"));
    }
}
