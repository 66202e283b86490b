//! Deterministic random number generation.
//!
//! RULE: Nothing in the engine may call any platform RNG.
//! All randomness flows through SubsystemRng instances derived
//! from the single master seed stored on the run.
//!
//! Streams are derived from (master_seed, slot, tick) for tick work and
//! (master_seed, slot, tick, intent_seq) for player intents, so:
//!   - Adding a new slot never changes existing slots' streams.
//!   - No RNG state has to be saved; a restored run replays identically.

use rand::{RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

const GOLDEN: u64 = 0x9e37_79b9_7f4a_7c15;

/// A named, deterministic RNG for a single stage.
pub struct SubsystemRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl SubsystemRng {
    /// Create an RNG from an already-mixed seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    /// Roll an index in [0, n). Returns 0 when n is 0.
    pub fn pick_index(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        (self.inner.next_u64() % n as u64) as usize
    }

    /// Bernoulli trial: returns true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.next_f64() < p
    }
}

fn mix(mut x: u64) -> u64 {
    // splitmix64 finalizer
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

/// All stage RNGs for a single run, indexed by stable slot.
#[derive(Debug, Clone, Copy)]
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

    /// Stream for a stage's work during one tick.
    pub fn for_tick(&self, slot: SubsystemSlot, tick: u64) -> SubsystemRng {
        let seed = mix(self.master_seed ^ (slot as u64).wrapping_mul(GOLDEN) ^ mix(tick));
        SubsystemRng::from_seed(seed).with_name(slot.name())
    }

    /// Stream for one player intent. `seq` is the clock's intent counter.
    pub fn for_intent(&self, slot: SubsystemSlot, tick: u64, seq: u64) -> SubsystemRng {
        let seed = mix(
            self.master_seed
                ^ (slot as u64).wrapping_mul(GOLDEN)
                ^ mix(tick)
                ^ mix(seq.wrapping_add(GOLDEN)),
        );
        SubsystemRng::from_seed(seed).with_name(slot.name())
    }
}

/// Stable slot assignments.
/// NEVER reorder or remove entries — only append.
/// Reordering changes every stage's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum SubsystemSlot {
    Ledger = 0,
    Crisis = 1,
    Progression = 2,
    Narrative = 3,
    Rival = 4,
    DataLog = 5,
}

impl SubsystemSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ledger => "ledger",
            Self::Crisis => "crisis",
            Self::Progression => "progression",
            Self::Narrative => "narrative",
            Self::Rival => "rival",
            Self::DataLog => "datalog",
        }
    }
}
