use alloc::vec::Vec;

use crate::*;

const SPAWN_SALT: u64 = 0x7370_6177_6e00_0001;
const VALUE_SALT: u64 = 0x7661_6c75_6500_0002;

/// Reproducible per-cell randomness.
///
/// Every answer is a pure function of `(seed, i, j)`: no counters, no call-order effects, and the
/// same bits on every platform.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueGenerator {
    seed: u64,
    spawn_threshold: f64,
    denominations: Vec<CoinValue>,
}

impl ValueGenerator {
    pub fn new(seed: u64, spawn_threshold: f64, denominations: Vec<CoinValue>) -> Self {
        Self {
            seed,
            spawn_threshold,
            denominations,
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(
            config.seed,
            config.spawn_threshold,
            config.denominations.clone(),
        )
    }

    /// Whether a cache exists at `cell`.
    pub fn spawns(&self, cell: CellId) -> bool {
        self.unit(cell, SPAWN_SALT) < self.spawn_threshold
    }

    /// Coin a never-touched cache at `cell` holds.
    pub fn default_value(&self, cell: CellId) -> CoinValue {
        let len = self.denominations.len() as u64;
        self.hash(cell, VALUE_SALT)
            .checked_rem(len)
            .and_then(|index| self.denominations.get(index as usize))
            .copied()
            .unwrap_or_default()
    }

    fn hash(&self, cell: CellId, salt: u64) -> u64 {
        let mut h = mix(self.seed ^ salt);
        h = mix(h ^ u64::from(cell.i as u32));
        mix(h ^ (u64::from(cell.j as u32) << 32))
    }

    /// Uniform in `[0, 1)` from the top 53 bits.
    fn unit(&self, cell: CellId, salt: u64) -> f64 {
        (self.hash(cell, salt) >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}

/// SplitMix64 finalizer.
const fn mix(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}
