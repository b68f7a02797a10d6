use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::*;

/// A cell that no longer matches what the generator would produce for it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRecord {
    #[serde(default)]
    pub value: CoinValue,
    pub picked_up: bool,
}

impl CellRecord {
    /// Record left behind once a cache's coin has been taken.
    pub const fn picked() -> Self {
        Self {
            value: 0,
            picked_up: true,
        }
    }
}

/// Authoritative value of every cell in the unbounded world.
///
/// Untouched cells are never stored: their value is regenerated on demand, with an optional
/// memo in `defaults`. Cells the player has touched live in `overlay` until an explicit reset.
#[derive(Debug)]
pub struct WorldState {
    generator: ValueGenerator,
    overlay: HashMap<CellId, CellRecord>,
    defaults: RefCell<HashMap<CellId, CoinValue>>,
}

impl WorldState {
    pub fn new(generator: ValueGenerator) -> Self {
        Self {
            generator,
            overlay: HashMap::new(),
            defaults: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_overlay(
        generator: ValueGenerator,
        overlay: impl IntoIterator<Item = (CellId, CellRecord)>,
    ) -> Self {
        let mut world = Self::new(generator);
        world.overlay.extend(overlay);
        world
    }

    pub fn generator(&self) -> &ValueGenerator {
        &self.generator
    }

    /// Current value of `cell`: a picked-up record wins, the generator fills in the rest.
    ///
    /// Never touches the memo, so scanning arbitrary cells costs no memory.
    pub fn value(&self, cell: CellId) -> CoinValue {
        match self.overlay.get(&cell) {
            Some(record) if record.picked_up => record.value,
            _ => self.generator.default_value(cell),
        }
    }

    /// Like [`Self::value`], but memoises the generated default.
    ///
    /// Callers own eviction: every cell read this way must later go through
    /// [`Self::forget_defaults`].
    pub fn cached_value(&self, cell: CellId) -> CoinValue {
        match self.overlay.get(&cell) {
            Some(record) if record.picked_up => record.value,
            _ => self.memoised_default(cell),
        }
    }

    fn memoised_default(&self, cell: CellId) -> CoinValue {
        let cached = self.defaults.borrow().get(&cell).copied();
        cached.unwrap_or_else(|| {
            let value = self.generator.default_value(cell);
            self.defaults.borrow_mut().insert(cell, value);
            value
        })
    }

    pub fn record(&self, cell: CellId) -> Option<CellRecord> {
        self.overlay.get(&cell).copied()
    }

    /// Touches `cell` with `held`, recording the divergence on success.
    ///
    /// With nothing held the cell's coin is picked up; with a coin of equal value the two merge
    /// into one of twice the value. Anything else is rejected and nothing changes.
    pub fn apply_interaction(&mut self, cell: CellId, held: Option<CoinValue>) -> Interaction {
        use Interaction::*;

        let current = self.value(cell);
        if current == 0 {
            return Rejected(Rejection::Empty);
        }

        let outcome = match held {
            None => PickedUp(current),
            Some(held) if held == current => Merged(held.saturating_mul(2)),
            Some(held) => {
                return Rejected(Rejection::ValueMismatch {
                    held,
                    cell: current,
                });
            }
        };

        self.overlay.insert(cell, CellRecord::picked());
        log::debug!("Cell {} emptied: {:?}", cell, outcome);
        outcome
    }

    pub fn overlay_len(&self) -> usize {
        self.overlay.len()
    }

    /// Overlay entries ordered by cell, for stable snapshots.
    pub fn sorted_overlay(&self) -> Vec<(CellId, CellRecord)> {
        let mut entries: Vec<_> = self.overlay.iter().map(|(&c, &r)| (c, r)).collect();
        entries.sort_unstable_by_key(|&(cell, _)| cell);
        entries
    }

    /// Drops memoised defaults, usually for cells that just left the visibility window.
    pub fn forget_defaults(&self, cells: impl IntoIterator<Item = CellId>) {
        let mut defaults = self.defaults.borrow_mut();
        for cell in cells {
            defaults.remove(&cell);
        }
    }

    pub fn memoised_len(&self) -> usize {
        self.defaults.borrow().len()
    }

    /// Forgets every touched cell.
    pub fn clear(&mut self) {
        self.overlay.clear();
        self.defaults.get_mut().clear();
    }
}
