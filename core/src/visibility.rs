use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::*;

/// Whether the player may act on a visible cache or only look at it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reach {
    Interactive,
    ReadOnly,
}

impl Reach {
    pub const fn is_interactive(self) -> bool {
        matches!(self, Self::Interactive)
    }
}

/// Every cache within `radius` cells (Chebyshev) of `center`.
pub fn compute_visible(center: CellId, radius: u16, generator: &ValueGenerator) -> BTreeSet<CellId> {
    Neighborhood::new(center, radius)
        .filter(|&cell| generator.spawns(cell))
        .collect()
}

/// Interactive iff the cell's center is within `reach_m` metres of the player's cell center.
pub fn classify(grid: &Grid, cell: CellId, player: CellId, reach_m: f64) -> Reach {
    if distance_m(grid.to_center(player), grid.to_center(cell)) <= reach_m {
        Reach::Interactive
    } else {
        Reach::ReadOnly
    }
}

/// Cells that appeared and disappeared in one refresh.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowDiff {
    pub entered: Vec<CellId>,
    pub left: Vec<CellId>,
}

/// The caches currently around the player.
///
/// Holds no cell state of its own: the set is rebuilt from scratch on every refresh, and
/// anything that must survive lives in [`WorldState`].
#[derive(Clone, Debug, Default)]
pub struct VisibilityWindow {
    radius: u16,
    visible: BTreeSet<CellId>,
}

impl VisibilityWindow {
    pub fn new(radius: u16) -> Self {
        Self {
            radius,
            visible: BTreeSet::new(),
        }
    }

    pub fn radius(&self) -> u16 {
        self.radius
    }

    pub fn refresh(&mut self, center: CellId, generator: &ValueGenerator) -> WindowDiff {
        let next = compute_visible(center, self.radius, generator);
        let diff = WindowDiff {
            entered: next.difference(&self.visible).copied().collect(),
            left: self.visible.difference(&next).copied().collect(),
        };
        log::trace!(
            "Window around {}: {} visible, {} entered, {} left",
            center,
            next.len(),
            diff.entered.len(),
            diff.left.len()
        );
        self.visible = next;
        diff
    }

    /// Empties the window, returning what was visible.
    pub fn clear(&mut self) -> Vec<CellId> {
        core::mem::take(&mut self.visible).into_iter().collect()
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.visible.contains(&cell)
    }

    pub fn cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.visible.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }
}
