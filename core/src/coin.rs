use serde::{Deserialize, Serialize};

use crate::*;

/// Valid transitions:
/// - Empty -> Holding (pickup, whatever the coin's value)
/// - Holding -> Holding (merge not landing on the victory value)
/// - Holding -> Won (merge landing exactly on the victory value)
/// - Won -> Won (any later merge)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinState {
    Empty,
    Holding(CoinValue),
    Won(CoinValue),
}

impl CoinState {
    /// State implied by a held coin, as restored from a snapshot. Play itself only reaches
    /// `Won` through [`CoinMachine::interact`].
    pub const fn from_held(held: Option<CoinValue>, victory: CoinValue) -> Self {
        match held {
            None => Self::Empty,
            Some(value) if value >= victory => Self::Won(value),
            Some(value) => Self::Holding(value),
        }
    }

    pub const fn held(self) -> Option<CoinValue> {
        match self {
            Self::Empty => None,
            Self::Holding(value) | Self::Won(value) => Some(value),
        }
    }

    pub const fn is_won(self) -> bool {
        matches!(self, Self::Won(_))
    }
}

impl Default for CoinState {
    fn default() -> Self {
        Self::Empty
    }
}

/// What one interaction did to the held coin
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CoinTransition {
    Unchanged(Rejection),
    PickedUp(CoinValue),
    Merged(CoinValue),
    /// The merge that first reached the victory value.
    Victory(CoinValue),
}

impl CoinTransition {
    /// Whether this transition changed player or world state
    pub const fn has_update(self) -> bool {
        use CoinTransition::*;
        match self {
            Unchanged(_) => false,
            PickedUp(_) => true,
            Merged(_) => true,
            Victory(_) => true,
        }
    }
}

/// Tracks the single coin the player carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CoinMachine {
    state: CoinState,
    victory: CoinValue,
}

impl CoinMachine {
    pub const fn new(held: Option<CoinValue>, victory: CoinValue) -> Self {
        Self {
            state: CoinState::from_held(held, victory),
            victory,
        }
    }

    pub const fn state(&self) -> CoinState {
        self.state
    }

    pub const fn held(&self) -> Option<CoinValue> {
        self.state.held()
    }

    pub const fn victory(&self) -> CoinValue {
        self.victory
    }

    /// Touches `cell` with the held coin. All world changes go through
    /// [`WorldState::apply_interaction`].
    pub fn interact(&mut self, world: &mut WorldState, cell: CellId) -> CoinTransition {
        let was_won = self.state.is_won();

        match world.apply_interaction(cell, self.held()) {
            Interaction::Rejected(reason) => {
                log::debug!("Interaction with {} rejected: {}", cell, reason);
                CoinTransition::Unchanged(reason)
            }
            Interaction::PickedUp(value) => {
                // a found coin never wins on its own, whatever its value
                self.state = CoinState::Holding(value);
                CoinTransition::PickedUp(value)
            }
            Interaction::Merged(value) => {
                let reached = value == self.victory;
                self.state = if reached || was_won {
                    CoinState::Won(value)
                } else {
                    CoinState::Holding(value)
                };
                if reached && !was_won {
                    log::info!("Reached the victory coin {}", value);
                    CoinTransition::Victory(value)
                } else {
                    CoinTransition::Merged(value)
                }
            }
        }
    }
}
