#![no_std]

extern crate alloc;

use core::fmt;

pub use coin::*;
pub use config::*;
pub use error::*;
pub use generator::*;
pub use grid::*;
pub use movement::*;
pub use persistence::*;
pub use session::*;
pub use types::*;
pub use visibility::*;
pub use world::*;

mod coin;
mod config;
mod error;
mod generator;
mod grid;
mod movement;
mod persistence;
mod session;
mod types;
mod visibility;
mod world;

/// Why an interaction left every piece of state untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// The cell has nothing left to take.
    Empty,
    /// The held coin and the cell's coin differ.
    ValueMismatch { held: CoinValue, cell: CoinValue },
    /// The cell is not visible or too far from the player.
    OutOfReach,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "There is no coin left here"),
            Self::ValueMismatch { held, cell } => write!(
                f,
                "Your coin ({held}) does not match this cache's coin ({cell})"
            ),
            Self::OutOfReach => write!(f, "That cache is too far away"),
        }
    }
}

/// Outcome of touching a cell with the currently held coin
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Interaction {
    PickedUp(CoinValue),
    Merged(CoinValue),
    Rejected(Rejection),
}

impl Interaction {
    /// Whether this outcome wrote to the overlay
    pub const fn has_update(self) -> bool {
        use Interaction::*;
        match self {
            PickedUp(_) => true,
            Merged(_) => true,
            Rejected(_) => false,
        }
    }
}

/// Outcome of a movement command
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MoveOutcome {
    /// The player changed cell.
    Moved(CellId),
    /// The command resolved to the cell the player already stands on.
    NoChange,
    /// The command does not belong to the active movement strategy.
    Ignored,
    /// The command could not be mapped onto the grid.
    Invalid(GridError),
}

impl MoveOutcome {
    pub const fn has_update(self) -> bool {
        matches!(self, Self::Moved(_))
    }
}
