use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::GridError;

/// Single grid axis index; the world is unbounded in both directions up to the type's range.
pub type Axis = i32;

/// Face value of a coin.
pub type CoinValue = u32;

/// Discrete cell identifier `(i, j)`, `i` follows latitude and `j` longitude.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub i: Axis,
    pub j: Axis,
}

impl CellId {
    pub const fn new(i: Axis, j: Axis) -> Self {
        Self { i, j }
    }

    /// Applies `(di, dj)`, returning a value only when it stays addressable.
    pub fn offset(self, di: Axis, dj: Axis) -> Option<Self> {
        Some(Self::new(self.i.checked_add(di)?, self.j.checked_add(dj)?))
    }

    /// Chessboard distance in cells.
    pub fn chebyshev(self, other: Self) -> u32 {
        self.i.abs_diff(other.i).max(self.j.abs_diff(other.j))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.i, self.j)
    }
}

impl FromStr for CellId {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (i, j) = s.split_once(',').ok_or(GridError::MalformedKey)?;
        let i = i.trim().parse().map_err(|_| GridError::MalformedKey)?;
        let j = j.trim().parse().map_err(|_| GridError::MalformedKey)?;
        Ok(Self::new(i, j))
    }
}

/// Continuous position in degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Everything the player carries between events.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub position: CellId,
    pub held_coin: Option<CoinValue>,
}

/// Iterates every cell of the square of `radius` cells around `center`, row by row.
///
/// Cells that would fall outside the addressable range are skipped.
#[derive(Debug)]
pub struct Neighborhood {
    center: CellId,
    radius: Axis,
    di: Axis,
    dj: Axis,
}

impl Neighborhood {
    pub fn new(center: CellId, radius: u16) -> Self {
        let radius = Axis::from(radius);
        Self {
            center,
            radius,
            di: -radius,
            dj: -radius,
        }
    }
}

impl Iterator for Neighborhood {
    type Item = CellId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.di > self.radius {
                return None;
            }

            let next_item = self.center.offset(self.di, self.dj);
            if self.dj == self.radius {
                self.dj = -self.radius;
                self.di += 1;
            } else {
                self.dj += 1;
            }

            if next_item.is_some() {
                return next_item;
            }
        }
    }
}
