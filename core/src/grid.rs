use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::*;

/// Mean Earth radius in metres, used for real-world distances.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Quotients within this many ulps of an integer count as lying on a cell edge.
const EDGE_ULPS: f64 = 4.0;

/// Maps continuous coordinates onto the unbounded cell grid and back.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    cell_size: f64,
}

impl Grid {
    /// `cell_size` is in degrees and must be positive; [`GameConfig::validate`] checks it.
    pub const fn new(cell_size: f64) -> Self {
        Self { cell_size }
    }

    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Cell containing `position`, flooring toward negative infinity on both axes.
    ///
    /// A coordinate sitting exactly on an edge belongs to the cell whose lower edge it is,
    /// even when the division lands a hair below the integer.
    pub fn to_cell(&self, position: LatLng) -> Result<CellId> {
        Ok(CellId::new(
            self.axis_index(position.lat)?,
            self.axis_index(position.lng)?,
        ))
    }

    /// Midpoint of `cell`.
    pub fn to_center(&self, cell: CellId) -> LatLng {
        LatLng::new(self.axis_center(cell.i), self.axis_center(cell.j))
    }

    fn axis_index(&self, coord: f64) -> Result<Axis> {
        if !coord.is_finite() {
            return Err(GridError::NonFinite);
        }

        let quotient = coord / self.cell_size;
        let nearest = quotient.round();
        let tolerance = EDGE_ULPS * f64::EPSILON * nearest.abs().max(1.0);
        let index = if (quotient - nearest).abs() <= tolerance {
            nearest
        } else {
            quotient.floor()
        };

        if !(f64::from(Axis::MIN)..=f64::from(Axis::MAX)).contains(&index) {
            return Err(GridError::OutOfRange);
        }
        Ok(index as Axis)
    }

    fn axis_center(&self, index: Axis) -> f64 {
        f64::from(index) * self.cell_size + self.cell_size / 2.0
    }
}

/// Great-circle distance in metres (haversine).
pub fn distance_m(a: LatLng, b: LatLng) -> f64 {
    let (lat_a, lat_b) = (a.lat.to_radians(), b.lat.to_radians());
    let d_lat = lat_b - lat_a;
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}
