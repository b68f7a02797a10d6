use futures_channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use serde::{Deserialize, Serialize};

use crate::*;

/// Directional controls; north/south walk `i` (latitude), east/west walk `j` (longitude).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::East, Self::West];

    pub const fn delta(self) -> (Axis, Axis) {
        match self {
            Self::North => (1, 0),
            Self::South => (-1, 0),
            Self::East => (0, 1),
            Self::West => (0, -1),
        }
    }
}

/// A movement request, before the active strategy interprets it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MoveCommand {
    By { di: Axis, dj: Axis },
    ToAbsolute(LatLng),
}

impl From<Direction> for MoveCommand {
    fn from(direction: Direction) -> Self {
        let (di, dj) = direction.delta();
        Self::By { di, dj }
    }
}

/// How a strategy answered a command.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MoveResolution {
    Target(CellId),
    Ignored,
    Invalid(GridError),
}

/// The two interchangeable movement strategies.
///
/// Switching is a plain value swap; both strategies only name a target cell and leave the
/// actual relocation to the session.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementMode {
    /// Step cell by cell from directional controls.
    #[default]
    Discrete,
    /// Follow absolute fixes from a location sensor.
    Sensor,
}

impl MovementMode {
    pub fn resolve(self, grid: &Grid, from: CellId, command: MoveCommand) -> MoveResolution {
        use MoveResolution::*;

        match (self, command) {
            (Self::Discrete, MoveCommand::By { di, dj }) => match from.offset(di, dj) {
                Some(cell) => Target(cell),
                None => Invalid(GridError::OutOfRange),
            },
            (Self::Sensor, MoveCommand::ToAbsolute(position)) => match grid.to_cell(position) {
                Ok(cell) => Target(cell),
                Err(err) => Invalid(err),
            },
            _ => Ignored,
        }
    }
}

/// Handle the external location source pushes fixes through.
#[derive(Clone, Debug)]
pub struct SensorSender {
    inner: UnboundedSender<LatLng>,
}

impl SensorSender {
    /// Queues a fix. Returns `false` once the feed has been shut down.
    pub fn deliver(&self, position: LatLng) -> bool {
        self.inner.unbounded_send(position).is_ok()
    }

    pub fn is_active(&self) -> bool {
        !self.inner.is_closed()
    }
}

/// Receiving end of the location sensor, owned by the session while the sensor strategy is on.
#[derive(Debug)]
pub struct SensorFeed {
    receiver: UnboundedReceiver<LatLng>,
}

impl SensorFeed {
    pub fn open() -> (Self, SensorSender) {
        let (inner, receiver) = mpsc::unbounded();
        (Self { receiver }, SensorSender { inner })
    }

    /// Next queued fix, without waiting.
    pub fn next_fix(&mut self) -> Option<LatLng> {
        self.receiver.try_recv().ok()
    }

    /// Stops accepting fixes and drops any still queued.
    pub fn close(mut self) {
        self.receiver.close();
        while let Ok(stale) = self.receiver.try_recv() {
            log::debug!("Dropping stale sensor fix {:?}", stale);
        }
    }
}
