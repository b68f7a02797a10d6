use alloc::string::String;
use thiserror::Error;

use crate::CellId;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Coordinates are not finite")]
    NonFinite,
    #[error("Coordinates fall outside the addressable grid")]
    OutOfRange,
    #[error("Malformed cell key")]
    MalformedKey,
}

pub type Result<T> = core::result::Result<T, GridError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Cell size must be a positive finite number of degrees")]
    CellSize,
    #[error("Origin is not addressable: {0}")]
    Origin(GridError),
    #[error("Spawn threshold must lie within [0, 1]")]
    SpawnThreshold,
    #[error("Denominations must be non-empty, positive and strictly ascending")]
    Denominations,
    #[error("Interaction radius must be positive and smaller than the visibility radius")]
    InteractionRadius,
    #[error("Victory value must be a power of two above the initial coin")]
    VictoryValue,
    #[error("Could not decode config: {0}")]
    Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage backend failed: {0}")]
    Backend(String),
    #[error("Could not encode snapshot: {0}")]
    Encode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Could not decode snapshot: {0}")]
    Decode(String),
    #[error("Cell {0} appears more than once in the overlay")]
    DuplicateCell(CellId),
    #[error("Cell {0} is picked up but still records a value")]
    PickedCellHasValue(CellId),
    #[error("Held coin cannot be zero")]
    EmptyHeldCoin,
}
