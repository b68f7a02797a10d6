use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::*;

/// String-keyed durable storage, e.g. the browser's `localStorage`.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> core::result::Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> core::result::Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> core::result::Result<(), StoreError>;
}

/// Process-local store, lost on exit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> core::result::Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> core::result::Result<(), StoreError> {
        self.entries.insert(key.into(), value.into());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> core::result::Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &mut S {
    fn get(&self, key: &str) -> core::result::Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> core::result::Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> core::result::Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// One overlay entry on the wire: `["i,j", { "pickedUp": true, "value": 0 }]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayEntry(#[serde(with = "cell_key")] pub CellId, pub CellRecord);

/// The only durable entity: the player plus every touched cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub player: PlayerState,
    pub overlay: Vec<OverlayEntry>,
}

impl Snapshot {
    /// Builds a snapshot with overlay entries ordered by cell.
    pub fn new(player: PlayerState, overlay: impl IntoIterator<Item = (CellId, CellRecord)>) -> Self {
        let mut overlay: Vec<_> = overlay
            .into_iter()
            .map(|(cell, record)| OverlayEntry(cell, record))
            .collect();
        overlay.sort_unstable_by_key(|entry| entry.0);
        Self { player, overlay }
    }

    pub fn entries(&self) -> impl Iterator<Item = (CellId, CellRecord)> + '_ {
        self.overlay.iter().map(|&OverlayEntry(cell, record)| (cell, record))
    }

    /// Checks what the JSON schema alone cannot.
    pub fn validate(&self) -> core::result::Result<(), SnapshotError> {
        if self.player.held_coin == Some(0) {
            return Err(SnapshotError::EmptyHeldCoin);
        }

        let mut seen = HashSet::with_capacity(self.overlay.len());
        for &OverlayEntry(cell, record) in &self.overlay {
            if !seen.insert(cell) {
                return Err(SnapshotError::DuplicateCell(cell));
            }
            if record.picked_up && record.value != 0 {
                return Err(SnapshotError::PickedCellHasValue(cell));
            }
        }

        Ok(())
    }

    pub fn to_json(&self) -> core::result::Result<String, StoreError> {
        serde_json::to_string(self).map_err(|err| StoreError::Encode(err.to_string()))
    }

    pub fn from_json(raw: &str) -> core::result::Result<Self, SnapshotError> {
        let snapshot: Self =
            serde_json::from_str(raw).map_err(|err| SnapshotError::Decode(err.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

mod cell_key {
    use alloc::string::String;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use crate::CellId;

    pub fn serialize<S: Serializer>(cell: &CellId, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(cell)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CellId, D::Error> {
        let key = String::deserialize(deserializer)?;
        key.parse()
            .map_err(|err| D::Error::custom(format_args!("{err}: {key:?}")))
    }
}

/// Reads and writes the [`Snapshot`] under a single key.
#[derive(Clone, Debug)]
pub struct SnapshotCodec<S> {
    store: S,
    key: String,
}

impl<S: KeyValueStore> SnapshotCodec<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Overwrites whatever was stored before.
    pub fn save(&mut self, snapshot: &Snapshot) -> core::result::Result<(), StoreError> {
        let raw = snapshot.to_json()?;
        self.store.set(&self.key, &raw)?;
        log::trace!("Saved snapshot with {} overlay entries", snapshot.overlay.len());
        Ok(())
    }

    /// Stored snapshot, or `None` when it is missing or unusable.
    pub fn load(&self) -> Option<Snapshot> {
        self.try_load().unwrap_or_else(|err| {
            log::warn!("Discarding stored snapshot: {}", err);
            None
        })
    }

    /// Like [`Self::load`] but tells a missing snapshot apart from a broken one.
    pub fn try_load(&self) -> core::result::Result<Option<Snapshot>, SnapshotError> {
        match self.store.get(&self.key)? {
            Some(raw) => Snapshot::from_json(&raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn clear(&mut self) -> core::result::Result<(), StoreError> {
        self.store.remove(&self.key)
    }
}
