use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;

use serde::Serialize;

use crate::*;

/// What the renderer needs to draw one visible cache.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellView {
    pub cell: CellId,
    pub center: LatLng,
    pub value: CoinValue,
    pub interactive: bool,
}

/// Render work accumulated since the renderer last asked.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Refresh {
    /// Caches to create render objects for.
    pub spawned: Vec<CellView>,
    /// Caches whose value or reach changed.
    pub updated: Vec<CellView>,
    /// Render objects to tear down.
    pub released: Vec<CellId>,
    /// New player marker position, if the player moved.
    pub player: Option<LatLng>,
}

impl Refresh {
    pub fn is_empty(&self) -> bool {
        self.spawned.is_empty()
            && self.updated.is_empty()
            && self.released.is_empty()
            && self.player.is_none()
    }
}

/// Non-blocking feedback for the player.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    Rejected(Rejection),
    Victory(CoinValue),
    SensorUnavailable,
    SaveFailed(StoreError),
    RestoredDefault(SnapshotError),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "{reason}"),
            Self::Victory(value) => write!(f, "You forged a coin worth {value}. You win!"),
            Self::SensorUnavailable => {
                write!(f, "Location is unavailable, use the arrow controls to move")
            }
            Self::SaveFailed(err) => write!(f, "Progress could not be saved: {err}"),
            Self::RestoredDefault(err) => {
                write!(f, "Saved game could not be read, starting fresh: {err}")
            }
        }
    }
}

/// Cell-level bookkeeping between two [`Session::take_refresh`] calls.
#[derive(Debug, Default)]
struct PendingRefresh {
    spawned: BTreeSet<CellId>,
    dirty: BTreeSet<CellId>,
    released: BTreeSet<CellId>,
    player_moved: bool,
}

impl PendingRefresh {
    fn enter(&mut self, cell: CellId) {
        // left and came back before the renderer noticed: it still owns the object
        if self.released.remove(&cell) {
            self.dirty.insert(cell);
        } else {
            self.spawned.insert(cell);
        }
    }

    fn release(&mut self, cell: CellId) {
        self.dirty.remove(&cell);
        if !self.spawned.remove(&cell) {
            self.released.insert(cell);
        }
    }
}

/// The single logical actor owning all game state.
///
/// Every event (step, sensor fix, interaction) runs to completion: world update, window refresh
/// and persistence all happen before the method returns.
#[derive(Debug)]
pub struct Session<S> {
    config: GameConfig,
    grid: Grid,
    home: CellId,
    world: WorldState,
    coin: CoinMachine,
    position: CellId,
    window: VisibilityWindow,
    mode: MovementMode,
    sensor: Option<SensorFeed>,
    sensor_reported: bool,
    codec: SnapshotCodec<S>,
    pending: PendingRefresh,
    notices: Vec<Notice>,
}

impl<S: KeyValueStore> Session<S> {
    /// Starts from the stored snapshot when there is a usable one, from defaults otherwise.
    pub fn new(config: GameConfig, store: S) -> core::result::Result<Self, ConfigError> {
        config.validate()?;
        let home = config.home().map_err(ConfigError::Origin)?;
        let codec = SnapshotCodec::new(store, config.storage_key.as_str());
        let generator = ValueGenerator::from_config(&config);
        let fresh = PlayerState {
            position: home,
            held_coin: config.initial_coin,
        };
        let mut notices = Vec::new();

        let (player, world) = match codec.try_load() {
            Ok(Some(snapshot)) => {
                log::info!(
                    "Restored game at {} with {} touched cells",
                    snapshot.player.position,
                    snapshot.overlay.len()
                );
                let world = WorldState::with_overlay(generator, snapshot.entries());
                (snapshot.player, world)
            }
            Ok(None) => (fresh, WorldState::new(generator)),
            Err(err) => {
                log::warn!("Discarding stored snapshot: {}", err);
                notices.push(Notice::RestoredDefault(err));
                (fresh, WorldState::new(generator))
            }
        };

        let mut session = Self {
            grid: config.grid(),
            home,
            world,
            coin: CoinMachine::new(player.held_coin, config.victory_value),
            position: player.position,
            window: VisibilityWindow::new(config.visibility_radius),
            mode: MovementMode::Discrete,
            sensor: None,
            sensor_reported: false,
            codec,
            pending: PendingRefresh {
                player_moved: true,
                ..Default::default()
            },
            notices,
            config,
        };
        session.refresh_window();
        Ok(session)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn store(&self) -> &S {
        self.codec.store()
    }

    pub fn position(&self) -> CellId {
        self.position
    }

    /// Center of the player's cell.
    pub fn player_position(&self) -> LatLng {
        self.grid.to_center(self.position)
    }

    pub fn held_coin(&self) -> Option<CoinValue> {
        self.coin.held()
    }

    pub fn coin_state(&self) -> CoinState {
        self.coin.state()
    }

    pub fn movement_mode(&self) -> MovementMode {
        self.mode
    }

    pub fn player(&self) -> PlayerState {
        PlayerState {
            position: self.position,
            held_coin: self.coin.held(),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.player(), self.world.sorted_overlay())
    }

    pub fn reach(&self, cell: CellId) -> Reach {
        classify(
            &self.grid,
            cell,
            self.position,
            self.config.interaction_radius_m,
        )
    }

    pub fn cell_view(&self, cell: CellId) -> CellView {
        // only window cells are memoised; leaving the window evicts them
        let value = if self.window.contains(cell) {
            self.world.cached_value(cell)
        } else {
            self.world.value(cell)
        };
        CellView {
            cell,
            center: self.grid.to_center(cell),
            value,
            interactive: self.reach(cell).is_interactive(),
        }
    }

    /// Every cache currently in the window.
    pub fn visible_cells(&self) -> Vec<CellView> {
        self.window.cells().map(|cell| self.cell_view(cell)).collect()
    }

    pub fn is_visible(&self, cell: CellId) -> bool {
        self.window.contains(cell)
    }

    pub fn step(&mut self, direction: Direction) -> MoveOutcome {
        self.execute(direction.into())
    }

    pub fn move_by(&mut self, di: Axis, dj: Axis) -> MoveOutcome {
        self.execute(MoveCommand::By { di, dj })
    }

    pub fn move_to_absolute(&mut self, position: LatLng) -> MoveOutcome {
        self.execute(MoveCommand::ToAbsolute(position))
    }

    /// Runs a movement command through the active strategy.
    pub fn execute(&mut self, command: MoveCommand) -> MoveOutcome {
        match self.mode.resolve(&self.grid, self.position, command) {
            MoveResolution::Target(cell) if cell == self.position => MoveOutcome::NoChange,
            MoveResolution::Target(cell) => {
                self.relocate(cell);
                MoveOutcome::Moved(cell)
            }
            MoveResolution::Ignored => {
                log::debug!("Ignoring {:?} during {:?} movement", command, self.mode);
                MoveOutcome::Ignored
            }
            MoveResolution::Invalid(err) => {
                log::warn!("Dropping movement {:?}: {}", command, err);
                MoveOutcome::Invalid(err)
            }
        }
    }

    /// Touches a visible cache with the held coin.
    pub fn interact(&mut self, cell: CellId) -> CoinTransition {
        let transition = if self.window.contains(cell) && self.reach(cell).is_interactive() {
            self.coin.interact(&mut self.world, cell)
        } else {
            CoinTransition::Unchanged(Rejection::OutOfReach)
        };

        match transition {
            CoinTransition::Unchanged(reason) => self.notices.push(Notice::Rejected(reason)),
            CoinTransition::Victory(value) => self.notices.push(Notice::Victory(value)),
            CoinTransition::PickedUp(_) | CoinTransition::Merged(_) => {}
        }

        if transition.has_update() {
            self.pending.dirty.insert(cell);
            self.persist();
        }
        transition
    }

    /// Switches to sensor movement and hands out the sender the location source should use.
    ///
    /// Any previous feed is closed first, so fixes queued for it are never applied.
    pub fn enable_sensor(&mut self) -> SensorSender {
        let (feed, sender) = SensorFeed::open();
        if let Some(previous) = self.sensor.replace(feed) {
            previous.close();
        }
        self.mode = MovementMode::Sensor;
        self.sensor_reported = false;
        log::info!("Sensor movement enabled");
        sender
    }

    /// Switches back to discrete movement, discarding undelivered fixes.
    pub fn disable_sensor(&mut self) {
        if let Some(feed) = self.sensor.take() {
            feed.close();
            log::info!("Sensor movement disabled");
        }
        self.mode = MovementMode::Discrete;
    }

    /// Applies every queued sensor fix in arrival order, each as one full movement event.
    pub fn pump_sensor(&mut self) -> usize {
        let mut applied = 0;
        while self.mode == MovementMode::Sensor {
            let Some(fix) = self.sensor.as_mut().and_then(SensorFeed::next_fix) else {
                break;
            };
            self.move_to_absolute(fix);
            applied += 1;
        }
        applied
    }

    /// The location source failed: fall back to discrete movement.
    pub fn sensor_unavailable(&mut self) {
        if !self.sensor_reported {
            self.sensor_reported = true;
            log::warn!("Location sensor unavailable, falling back to discrete movement");
            self.notices.push(Notice::SensorUnavailable);
        }
        self.disable_sensor();
    }

    /// Starts a new game: clears storage, forgets every touched cell and returns home.
    pub fn reset(&mut self) {
        if let Err(err) = self.codec.clear() {
            log::error!("Could not clear stored game: {}", err);
            self.notices.push(Notice::SaveFailed(err));
        }
        self.world.clear();
        self.coin = CoinMachine::new(self.config.initial_coin, self.config.victory_value);
        self.position = self.home;
        self.pending.player_moved = true;
        for cell in self.window.clear() {
            self.pending.release(cell);
        }
        self.refresh_window();
        log::info!("Started a new game at {}", self.home);
    }

    /// Drains accumulated render work.
    pub fn take_refresh(&mut self) -> Refresh {
        let pending = core::mem::take(&mut self.pending);
        Refresh {
            spawned: pending
                .spawned
                .iter()
                .map(|&cell| self.cell_view(cell))
                .collect(),
            updated: pending
                .dirty
                .difference(&pending.spawned)
                .map(|&cell| self.cell_view(cell))
                .collect(),
            released: pending.released.into_iter().collect(),
            player: pending.player_moved.then(|| self.player_position()),
        }
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        core::mem::take(&mut self.notices)
    }

    fn relocate(&mut self, cell: CellId) {
        log::debug!("Player moved {} -> {}", self.position, cell);
        self.position = cell;
        self.pending.player_moved = true;
        self.refresh_window();
        self.persist();
    }

    fn refresh_window(&mut self) {
        let diff = self.window.refresh(self.position, self.world.generator());
        self.world.forget_defaults(diff.left.iter().copied());
        for cell in diff.left {
            self.pending.release(cell);
        }
        // reach depends on the player's cell
        self.pending.dirty.extend(self.window.cells());
        for cell in diff.entered {
            self.pending.enter(cell);
        }
    }

    fn persist(&mut self) {
        let snapshot = self.snapshot();
        if let Err(err) = self.codec.save(&snapshot) {
            log::error!("Could not save game to storage: {}", err);
            self.notices.push(Notice::SaveFailed(err));
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::{String, ToString};
    use alloc::vec;

    use super::*;

    /// Store whose writes always fail.
    #[derive(Debug, Default)]
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> core::result::Result<Option<String>, StoreError> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: &str) -> core::result::Result<(), StoreError> {
            Err(StoreError::Backend("quota exceeded".into()))
        }

        fn remove(&mut self, _key: &str) -> core::result::Result<(), StoreError> {
            Err(StoreError::Backend("quota exceeded".into()))
        }
    }

    fn config() -> GameConfig {
        GameConfig::default()
    }

    fn session(store: &mut MemoryStore) -> Session<&mut MemoryStore> {
        Session::new(config(), store).unwrap()
    }

    /// Nearest cache (by row scan) holding `value`.
    fn cache_worth<S: KeyValueStore>(session: &Session<S>, value: CoinValue) -> CellId {
        let generator = session.world().generator();
        Neighborhood::new(session.position(), 60)
            .find(|&c| generator.spawns(c) && session.world().value(c) == value)
            .unwrap()
    }

    fn walk_to<S: KeyValueStore>(session: &mut Session<S>, cell: CellId) {
        let from = session.position();
        session.move_by(cell.i - from.i, cell.j - from.j);
        assert_eq!(session.position(), cell);
    }

    #[test]
    fn fresh_session_starts_home_with_initial_coin() {
        let mut store = MemoryStore::new();
        let session = session(&mut store);

        assert_eq!(session.position(), config().home().unwrap());
        assert_eq!(session.held_coin(), Some(1));
        assert_eq!(session.coin_state(), CoinState::Holding(1));
        assert_eq!(session.movement_mode(), MovementMode::Discrete);
        assert!(session.visible_cells().iter().all(|v| session.is_visible(v.cell)));
    }

    #[test]
    fn startup_does_not_write() {
        let mut store = MemoryStore::new();
        let _ = session(&mut store);

        assert_eq!(store.get(DEFAULT_STORAGE_KEY), Ok(None));
    }

    #[test]
    fn every_move_is_persisted() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);

        assert!(session.step(Direction::North).has_update());
        let expected = session.snapshot();
        drop(session);

        let raw = store.get(DEFAULT_STORAGE_KEY).unwrap().unwrap();
        assert_eq!(Snapshot::from_json(&raw), Ok(expected));
    }

    #[test]
    fn restart_restores_player_and_overlay() {
        let mut store = MemoryStore::new();
        let (cell, position) = {
            let mut session = session(&mut store);
            let cell = cache_worth(&session, 1);
            walk_to(&mut session, cell);
            assert_eq!(session.interact(cell), CoinTransition::Merged(2));
            (cell, session.position())
        };

        let session = session(&mut store);

        assert_eq!(session.position(), position);
        assert_eq!(session.held_coin(), Some(2));
        assert_eq!(session.world().value(cell), 0);
        assert!(session.world().record(cell).is_some());
    }

    #[test]
    fn broken_snapshot_falls_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set(DEFAULT_STORAGE_KEY, "{\"player\":").unwrap();

        let mut session = session(&mut store);

        assert_eq!(session.position(), config().home().unwrap());
        assert_eq!(session.held_coin(), Some(1));
        assert!(matches!(
            session.take_notices().as_slice(),
            [Notice::RestoredDefault(SnapshotError::Decode(_))]
        ));
    }

    #[test]
    fn out_of_reach_is_rejected_with_notice() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);
        let far = session.position().offset(500, 500).unwrap();

        assert_eq!(
            session.interact(far),
            CoinTransition::Unchanged(Rejection::OutOfReach)
        );
        let readonly = session
            .visible_cells()
            .into_iter()
            .find(|v| !v.interactive)
            .map(|v| v.cell)
            .unwrap();
        assert_eq!(
            session.interact(readonly),
            CoinTransition::Unchanged(Rejection::OutOfReach)
        );
        assert_eq!(
            session.take_notices(),
            vec![
                Notice::Rejected(Rejection::OutOfReach),
                Notice::Rejected(Rejection::OutOfReach)
            ]
        );
        assert_eq!(session.world().overlay_len(), 0);
    }

    #[test]
    fn mismatch_is_reported_and_not_persisted() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);
        let cell = cache_worth(&session, 8);
        walk_to(&mut session, cell);
        let before = session.snapshot();

        let transition = session.interact(cell);

        assert_eq!(
            transition,
            CoinTransition::Unchanged(Rejection::ValueMismatch { held: 1, cell: 8 })
        );
        assert_eq!(session.snapshot(), before);
        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(
            notices[0].to_string(),
            "Your coin (1) does not match this cache's coin (8)"
        );
    }

    #[test]
    fn refresh_spawns_then_releases() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);

        let initial = session.take_refresh();
        assert_eq!(initial.spawned, session.visible_cells());
        assert!(initial.updated.is_empty());
        assert!(initial.released.is_empty());
        assert_eq!(initial.player, Some(session.player_position()));
        assert!(session.take_refresh().is_empty());

        session.move_by(1000, 0);
        let far = session.take_refresh();
        let mut released = far.released.clone();
        released.sort();
        let mut expected: Vec<_> = initial.spawned.iter().map(|v| v.cell).collect();
        expected.sort();
        assert_eq!(released, expected);
        assert_eq!(far.spawned, session.visible_cells());
    }

    #[test]
    fn round_trip_before_drain_updates_instead_of_respawning() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);
        let initial = session.take_refresh();

        session.move_by(1000, 0);
        session.move_by(-1000, 0);
        let refresh = session.take_refresh();

        assert!(refresh.spawned.is_empty());
        assert!(refresh.released.is_empty());
        assert_eq!(refresh.updated, initial.spawned);
    }

    #[test]
    fn window_memo_stays_bounded() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);

        for _ in 0..200 {
            session.step(Direction::East);
            session.take_refresh();
            assert!(session.world().memoised_len() <= 17 * 17);
        }
    }

    #[test]
    fn scans_and_far_views_leave_the_memo_alone() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);
        session.take_refresh();
        let window = session.world().memoised_len();

        cache_worth(&session, 16);
        let far = session.position().offset(400, -400).unwrap();
        session.cell_view(far);

        assert_eq!(session.world().memoised_len(), window);
        assert!(window <= 17 * 17);
    }

    #[test]
    fn sensor_fixes_apply_in_order_and_stop_when_disabled() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);
        let grid = *session.grid();
        let home = session.position();
        let sender = session.enable_sensor();

        assert_eq!(session.step(Direction::North), MoveOutcome::Ignored);
        for k in 1..=3 {
            sender.deliver(grid.to_center(home.offset(k, k).unwrap()));
        }
        assert_eq!(session.pump_sensor(), 3);
        assert_eq!(session.position(), home.offset(3, 3).unwrap());

        sender.deliver(grid.to_center(home.offset(9, 9).unwrap()));
        session.disable_sensor();
        assert_eq!(session.pump_sensor(), 0);
        assert_eq!(session.position(), home.offset(3, 3).unwrap());
        assert!(!sender.deliver(grid.to_center(home)));

        assert_eq!(
            session.move_to_absolute(grid.to_center(home)),
            MoveOutcome::Ignored
        );
        assert!(session.step(Direction::South).has_update());
    }

    #[test]
    fn reenabling_sensor_discards_old_feed() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);
        let grid = *session.grid();
        let target = session.position().offset(4, 0).unwrap();

        let stale = session.enable_sensor();
        stale.deliver(grid.to_center(target));
        let fresh = session.enable_sensor();

        assert_eq!(session.pump_sensor(), 0);
        assert!(!stale.is_active());
        assert!(fresh.is_active());
    }

    #[test]
    fn sensor_unavailable_is_reported_once() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);

        let _sender = session.enable_sensor();
        session.sensor_unavailable();
        session.sensor_unavailable();

        assert_eq!(session.movement_mode(), MovementMode::Discrete);
        assert_eq!(session.take_notices(), vec![Notice::SensorUnavailable]);
        assert!(session.step(Direction::West).has_update());
    }

    #[test]
    fn invalid_fix_is_dropped() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);
        let home = session.position();
        let sender = session.enable_sensor();

        sender.deliver(LatLng::new(f64::NAN, 0.0));
        sender.deliver(LatLng::new(0.0, 1e9));

        assert_eq!(session.pump_sensor(), 2);
        assert_eq!(session.position(), home);
    }

    #[test]
    fn reset_clears_store_and_overlay() {
        let mut store = MemoryStore::new();
        let mut session = session(&mut store);
        let cell = cache_worth(&session, 1);
        walk_to(&mut session, cell);
        session.interact(cell);

        session.reset();

        assert_eq!(session.position(), config().home().unwrap());
        assert_eq!(session.held_coin(), Some(1));
        assert_eq!(session.world().overlay_len(), 0);
        assert_eq!(session.world().value(cell), 1);
        drop(session);
        assert_eq!(store.get(DEFAULT_STORAGE_KEY), Ok(None));
    }

    #[test]
    fn save_failure_is_not_fatal() {
        let mut session = Session::new(config(), ReadOnlyStore).unwrap();

        assert!(session.step(Direction::North).has_update());
        assert!(session.step(Direction::North).has_update());

        let notices = session.take_notices();
        assert_eq!(notices.len(), 2);
        assert!(matches!(notices[0], Notice::SaveFailed(StoreError::Backend(_))));
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = GameConfig {
            spawn_threshold: -1.0,
            ..GameConfig::default()
        };

        assert!(matches!(
            Session::new(config, MemoryStore::new()),
            Err(ConfigError::SpawnThreshold)
        ));
    }
}
