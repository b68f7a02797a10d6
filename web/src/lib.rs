use geocoin_core::{
    CellId, Direction, GameConfig, KeyValueStore, LatLng, MovementMode, SensorSender, Session,
    StoreError,
};
use gloo::storage::{LocalStorage, Storage};
use wasm_bindgen::prelude::*;

/// Browser `localStorage`, seen as raw strings.
#[derive(Copy, Clone, Debug, Default)]
pub struct LocalStorageStore;

fn backend(err: JsValue) -> StoreError {
    StoreError::Backend(format!("{err:?}"))
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        LocalStorage::raw().get_item(key).map_err(backend)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        LocalStorage::raw().set_item(key, value).map_err(backend)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        LocalStorage::raw().remove_item(key).map_err(backend)
    }
}

/// Log level picked from the page hash, e.g. `#log=trace`.
fn log_level() -> log::Level {
    let hash = gloo::utils::window().location().hash().unwrap_or_default();
    hash.split(['#', '&'])
        .find_map(|arg| arg.strip_prefix("log="))
        .and_then(|level| level.parse().ok())
        .unwrap_or(log::Level::Info)
}

#[wasm_bindgen(start)]
pub fn start() {
    #[cfg(feature = "console_error_panic_hook")]
    {
        console_error_panic_hook::set_once();
    }

    if console_log::init_with_level(log_level()).is_err() {
        log::warn!("Logger was already initialized");
    }
    log::debug!("Geocoin module loaded");
}

fn parse_direction(name: &str) -> Option<Direction> {
    match name.to_ascii_lowercase().as_str() {
        "north" | "up" => Some(Direction::North),
        "south" | "down" => Some(Direction::South),
        "east" | "right" => Some(Direction::East),
        "west" | "left" => Some(Direction::West),
        _ => None,
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsError> {
    serde_json::to_string(value).map_err(JsError::from)
}

/// Game handle for the map page.
///
/// The page owns rendering and the geolocation watch; everything else happens here, one event at
/// a time.
#[wasm_bindgen]
pub struct GeocoinApp {
    session: Session<LocalStorageStore>,
    sensor: Option<SensorSender>,
}

#[wasm_bindgen]
impl GeocoinApp {
    /// `config_json` is a partial [`GameConfig`] in camelCase; missing fields use defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<GeocoinApp, JsError> {
        let config = match config_json {
            Some(raw) => GameConfig::from_json(&raw)?,
            None => GameConfig::default(),
        };
        let session = Session::new(config, LocalStorageStore)?;
        log::info!("Game started at {}", session.position());
        Ok(Self {
            session,
            sensor: None,
        })
    }

    /// One discrete step; returns whether the player moved.
    pub fn step(&mut self, direction: &str) -> bool {
        match parse_direction(direction) {
            Some(direction) => self.session.step(direction).has_update(),
            None => {
                log::warn!("Unknown direction {:?}", direction);
                false
            }
        }
    }

    pub fn move_by(&mut self, di: i32, dj: i32) -> bool {
        self.session.move_by(di, dj).has_update()
    }

    /// Touches cell `(i, j)`; returns whether anything changed.
    pub fn interact(&mut self, i: i32, j: i32) -> bool {
        self.session.interact(CellId::new(i, j)).has_update()
    }

    pub fn enable_sensor(&mut self) {
        self.sensor = Some(self.session.enable_sensor());
    }

    pub fn disable_sensor(&mut self) {
        self.sensor = None;
        self.session.disable_sensor();
    }

    /// A geolocation fix; applied right away when the sensor is on, dropped otherwise.
    pub fn sensor_fix(&mut self, lat: f64, lng: f64) -> usize {
        match &self.sensor {
            Some(sender) if sender.deliver(LatLng::new(lat, lng)) => self.session.pump_sensor(),
            _ => {
                log::debug!("Dropping fix ({}, {}) with sensor off", lat, lng);
                0
            }
        }
    }

    /// Geolocation denied or failed.
    pub fn sensor_unavailable(&mut self) {
        self.sensor = None;
        self.session.sensor_unavailable();
    }

    pub fn sensor_enabled(&self) -> bool {
        self.session.movement_mode() == MovementMode::Sensor
    }

    pub fn reset(&mut self) {
        self.sensor = None;
        self.session.disable_sensor();
        self.session.reset();
    }

    /// Pending render work as JSON: `{ spawned, updated, released, player }`.
    pub fn take_refresh(&mut self) -> Result<String, JsError> {
        to_json(&self.session.take_refresh())
    }

    pub fn visible_cells(&self) -> Result<String, JsError> {
        to_json(&self.session.visible_cells())
    }

    /// Messages to show the player, oldest first.
    pub fn take_notices(&mut self) -> Vec<String> {
        self.session
            .take_notices()
            .into_iter()
            .map(|notice| notice.to_string())
            .collect()
    }

    pub fn held_coin(&self) -> Option<u32> {
        self.session.held_coin()
    }

    pub fn is_won(&self) -> bool {
        self.session.coin_state().is_won()
    }

    /// `[lat, lng]` of the player's cell center.
    pub fn player_position(&self) -> Vec<f64> {
        let position = self.session.player_position();
        vec![position.lat, position.lng]
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    const KEY: &str = "geocoin:web-test";

    #[wasm_bindgen_test]
    fn local_storage_round_trips() {
        let mut store = LocalStorageStore;
        store.set(KEY, "{\"a\":1}").unwrap();

        assert_eq!(store.get(KEY), Ok(Some("{\"a\":1}".to_string())));

        store.remove(KEY).unwrap();
        assert_eq!(store.get(KEY), Ok(None));
    }

    #[wasm_bindgen_test]
    fn app_moves_and_persists() {
        let config = format!(r#"{{"storageKey":"{KEY}"}}"#);
        let mut app = GeocoinApp::new(Some(config.clone())).unwrap();

        assert!(app.step("north"));
        assert!(!app.step("sideways"));
        let position = app.player_position();
        drop(app);

        let app = GeocoinApp::new(Some(config)).unwrap();
        assert_eq!(app.player_position(), position);
        LocalStorageStore.remove(KEY).unwrap();
    }
}
