use alloc::string::{String, ToString};
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::*;

/// Degrees of latitude/longitude spanned by one cell.
pub const DEFAULT_CELL_SIZE: f64 = 1e-4;
/// Where a fresh game starts.
pub const DEFAULT_ORIGIN: LatLng = LatLng::new(36.98949379578401, -122.06277128548504);
pub const DEFAULT_VISIBILITY_RADIUS: u16 = 8;
pub const DEFAULT_INTERACTION_RADIUS_M: f64 = 30.0;
pub const DEFAULT_SPAWN_THRESHOLD: f64 = 0.1;
pub const DEFAULT_SEED: u64 = 0x6765_6f63_6f69_6e00;
pub const DEFAULT_DENOMINATIONS: [CoinValue; 5] = [1, 2, 4, 8, 16];
pub const DEFAULT_INITIAL_COIN: CoinValue = 1;
pub const DEFAULT_VICTORY_VALUE: CoinValue = 256;
pub const DEFAULT_STORAGE_KEY: &str = "geocoin:snapshot";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    pub cell_size: f64,
    pub origin: LatLng,
    /// Half-width of the visible square, in cells.
    pub visibility_radius: u16,
    /// Real-world reach for interaction, in metres.
    pub interaction_radius_m: f64,
    pub spawn_threshold: f64,
    pub seed: u64,
    pub denominations: Vec<CoinValue>,
    pub initial_coin: Option<CoinValue>,
    pub victory_value: CoinValue,
    pub storage_key: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            origin: DEFAULT_ORIGIN,
            visibility_radius: DEFAULT_VISIBILITY_RADIUS,
            interaction_radius_m: DEFAULT_INTERACTION_RADIUS_M,
            spawn_threshold: DEFAULT_SPAWN_THRESHOLD,
            seed: DEFAULT_SEED,
            denominations: DEFAULT_DENOMINATIONS.to_vec(),
            initial_coin: Some(DEFAULT_INITIAL_COIN),
            victory_value: DEFAULT_VICTORY_VALUE,
            storage_key: DEFAULT_STORAGE_KEY.into(),
        }
    }
}

impl GameConfig {
    /// Parses a partial JSON config on top of the defaults and validates the result.
    pub fn from_json(raw: &str) -> core::result::Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::Decode(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(ConfigError::CellSize);
        }

        self.home().map_err(ConfigError::Origin)?;

        if !(0.0..=1.0).contains(&self.spawn_threshold) {
            return Err(ConfigError::SpawnThreshold);
        }

        let ascending = self.denominations.windows(2).all(|w| w[0] < w[1]);
        if self.denominations.first().is_none_or(|&first| first == 0) || !ascending {
            return Err(ConfigError::Denominations);
        }

        let reach = self.interaction_radius_m;
        if !(reach.is_finite() && reach > 0.0 && reach < self.visibility_radius_m()) {
            return Err(ConfigError::InteractionRadius);
        }

        let floor = self.initial_coin.unwrap_or(0);
        if !self.victory_value.is_power_of_two() || self.victory_value <= floor {
            return Err(ConfigError::VictoryValue);
        }

        Ok(())
    }

    pub const fn grid(&self) -> Grid {
        Grid::new(self.cell_size)
    }

    /// Cell a fresh game starts on.
    pub fn home(&self) -> Result<CellId> {
        self.grid().to_cell(self.origin)
    }

    /// Visibility radius converted to metres along a meridian.
    pub fn visibility_radius_m(&self) -> f64 {
        let degrees = f64::from(self.visibility_radius) * self.cell_size;
        distance_m(LatLng::new(0.0, 0.0), LatLng::new(degrees, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = GameConfig::default();

        assert_eq!(config.validate(), Ok(()));
        assert!(config.visibility_radius_m() > config.interaction_radius_m);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = GameConfig::from_json(r#"{"visibilityRadius": 12, "seed": 9}"#).unwrap();

        assert_eq!(config.visibility_radius, 12);
        assert_eq!(config.seed, 9);
        assert_eq!(config.victory_value, DEFAULT_VICTORY_VALUE);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
    }

    #[test]
    fn malformed_json_is_reported() {
        assert!(matches!(
            GameConfig::from_json("{not json"),
            Err(ConfigError::Decode(_))
        ));
    }

    #[test]
    fn rejects_invalid_fields() {
        let check = |edit: fn(&mut GameConfig), expected: ConfigError| {
            let mut config = GameConfig::default();
            edit(&mut config);
            assert_eq!(config.validate(), Err(expected));
        };

        check(|c| c.cell_size = 0.0, ConfigError::CellSize);
        check(|c| c.cell_size = f64::NAN, ConfigError::CellSize);
        check(
            |c| c.origin = LatLng::new(f64::NAN, 0.0),
            ConfigError::Origin(GridError::NonFinite),
        );
        check(|c| c.spawn_threshold = 1.5, ConfigError::SpawnThreshold);
        check(|c| c.denominations.clear(), ConfigError::Denominations);
        check(|c| c.denominations = vec![0, 1], ConfigError::Denominations);
        check(|c| c.denominations = vec![4, 2], ConfigError::Denominations);
        check(|c| c.interaction_radius_m = 0.0, ConfigError::InteractionRadius);
        check(|c| c.interaction_radius_m = 500.0, ConfigError::InteractionRadius);
        check(|c| c.victory_value = 100, ConfigError::VictoryValue);
        check(|c| c.victory_value = 1, ConfigError::VictoryValue);
    }
}
