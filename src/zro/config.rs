use super::angle::AngleConverter;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// MQTT broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker TCP port.
    pub port: u16,
    /// User name; empty for anonymous access.
    pub username: String,
    /// Password.
    pub password: String,
    /// Prefix shared by all dome topics.
    pub topic_root: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            topic_root: "/ZRO".to_owned(),
        }
    }
}

impl BrokerConfig {
    /// Full topic name for a leaf such as `commands`.
    pub fn topic(&self, leaf: &str) -> String {
        format!("{}/{leaf}", self.topic_root.trim_end_matches('/'))
    }
}

/// Persistent dome configuration.
///
/// Positions are in degrees, everything motion-related is forwarded to the controller as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker settings.
    pub broker: BrokerConfig,
    /// Encoder ticks in a full turn.
    pub ticks_per_turn: i32,
    /// Positioning tolerance in ticks.
    pub tolerance: i32,
    /// Azimuth of the home sensor.
    pub home_position: f64,
    /// Azimuth of the park position.
    pub park_position: f64,
    /// Azimuth motion timeout.
    pub azimuth_timeout: i32,
    /// Maximum motor speed.
    pub max_speed: i32,
    /// Minimum motor speed.
    pub min_speed: i32,
    /// Braking speed.
    pub brake_speed: i32,
    /// Encoder divisor.
    pub encoder_divisor: i32,
    /// Velocity timeout.
    pub velocity_timeout: i32,
    /// Distance below which the controller does a short move.
    pub short_distance: i32,
    /// Park the dome before operating the shutter.
    pub park_on_shutter: bool,
    /// Shutter timeout.
    pub shutter_timeout: i32,
    /// Whether a shutter controller is present.
    pub use_shutter: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            ticks_per_turn: 10_476,
            tolerance: 4,
            home_position: 0.0,
            park_position: 0.0,
            azimuth_timeout: 20_000,
            max_speed: 200,
            min_speed: 30,
            brake_speed: 80,
            encoder_divisor: 1,
            velocity_timeout: 10,
            short_distance: 100,
            park_on_shutter: false,
            shutter_timeout: 0,
            use_shutter: true,
        }
    }
}

/// A configuration value that the controller can't work with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid configuration: {0}")]
pub struct InvalidConfig(pub &'static str);

impl Config {
    /// Check the values the driver and the controller rely on.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        let checks = [
            (self.ticks_per_turn > 0, "ticks per turn must be positive"),
            (self.tolerance >= 0, "tolerance must not be negative"),
            (self.azimuth_timeout > 0, "azimuth timeout must be positive"),
            (self.max_speed > 0, "max speed must be positive"),
            (self.min_speed > 0, "min speed must be positive"),
            (self.brake_speed > 0, "brake speed must be positive"),
            (self.encoder_divisor > 0, "encoder divisor must be positive"),
            (
                self.home_position.is_finite() && self.park_position.is_finite(),
                "home and park positions must be finite",
            ),
        ];

        match checks.into_iter().find(|&(ok, _)| !ok) {
            Some((_, reason)) => Err(InvalidConfig(reason)),
            None => Ok(()),
        }
    }

    /// Converter for this dome's encoder geometry.
    pub const fn angles(&self) -> AngleConverter {
        AngleConverter::new(self.ticks_per_turn, self.home_position)
    }

    /// Parameters pushed to the controller on connect, in the order it expects them.
    pub fn controller_parameters(&self) -> [(&'static str, i32); 11] {
        [
            ("TICK", self.ticks_per_turn),
            ("TOLE", self.tolerance),
            ("PKPO", self.angles().degrees_to_ticks(self.park_position)),
            ("AZTO", self.azimuth_timeout),
            ("MXSP", self.max_speed),
            ("MNSP", self.min_speed),
            ("BKSP", self.brake_speed),
            ("VLTO", self.velocity_timeout),
            ("SHDS", self.short_distance),
            ("POSH", i32::from(self.park_on_shutter)),
            ("ENDV", self.encoder_divisor),
        ]
    }
}

/// Persistence for the dome configuration.
pub trait ConfigStore: Debug + Send + Sync {
    /// Read the current configuration.
    fn load(&self) -> eyre::Result<Config>;

    /// Replace the stored configuration.
    fn save(&self, config: &Config) -> eyre::Result<()>;
}

/// Configuration kept in a JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Open the store, writing the defaults if the file doesn't exist yet.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let store = Self {
            path: path.as_ref().to_owned(),
        };

        if !store.path.try_exists()? {
            tracing::info!("Configuration file not found, writing defaults");
            store.save(&Config::default())?;
        }

        Ok(store)
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> eyre::Result<Config> {
        let file = std::fs::File::open(&self.path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    fn save(&self, config: &Config) -> eyre::Result<()> {
        let json = serde_json::to_vec_pretty(config)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Configuration kept in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore(parking_lot::Mutex<Config>);

impl MemoryStore {
    /// Create a store holding the given configuration.
    pub fn new(config: Config) -> Self {
        Self(parking_lot::Mutex::new(config))
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> eyre::Result<Config> {
        Ok(self.0.lock().clone())
    }

    fn save(&self, config: &Config) -> eyre::Result<()> {
        config.clone_into(&mut self.0.lock());
        Ok(())
    }
}
