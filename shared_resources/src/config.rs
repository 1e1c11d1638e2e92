use std::fs;
use std::path::Path;

use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read configuration file: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("could not parse configuration file: {0}")]
    Unparseable(#[from] serde_json::Error),
    #[error("invalid floor range [{min}, {max}]")]
    InvalidFloorRange { min: i32, max: i32 },
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: i64 },
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct SimulationConfig {
    pub person_spawn_interval_ms: u64,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct BuildingConfig {
    pub min_floor: i32,
    pub max_floor: i32,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct ElevatorConfig {
    pub count: u8,
    pub capacity_weight: u32,
    pub floor_travel_time_ms: u64,
    pub door_open_time_ms: u64,
    pub door_close_time_ms: u64,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub building: BuildingConfig,
    pub elevator: ElevatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            simulation: SimulationConfig {
                person_spawn_interval_ms: 1000,
            },
            building: BuildingConfig {
                min_floor: 1,
                max_floor: 10,
            },
            elevator: ElevatorConfig {
                count: 2,
                capacity_weight: 400,
                floor_travel_time_ms: 110,
                door_open_time_ms: 10,
                door_close_time_ms: 10,
            },
        }
    }
}

impl Config {
    /// Reads the configuration from `path`, falling back to the built-in
    /// defaults when no file exists. Invalid values refuse to load.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            log::info!(
                "no configuration file at {}, using default settings",
                path.display()
            );
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.building.min_floor >= self.building.max_floor {
            return Err(ConfigError::InvalidFloorRange {
                min: self.building.min_floor,
                max: self.building.max_floor,
            });
        }
        if self.simulation.person_spawn_interval_ms == 0 {
            return Err(ConfigError::NotPositive {
                field: "person_spawn_interval_ms",
                value: 0,
            });
        }
        if self.elevator.count == 0 {
            return Err(ConfigError::NotPositive {
                field: "elevator count",
                value: 0,
            });
        }
        if self.elevator.capacity_weight == 0 {
            return Err(ConfigError::NotPositive {
                field: "capacity_weight",
                value: 0,
            });
        }
        Ok(())
    }
}
