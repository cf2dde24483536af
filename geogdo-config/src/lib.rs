//! Configuration file schema and validation.
//!
//! The daemon is driven by a single YAML file: global policy plus a list of
//! garage doors, each with one geofence, one opener and the vehicles
//! assigned to it. Loading is strict: unknown geofence combinations are
//! resolved by a fixed priority and structural problems fail startup
//! instead of surfacing as dead doors at 2am.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use geogdo_opener_bus::BusCommand;
use geogdo_opener_http::HttpOpenerSettings;
use geogdo_types::{CircularGeofence, GeofenceSpec, PolygonGeofence, ZoneGeofence};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no garage doors configured")]
    NoDoors,

    #[error("duplicate garage door id `{id}`")]
    DuplicateDoor { id: String },

    #[error("garage door `{door}` has no usable geofence")]
    MissingGeofence { door: String },

    #[error("garage door `{door}` has no vehicles assigned")]
    NoVehicles { door: String },

    #[error("tracker id {tracker_id} is assigned to more than one door")]
    DuplicateTracker { tracker_id: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub garage_doors: Vec<DoorConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Global {
    /// Topic prefix of the telemetry feed.
    #[serde(default = "default_tracker_prefix")]
    pub tracker_prefix: String,
    /// Minutes a door stays locked after an operation finishes.
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,
    /// Attempts per door operation.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Seed vehicles as parked inside every fence at startup.
    #[serde(default = "default_true")]
    pub assume_at_home: bool,
    /// Simulate door hardware instead of talking to controllers.
    #[serde(default)]
    pub testing: bool,
}

impl Default for Global {
    fn default() -> Self {
        Self {
            tracker_prefix: default_tracker_prefix(),
            cooldown_minutes: default_cooldown_minutes(),
            max_retries: default_max_retries(),
            assume_at_home: true,
            testing: false,
        }
    }
}

impl Global {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes * 60)
    }
}

fn default_tracker_prefix() -> String {
    "teslamate".to_string()
}

fn default_cooldown_minutes() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DoorConfig {
    pub id: String,
    /// Overrides `global.cooldown_minutes` for this door.
    #[serde(default)]
    pub cooldown_minutes: Option<u64>,
    #[serde(default)]
    pub circular_geofence: Option<CircularGeofence>,
    #[serde(default)]
    pub zone_geofence: Option<ZoneGeofence>,
    #[serde(default)]
    pub polygon_geofence: Option<PolygonGeofence>,
    #[serde(default)]
    pub opener: OpenerConfig,
    #[serde(default)]
    pub vehicles: Vec<VehicleConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VehicleConfig {
    pub tracker_id: u64,
}

/// Opener selection, tagged by `type`.
// No deny_unknown_fields here: the http variant flattens its settings,
// which serde cannot combine with strict field checking.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OpenerConfig {
    /// ratgdo controller: everything derives from its topic prefix.
    Ratgdo {
        topic_prefix: String,
        #[serde(default = "default_status_timeout_secs")]
        status_timeout_secs: u64,
    },
    /// Generic command-bus controller with explicit commands.
    Bus {
        topic_prefix: String,
        commands: Vec<BusCommand>,
        #[serde(default)]
        status_topics: BusStatusTopics,
        #[serde(default = "default_status_timeout_secs")]
        status_timeout_secs: u64,
    },
    /// Controller with an HTTP API.
    Http {
        #[serde(flatten)]
        settings: HttpOpenerSettings,
        #[serde(default = "default_status_timeout_secs")]
        status_timeout_secs: u64,
    },
    /// No controller; operations are logged and dropped.
    #[default]
    Noop,
}

fn default_status_timeout_secs() -> u64 {
    30
}

/// Status topic suffixes for a generic bus controller. Defaults match the
/// ratgdo layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStatusTopics {
    #[serde(default = "default_door_topic")]
    pub door: String,
    #[serde(default = "default_obstruction_topic")]
    pub obstruction: String,
    #[serde(default = "default_availability_topic")]
    pub availability: String,
}

impl Default for BusStatusTopics {
    fn default() -> Self {
        Self {
            door: default_door_topic(),
            obstruction: default_obstruction_topic(),
            availability: default_availability_topic(),
        }
    }
}

fn default_door_topic() -> String {
    "status/door".to_string()
}

fn default_obstruction_topic() -> String {
    "status/obstruction".to_string()
}

fn default_availability_topic() -> String {
    "status/availability".to_string()
}

impl DoorConfig {
    /// Cooldown for this door, falling back to the global setting.
    pub fn cooldown(&self, global: &Global) -> Duration {
        match self.cooldown_minutes {
            Some(minutes) => Duration::from_secs(minutes * 60),
            None => global.cooldown(),
        }
    }

    /// Pick the door's effective geofence. When several are configured the
    /// most specific model wins: polygon, then circular, then zone.
    pub fn resolve_geofence(&self) -> Result<GeofenceSpec, ConfigError> {
        let configured = [
            self.polygon_geofence.as_ref().is_some_and(|g| g.is_defined()),
            self.circular_geofence.as_ref().is_some_and(|g| g.is_defined()),
            self.zone_geofence.as_ref().is_some_and(|g| g.is_defined()),
        ];
        if configured.iter().filter(|c| **c).count() > 1 {
            warn!(door = %self.id, "multiple geofences configured, using the most specific");
        }

        if let Some(g) = self.polygon_geofence.as_ref().filter(|g| g.is_defined()) {
            return Ok(GeofenceSpec::Polygon(g.clone()));
        }
        if let Some(g) = self.circular_geofence.as_ref().filter(|g| g.is_defined()) {
            return Ok(GeofenceSpec::Circular(g.clone()));
        }
        if let Some(g) = self.zone_geofence.as_ref().filter(|g| g.is_defined()) {
            return Ok(GeofenceSpec::Zone(g.clone()));
        }
        Err(ConfigError::MissingGeofence {
            door: self.id.clone(),
        })
    }
}

impl Config {
    /// Load and validate a config file. `TESTING=true` in the environment
    /// forces testing mode regardless of the file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config =
            serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if let Ok(val) = std::env::var("TESTING") {
            if val.eq_ignore_ascii_case("true") {
                config.global.testing = true;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.garage_doors.is_empty() {
            return Err(ConfigError::NoDoors);
        }

        let mut door_ids = HashSet::new();
        let mut tracker_ids = HashSet::new();
        for door in &self.garage_doors {
            if !door_ids.insert(door.id.as_str()) {
                return Err(ConfigError::DuplicateDoor {
                    id: door.id.clone(),
                });
            }
            door.resolve_geofence()?;
            if door.vehicles.is_empty() {
                return Err(ConfigError::NoVehicles {
                    door: door.id.clone(),
                });
            }
            for vehicle in &door.vehicles {
                if !tracker_ids.insert(vehicle.tracker_id) {
                    return Err(ConfigError::DuplicateTracker {
                        tracker_id: vehicle.tracker_id,
                    });
                }
            }
        }
        Ok(())
    }
}
