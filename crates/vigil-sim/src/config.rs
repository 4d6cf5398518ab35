//! Harness configuration.
//!
//! Controls tick rate, run length, the spawned population and output.
//! Configuration can be loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "vigil-sim.toml";

/// How much of the event stream is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLog {
    /// Nothing
    Off,
    /// Spawns, deaths and status changes
    #[default]
    Lifecycle,
    /// Every event
    All,
}

/// Harness configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    // === Timing ===
    /// Ticks per simulated second
    pub tick_rate: u32,
    /// Ticks to run
    pub ticks: u64,

    // === Population ===
    /// RNG seed (None = random)
    pub seed: Option<u64>,
    /// Half the side length of the square spawn area
    pub arena_half_extent: f32,
    /// Extra archetypes loaded on top of the built-ins
    pub archetype_file: Option<PathBuf>,
    /// Ticks between random status effects (0 = disabled)
    pub status_interval: u64,
    /// Duration of random status effects in seconds
    pub status_duration: f32,

    // === Output ===
    /// Event logging verbosity
    pub event_log: EventLog,
    /// Where to write the JSON run summary
    pub summary_path: Option<PathBuf>,

    // === Spawns ===
    /// Number of entities to spawn per archetype
    pub spawns: BTreeMap<String, u32>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let spawns = [("warrior", 2), ("goblin", 4), ("shaman", 1), ("spike_trap", 2), ("deer", 3)]
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();

        Self {
            tick_rate: 20,
            ticks: 600,

            seed: None,
            arena_half_extent: 15.0,
            archetype_file: None,
            status_interval: 100,
            status_duration: 2.0,

            event_log: EventLog::default(),
            summary_path: None,

            spawns,
        }
    }
}

impl SimConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.tick_rate = self.tick_rate.clamp(1, 1_000);
        self.ticks = self.ticks.min(1_000_000);

        if !self.arena_half_extent.is_finite() {
            self.arena_half_extent = 15.0;
        }
        self.arena_half_extent = self.arena_half_extent.clamp(1.0, 1_000.0);

        if !self.status_duration.is_finite() {
            self.status_duration = 2.0;
        }
        self.status_duration = self.status_duration.clamp(0.1, 60.0);

        for count in self.spawns.values_mut() {
            *count = (*count).min(1_000);
        }
        self.spawns.retain(|_, count| *count > 0);
    }

    /// Seconds per tick.
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Total entities requested.
    pub fn population(&self) -> u32 {
        self.spawns.values().sum()
    }
}
