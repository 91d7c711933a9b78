//! Configuration management for shmdb
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (`SHMDB_*` prefix, `__` between sections,
//!    e.g. `SHMDB_REGION__CAPACITY`) (highest precedence)
//! 2. shmdb.local.toml (local overrides)
//! 3. shmdb.toml (project config)
//! 4. ~/.config/shmdb/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! Both ends of a channel must load the same region capacity; it is never
//! negotiated on the wire.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use shmdb_types::{DEFAULT_REGION_CAPACITY, HEADER_LEN, Schema, Table};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main shmdb configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShmdbConfig {
    pub region: RegionConfig,
    pub session: SessionConfig,
    pub schema: SchemaConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Size of every region in bytes, flag byte included.
    pub capacity: usize,
    pub backing: RegionBacking,
    /// Where file-backed regions are created.
    pub directory: PathBuf,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_REGION_CAPACITY,
            backing: RegionBacking::Anonymous,
            directory: PathBuf::from("/dev/shm/shmdb"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RegionBacking {
    /// Shared anonymous mappings; client and sessions share one process.
    Anonymous,
    /// One file per region, mappable by other processes.
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub wait: WaitMode,
    /// Sleep between polls when `wait = "sleep"`.
    pub sleep_micros: u64,
    /// Empty polls spent spinning before `wait` applies.
    pub spin_limit: u32,
    /// Client-side response deadline; 0 waits forever.
    pub poll_timeout_ms: u64,
    pub thread_name_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wait: WaitMode::Sleep,
            sleep_micros: 1,
            spin_limit: 1_000,
            poll_timeout_ms: 0,
            thread_name_prefix: "shmdb-session".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn sleep_interval(&self) -> Duration {
        Duration::from_micros(self.sleep_micros)
    }

    pub fn poll_timeout(&self) -> Option<Duration> {
        (self.poll_timeout_ms > 0).then(|| Duration::from_millis(self.poll_timeout_ms))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WaitMode {
    Spin,
    Yield,
    Sleep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Storage location handed to the backend (file name, or `:memory:`).
    pub location: String,
    pub tables: Vec<Table>,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            location: ":memory:".to_string(),
            tables: Vec::new(),
        }
    }
}

impl SchemaConfig {
    /// The YCSB `usertable` with `field0..field{n-1}`.
    pub fn ycsb(field_count: usize) -> Self {
        Self {
            tables: vec![Table::new(
                "usertable",
                (0..field_count).map(|i| format!("field{i}")),
            )],
            ..Self::default()
        }
    }

    pub fn to_schema(&self) -> Schema {
        Schema::new(self.tables.clone(), self.location.clone())
    }
}

impl ShmdbConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Reads a single TOML file, without merging any other source.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Lowest round-trip latency: both sides spin without yielding.
    pub fn low_latency() -> Self {
        Self {
            session: SessionConfig {
                wait: WaitMode::Spin,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Idle sessions give their CPU back to the scheduler.
    pub fn power_saving() -> Self {
        Self {
            session: SessionConfig {
                wait: WaitMode::Sleep,
                sleep_micros: 50,
                spin_limit: 0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        if self.region.directory.is_relative() {
            self.region.directory = base_dir.as_ref().join(&self.region.directory);
        }
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.capacity <= HEADER_LEN {
            return Err(ConfigError::invalid(format!(
                "region.capacity must exceed the {HEADER_LEN}-byte flag header, got {}",
                self.region.capacity
            )));
        }
        if self.session.thread_name_prefix.is_empty() {
            return Err(ConfigError::invalid(
                "session.thread_name_prefix must not be empty",
            ));
        }

        let mut names = HashSet::new();
        for table in &self.schema.tables {
            if table.name.is_empty() {
                return Err(ConfigError::invalid("table names must not be empty"));
            }
            if !names.insert(table.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate table {}",
                    table.name
                )));
            }
            let mut columns = HashSet::new();
            if let Some(dup) = table.columns.iter().find(|c| !columns.insert(c.as_str())) {
                return Err(ConfigError::invalid(format!(
                    "duplicate column {dup} in table {}",
                    table.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn default_config() {
        let config = ShmdbConfig::default();
        assert_eq!(config.region.capacity, 1 << 20);
        assert_eq!(config.region.backing, RegionBacking::Anonymous);
        assert_eq!(config.session.wait, WaitMode::Sleep);
        assert_eq!(config.session.poll_timeout(), None);
        assert_eq!(config.schema.location, ":memory:");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn presets() {
        assert_eq!(ShmdbConfig::low_latency().session.wait, WaitMode::Spin);

        let saving = ShmdbConfig::power_saving();
        assert_eq!(saving.session.spin_limit, 0);
        assert_eq!(saving.session.sleep_interval(), Duration::from_micros(50));
    }

    #[test]
    fn ycsb_schema() {
        let schema = SchemaConfig::ycsb(10).to_schema();
        let table = schema.table("usertable").unwrap();
        assert_eq!(table.columns.len(), 10);
        assert_eq!(table.columns[9], "field9");
    }

    #[test]
    fn path_resolution() {
        let mut config = ShmdbConfig::default();
        config.region.directory = PathBuf::from("regions");
        config.resolve_paths("/srv/bench");
        assert_eq!(config.region.directory, PathBuf::from("/srv/bench/regions"));

        // Absolute paths are left alone.
        config.resolve_paths("/elsewhere");
        assert_eq!(config.region.directory, PathBuf::from("/srv/bench/regions"));
    }

    #[test_case(0 ; "zero")]
    #[test_case(1 ; "flag only")]
    fn tiny_capacity_is_invalid(capacity: usize) {
        let mut config = ShmdbConfig::default();
        config.region.capacity = capacity;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test_case(vec![Table::new("", ["a"])] ; "empty name")]
    #[test_case(vec![Table::new("t", ["a"]), Table::new("t", ["b"])] ; "duplicate table")]
    #[test_case(vec![Table::new("t", ["a", "b", "a"])] ; "duplicate column")]
    fn bad_tables_are_invalid(tables: Vec<Table>) {
        let mut config = ShmdbConfig::default();
        config.schema.tables = tables;
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = ShmdbConfig::low_latency();
        config.schema = SchemaConfig::ycsb(2);

        let text = toml::to_string(&config).unwrap();
        let back: ShmdbConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
