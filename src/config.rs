use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    catalog::{self, VEHICLES},
    census::StreamConfig,
    events::FilterTarget,
    render::FeedStyle,
};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "vehicle-tracker",
    about = "Track vehicle kills on a specific continent"
)]
pub struct Cli {
    /// Census service id, with or without the `s:` prefix.
    #[arg(short = 'i', long)]
    pub service_id: Option<String>,
    /// Continent to track.
    #[arg(short, long)]
    pub continent: Option<String>,
    /// Server to track.
    #[arg(short, long)]
    pub server: Option<String>,
    /// Your faction; kills by this faction are underlined.
    #[arg(short, long)]
    pub faction: Option<String>,
    /// Vehicle to track. Repeat to track several; defaults to every known vehicle.
    #[arg(short, long = "vehicle")]
    pub vehicles: Vec<String>,
    /// Config file to use instead of the one in the user config directory.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Write the feed without terminal colors.
    #[arg(long)]
    pub plain: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub service_id: Option<String>,
    pub stream_endpoint: String,
    pub census_endpoint: String,
    pub continent: String,
    pub server: String,
    pub faction: Option<String>,
    pub vehicles: Vec<String>,
    pub lookup_timeout_ms: u64,
    pub queue_capacity: usize,
    pub plain_output: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            service_id: None,
            stream_endpoint: "wss://push.nanite-systems.net/streaming".to_owned(),
            census_endpoint: "https://census.daybreakgames.com".to_owned(),
            continent: "Indar".to_owned(),
            server: "Jaeger".to_owned(),
            faction: None,
            vehicles: VEHICLES.iter().map(|(_, name)| (*name).to_owned()).collect(),
            lookup_timeout_ms: 5_000,
            queue_capacity: 256,
            plain_output: false,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no census service id configured (use --service-id)")]
    MissingServiceId,
    #[error("unknown continent `{0}`")]
    UnknownContinent(String),
    #[error("unknown server `{0}`")]
    UnknownServer(String),
    #[error("unknown faction `{0}`")]
    UnknownFaction(String),
    #[error("unknown vehicle `{0}`")]
    UnknownVehicle(String),
    #[error("no vehicles selected for tracking")]
    NoVehicles,
    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub service_id: String,
    pub stream_endpoint: String,
    pub census_endpoint: String,
    pub zone_id: u32,
    pub world_id: u32,
    pub home_faction: Option<u32>,
    pub vehicle_ids: HashSet<u32>,
    pub lookup_timeout: Duration,
    pub queue_capacity: usize,
    pub feed_style: FeedStyle,
}

impl Settings {
    pub fn filter_target(&self) -> FilterTarget {
        FilterTarget {
            zone_id: self.zone_id,
            world_id: self.world_id,
            vehicle_ids: self.vehicle_ids.clone(),
        }
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            endpoint: self.stream_endpoint.clone(),
            service_id: self.service_id.clone(),
            world_id: self.world_id,
        }
    }

    pub fn header(&self) -> String {
        format!(
            "Tracking Vehicle Kills on {} on {}",
            catalog::zone_name(self.zone_id).unwrap_or("?"),
            catalog::world_name(self.world_id).unwrap_or("?")
        )
    }
}

impl TrackerConfig {
    pub fn load_or_create(path: Option<&Path>) -> Result<(Self, PathBuf)> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let config_dir = dirs::config_dir()
                    .context("unable to locate OS config directory")?
                    .join("vehicle-tracker");
                fs::create_dir_all(&config_dir).with_context(|| {
                    format!("failed creating config dir at {}", config_dir.display())
                })?;
                config_dir.join("config.json")
            }
        };
        if !config_path.exists() {
            let default = Self::default();
            default.save(&config_path)?;
            return Ok((default, config_path));
        }

        let text = fs::read_to_string(&config_path)
            .with_context(|| format!("failed reading {}", config_path.display()))?;
        let config = serde_json::from_str::<Self>(&text)
            .with_context(|| format!("invalid json in {}", config_path.display()))?;
        Ok((config, config_path))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let payload = serde_json::to_string_pretty(self).context("failed serializing config")?;
        fs::write(path, payload).with_context(|| format!("failed writing {}", path.display()))?;
        Ok(())
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(service_id) = &cli.service_id {
            self.service_id = Some(service_id.clone());
        }
        if let Some(continent) = &cli.continent {
            self.continent = continent.clone();
        }
        if let Some(server) = &cli.server {
            self.server = server.clone();
        }
        if let Some(faction) = &cli.faction {
            self.faction = Some(faction.clone());
        }
        if !cli.vehicles.is_empty() {
            self.vehicles = cli.vehicles.clone();
        }
        self.plain_output |= cli.plain;
    }

    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let service_id = self
            .service_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingServiceId)?;
        let service_id = if service_id.starts_with("s:") {
            service_id.to_owned()
        } else {
            format!("s:{service_id}")
        };
        let zone_id = catalog::zone_id(&self.continent)
            .ok_or_else(|| ConfigError::UnknownContinent(self.continent.clone()))?;
        let world_id = catalog::world_id(&self.server)
            .ok_or_else(|| ConfigError::UnknownServer(self.server.clone()))?;
        let home_faction = match self.faction.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(tag) => Some(
                catalog::faction_id(tag)
                    .ok_or_else(|| ConfigError::UnknownFaction(tag.to_owned()))?,
            ),
        };
        let vehicle_ids = self
            .vehicles
            .iter()
            .map(|name| {
                catalog::vehicle_id(name).ok_or_else(|| ConfigError::UnknownVehicle(name.clone()))
            })
            .collect::<Result<HashSet<_>, _>>()?;
        if vehicle_ids.is_empty() {
            return Err(ConfigError::NoVehicles);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(Settings {
            service_id,
            stream_endpoint: self.stream_endpoint.clone(),
            census_endpoint: self.census_endpoint.clone(),
            zone_id,
            world_id,
            home_faction,
            vehicle_ids,
            lookup_timeout: Duration::from_millis(self.lookup_timeout_ms),
            queue_capacity: self.queue_capacity,
            feed_style: if self.plain_output {
                FeedStyle::Plain
            } else {
                FeedStyle::Ansi
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use clap::Parser;

    use super::{Cli, ConfigError, TrackerConfig};
    use crate::render::FeedStyle;

    fn with_service_id() -> TrackerConfig {
        TrackerConfig {
            service_id: Some("example".to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn parses_partial_config_with_defaults() {
        let raw = r#"{
            "service_id": "s:example",
            "continent": "Esamir",
            "unknown_key": 1
        }"#;
        let parsed: TrackerConfig = serde_json::from_str(raw).expect("config should parse");
        assert_eq!(parsed.continent, "Esamir");
        assert_eq!(parsed.server, "Jaeger");
        assert_eq!(parsed.vehicles.len(), 12);
        assert_eq!(parsed.lookup_timeout_ms, 5_000);
        assert!(parsed.faction.is_none());
    }

    #[test]
    fn defaults_validate_to_indar_on_jaeger() {
        let settings = with_service_id().validate().expect("defaults are valid");
        assert_eq!(settings.service_id, "s:example");
        assert_eq!(settings.zone_id, 2);
        assert_eq!(settings.world_id, 19);
        assert_eq!(settings.home_faction, None);
        assert_eq!(settings.vehicle_ids.len(), 12);
        assert_eq!(settings.feed_style, FeedStyle::Ansi);
        assert_eq!(settings.header(), "Tracking Vehicle Kills on Indar on Jaeger");
    }

    #[test]
    fn rejects_unknown_names() {
        let mut config = with_service_id();
        config.continent = "Nexus".to_owned();
        assert_eq!(
            config.validate().err(),
            Some(ConfigError::UnknownContinent("Nexus".to_owned()))
        );

        let mut config = with_service_id();
        config.server = "Briggs".to_owned();
        assert_eq!(
            config.validate().err(),
            Some(ConfigError::UnknownServer("Briggs".to_owned()))
        );

        let mut config = with_service_id();
        config.faction = Some("NSO".to_owned());
        assert_eq!(
            config.validate().err(),
            Some(ConfigError::UnknownFaction("NSO".to_owned()))
        );

        let mut config = with_service_id();
        config.vehicles = vec!["Sunderer".to_owned(), "Colossus".to_owned()];
        assert_eq!(
            config.validate().err(),
            Some(ConfigError::UnknownVehicle("Colossus".to_owned()))
        );
    }

    #[test]
    fn requires_service_id_and_vehicles() {
        assert_eq!(
            TrackerConfig::default().validate().err(),
            Some(ConfigError::MissingServiceId)
        );
        let mut config = with_service_id();
        config.vehicles.clear();
        assert_eq!(config.validate().err(), Some(ConfigError::NoVehicles));
    }

    #[test]
    fn cli_overrides_file_values() {
        let cli = Cli::parse_from([
            "vehicle-tracker",
            "-i",
            "s:cli",
            "-c",
            "oshur",
            "-s",
            "Miller",
            "-f",
            "TR",
            "-v",
            "Galaxy",
            "-v",
            "liberator",
            "--plain",
        ]);
        let mut config = with_service_id();
        config.apply_cli(&cli);
        let settings = config.validate().expect("cli values are valid");
        assert_eq!(settings.service_id, "s:cli");
        assert_eq!(settings.zone_id, 344);
        assert_eq!(settings.world_id, 10);
        assert_eq!(settings.home_faction, Some(3));
        assert_eq!(settings.vehicle_ids, HashSet::from([10, 11]));
        assert_eq!(settings.feed_style, FeedStyle::Plain);
    }

    #[test]
    fn creates_default_file_on_first_load() {
        let dir = std::env::temp_dir().join(format!("vehicle-tracker-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("config.json");
        let _ = std::fs::remove_file(&path);

        let (created, created_path) =
            TrackerConfig::load_or_create(Some(&path)).expect("create default config");
        assert_eq!(created_path, path);
        assert!(path.exists());
        let (loaded, _) = TrackerConfig::load_or_create(Some(&path)).expect("reload config");
        assert_eq!(loaded.continent, created.continent);
        assert_eq!(loaded.vehicles, created.vehicles);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
