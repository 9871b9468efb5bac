//! Settings file loading.
//!
//! A settings file is TOML with a `[search]` table holding the core
//! [`SearchConfig`] and any number of `[[simulated]]` engine entries:
//!
//! ```toml
//! [search]
//! engine_timeout_ms = 2000
//! cache_ttl_seconds = 0
//!
//! [search.suspension.rate_limited]
//! strategy = "fixed"
//! secs = 600
//!
//! [[simulated]]
//! name = "alpha"
//! failure_rate = 0.1
//! failure_kind = "captcha"
//! ```
//!
//! Simulated engines are registered with the coordinator automatically;
//! listing them under `[[search.engines]]` as well is only needed to set a
//! timeout override or disable one.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use searchmux_core::{EngineAdapter, FailureKind, QueryCoordinator, SearchConfig};

use crate::error::{Error, Result};
use crate::simulated::{SimulatedEngine, SimulatedEngineConfig};

/// Everything the soak harness needs to build a coordinator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub search: SearchConfig,
    pub simulated: Vec<SimulatedEngineConfig>,
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save settings to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the settings cannot
    /// be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default settings path: `<config dir>/searchmux/config.toml`.
    ///
    /// `SEARCHMUX_CONFIG_DIR` overrides the directory.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Some(dir) = std::env::var_os("SEARCHMUX_CONFIG_DIR") {
            return PathBuf::from(dir).join("config.toml");
        }
        dirs::config_dir()
            .map(|d| d.join("searchmux"))
            .unwrap_or_else(|| PathBuf::from("/tmp/searchmux-config"))
            .join("config.toml")
    }

    /// Load from `path`, or from [`Settings::default_path`] if it exists,
    /// or fall back to [`Settings::demo`].
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit `path` cannot be loaded, or the
    /// default file exists but is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        let default = Self::default_path();
        if default.is_file() {
            tracing::debug!(path = %default.display(), "loading settings");
            Self::from_file(&default)
        } else {
            tracing::debug!("no settings file found, using demo engines");
            Ok(Self::demo())
        }
    }

    /// Four simulated engines with differing reliability: one healthy, one
    /// slow, one that times out now and then, one that hits CAPTCHAs.
    pub fn demo() -> Self {
        let ms = Duration::from_millis;
        Self {
            search: SearchConfig::default(),
            simulated: vec![
                SimulatedEngineConfig::new("alpha").with_latency(ms(50), ms(250)),
                SimulatedEngineConfig::new("beta").with_latency(ms(400), ms(1_200)),
                SimulatedEngineConfig::new("gamma")
                    .with_latency(ms(100), ms(600))
                    .with_failures(0.2, FailureKind::Timeout),
                SimulatedEngineConfig::new("delta")
                    .with_latency(ms(100), ms(400))
                    .with_failures(0.1, FailureKind::Captcha),
            ],
        }
    }

    /// The search config with every simulated engine registered.
    ///
    /// Engines already listed under `[[search.engines]]` keep their entry.
    pub fn search_config(&self) -> SearchConfig {
        let mut config = self.search.clone();
        let listed: HashSet<(String, String)> = config
            .engines
            .iter()
            .map(|e| (e.name.clone(), e.category.clone()))
            .collect();
        for sim in &self.simulated {
            if !listed.contains(&(sim.name.clone(), sim.category.clone())) {
                config.engines.push(sim.engine_settings());
            }
        }
        config
    }

    /// Validates the settings, including the embedded search config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an invalid simulated entry or a name
    /// used twice, and [`Error::Search`] for an invalid search config.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for sim in &self.simulated {
            sim.validate().map_err(Error::Config)?;
            if !names.insert(sim.name.as_str()) {
                return Err(Error::Config(format!(
                    "simulated engine '{}' defined twice",
                    sim.name
                )));
            }
        }
        self.search_config().validate()?;
        Ok(())
    }

    /// Build a coordinator backed by the simulated engines.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or a configured engine
    /// has no simulated adapter.
    pub fn build_coordinator(&self) -> Result<QueryCoordinator> {
        self.validate()?;
        let adapters = self.simulated.iter().map(|sim| {
            let adapter: Arc<dyn EngineAdapter> = Arc::new(SimulatedEngine::new(sim.clone()));
            (sim.name.clone(), adapter)
        });
        Ok(QueryCoordinator::new(self.search_config(), adapters)?)
    }
}
