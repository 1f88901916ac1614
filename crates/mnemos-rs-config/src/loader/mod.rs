//! Layered configuration loader.
//!
//! Layers are read in order system, user, cwd, runtime; later layers
//! override earlier ones key by key.

mod layers;
mod merge;
mod schema;


use crate::{ConfigError, MnemosConfig, StoreProvider};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Effective config plus the layers that produced it.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: MnemosConfig,
    /// In load order.
    pub layers: Vec<ConfigLayer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// `/etc/mnemos/mnemos.json5` (or the Windows equivalent).
    System,
    /// `~/.mnemos/mnemos.json5`.
    User,
    /// `mnemos.json5` in the working directory.
    Cwd,
    /// Explicit files passed by the caller; these must exist.
    Runtime,
}

#[derive(Debug, Clone)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: Option<PathBuf>,
}

/// Where to look for each layer. Set a path to `None` to skip that layer.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    pub cwd: PathBuf,
    pub system_config_path: Option<PathBuf>,
    pub user_config_path: Option<PathBuf>,
    pub runtime_paths: Vec<PathBuf>,
}

impl LayeredConfigOptions {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: layers::system_config_path(),
            user_config_path: layers::user_config_path(),
            runtime_paths: Vec::new(),
        }
    }

    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl MnemosConfig {
    /// Load a single config from a path (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config from path: {}", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        let value: Value = json5::from_str(&contents)?;
        config_from_value(value, "config")
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value, "config")
    }

    /// Load a layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        info!(
            "loading layered config with defaults (cwd={})",
            cwd.as_ref().display()
        );
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load system, user, cwd and runtime layers from explicit locations.
    ///
    /// Missing optional layers are skipped; a file reached through two
    /// layers is only applied once.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let optional = [
            (ConfigLayerSource::System, options.system_config_path),
            (ConfigLayerSource::User, options.user_config_path),
            (
                ConfigLayerSource::Cwd,
                Some(options.cwd.join(layers::CONFIG_FILE)),
            ),
        ];
        let runtime = options
            .runtime_paths
            .into_iter()
            .map(|path| (ConfigLayerSource::Runtime, Some(path)));

        let mut loaded = Vec::new();
        let mut merged = Value::Object(serde_json::Map::new());
        let mut seen = HashSet::new();
        for (source, path) in optional.into_iter().chain(runtime) {
            let Some(path) = path else { continue };
            let required = source == ConfigLayerSource::Runtime;
            let Some(layer) = layers::read_layer(source, &path, required)? else {
                continue;
            };
            if !required && !seen.insert(layers::path_key(&path)) {
                debug!("layer already applied (path={})", path.display());
                continue;
            }
            merge::merge_json_values(&mut merged, &layer.value);
            loaded.push(layer.meta);
        }

        let config = config_from_value(merged, "effective")?;
        info!("layered config loaded (layers={})", loaded.len());
        Ok(LayeredConfig {
            config,
            layers: loaded,
        })
    }

    /// Validate configuration invariants that cannot be expressed in serde.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.memory.path
            && path.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "memory.path must not be empty".to_string(),
            ));
        }
        if self.memory.provider == StoreProvider::File
            && let Some(path) = &self.sessions.path
            && path.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "sessions.path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn config_from_value(value: Value, label: &str) -> Result<MnemosConfig, ConfigError> {
    schema::validate_layer_schema(&value, label)?;
    let config: MnemosConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
