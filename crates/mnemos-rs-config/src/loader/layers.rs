//! Locating and reading the individual `mnemos.json5` layers.

use super::{ConfigLayer, ConfigLayerSource, schema};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub(super) const CONFIG_FILE: &str = "mnemos.json5";
const USER_CONFIG_DIR: &str = ".mnemos";

#[cfg(unix)]
const SYSTEM_CONFIG: Option<&str> = Some("/etc/mnemos/mnemos.json5");
#[cfg(windows)]
const SYSTEM_CONFIG: Option<&str> = Some("C:\\ProgramData\\mnemos\\mnemos.json5");
#[cfg(not(any(unix, windows)))]
const SYSTEM_CONFIG: Option<&str> = None;

/// A parsed layer, schema-checked but not yet merged.
pub(super) struct Layer {
    pub meta: ConfigLayer,
    pub value: Value,
}

impl ConfigLayerSource {
    fn name(self) -> &'static str {
        match self {
            ConfigLayerSource::System => "system",
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Runtime => "runtime",
        }
    }
}

pub(super) fn system_config_path() -> Option<PathBuf> {
    SYSTEM_CONFIG.map(PathBuf::from)
}

pub(super) fn user_config_path() -> Option<PathBuf> {
    UserDirs::new().map(|dirs| dirs.home_dir().join(USER_CONFIG_DIR).join(CONFIG_FILE))
}

/// Read `path` as a `source` layer. Missing files yield `None` unless
/// `required` is set.
pub(super) fn read_layer(
    source: ConfigLayerSource,
    path: &Path,
    required: bool,
) -> Result<Option<Layer>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
            debug!("no {} layer (path={})", source.name(), path.display());
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };
    let value: Value = json5::from_str(&contents)?;
    let label = format!("{}({})", source.name(), path.display());
    schema::validate_layer_schema(&value, &label)?;
    debug!("read config layer {label}");
    Ok(Some(Layer {
        meta: ConfigLayer {
            source,
            path: Some(path.to_path_buf()),
        },
        value,
    }))
}

/// Identity used to skip a file already loaded under another layer.
pub(super) fn path_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
