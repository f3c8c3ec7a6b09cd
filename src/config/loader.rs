// src/config/loader.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, Environment};
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::config::model::{RawSettings, Settings};
use crate::errors::Result;

/// Loads [`Settings`] once and hands out the cached value afterwards.
///
/// By default the loader reads `.env` from the current directory (when it
/// exists) into the process environment, then deserializes the process
/// environment. Tests swap the environment for an explicit map with
/// [`SettingsLoader::from_source`]; in that mode the `.env` file (if one is
/// configured) is merged into the map instead of the process environment.
///
/// In both modes, values already present win over `.env` entries.
#[derive(Debug)]
pub struct SettingsLoader {
    env_file: Option<PathBuf>,
    source: Option<HashMap<String, String>>,
    cache: OnceCell<Settings>,
}

impl SettingsLoader {
    /// Loader over the real process environment and `./.env`.
    pub fn new() -> Self {
        Self {
            env_file: Some(default_env_path()),
            source: None,
            cache: OnceCell::new(),
        }
    }

    /// Loader over an explicit key/value map (no `.env` unless configured).
    pub fn from_source<K, V>(source: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            env_file: None,
            source: Some(
                source
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            cache: OnceCell::new(),
        }
    }

    /// Use `path` as the `.env` file.
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    /// Do not read any `.env` file.
    pub fn without_env_file(mut self) -> Self {
        self.env_file = None;
        self
    }

    /// Load on first call; later calls return the same instance.
    pub fn get(&self) -> Result<&Settings> {
        self.cache.get_or_try_init(|| self.load_uncached())
    }

    fn load_uncached(&self) -> Result<Settings> {
        let source = match &self.source {
            Some(map) => {
                let mut map = map.clone();
                if let Some(path) = self.env_file.as_deref() {
                    merge_env_file(&mut map, path)?;
                }
                Some(map)
            }
            None => {
                if let Some(path) = self.env_file.as_deref() {
                    load_env_file(path)?;
                }
                None
            }
        };

        let raw = load_raw(source)?;
        Settings::try_from(raw)
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Deserialize [`RawSettings`] from `source`, or from the process
/// environment when `source` is `None`.
///
/// Keys are matched case-insensitively and every value is kept as a string
/// until a typed field asks for a bool or an integer, so string settings
/// such as `APP_SECRET_KEY=0042` come through verbatim. Empty values count
/// as unset.
pub fn load_raw(source: Option<HashMap<String, String>>) -> Result<RawSettings> {
    let env = Environment::default().ignore_empty(true);

    let cfg = Config::builder().add_source(env.source(source)).build()?;
    let raw: RawSettings = cfg.try_deserialize()?;
    Ok(raw)
}

/// Path of the `.env` file consulted by [`SettingsLoader::new`].
pub fn default_env_path() -> PathBuf {
    PathBuf::from(".env")
}

/// Load `path` into the process environment, if it is a file.
fn load_env_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        debug!(path = %path.display(), "no .env file; using process environment only");
        return Ok(());
    }
    dotenvy::from_path(path)?;
    debug!(path = %path.display(), "loaded .env file into process environment");
    Ok(())
}

/// Merge `path` into `map` without overriding existing keys.
fn merge_env_file(map: &mut HashMap<String, String>, path: &Path) -> Result<()> {
    if !path.is_file() {
        return Ok(());
    }
    for item in dotenvy::from_path_iter(path)? {
        let (key, value) = item?;
        map.entry(key).or_insert(value);
    }
    Ok(())
}
