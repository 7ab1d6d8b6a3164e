// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;
use crate::exec::{RepeatOptions, TimeoutPolicy};

/// Load a configuration file from a given path and return the raw
/// `ConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading config file at {:?}", path))?;

    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML config from {:?}", path))?;

    Ok(config)
}

/// Load a configuration file from path and run basic validation.
///
/// This is the recommended entry point:
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks buffer sizing and timeout policy sanity.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Helper to resolve a default config path.
///
/// Currently this just returns `Hostlink.toml` in the current working
/// directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Hostlink.toml")
}

/// Turn the `[repeat]` and `[exec]` sections into ready-to-use
/// [`RepeatOptions`].
pub fn repeat_options(cfg: &ConfigFile) -> Result<RepeatOptions> {
    let on_timeout = TimeoutPolicy::from_str(&cfg.exec.on_timeout)
        .map_err(|e| anyhow!(e))
        .context("invalid [exec].on_timeout")?;

    Ok(RepeatOptions {
        count: cfg.repeat.count,
        interval: cfg.repeat.interval(),
        ttl: cfg.repeat.ttl(),
        timeout: cfg.exec.timeout(),
        on_timeout,
    })
}
