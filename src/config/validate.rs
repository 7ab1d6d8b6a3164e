// src/config/validate.rs

use std::str::FromStr;

use anyhow::{Context, Result, anyhow};

use crate::config::model::ConfigFile;
use crate::exec::TimeoutPolicy;

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - `buffer.capacity >= 1`
/// - `exec.on_timeout` is a valid policy ("abort" or "continue")
/// - `exec.timeout_secs`, if present, is non-zero
///
/// `repeat.count` is deliberately unconstrained: negative means unbounded
/// and zero is the valid "run nothing" configuration.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_buffer(cfg)?;
    validate_exec(cfg)?;
    Ok(())
}

fn validate_buffer(cfg: &ConfigFile) -> Result<()> {
    if cfg.buffer.capacity == 0 {
        return Err(anyhow!("[buffer].capacity must be >= 1 (got 0)"));
    }
    Ok(())
}

fn validate_exec(cfg: &ConfigFile) -> Result<()> {
    TimeoutPolicy::from_str(&cfg.exec.on_timeout)
        .map_err(|e| anyhow!(e))
        .context("invalid [exec].on_timeout")?;

    if cfg.exec.timeout_secs == Some(0) {
        return Err(anyhow!(
            "[exec].timeout_secs must be >= 1 when set (omit it for no timeout)"
        ));
    }

    Ok(())
}
