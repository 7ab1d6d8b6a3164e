// src/config/mod.rs

//! Configuration loading and validation for hostlink.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants like buffer sizing (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, repeat_options};
pub use model::{BufferSection, ConfigFile, ExecSection, RepeatSection};
pub use validate::validate_config;
