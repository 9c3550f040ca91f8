// src/config/mod.rs
//! Configuration system for submission-vault
//!
//! TOML file plus environment overrides, loaded into a plain value that is
//! handed to `App::connect`. There is no process-global config.

pub use app::{AdminConfig, AnalyticsConfig, Config, DecryptConfig, KeysConfig, StoreConfig};

mod app;
mod defaults;
