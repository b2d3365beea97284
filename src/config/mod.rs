// src/config/mod.rs

//! Configuration: TOML file model, CLI overlay, validation.

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use duration::parse_duration;
pub use loader::{load_and_validate, resolve};
pub use model::{ConfigFile, QuerySpec, RawConfigFile};
