//! Layered configuration for the command-line front-end.
//!
//! Values are resolved in order of precedence: explicit CLI flags, `-S key=value`
//! overrides, the TOML configuration file, and finally the library defaults.

pub mod builder;
pub mod file;
pub mod models;

pub use builder::build_config;
pub use models::AppConfig;
