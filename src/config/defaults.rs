//! Configuration file locations.

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "PRODCAST_CONFIG";

/// Config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "prodcast.toml";
