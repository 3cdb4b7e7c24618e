//! Configuration loading: file discovery, `${ENV}` substitution and
//! deployment environment overrides.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{apply_env_overrides, config_dir, data_dir, discover_and_load, load_config, set_config_dir},
    schema::{BridgeConfig, HugliConfig, IpRestrictionConfig, WhatsAppConfig},
};
