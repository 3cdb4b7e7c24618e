use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::HugliConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["hugli.toml", "hugli.yaml", "hugli.yml", "hugli.json"];

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Set a custom config directory. When set, discovery only looks there.
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner()) = Some(path);
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<HugliConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply environment
/// overrides.
///
/// Search order:
/// 1. `./hugli.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/hugli/hugli.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `HugliConfig::default()` when nothing is found or parsing
/// fails.
pub fn discover_and_load() -> HugliConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                HugliConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            HugliConfig::default()
        },
    };
    apply_env_overrides(&mut config, |k| std::env::var(k).ok());
    config
}

/// Apply the deployment environment variables on top of a loaded config.
pub fn apply_env_overrides(config: &mut HugliConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(port) = env("PORT") {
        match port.parse() {
            Ok(p) => config.server.port = p,
            Err(_) => warn!(value = %port, "ignoring invalid PORT"),
        }
    }
    if let Some(origin) = env("CORS_ORIGIN") {
        config.server.cors_origin = origin;
    }
    if let Some(url) = env("DATABASE_URL") {
        config.database.url = Some(url);
    }
    if let Some(number) = env("WHATSAPP_TARGET_NUMBER") {
        config.whatsapp.target_number = number;
    }
    if let Some(url) = env("WHATSAPP_BRIDGE_URL") {
        config.whatsapp.bridge.base_url = url;
    }
    if let Some(key) = env("WHATSAPP_BRIDGE_API_KEY") {
        config.whatsapp.bridge.api_key = Some(key);
    }
    if let Some(flag) = env("ENABLE_IP_RESTRICTION") {
        config.ip_restriction.enabled = flag == "true";
    }
    if let Some(ips) = env("ALLOWED_IPS") {
        config.ip_restriction.allowed_ips = ips
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
    }
}

fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return CONFIG_FILENAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.exists());
    }

    CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| {
            let dir = config_dir()?;
            CONFIG_FILENAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.exists())
        })
}

/// Returns the config directory: override, or `~/.config/hugli/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return Some(dir);
    }
    home_dir().map(|h| h.join(".config").join("hugli"))
}

/// Returns the data directory: `~/.hugli/`.
pub fn data_dir() -> PathBuf {
    home_dir()
        .map(|h| h.join(".hugli"))
        .unwrap_or_else(|| PathBuf::from(".hugli"))
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<HugliConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
