//! Layered YAML configuration
//!
//! A bundled `default.yaml` is read first; the file named by `CONFIG_PATH`
//! deep-merges over it. The two mapping tables are replaced wholesale
//! rather than merged, so an operator override fully owns `env.mappings`
//! and `secrets.mappings`. After merging, `env.mappings` binds config
//! paths to environment variables and `secrets.mappings` binds config
//! paths to files under `secrets.dir` (`:optional` suffix tolerates a
//! missing file).

use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::path::Path;

use crate::error::{Result, ServiceError};

const BUNDLED: &str = include_str!("../config/default.yaml");

/// Config paths whose operator-supplied maps replace the bundled maps
const REPLACE_PATHS: &[&str] = &["env.mappings", "secrets.mappings"];

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_seconds: u64,
}

/// Database settings shared by both SQL backends
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// `sqlite` or `postgres`; anything else fails at storage construction
    pub driver: String,
    pub url: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub conn_max_lifetime_seconds: u64,
}

/// Runtime dispatcher settings
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSettings {
    /// `kubernetes` or `local`
    pub backend: String,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Base URL workers POST status events back to; required to dispatch
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub default_retry_attempts: Option<u32>,
}

/// Experiment tracker settings
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerSettings {
    pub enabled: bool,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Provider catalog settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersSettings {
    pub catalog_path: String,
}

/// Ready/termination file settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalSettings {
    #[serde(default)]
    pub ready_file: Option<String>,
    #[serde(default)]
    pub termination_file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvSettings {
    #[serde(default)]
    pub mappings: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecretsSettings {
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub mappings: std::collections::HashMap<String, String>,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub runtime: RuntimeSettings,
    pub tracker: TrackerSettings,
    pub providers: ProvidersSettings,
    #[serde(default)]
    pub signals: SignalSettings,
    #[serde(default)]
    pub env: EnvSettings,
    #[serde(default)]
    pub secrets: SecretsSettings,
}

impl Settings {
    /// Load configuration: bundled defaults, `CONFIG_PATH` overrides,
    /// environment mappings, secret mappings.
    pub fn load() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let mut doc = parse_yaml(BUNDLED)?;

        if let Ok(path) = env::var("CONFIG_PATH") {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                ServiceError::config(format!("Failed to read CONFIG_PATH {path}: {e}"))
            })?;
            let operator = parse_yaml(&raw)?;
            merge_documents(&mut doc, operator);
        }

        apply_env_mappings(&mut doc, |var| env::var(var).ok())?;
        apply_secret_mappings(&mut doc)?;

        serde_json::from_value(doc)
            .map_err(|e| ServiceError::config(format!("Invalid configuration: {e}")))
    }
}

fn parse_yaml(raw: &str) -> Result<Value> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(raw)
        .map_err(|e| ServiceError::config(format!("Invalid YAML configuration: {e}")))?;
    serde_json::to_value(yaml)
        .map_err(|e| ServiceError::config(format!("Configuration is not a JSON-like tree: {e}")))
}

/// Deep-merge `src` over `dst`. Objects merge key-wise, except the
/// mapping tables in [`REPLACE_PATHS`], which replace wholesale; scalars
/// and arrays always replace.
pub fn merge_documents(dst: &mut Value, src: Value) {
    merge_at(dst, src, "");
}

fn merge_at(dst: &mut Value, src: Value, path: &str) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (key, src_val) in src_map {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                if REPLACE_PATHS.contains(&child_path.as_str()) {
                    dst_map.insert(key, src_val);
                    continue;
                }
                match dst_map.get_mut(&key) {
                    Some(existing) => merge_at(existing, src_val, &child_path),
                    None => {
                        dst_map.insert(key, src_val);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Overwrite config paths from environment variables per `env.mappings`.
pub fn apply_env_mappings(
    doc: &mut Value,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let mappings = mapping_table(doc, "env")?;
    for (path, var) in mappings {
        if let Some(raw) = lookup(&var) {
            set_path(doc, &path, scalar_from_str(&raw));
        }
    }
    Ok(())
}

/// Overwrite config paths from secret files per `secrets.mappings`.
pub fn apply_secret_mappings(doc: &mut Value) -> Result<()> {
    let mappings = mapping_table(doc, "secrets")?;
    if mappings.is_empty() {
        return Ok(());
    }
    let dir = doc
        .pointer("/secrets/dir")
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::config("secrets.mappings requires secrets.dir"))?
        .to_string();

    for (path, name) in mappings {
        let (file, optional) = match name.strip_suffix(":optional") {
            Some(stripped) => (stripped.to_string(), true),
            None => (name, false),
        };
        let full = Path::new(&dir).join(&file);
        match std::fs::read_to_string(&full) {
            Ok(contents) => set_path(doc, &path, Value::String(contents.trim().to_string())),
            Err(_) if optional => {
                tracing::debug!(secret = %file, "Optional secret file missing, skipping");
            }
            Err(e) => {
                return Err(ServiceError::config(format!(
                    "Failed to read secret file {}: {e}",
                    full.display()
                )));
            }
        }
    }
    Ok(())
}

fn mapping_table(doc: &Value, section: &str) -> Result<Vec<(String, String)>> {
    let Some(table) = doc.pointer(&format!("/{section}/mappings")) else {
        return Ok(Vec::new());
    };
    let Some(map) = table.as_object() else {
        return Err(ServiceError::config(format!(
            "{section}.mappings must be a map of config paths"
        )));
    };
    map.iter()
        .map(|(path, v)| {
            v.as_str()
                .map(|s| (path.clone(), s.to_string()))
                .ok_or_else(|| {
                    ServiceError::config(format!("{section}.mappings.{path} must be a string"))
                })
        })
        .collect()
}

/// Set a dotted config path, creating intermediate objects as needed.
fn set_path(doc: &mut Value, path: &str, value: Value) {
    let mut current = doc;
    let segments: Vec<&str> = path.split('.').collect();
    for (i, segment) in segments.iter().enumerate() {
        if !current.is_object() {
            *current = Value::Object(Default::default());
        }
        let map = current.as_object_mut().expect("just ensured object");
        if i == segments.len() - 1 {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
}

/// Parse an environment value as a YAML scalar so numbers and booleans
/// keep their types; anything unparseable stays a string.
fn scalar_from_str(raw: &str) -> Value {
    serde_yaml::from_str::<serde_yaml::Value>(raw)
        .ok()
        .and_then(|y| serde_json::to_value(y).ok())
        .filter(|v| !v.is_null() || raw == "null" || raw == "~")
        .unwrap_or_else(|| Value::String(raw.to_string()))
}
