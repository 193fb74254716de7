use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::sanitize_base_url;

pub const DEFAULT_API_BASE: &str = "http://localhost:8082";
pub const API_BASE_STORAGE_KEY: &str = "aguaVivaApiBaseUrl";
pub const SETTINGS_FILE: &str = "console.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("no user config directory available")]
    NoConfigDir,
    #[error("failed to access settings file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("settings file '{path}' is not valid JSON: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub api_base_url: Option<String>,
    pub refresh_seconds: u64,
    pub courier_refresh_seconds: u64,
    pub log_filter: String,
    pub event_feed_limit: u32,
    pub examples_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            refresh_seconds: 5,
            courier_refresh_seconds: 4,
            log_filter: "info".into(),
            event_feed_limit: shared::paths::DEFAULT_EVENT_FEED_LIMIT,
            examples_path: None,
        }
    }
}

impl Settings {
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_seconds.max(1))
    }

    pub fn courier_refresh_period(&self) -> Duration {
        Duration::from_secs(self.courier_refresh_seconds.max(1))
    }

    pub fn resolve_base_url(&self, store: &BaseUrlStore) -> String {
        self.api_base_url
            .as_deref()
            .map(sanitize_base_url)
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| store.read())
    }
}

pub fn load_settings(path: &Path) -> Settings {
    load_settings_with(path, |key| std::env::var(key).ok())
}

/// Defaults, then the TOML file at `path`, then variables from `env`.
/// Unreadable files and unparsable numbers are skipped.
pub fn load_settings_with(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(values) => {
                let file_cfg: HashMap<String, String> = values
                    .into_iter()
                    .map(|(key, value)| match value {
                        toml::Value::String(text) => (key, text),
                        other => (key, other.to_string()),
                    })
                    .collect();
                if let Some(v) = file_cfg.get("api_base_url") {
                    settings.api_base_url = Some(v.clone());
                }
                if let Some(v) = file_cfg.get("refresh_seconds").and_then(|v| v.parse().ok()) {
                    settings.refresh_seconds = v;
                }
                if let Some(v) = file_cfg
                    .get("courier_refresh_seconds")
                    .and_then(|v| v.parse().ok())
                {
                    settings.courier_refresh_seconds = v;
                }
                if let Some(v) = file_cfg.get("log_filter") {
                    settings.log_filter = v.clone();
                }
                if let Some(v) = file_cfg.get("event_feed_limit").and_then(|v| v.parse().ok()) {
                    settings.event_feed_limit = v;
                }
                if let Some(v) = file_cfg.get("examples_path") {
                    settings.examples_path = Some(PathBuf::from(v));
                }
                debug!(path = %path.display(), "settings file applied");
            }
            Err(err) => warn!(path = %path.display(), error = %err, "ignoring unreadable settings file"),
        }
    }

    if let Some(v) = env("AGUA_VIVA_API_BASE") {
        settings.api_base_url = Some(v);
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = Some(v);
    }

    if let Some(v) = env("APP__REFRESH_SECONDS").and_then(|v| v.parse().ok()) {
        settings.refresh_seconds = v;
    }
    if let Some(v) = env("APP__COURIER_REFRESH_SECONDS").and_then(|v| v.parse().ok()) {
        settings.courier_refresh_seconds = v;
    }

    if let Some(v) = env("RUST_LOG") {
        settings.log_filter = v;
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    settings
}

#[derive(Debug, Clone)]
pub struct BaseUrlStore {
    path: PathBuf,
}

impl BaseUrlStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("agua_viva").join("settings.json"))
    }

    pub fn open_default() -> Result<Self, SettingsError> {
        Self::default_path().map(Self::at).ok_or(SettingsError::NoConfigDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }

    fn load_map(&self) -> Result<BTreeMap<String, String>, SettingsError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.display(),
                    source,
                })
            }
        };
        serde_json::from_str(&raw).map_err(|source| SettingsError::Json {
            path: self.display(),
            source,
        })
    }

    fn save_map(&self, map: &BTreeMap<String, String>) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let serialized = serde_json::to_string_pretty(map).map_err(|source| SettingsError::Json {
            path: self.display(),
            source,
        })?;
        fs::write(&self.path, serialized).map_err(|source| SettingsError::Io {
            path: self.display(),
            source,
        })
    }

    /// Stored value, sanitized. Missing, blank or unreadable falls back to
    /// [`DEFAULT_API_BASE`].
    pub fn read(&self) -> String {
        match self.load_map() {
            Ok(map) => map
                .get(API_BASE_STORAGE_KEY)
                .map(|raw| sanitize_base_url(raw))
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            Err(err) => {
                warn!(error = %err, "stored api base unreadable, using default");
                DEFAULT_API_BASE.to_string()
            }
        }
    }

    pub fn persist(&self, raw: &str) -> Result<bool, SettingsError> {
        let sanitized = sanitize_base_url(raw);
        if sanitized.is_empty() {
            return Ok(false);
        }
        let mut map = self.load_map().unwrap_or_default();
        map.insert(API_BASE_STORAGE_KEY.to_string(), sanitized);
        self.save_map(&map)?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), SettingsError> {
        let mut map = match self.load_map() {
            Ok(map) => map,
            Err(SettingsError::Json { .. }) => BTreeMap::new(),
            Err(err) => return Err(err),
        };
        if map.remove(API_BASE_STORAGE_KEY).is_some() || !self.path.exists() {
            self.save_map(&map)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_from(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = load_settings_with(&dir.path().join("missing.toml"), env_from(&[]));
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.refresh_period(), Duration::from_secs(5));
        assert_eq!(settings.courier_refresh_period(), Duration::from_secs(4));
        assert_eq!(settings.event_feed_limit, 50);
    }

    #[test]
    fn file_then_env_override_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(
            &path,
            "api_base_url = \"http://file:8082\"\nrefresh_seconds = 10\nlog_filter = \"debug\"\nexamples_path = \"ex.json\"\n",
        )
        .expect("write toml");

        let settings = load_settings_with(&path, env_from(&[]));
        assert_eq!(settings.api_base_url.as_deref(), Some("http://file:8082"));
        assert_eq!(settings.refresh_seconds, 10);
        assert_eq!(settings.log_filter, "debug");
        assert_eq!(settings.examples_path, Some(PathBuf::from("ex.json")));

        let settings = load_settings_with(
            &path,
            env_from(&[
                ("AGUA_VIVA_API_BASE", "http://legacy:1"),
                ("APP__API_BASE_URL", "http://env:2"),
                ("APP__COURIER_REFRESH_SECONDS", "7"),
                ("APP__REFRESH_SECONDS", "not-a-number"),
                ("APP__LOG_FILTER", "client_core=trace"),
            ]),
        );
        assert_eq!(settings.api_base_url.as_deref(), Some("http://env:2"));
        assert_eq!(settings.courier_refresh_seconds, 7);
        assert_eq!(settings.refresh_seconds, 10);
        assert_eq!(settings.log_filter, "client_core=trace");
    }

    #[test]
    fn malformed_toml_is_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "this is = = not toml").expect("write");
        assert_eq!(load_settings_with(&path, env_from(&[])), Settings::default());
    }

    #[test]
    fn store_reads_default_until_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = BaseUrlStore::at(dir.path().join("agua_viva").join("settings.json"));
        assert_eq!(store.read(), DEFAULT_API_BASE);

        assert!(store.persist("  http://api.local:9000/// ").expect("persist"));
        assert_eq!(store.read(), "http://api.local:9000");

        let raw = fs::read_to_string(store.path()).expect("stored file");
        let map: BTreeMap<String, String> = serde_json::from_str(&raw).expect("json map");
        assert_eq!(map.get(API_BASE_STORAGE_KEY).map(String::as_str), Some("http://api.local:9000"));
    }

    #[test]
    fn blank_value_is_not_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = BaseUrlStore::at(dir.path().join("settings.json"));
        store.persist("http://keep:1").expect("persist");
        assert!(!store.persist("  / ").expect("persist blank"));
        assert_eq!(store.read(), "http://keep:1");
    }

    #[test]
    fn clear_restores_default_and_keeps_other_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"aguaVivaApiBaseUrl": "http://x:1", "outra": "valor"}"#).expect("write");
        let store = BaseUrlStore::at(&path);

        store.clear().expect("clear");
        assert_eq!(store.read(), DEFAULT_API_BASE);
        let map: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
        assert_eq!(map.get("outra").map(String::as_str), Some("valor"));
    }

    #[test]
    fn corrupt_store_reads_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "[not a map").expect("write");
        assert_eq!(BaseUrlStore::at(&path).read(), DEFAULT_API_BASE);
    }

    #[test]
    fn explicit_override_beats_the_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = BaseUrlStore::at(dir.path().join("settings.json"));
        store.persist("http://stored:1").expect("persist");

        let mut settings = Settings::default();
        assert_eq!(settings.resolve_base_url(&store), "http://stored:1");
        settings.api_base_url = Some("http://override:2/".into());
        assert_eq!(settings.resolve_base_url(&store), "http://override:2");
    }
}
