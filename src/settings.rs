// Persisted user settings: the API credential and the configured routes
use crate::model::ConfiguredRoute;
use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

const API_KEY: &str = "511_api_key";
const ROUTES_KEY: &str = "configured_routes";

/// Opaque key-value storage. Values are replaced whole on every write.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&mut self, key: &str, value: &[u8]) -> anyhow::Result<()>;
}

/// Keeps every key in one JSON object on disk.
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(path: &Path) -> Self {
        let values = match fs::read(path) {
            Ok(content) => serde_json::from_slice(&content).unwrap_or_else(|err| {
                warn!("Ignoring unreadable settings in {}: {err}", path.display());
                BTreeMap::new()
            }),
            Err(_) => {
                info!("No settings in {} yet", path.display());
                BTreeMap::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            values,
        }
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> anyhow::Result<()> {
        let content = serde_json::to_vec_pretty(values)?;
        let partial = self.path.with_extension("tmp");
        fs::write(&partial, content)
            .with_context(|| format!("Unable to write {}", partial.display()))?;
        fs::rename(&partial, &self.path)
            .with_context(|| format!("Unable to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl SettingsStore for FileStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.values.get(key).map(|value| value.as_bytes().to_vec())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        let mut values = self.values.clone();
        values.insert(key.to_string(), String::from_utf8_lossy(value).into_owned());
        self.flush(&values)?;
        self.values = values;
        Ok(())
    }
}

/// Settings owned by whoever composes the application, passed to what needs them.
pub struct Settings {
    store: Box<dyn SettingsStore>,
    api_key: String,
    routes: Vec<ConfiguredRoute>,
}

impl Settings {
    pub fn load(store: Box<dyn SettingsStore>) -> Self {
        let api_key = store
            .get(API_KEY)
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
            .unwrap_or_default();
        let routes = store
            .get(ROUTES_KEY)
            .map(|bytes| {
                serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                    warn!("Stored routes do not decode, starting without routes: {err}");
                    Vec::new()
                })
            })
            .unwrap_or_default();
        Self {
            store,
            api_key,
            routes,
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn set_api_key(&mut self, api_key: &str) -> anyhow::Result<()> {
        let api_key = api_key.trim().to_string();
        self.store.set(API_KEY, api_key.as_bytes())?;
        self.api_key = api_key;
        Ok(())
    }

    pub fn routes(&self) -> &[ConfiguredRoute] {
        &self.routes
    }

    pub fn has_valid_configuration(&self) -> bool {
        !self.api_key.is_empty() && !self.routes.is_empty()
    }

    pub fn add_route(&mut self, route: ConfiguredRoute) -> anyhow::Result<()> {
        let mut routes = self.routes.clone();
        routes.push(route);
        self.replace_routes(routes)
    }

    /// Replaces the route with the same id. Returns false if there is none.
    pub fn update_route(&mut self, route: ConfiguredRoute) -> anyhow::Result<bool> {
        let Some(position) = self.routes.iter().position(|r| r.id == route.id) else {
            return Ok(false);
        };
        let mut routes = self.routes.clone();
        routes[position] = route;
        self.replace_routes(routes)?;
        Ok(true)
    }

    pub fn remove_route(&mut self, id: Uuid) -> anyhow::Result<Option<ConfiguredRoute>> {
        let Some(position) = self.routes.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let mut routes = self.routes.clone();
        let removed = routes.remove(position);
        self.replace_routes(routes)?;
        Ok(Some(removed))
    }

    pub fn clear_all(&mut self) -> anyhow::Result<()> {
        self.set_api_key("")?;
        self.replace_routes(Vec::new())
    }

    /// Writes the whole list; memory only changes once the store accepted it.
    fn replace_routes(&mut self, routes: Vec<ConfiguredRoute>) -> anyhow::Result<()> {
        let encoded = serde_json::to_vec(&routes)?;
        self.store.set(ROUTES_KEY, &encoded)?;
        self.routes = routes;
        Ok(())
    }
}
