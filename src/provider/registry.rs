//! Model registry: the static provider set plus derived models

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::provider::factory::create_provider;
use crate::provider::traits::Provider;

/// A named provider overlay with an added system prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedModel {
    pub name: String,
    pub base: String,
    pub system: String,
}

/// Registry of providers, keyed by name
pub struct ModelRegistry {
    providers: Vec<Arc<dyn Provider>>,
    index: HashMap<String, usize>,
    derived: RwLock<BTreeMap<String, DerivedModel>>,
}

/// Drop a trailing `:tag` such as `:latest`
pub fn strip_tag(name: &str) -> &str {
    name.split(':').next().unwrap_or(name)
}

impl ModelRegistry {
    /// Create a registry over a fixed provider set; later duplicates are ignored
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        let mut registered: Vec<Arc<dyn Provider>> = Vec::with_capacity(providers.len());
        let mut index = HashMap::new();

        for provider in providers {
            let name = provider.name().to_string();
            if index.contains_key(&name) {
                warn!(provider = %name, "Duplicate provider name, keeping the first");
                continue;
            }
            index.insert(name, registered.len());
            registered.push(provider);
        }

        Self {
            providers: registered,
            index,
            derived: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build every enabled provider declared in settings
    pub fn from_settings(settings: &Settings) -> Self {
        let enabled = settings.enabled_providers();
        let disabled = settings.providers.len() - enabled.len();
        if disabled > 0 {
            info!(disabled, "Skipping disabled providers");
        }

        let mut providers = Vec::new();
        for config in enabled {
            match create_provider(config, &settings.resolution) {
                Ok(provider) => {
                    info!(provider = %config.name, kind = %config.kind, "Provider registered");
                    providers.push(provider);
                }
                Err(e) => {
                    warn!(provider = %config.name, error = %e, "Failed to create provider");
                }
            }
        }

        Self::new(providers)
    }

    /// Map a requested model name to (provider name, system overlay).
    ///
    /// Never fails; unknown names come back unchanged with an empty overlay.
    pub fn resolve(&self, requested: &str) -> (String, String) {
        let name = strip_tag(requested);
        match self.derived.read().get(name) {
            Some(derived) => (derived.base.clone(), derived.system.clone()),
            None => (name.to_string(), String::new()),
        }
    }

    /// Resolve a requested model all the way to a provider instance
    pub fn resolve_provider(&self, requested: &str) -> Result<(Arc<dyn Provider>, String)> {
        let (name, system) = self.resolve(requested);
        let provider = self
            .provider(&name)
            .ok_or_else(|| AppError::ModelNotFound(requested.to_string()))?;
        Ok((provider, system))
    }

    pub fn provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.index.get(name).map(|&i| self.providers[i].clone())
    }

    pub fn contains_provider(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Register or replace a derived model; the base must be a registered provider
    pub fn create_derived(&self, name: &str, base: &str, system: &str) -> Result<DerivedModel> {
        let name = strip_tag(name);
        let base = strip_tag(base);

        if name.is_empty() {
            return Err(AppError::InvalidRequest("model name is required".to_string()));
        }
        if !self.contains_provider(base) {
            return Err(AppError::UnknownBase(base.to_string()));
        }

        let derived = DerivedModel {
            name: name.to_string(),
            base: base.to_string(),
            system: system.to_string(),
        };
        self.derived.write().insert(name.to_string(), derived.clone());
        info!(model = %name, base = %base, "Derived model created");

        Ok(derived)
    }

    /// Remove a derived model; returns whether one existed
    pub fn delete_derived(&self, name: &str) -> bool {
        let removed = self.derived.write().remove(strip_tag(name)).is_some();
        if removed {
            info!(model = %strip_tag(name), "Derived model deleted");
        }
        removed
    }

    pub fn derived_models(&self) -> Vec<DerivedModel> {
        self.derived.read().values().cloned().collect()
    }

    pub fn providers(&self) -> &[Arc<dyn Provider>] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
