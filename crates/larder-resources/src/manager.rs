//! Named provider registry.

use crate::config::LoaderConfig;
use crate::error::{ResourceError, ResourceResult};
use crate::loader::ResourceLoader;
use crate::provider::ResourceProvider;

/// Registry of named providers that loaders are built from.
///
/// Owned by the application and passed where needed; several loaders built
/// from one manager share the providers, and so share their caches.
#[derive(Debug, Default)]
pub struct ProviderManager {
    providers: Vec<(String, ResourceProvider)>,
}

impl ProviderManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`, replacing any provider of that name.
    pub fn register(&mut self, name: impl Into<String>, provider: ResourceProvider) {
        let name = name.into();
        match self.providers.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => {
                tracing::debug!("Replacing provider '{}'", name);
                slot.1 = provider;
            }
            None => {
                tracing::debug!("Registered provider '{}' ({})", name, provider.name());
                self.providers.push((name, provider));
            }
        }
    }

    /// Register `provider` under `name` and return the manager.
    pub fn with(mut self, name: impl Into<String>, provider: ResourceProvider) -> Self {
        self.register(name, provider);
        self
    }

    /// Get a provider by name.
    pub fn get(&self, name: &str) -> Option<&ResourceProvider> {
        self.providers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, provider)| provider)
    }

    /// Names of the registered providers, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|(name, _)| name.as_str())
    }

    /// Build a loader from `config`.
    ///
    /// Fails with [`ResourceError::UnknownProvider`] when the configuration
    /// names a provider that is not registered.
    pub fn loader(&self, config: &LoaderConfig) -> ResourceResult<ResourceLoader> {
        let providers = config
            .providers
            .iter()
            .map(|name| {
                self.get(name)
                    .cloned()
                    .ok_or_else(|| ResourceError::UnknownProvider { name: name.clone() })
            })
            .collect::<ResourceResult<Vec<_>>>()?;

        Ok(ResourceLoader::new(&config.path_prefix, providers))
    }

    /// Unload everything from every registered provider.
    pub fn unload_all(&self) {
        for (_, provider) in &self.providers {
            provider.unload_all();
        }
    }
}
