//! Provider and loader configuration.

use crate::path;

/// Settings for a [`ResourceProvider`](crate::ResourceProvider).
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// Log every completed load at `info` level.
    pub log_loading: bool,
}

impl ProviderConfig {
    /// Create default provider settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether completed loads are logged.
    pub fn log_loading(mut self, log: bool) -> Self {
        self.log_loading = log;
        self
    }
}

/// Settings for a [`ResourceLoader`](crate::ResourceLoader).
///
/// # Example
///
/// ```
/// use larder_resources::LoaderConfig;
///
/// let config = LoaderConfig::new("Characters")
///     .with_provider("local")
///     .with_provider("embedded");
/// assert_eq!(config.path_prefix, "Characters");
/// assert_eq!(config.providers, ["local", "embedded"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Prefix prepended to every path the loader is asked for.
    pub path_prefix: String,
    /// Provider names, highest priority first.
    pub providers: Vec<String>,
}

impl LoaderConfig {
    /// Create a loader configuration scoped under `path_prefix`.
    pub fn new(path_prefix: impl AsRef<str>) -> Self {
        Self {
            path_prefix: path::normalize(path_prefix.as_ref()),
            providers: Vec::new(),
        }
    }

    /// Append a provider to the fallback chain.
    pub fn with_provider(mut self, name: impl Into<String>) -> Self {
        self.providers.push(name.into());
        self
    }
}
