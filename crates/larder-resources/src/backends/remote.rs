//! Remote asset-delivery backend.

use std::rc::Rc;

use futures::FutureExt;
use larder_core::alloc::HashSet;

use crate::backend::Backend;
use crate::kind::{ErasedPayload, ResourceKind};
use crate::path;
use crate::resource::{FolderRecord, LocationRecord};
use crate::runner::RunFuture;

/// An entry in a remote service's content listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    /// The service-side key, e.g. `Game/Sprites/Hero/Idle`.
    pub key: String,
    /// The payload kind stored under the key.
    pub kind: ResourceKind,
    /// Labels attached to the entry.
    pub labels: Vec<String>,
}

impl RemoteLocation {
    /// Create a location without labels.
    pub fn new(key: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            key: key.into(),
            kind,
            labels: Vec::new(),
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }
}

/// A remote service that hands out assets by key and expects them back.
///
/// Missing keys resolve to `Ok(None)`; transport or service faults resolve
/// to `Err`.
pub trait AssetService: 'static {
    /// List everything the service offers.
    fn locations(&self) -> RunFuture<Vec<RemoteLocation>>;

    /// Fetch the asset stored under `key`.
    fn load(&self, key: &str, kind: ResourceKind) -> RunFuture<Option<ErasedPayload>>;

    /// Hand a fetched asset back to the service.
    fn release(&self, key: &str, payload: ErasedPayload);
}

struct RemoteInner {
    name: String,
    service: Rc<dyn AssetService>,
    label: Option<String>,
    key_prefix: String,
    kinds: Option<Vec<ResourceKind>>,
}

impl RemoteInner {
    fn key_for(&self, path: &str) -> String {
        path::join(&self.key_prefix, path)
    }

    fn supports(&self, kind: ResourceKind) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }

    /// Translate a service listing into location records: drop entries
    /// missing the label, outside the prefix or of unsupported kinds.
    fn records(&self, locations: Vec<RemoteLocation>) -> Vec<LocationRecord> {
        let mut records: Vec<_> = locations
            .into_iter()
            .filter(|loc| {
                self.label
                    .as_ref()
                    .is_none_or(|label| loc.labels.iter().any(|l| l == label))
            })
            .filter(|loc| self.supports(loc.kind))
            .filter_map(|loc| {
                let key = path::normalize(&loc.key);
                path::strip_prefix(&self.key_prefix, &key)
                    .filter(|p| !p.is_empty())
                    .map(|p| LocationRecord::new(p, loc.kind))
            })
            .collect();
        records.sort();
        records.dedup();
        records
    }
}

/// Settings for a [`RemoteBackend`].
///
/// # Example
///
/// ```
/// use larder_resources::{Payload, RemoteConfig};
///
/// let config = RemoteConfig::new()
///     .label("chapter-1")
///     .key_prefix("Game")
///     .kinds(&[String::kind()]);
/// assert_eq!(config.key_prefix, "Game");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RemoteConfig {
    /// Only serve entries carrying this label.
    pub label: Option<String>,
    /// Only serve keys below this prefix; it is stripped from resource paths.
    pub key_prefix: String,
    /// Kinds reported as supported; `None` attempts every kind.
    pub kinds: Option<Vec<ResourceKind>>,
}

impl RemoteConfig {
    /// Create default settings: no label filter, no prefix, every kind.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the label filter.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the key prefix.
    pub fn key_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.key_prefix = path::normalize(prefix.as_ref());
        self
    }

    /// Restrict the supported kinds.
    pub fn kinds(mut self, kinds: &[ResourceKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }
}

/// Serves assets from an [`AssetService`].
///
/// The service listing is fetched once as the backend's catalog. Keys are
/// mapped to resource paths by stripping the configured key prefix. Disposal
/// releases the asset back to the service.
pub struct RemoteBackend {
    inner: Rc<RemoteInner>,
}

impl RemoteBackend {
    /// Create a backend over `service` with default settings.
    pub fn new(service: impl AssetService) -> Self {
        Self::with_config(service, RemoteConfig::default())
    }

    /// Create a backend over `service`.
    pub fn with_config(service: impl AssetService, config: RemoteConfig) -> Self {
        Self {
            inner: Rc::new(RemoteInner {
                name: "remote".to_string(),
                service: Rc::new(service),
                label: config.label,
                key_prefix: path::normalize(&config.key_prefix),
                kinds: config.kinds,
            }),
        }
    }
}

impl Backend for RemoteBackend {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn supports(&self, kind: ResourceKind) -> bool {
        self.inner.supports(kind)
    }

    fn load(&self, path: &str, kind: ResourceKind) -> RunFuture<Option<ErasedPayload>> {
        self.inner.service.load(&self.inner.key_for(path), kind)
    }

    fn locate_resources(&self, folder: &str, kind: ResourceKind) -> RunFuture<Vec<LocationRecord>> {
        let inner = Rc::clone(&self.inner);
        let folder = folder.to_string();
        async move {
            let locations = inner.service.locations().await?;
            Ok(inner
                .records(locations)
                .into_iter()
                .filter(|r| r.kind == kind && r.is_in_folder(&folder))
                .collect())
        }
        .boxed_local()
    }

    fn locate_folders(&self, folder: &str) -> RunFuture<Vec<FolderRecord>> {
        let inner = Rc::clone(&self.inner);
        let folder = folder.to_string();
        async move {
            let locations = inner.service.locations().await?;
            let folders: HashSet<String> = inner
                .records(locations)
                .iter()
                .filter_map(|r| path::child_folder(&folder, &r.path))
                .collect();
            let mut folders: Vec<_> = folders.into_iter().map(FolderRecord::new).collect();
            folders.sort();
            Ok(folders)
        }
        .boxed_local()
    }

    fn catalog(&self) -> Option<RunFuture<Vec<LocationRecord>>> {
        let inner = Rc::clone(&self.inner);
        Some(
            async move {
                let locations = inner.service.locations().await?;
                Ok(inner.records(locations))
            }
            .boxed_local(),
        )
    }

    fn dispose(&self, path: &str, payload: ErasedPayload) {
        let key = self.inner.key_for(path);
        tracing::debug!("{}: releasing '{}'", self.inner.name, key);
        self.inner.service.release(&key, payload);
    }
}
