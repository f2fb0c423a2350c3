//! Embedded backend: payloads bundled with the application.

use futures::FutureExt;
use larder_core::alloc::{HashMap, HashSet};

use crate::backend::Backend;
use crate::convert::KindConversions;
use crate::error::ResourceResult;
use crate::kind::{ErasedPayload, Payload, ResourceKind};
use crate::path;
use crate::resource::{FolderRecord, LocationRecord};
use crate::runner::RunFuture;

struct EmbeddedInner {
    name: String,
    entries: HashMap<(String, ResourceKind), ErasedPayload>,
    conversions: KindConversions,
}

impl EmbeddedInner {
    fn lookup(&self, path: &str, kind: ResourceKind) -> ResourceResult<Option<ErasedPayload>> {
        if let Some(payload) = self.entries.get(&(path.to_string(), kind)) {
            return Ok(Some(payload.clone()));
        }

        let Some(source) = self.conversions.source_of(kind) else {
            return Ok(None);
        };
        match self.entries.get(&(path.to_string(), source)) {
            Some(stored) => self.conversions.convert(kind, path, stored).map(Some),
            None => Ok(None),
        }
    }

    /// Every (path, kind) the backend can serve, conversions included.
    fn records(&self) -> Vec<LocationRecord> {
        let mut records = Vec::with_capacity(self.entries.len());
        for (path, kind) in self.entries.keys() {
            records.push(LocationRecord::new(path.clone(), *kind));
            for target in self.conversions.targets_of(*kind) {
                records.push(LocationRecord::new(path.clone(), target));
            }
        }
        records.sort();
        records.dedup();
        records
    }
}

/// Serves payloads registered in memory at construction.
///
/// The whole table is known up front, so the backend exposes a catalog and
/// the provider never lists it folder by folder. Lookups resolve
/// immediately. Payloads are shared with the table and are never disposed.
///
/// # Example
///
/// ```
/// use larder_resources::EmbeddedBackend;
///
/// let backend = EmbeddedBackend::new()
///     .with("Scripts/Intro", "Hello!".to_string())
///     .with("Audio/Click", vec![0u8, 1, 2]);
/// assert_eq!(backend.len(), 2);
/// ```
pub struct EmbeddedBackend {
    inner: EmbeddedInner,
}

impl EmbeddedBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            inner: EmbeddedInner {
                name: "embedded".to_string(),
                entries: HashMap::new(),
                conversions: KindConversions::new(),
            },
        }
    }

    /// Add a payload under `path` and return the backend.
    pub fn with<T: Payload>(mut self, path: &str, object: T) -> Self {
        self.insert(path, object);
        self
    }

    /// Add a payload under `path`, replacing one of the same kind.
    pub fn insert<T: Payload>(&mut self, path: &str, object: T) {
        self.insert_erased(path, ErasedPayload::new(object));
    }

    /// Add a type-erased payload under `path`.
    pub fn insert_erased(&mut self, path: &str, payload: ErasedPayload) {
        let key = (path::normalize(path), payload.kind());
        self.inner.entries.insert(key, payload);
    }

    /// Serve kinds not stored directly through `conversions`.
    pub fn with_conversions(mut self, conversions: KindConversions) -> Self {
        self.inner.conversions = conversions;
        self
    }

    /// Number of stored payloads.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Check whether the backend stores nothing.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

impl Default for EmbeddedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for EmbeddedBackend {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn supports(&self, kind: ResourceKind) -> bool {
        let inner = &self.inner;
        let stored = |k: ResourceKind| inner.entries.keys().any(|(_, stored)| *stored == k);
        stored(kind) || inner.conversions.source_of(kind).is_some_and(stored)
    }

    fn load(&self, path: &str, kind: ResourceKind) -> RunFuture<Option<ErasedPayload>> {
        let result = self.inner.lookup(path, kind);
        async move { result }.boxed_local()
    }

    fn locate_resources(&self, folder: &str, kind: ResourceKind) -> RunFuture<Vec<LocationRecord>> {
        let records: Vec<_> = self
            .inner
            .records()
            .into_iter()
            .filter(|r| r.kind == kind && r.is_in_folder(folder))
            .collect();
        async move { Ok(records) }.boxed_local()
    }

    fn locate_folders(&self, folder: &str) -> RunFuture<Vec<FolderRecord>> {
        let folders: HashSet<String> = self
            .inner
            .entries
            .keys()
            .filter_map(|(path, _)| path::child_folder(folder, path))
            .collect();
        let mut folders: Vec<_> = folders.into_iter().map(FolderRecord::new).collect();
        folders.sort();
        async move { Ok(folders) }.boxed_local()
    }

    fn catalog(&self) -> Option<RunFuture<Vec<LocationRecord>>> {
        let records = self.inner.records();
        Some(async move { Ok(records) }.boxed_local())
    }

    fn dispose(&self, path: &str, _payload: ErasedPayload) {
        tracing::trace!("{}: '{}' is bundled; not disposing", self.inner.name, path);
    }
}
