//! Resource provider - the orchestrator shared by every backend.
//!
//! The provider owns the resource cache, the location cache and the
//! in-flight runner tables. All bookkeeping is synchronous and happens
//! between suspension points, so the tables need no locking: the provider is
//! meant to be driven from one thread, the way a game loop drives it.

use std::cell::{Cell, RefCell};
use std::hash::Hash;
use std::rc::Rc;

use larder_core::alloc::HashMap;
use larder_core::profiling::profile_function;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::config::ProviderConfig;
use crate::error::{ResourceError, ResourceResult};
use crate::event::{EventBuffer, ProviderEvent};
use crate::kind::{ErasedPayload, Payload, ResourceKind};
use crate::path;
use crate::resource::{FolderRecord, LocationRecord, Resource};
use crate::runner::{RunFuture, Runner};

type LoadKey = (String, ResourceKind);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LocateKey {
    /// The one-time full enumeration of a backend.
    Catalog,
    /// A per-folder listing for backends without a catalog.
    Folder { path: String, kind: ResourceKind },
}

/// A full listing of a backend's contents.
struct Catalog {
    records: Vec<LocationRecord>,
    kinds_by_path: HashMap<String, Vec<ResourceKind>>,
}

impl Catalog {
    fn new(mut records: Vec<LocationRecord>) -> Self {
        records.sort();
        records.dedup();
        let mut kinds_by_path: HashMap<String, Vec<ResourceKind>> = HashMap::new();
        for record in &records {
            kinds_by_path
                .entry(record.path.clone())
                .or_default()
                .push(record.kind);
        }
        Self {
            records,
            kinds_by_path,
        }
    }

    fn contains(&self, path: &str, kind: ResourceKind, backend: &dyn Backend) -> bool {
        self.kinds_by_path
            .get(path)
            .is_some_and(|kinds| kinds.iter().any(|k| backend.compatible(*k, kind)))
    }
}

enum CatalogState {
    /// Not enumerated yet.
    Unknown,
    /// The backend cannot enumerate its contents.
    Unsupported,
    Ready(Rc<Catalog>),
}

struct ProviderState {
    resources: HashMap<String, ErasedPayload>,
    load_runners: HashMap<LoadKey, Runner<ErasedPayload>>,
    locate_runners: HashMap<LocateKey, Runner<Vec<LocationRecord>>>,
    folder_runners: HashMap<String, Runner<Vec<FolderRecord>>>,
    catalog: CatalogState,
    located: HashMap<LoadKey, Vec<LocationRecord>>,
    folders: HashMap<String, Vec<FolderRecord>>,
    events: EventBuffer,
    progress: f32,
}

impl ProviderState {
    fn new() -> Self {
        Self {
            resources: HashMap::new(),
            load_runners: HashMap::new(),
            locate_runners: HashMap::new(),
            folder_runners: HashMap::new(),
            catalog: CatalogState::Unknown,
            located: HashMap::new(),
            folders: HashMap::new(),
            events: EventBuffer::new(),
            progress: 1.0,
        }
    }

    fn operation_count(&self) -> usize {
        self.load_runners.len() + self.locate_runners.len() + self.folder_runners.len()
    }

    /// Recompute progress after a table mutation.
    fn update_progress(&mut self) {
        let total = self.operation_count();
        let progress = if total == 0 {
            1.0
        } else {
            (1.0 / total as f32).min(0.999)
        };

        if progress != self.progress {
            self.progress = progress;
            self.events.push(ProviderEvent::ProgressChanged { progress });
        }
    }

    fn is_shared(&self, payload: &ErasedPayload) -> bool {
        self.resources.values().any(|other| other.ptr_eq(payload))
    }
}

fn load_table(state: &mut ProviderState) -> &mut HashMap<LoadKey, Runner<ErasedPayload>> {
    &mut state.load_runners
}

fn locate_table(
    state: &mut ProviderState,
) -> &mut HashMap<LocateKey, Runner<Vec<LocationRecord>>> {
    &mut state.locate_runners
}

fn folder_table(state: &mut ProviderState) -> &mut HashMap<String, Runner<Vec<FolderRecord>>> {
    &mut state.folder_runners
}

/// Remove the runner registered under `key` if it is still the one with `id`.
fn retire<K, O>(runners: &mut HashMap<K, Runner<O>>, key: &K, id: u64) -> bool
where
    K: Eq + Hash,
    O: Clone + 'static,
{
    if runners.get(key).is_some_and(|runner| runner.id() == id) {
        runners.remove(key);
        true
    } else {
        false
    }
}

struct ProviderShared {
    backend: Box<dyn Backend>,
    config: ProviderConfig,
    state: RefCell<ProviderState>,
    next_runner_id: Cell<u64>,
}

impl ProviderShared {
    fn next_id(&self) -> u64 {
        let id = self.next_runner_id.get();
        self.next_runner_id.set(id + 1);
        id
    }

    /// Move a payload into the cache, evicting whatever the path held before.
    fn store(&self, state: &mut ProviderState, path: &str, payload: ErasedPayload) {
        if let Some(previous) = state.resources.insert(path.to_string(), payload.clone())
            && !previous.ptr_eq(&payload)
            && !state.is_shared(&previous)
        {
            self.backend.dispose(path, previous);
        }
    }

    fn settle_load(
        &self,
        id: u64,
        path: &str,
        kind: ResourceKind,
        result: ResourceResult<Option<ErasedPayload>>,
    ) -> ResourceResult<ErasedPayload> {
        let mut state = self.state.borrow_mut();
        retire(&mut state.load_runners, &(path.to_string(), kind), id);

        let outcome = match result {
            Ok(Some(payload)) => {
                self.store(&mut state, path, payload.clone());
                if self.config.log_loading {
                    tracing::info!("{}: loaded '{}' as {}", self.backend.name(), path, kind);
                } else {
                    tracing::debug!("{}: loaded '{}' as {}", self.backend.name(), path, kind);
                }
                state.events.push(ProviderEvent::Loaded {
                    path: path.to_string(),
                    kind,
                });
                Ok(payload)
            }
            Ok(None) => {
                tracing::debug!("{}: '{}' not found as {}", self.backend.name(), path, kind);
                Err(ResourceError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(err) => {
                if !err.is_canceled() {
                    tracing::warn!("{}: failed to load '{}': {}", self.backend.name(), path, err);
                    state.events.push(ProviderEvent::LoadFailed {
                        path: path.to_string(),
                        error: err.to_string(),
                    });
                }
                Err(err)
            }
        };

        state.update_progress();
        outcome
    }

    fn settle_locate(
        &self,
        id: u64,
        key: LocateKey,
        result: ResourceResult<Vec<LocationRecord>>,
    ) -> ResourceResult<Vec<LocationRecord>> {
        let mut state = self.state.borrow_mut();
        retire(&mut state.locate_runners, &key, id);

        if let Ok(records) = &result {
            match key {
                LocateKey::Catalog => {
                    tracing::debug!(
                        "{}: catalogued {} resources",
                        self.backend.name(),
                        records.len()
                    );
                    state.catalog = CatalogState::Ready(Rc::new(Catalog::new(records.clone())));
                }
                LocateKey::Folder { path, kind } => {
                    state.located.insert((path, kind), records.clone());
                }
            }
        }

        state.update_progress();
        result
    }

    fn settle_folders(
        &self,
        id: u64,
        folder: &str,
        result: ResourceResult<Vec<FolderRecord>>,
    ) -> ResourceResult<Vec<FolderRecord>> {
        let mut state = self.state.borrow_mut();
        retire(&mut state.folder_runners, &folder.to_string(), id);

        if let Ok(records) = &result {
            state.folders.insert(folder.to_string(), records.clone());
        }

        state.update_progress();
        result
    }
}

/// Build the callback a runner invokes when its last awaiter gives up.
fn abandon<K, O>(
    shared: &Rc<ProviderShared>,
    key: K,
    id: u64,
    table: fn(&mut ProviderState) -> &mut HashMap<K, Runner<O>>,
) -> impl FnOnce() + 'static
where
    K: Eq + Hash + 'static,
    O: Clone + 'static,
{
    let weak = Rc::downgrade(shared);
    move || {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let mut state = shared.state.borrow_mut();
        if retire(table(&mut *state), &key, id) {
            tracing::debug!("{}: runner #{} abandoned", shared.backend.name(), id);
        }
        state.update_progress();
    }
}

enum Lookup<T, O: Clone + 'static> {
    Ready(T),
    Pending(Runner<O>),
}

/// Orchestrates loading and locating resources from one backend.
///
/// - Concurrent requests for the same (path, kind) share one runner and
///   observe the same payload.
/// - Loaded payloads are cached by path until explicitly unloaded; asking
///   for a cached path as an incompatible kind evicts and reloads it.
/// - Location listings are cached for the lifetime of the provider.
///
/// The handle is cheap to clone; clones share one cache.
///
/// # Example
///
/// ```ignore
/// let provider = ResourceProvider::new(LocalBackend::new("assets", DecoderRegistry::with_defaults()));
/// let cancel = CancellationToken::new();
///
/// let intro: Resource<String> = provider.load_resource("Scripts/Intro", &cancel).await?;
/// let scripts = provider.locate_resources::<String>("Scripts", &cancel).await?;
///
/// provider.unload_resource("Scripts/Intro");
/// ```
#[derive(Clone)]
pub struct ResourceProvider {
    shared: Rc<ProviderShared>,
}

impl ResourceProvider {
    /// Create a provider over `backend` with default settings.
    pub fn new(backend: impl Backend) -> Self {
        Self::with_config(backend, ProviderConfig::default())
    }

    /// Create a provider over `backend`.
    pub fn with_config(backend: impl Backend, config: ProviderConfig) -> Self {
        Self {
            shared: Rc::new(ProviderShared {
                backend: Box::new(backend),
                config,
                state: RefCell::new(ProviderState::new()),
                next_runner_id: Cell::new(1),
            }),
        }
    }

    /// Name of the backend.
    pub fn name(&self) -> &str {
        self.shared.backend.name()
    }

    /// Check whether the backend can produce payloads of `kind`.
    pub fn supports(&self, kind: ResourceKind) -> bool {
        self.shared.backend.supports(kind)
    }

    /// Check whether two handles refer to the same provider.
    pub fn ptr_eq(&self, other: &ResourceProvider) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }

    /// Load the resource at `path` as a `T`.
    ///
    /// Returns the cached resource when one of a compatible kind exists, joins
    /// an in-flight load of the same (path, kind), or starts a new one.
    /// Returns an invalid resource right away when the backend does not
    /// support `T`; fails with [`ResourceError::NotFound`] when the backend
    /// could not find the asset.
    pub async fn load_resource<T: Payload>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> ResourceResult<Resource<T>> {
        profile_function!();
        let path = path::normalize(path);
        let kind = T::kind();

        if !self.supports(kind) {
            tracing::debug!("{}: {} is not supported", self.name(), kind);
            return Ok(Resource::invalid(path));
        }

        let runner = match self.cached_or_load_runner::<T>(&path, kind)? {
            Lookup::Ready(resource) => return Ok(resource),
            Lookup::Pending(runner) => runner,
        };

        let key = (path.clone(), kind);
        let on_abandon = abandon(&self.shared, key, runner.id(), load_table);
        let payload = runner.wait(cancel, on_abandon).await?;
        Resource::from_erased(&path, &payload)
    }

    fn cached_or_load_runner<T: Payload>(
        &self,
        path: &str,
        kind: ResourceKind,
    ) -> ResourceResult<Lookup<Resource<T>, ErasedPayload>> {
        let shared = &self.shared;
        let mut guard = shared.state.borrow_mut();
        let state = &mut *guard;
        let key = (path.to_string(), kind);

        if let Some(runner) = state.load_runners.get(&key) {
            return Ok(Lookup::Pending(runner.clone()));
        }

        if let Some(cached) = state.resources.get(path) {
            if shared.backend.compatible(cached.kind(), kind) && cached.is::<T>() {
                return Resource::from_erased(path, cached).map(Lookup::Ready);
            }

            let cached_kind = cached.kind();
            tracing::info!(
                "{}: '{}' is cached as {} but was requested as {}; reloading",
                shared.backend.name(),
                path,
                cached_kind,
                kind
            );
            if let Some(evicted) = state.resources.remove(path) {
                state.events.push(ProviderEvent::Evicted {
                    path: path.to_string(),
                    cached: cached_kind,
                    requested: kind,
                });
                if !state.is_shared(&evicted) {
                    shared.backend.dispose(path, evicted);
                }
            }
        }

        let id = shared.next_id();
        let weak = Rc::downgrade(shared);
        let settle_path = path.to_string();
        let runner = Runner::start(id, path, shared.backend.load(path, kind), move |result| {
            match weak.upgrade() {
                Some(shared) => shared.settle_load(id, &settle_path, kind, result),
                None => result.and_then(|payload| {
                    payload.ok_or(ResourceError::NotFound { path: settle_path })
                }),
            }
        });
        tracing::debug!("{}: runner #{} loads '{}' as {}", shared.backend.name(), id, path, kind);

        state.load_runners.insert(key, runner.clone());
        state.update_progress();
        Ok(Lookup::Pending(runner))
    }

    /// Load every resource of kind `T` below `folder`.
    ///
    /// The loads run concurrently; the first failure fails the whole call.
    pub async fn load_resources<T: Payload>(
        &self,
        folder: &str,
        cancel: &CancellationToken,
    ) -> ResourceResult<Vec<Resource<T>>> {
        let paths = self.locate_resources::<T>(folder, cancel).await?;
        let loads = paths.iter().map(|path| self.load_resource::<T>(path, cancel));
        futures::future::try_join_all(loads).await
    }

    /// Remove a resource from the cache.
    ///
    /// In-flight loads of the path are canceled. The payload is handed back
    /// to the backend for disposal unless another cached path shares it.
    pub fn unload_resource(&self, path: &str) {
        let path = path::normalize(path);
        let (canceled, disposable) = {
            let mut state = self.shared.state.borrow_mut();

            let keys: Vec<LoadKey> = state
                .load_runners
                .keys()
                .filter(|(p, _)| *p == path)
                .cloned()
                .collect();
            let canceled: Vec<_> = keys
                .iter()
                .filter_map(|key| state.load_runners.remove(key))
                .collect();

            let removed = state.resources.remove(&path);
            if removed.is_some() {
                state.events.push(ProviderEvent::Unloaded { path: path.clone() });
            }
            let disposable = removed.filter(|payload| !state.is_shared(payload));

            state.update_progress();
            (canceled, disposable)
        };

        for runner in canceled {
            runner.cancel();
        }
        if let Some(payload) = disposable {
            tracing::debug!("{}: unloaded '{}'", self.name(), path);
            self.shared.backend.dispose(&path, payload);
        }
    }

    /// Unload every cached resource and cancel every in-flight load.
    pub fn unload_all(&self) {
        let mut paths = self.loaded_paths();
        paths.extend(self.loading_paths());
        paths.sort();
        paths.dedup();

        for path in paths {
            self.unload_resource(&path);
        }
    }

    /// List the paths of resources of kind `T` below `folder`, sorted.
    pub async fn locate_resources<T: Payload>(
        &self,
        folder: &str,
        cancel: &CancellationToken,
    ) -> ResourceResult<Vec<String>> {
        profile_function!();
        let folder = path::normalize(folder);
        let kind = T::kind();
        if !self.supports(kind) {
            return Ok(Vec::new());
        }

        let records = self.locations(&folder, kind, cancel).await?;
        Ok(records.into_iter().map(|record| record.path).collect())
    }

    /// List the folders directly below `folder`, sorted.
    pub async fn locate_folders(
        &self,
        folder: &str,
        cancel: &CancellationToken,
    ) -> ResourceResult<Vec<String>> {
        profile_function!();
        let folder = path::normalize(folder);

        if let Some(catalog) = self.ensure_catalog(cancel).await? {
            let mut folders: Vec<String> = catalog
                .records
                .iter()
                .filter_map(|record| path::child_folder(&folder, &record.path))
                .collect();
            folders.sort();
            folders.dedup();
            return Ok(folders);
        }

        let runner = {
            let shared = &self.shared;
            let mut state = shared.state.borrow_mut();

            if let Some(records) = state.folders.get(&folder) {
                return Ok(records.iter().map(|r| r.path.clone()).collect());
            }

            match state.folder_runners.get(&folder) {
                Some(runner) => runner.clone(),
                None => {
                    let id = shared.next_id();
                    let weak = Rc::downgrade(shared);
                    let settle_folder = folder.clone();
                    let runner = Runner::start(
                        id,
                        folder.as_str(),
                        shared.backend.locate_folders(&folder),
                        move |result| match weak.upgrade() {
                            Some(shared) => shared.settle_folders(id, &settle_folder, result),
                            None => result,
                        },
                    );
                    state.folder_runners.insert(folder.clone(), runner.clone());
                    state.update_progress();
                    runner
                }
            }
        };

        let on_abandon = abandon(&self.shared, folder.clone(), runner.id(), folder_table);
        let mut folders: Vec<String> = runner
            .wait(cancel, on_abandon)
            .await?
            .into_iter()
            .map(|record| record.path)
            .collect();
        folders.sort();
        folders.dedup();
        Ok(folders)
    }

    /// Check whether a resource of kind `T` exists at `path`, without loading it.
    pub async fn resource_exists<T: Payload>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> ResourceResult<bool> {
        profile_function!();
        let path = path::normalize(path);
        let kind = T::kind();
        if !self.supports(kind) {
            return Ok(false);
        }
        if self.get_loaded::<T>(&path).is_some() {
            return Ok(true);
        }

        if let Some(catalog) = self.ensure_catalog(cancel).await? {
            return Ok(catalog.contains(&path, kind, self.shared.backend.as_ref()));
        }

        let records = self.locations(path::parent(&path), kind, cancel).await?;
        Ok(records.iter().any(|record| record.path == path))
    }

    /// Resolve the location records of `kind` below `folder`, running the
    /// catalog or a folder listing when nothing cached covers it.
    async fn locations(
        &self,
        folder: &str,
        kind: ResourceKind,
        cancel: &CancellationToken,
    ) -> ResourceResult<Vec<LocationRecord>> {
        let backend = self.shared.backend.as_ref();
        let matches = |record: &LocationRecord| {
            record.is_in_folder(folder) && backend.compatible(record.kind, kind)
        };

        if let Some(catalog) = self.ensure_catalog(cancel).await? {
            return Ok(catalog.records.iter().filter(|r| matches(r)).cloned().collect());
        }

        let runner = {
            let shared = &self.shared;
            let mut state = shared.state.borrow_mut();

            // A listing of this folder or any ancestor covers the query.
            let covering = state.located.iter().find(|((listed, listed_kind), _)| {
                *listed_kind == kind && (listed == folder || path::is_under(listed, folder))
            });
            if let Some((_, records)) = covering {
                let mut found: Vec<LocationRecord> =
                    records.iter().filter(|r| matches(r)).cloned().collect();
                found.sort();
                return Ok(found);
            }

            let key = LocateKey::Folder {
                path: folder.to_string(),
                kind,
            };
            match state.locate_runners.get(&key) {
                Some(runner) => runner.clone(),
                None => {
                    let id = shared.next_id();
                    let weak = Rc::downgrade(shared);
                    let settle_key = key.clone();
                    let runner = Runner::start(
                        id,
                        folder,
                        backend.locate_resources(folder, kind),
                        move |result| match weak.upgrade() {
                            Some(shared) => shared.settle_locate(id, settle_key, result),
                            None => result,
                        },
                    );
                    state.locate_runners.insert(key, runner.clone());
                    state.update_progress();
                    runner
                }
            }
        };

        let key = LocateKey::Folder {
            path: folder.to_string(),
            kind,
        };
        let on_abandon = abandon(&self.shared, key, runner.id(), locate_table);
        let mut found: Vec<LocationRecord> = runner
            .wait(cancel, on_abandon)
            .await?
            .into_iter()
            .filter(|r| matches(r))
            .collect();
        found.sort();
        found.dedup();
        Ok(found)
    }

    /// Enumerate the backend once if it supports it.
    ///
    /// Returns `None` for backends without a catalog.
    async fn ensure_catalog(&self, cancel: &CancellationToken) -> ResourceResult<Option<Rc<Catalog>>> {
        let runner = {
            let shared = &self.shared;
            let mut state = shared.state.borrow_mut();
            match &state.catalog {
                CatalogState::Ready(catalog) => return Ok(Some(Rc::clone(catalog))),
                CatalogState::Unsupported => return Ok(None),
                CatalogState::Unknown => {}
            }

            match state.locate_runners.get(&LocateKey::Catalog) {
                Some(runner) => runner.clone(),
                None => {
                    let Some(work) = shared.backend.catalog() else {
                        state.catalog = CatalogState::Unsupported;
                        return Ok(None);
                    };
                    self.start_catalog(&mut *state, work)
                }
            }
        };

        let on_abandon = abandon(&self.shared, LocateKey::Catalog, runner.id(), locate_table);
        let records = runner.wait(cancel, on_abandon).await?;

        let state = self.shared.state.borrow();
        match &state.catalog {
            CatalogState::Ready(catalog) => Ok(Some(Rc::clone(catalog))),
            _ => Ok(Some(Rc::new(Catalog::new(records)))),
        }
    }

    fn start_catalog(
        &self,
        state: &mut ProviderState,
        work: RunFuture<Vec<LocationRecord>>,
    ) -> Runner<Vec<LocationRecord>> {
        let shared = &self.shared;
        let id = shared.next_id();
        let weak = Rc::downgrade(shared);
        let runner = Runner::start(id, "", work, move |result| match weak.upgrade() {
            Some(shared) => shared.settle_locate(id, LocateKey::Catalog, result),
            None => result,
        });
        tracing::debug!("{}: runner #{} builds the catalog", shared.backend.name(), id);

        state.locate_runners.insert(LocateKey::Catalog, runner.clone());
        state.update_progress();
        runner
    }

    /// Check whether a resource is cached at `path`, as any kind.
    pub fn is_loaded(&self, path: &str) -> bool {
        let path = path::normalize(path);
        self.shared.state.borrow().resources.contains_key(&path)
    }

    /// Check whether a load of `path` is in flight, as any kind.
    pub fn is_loading(&self, path: &str) -> bool {
        let path = path::normalize(path);
        self.shared
            .state
            .borrow()
            .load_runners
            .keys()
            .any(|(p, _)| *p == path)
    }

    /// Paths with a load in flight, as any kind, sorted.
    pub fn loading_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .shared
            .state
            .borrow()
            .load_runners
            .keys()
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Get the cached resource at `path` if it is compatible with `T`.
    pub fn get_loaded<T: Payload>(&self, path: &str) -> Option<Resource<T>> {
        let path = path::normalize(path);
        let state = self.shared.state.borrow();
        let cached = state.resources.get(&path)?;
        if !self.shared.backend.compatible(cached.kind(), T::kind()) {
            return None;
        }
        Resource::from_erased(&path, cached).ok()
    }

    /// Paths of every cached resource, sorted.
    pub fn loaded_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.shared.state.borrow().resources.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Aggregate progress of in-flight operations, `1.0` when idle.
    pub fn load_progress(&self) -> f32 {
        self.shared.state.borrow().progress
    }

    /// Number of in-flight runners across all tables.
    pub fn pending_operations(&self) -> usize {
        self.shared.state.borrow().operation_count()
    }

    /// Drain the events raised since the last call.
    pub fn drain_events(&self) -> Vec<ProviderEvent> {
        self.shared.state.borrow_mut().events.drain().collect()
    }
}

impl std::fmt::Debug for ResourceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("ResourceProvider")
            .field("backend", &self.shared.backend.name())
            .field("loaded", &state.resources.len())
            .field("pending", &state.operation_count())
            .finish()
    }
}
