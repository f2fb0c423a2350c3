//! Reference-counted loader - the facade consumers talk to.

use std::cell::RefCell;

use larder_core::alloc::{HashMap, HashSet};
use larder_core::profiling::profile_function;
use tokio_util::sync::CancellationToken;

use crate::error::ResourceResult;
use crate::holder::HolderId;
use crate::kind::Payload;
use crate::path;
use crate::provider::ResourceProvider;
use crate::resource::Resource;

/// Path-prefix scoped facade over an ordered chain of providers.
///
/// Paths given to the loader are local to its prefix: a loader scoped under
/// `Audio` resolves `Bgm/Theme` to `Audio/Bgm/Theme`. Providers are tried in
/// order, so a chain of `[local, embedded]` lets on-disk overrides shadow
/// bundled defaults.
///
/// Whether a resource is *loaded* and whether it is *held* are tracked
/// separately. Holding never loads; releasing the last holder only unloads
/// when the caller asks for it.
///
/// # Example
///
/// ```ignore
/// let loader = ResourceLoader::new("Audio", vec![local, embedded]);
/// let cancel = CancellationToken::new();
/// let owner = HolderId::new();
///
/// let theme = loader.load_and_hold::<Vec<u8>>("Bgm/Theme", owner, &cancel).await?;
/// // ...
/// loader.release_all(owner, true);
/// ```
pub struct ResourceLoader {
    prefix: String,
    providers: Vec<ResourceProvider>,
    /// Full path -> holders.
    holders: RefCell<HashMap<String, HashSet<HolderId>>>,
}

impl ResourceLoader {
    /// Create a loader scoped under `prefix` over `providers`, highest
    /// priority first.
    pub fn new(prefix: impl AsRef<str>, providers: Vec<ResourceProvider>) -> Self {
        Self {
            prefix: path::normalize(prefix.as_ref()),
            providers,
            holders: RefCell::new(HashMap::new()),
        }
    }

    /// The path prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The provider chain, highest priority first.
    pub fn providers(&self) -> &[ResourceProvider] {
        &self.providers
    }

    /// Resolve a local path to a full provider path.
    pub fn to_full_path(&self, local: &str) -> String {
        path::join(&self.prefix, local)
    }

    /// Resolve a full provider path to a local path.
    ///
    /// Returns `None` when the path is outside this loader's prefix.
    pub fn to_local_path<'a>(&self, full: &'a str) -> Option<&'a str> {
        path::strip_prefix(&self.prefix, full)
    }

    /// Load the resource at `path` from the first provider that has it.
    ///
    /// A resource already loaded by any provider in the chain is returned
    /// without touching the backends. When no provider has it, the result is
    /// an invalid resource.
    ///
    /// Each provider is asked whether it has the path before loading it. On
    /// backends without a catalog that lists the parent folder (recursively)
    /// the first time, and fills the provider's location cache.
    pub async fn load<T: Payload>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> ResourceResult<Resource<T>> {
        profile_function!();
        let full = self.to_full_path(path);

        if let Some(resource) = self.get_loaded_full::<T>(&full) {
            return Ok(resource);
        }

        for provider in &self.providers {
            if !provider.supports(T::kind()) {
                continue;
            }
            if !provider.resource_exists::<T>(&full, cancel).await? {
                continue;
            }
            match provider.load_resource::<T>(&full, cancel).await {
                Ok(resource) => return Ok(resource),
                // Listed but gone by the time it was read.
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            }
        }

        tracing::debug!("'{}' not found in any provider", full);
        Ok(Resource::invalid(full))
    }

    /// Load the resource at `path` and record `holder` as holding it.
    pub async fn load_and_hold<T: Payload>(
        &self,
        path: &str,
        holder: HolderId,
        cancel: &CancellationToken,
    ) -> ResourceResult<Resource<T>> {
        let resource = self.load::<T>(path, cancel).await?;
        self.hold(path, holder);
        Ok(resource)
    }

    /// Load every resource of kind `T` below `folder`.
    ///
    /// When several providers hold the same path, the first one in the chain
    /// serves it.
    pub async fn load_all<T: Payload>(
        &self,
        folder: &str,
        cancel: &CancellationToken,
    ) -> ResourceResult<Vec<Resource<T>>> {
        profile_function!();
        let located = self.locate_in_chain::<T>(folder, cancel).await?;
        let loads = located
            .iter()
            .map(|(full, provider)| provider.load_resource::<T>(full, cancel));
        futures::future::try_join_all(loads).await
    }

    /// List local paths of resources of kind `T` below `folder`, sorted.
    pub async fn locate<T: Payload>(
        &self,
        folder: &str,
        cancel: &CancellationToken,
    ) -> ResourceResult<Vec<String>> {
        let located = self.locate_in_chain::<T>(folder, cancel).await?;
        Ok(located
            .into_iter()
            .filter_map(|(full, _)| self.to_local_path(&full).map(str::to_string))
            .collect())
    }

    /// Full paths below `folder` paired with the provider that serves each.
    async fn locate_in_chain<T: Payload>(
        &self,
        folder: &str,
        cancel: &CancellationToken,
    ) -> ResourceResult<Vec<(String, &ResourceProvider)>> {
        let full_folder = self.to_full_path(folder);
        let mut found: Vec<(String, &ResourceProvider)> = Vec::new();

        for provider in &self.providers {
            for full in provider.locate_resources::<T>(&full_folder, cancel).await? {
                if !found.iter().any(|(existing, _)| *existing == full) {
                    found.push((full, provider));
                }
            }
        }

        found.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(found)
    }

    /// List local paths of folders directly below `folder`, sorted.
    pub async fn locate_folders(
        &self,
        folder: &str,
        cancel: &CancellationToken,
    ) -> ResourceResult<Vec<String>> {
        let full_folder = self.to_full_path(folder);
        let mut folders = Vec::new();
        for provider in &self.providers {
            folders.extend(provider.locate_folders(&full_folder, cancel).await?);
        }
        folders.sort();
        folders.dedup();

        Ok(folders
            .iter()
            .filter_map(|full| self.to_local_path(full).map(str::to_string))
            .collect())
    }

    /// Check whether any provider in the chain has a `T` at `path`.
    pub async fn exists<T: Payload>(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> ResourceResult<bool> {
        let full = self.to_full_path(path);
        for provider in &self.providers {
            if provider.resource_exists::<T>(&full, cancel).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Record `holder` as holding `path`. Holding does not load.
    pub fn hold(&self, path: &str, holder: HolderId) {
        let full = self.to_full_path(path);
        self.holders
            .borrow_mut()
            .entry(full)
            .or_default()
            .insert(holder);
    }

    /// Remove `holder` from `path`.
    ///
    /// When that leaves the path without holders and `unload` is set, the
    /// resource is unloaded from every provider. Releasing a holder that
    /// does not hold the path does nothing.
    pub fn release(&self, path: &str, holder: HolderId, unload: bool) {
        let full = self.to_full_path(path);
        let emptied = {
            let mut holders = self.holders.borrow_mut();
            let Some(set) = holders.get_mut(&full) else {
                return;
            };
            if !set.remove(&holder) {
                return;
            }
            let emptied = set.is_empty();
            if emptied {
                holders.remove(&full);
            }
            emptied
        };

        if emptied && unload {
            self.unload_full(&full);
        }
    }

    /// Release `holder` from every path it holds.
    pub fn release_all(&self, holder: HolderId, unload: bool) {
        let emptied: Vec<String> = {
            let mut holders = self.holders.borrow_mut();
            let mut emptied = Vec::new();
            holders.retain(|full, set| {
                if set.remove(&holder) && set.is_empty() {
                    emptied.push(full.clone());
                    return false;
                }
                true
            });
            emptied
        };

        if unload {
            for full in &emptied {
                self.unload_full(full);
            }
        }
    }

    /// Check whether `holder` holds `path`.
    pub fn is_held_by(&self, path: &str, holder: HolderId) -> bool {
        let full = self.to_full_path(path);
        self.holders
            .borrow()
            .get(&full)
            .is_some_and(|set| set.contains(&holder))
    }

    /// Number of holders of `path`.
    pub fn count_holders(&self, path: &str) -> usize {
        let full = self.to_full_path(path);
        self.holders.borrow().get(&full).map_or(0, |set| set.len())
    }

    /// Check whether any provider has `path` loaded.
    pub fn is_loaded(&self, path: &str) -> bool {
        let full = self.to_full_path(path);
        self.providers.iter().any(|provider| provider.is_loaded(&full))
    }

    /// Get the loaded resource at `path`, if any provider has it as a `T`.
    pub fn get_loaded<T: Payload>(&self, path: &str) -> Option<Resource<T>> {
        self.get_loaded_full(&self.to_full_path(path))
    }

    fn get_loaded_full<T: Payload>(&self, full: &str) -> Option<Resource<T>> {
        self.providers
            .iter()
            .find_map(|provider| provider.get_loaded::<T>(full))
    }

    /// Local paths of every loaded resource under this loader's prefix.
    pub fn loaded_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .providers
            .iter()
            .flat_map(|provider| provider.loaded_paths())
            .filter_map(|full| self.to_local_path(&full).map(str::to_string))
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }

    /// Unload `path` regardless of its holders, and forget them.
    pub fn unload(&self, path: &str) {
        let full = self.to_full_path(path);
        self.holders.borrow_mut().remove(&full);
        self.unload_full(&full);
    }

    /// Unload everything under this loader's prefix, cancel loads in flight
    /// there and clear every holder.
    pub fn unload_all(&self) {
        self.holders.borrow_mut().clear();
        for provider in &self.providers {
            let mut paths = provider.loaded_paths();
            paths.extend(provider.loading_paths());
            paths.sort();
            paths.dedup();

            for full in paths {
                if self.to_local_path(&full).is_some() {
                    provider.unload_resource(&full);
                }
            }
        }
    }

    fn unload_full(&self, full: &str) {
        for provider in &self.providers {
            provider.unload_resource(full);
        }
    }
}

impl std::fmt::Debug for ResourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLoader")
            .field("prefix", &self.prefix)
            .field("providers", &self.providers)
            .field("held", &self.holders.borrow().len())
            .finish()
    }
}
