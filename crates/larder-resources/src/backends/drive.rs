//! Cloud-drive backend with an optional on-disk byte cache.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use futures::FutureExt;

use crate::backend::Backend;
use crate::decoder::DecoderRegistry;
use crate::error::{ResourceError, ResourceResult};
use crate::kind::{ErasedPayload, ResourceKind};
use crate::path;
use crate::resource::{FolderRecord, LocationRecord};
use crate::runner::RunFuture;

/// An entry returned by a drive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveEntry {
    /// The entry name; files carry their extension (`Intro.txt`).
    pub name: String,
    /// Whether the entry is a folder.
    pub is_folder: bool,
}

impl DriveEntry {
    /// A file entry.
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_folder: false,
        }
    }

    /// A folder entry.
    pub fn folder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_folder: true,
        }
    }

    /// Split a file name into (stem, extension).
    fn stem_and_extension(&self) -> Option<(&str, &str)> {
        if self.is_folder {
            return None;
        }
        self.name.rsplit_once('.').filter(|(stem, _)| !stem.is_empty())
    }
}

/// Client for a cloud-drive API.
///
/// Paths are `/`-separated and relative to the drive root. A missing folder
/// lists as empty and a missing file downloads as `Ok(None)`.
pub trait DriveClient: 'static {
    /// List the entries directly inside `folder`.
    fn list(&self, folder: &str) -> RunFuture<Vec<DriveEntry>>;

    /// Download the file at `path` (extension included).
    fn download(&self, path: &str) -> RunFuture<Option<Vec<u8>>>;
}

/// When the on-disk cache is trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachingPolicy {
    /// Reuse cached bytes when present; download otherwise.
    #[default]
    Smart,
    /// Delete the cache when the backend is created, then behave as `Smart`.
    PurgeAllOnInit,
}

/// Settings for a [`DriveBackend`].
#[derive(Debug, Clone, Default)]
pub struct DriveConfig {
    /// Drive folder that resource paths are relative to.
    pub root_path: String,
    /// Directory for downloaded bytes; `None` disables caching.
    pub cache_dir: Option<PathBuf>,
    /// Cache policy.
    pub policy: CachingPolicy,
}

impl DriveConfig {
    /// Create settings rooted at `root_path`, without a cache.
    pub fn new(root_path: impl AsRef<str>) -> Self {
        Self {
            root_path: path::normalize(root_path.as_ref()),
            ..Default::default()
        }
    }

    /// Cache downloaded bytes under `dir`.
    pub fn cache_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cache_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set the cache policy.
    pub fn policy(mut self, policy: CachingPolicy) -> Self {
        self.policy = policy;
        self
    }
}

struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    fn open(dir: PathBuf, policy: CachingPolicy) -> ResourceResult<Self> {
        if policy == CachingPolicy::PurgeAllOnInit {
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => tracing::info!("Purged drive cache at {}", dir.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(ResourceError::io(dir, e)),
            }
        }
        std::fs::create_dir_all(&dir).map_err(|e| ResourceError::io(&dir, e))?;
        Ok(Self { dir })
    }

    fn file(&self, drive_path: &str) -> PathBuf {
        let mut file = self.dir.clone();
        file.extend(drive_path.split('/').filter(|s| !s.is_empty()));
        file
    }

    fn read(&self, drive_path: &str) -> ResourceResult<Option<Vec<u8>>> {
        let file = self.file(drive_path);
        match std::fs::read(&file) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ResourceError::io(file, e)),
        }
    }

    /// Store bytes; a failed write only costs a future download.
    fn write(&self, drive_path: &str, bytes: &[u8]) {
        let file = self.file(drive_path);
        let result = match file.parent() {
            Some(parent) => std::fs::create_dir_all(parent).and_then(|()| std::fs::write(&file, bytes)),
            None => std::fs::write(&file, bytes),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to cache {}: {}", file.display(), e);
        }
    }
}

struct DriveInner {
    name: String,
    client: Rc<dyn DriveClient>,
    root: String,
    decoders: DecoderRegistry,
    cache: Option<DiskCache>,
}

impl DriveInner {
    fn drive_path(&self, logical: &str) -> String {
        path::join(&self.root, logical)
    }

    async fn load(&self, logical: &str, kind: ResourceKind) -> ResourceResult<Option<ErasedPayload>> {
        let extensions = self.decoders.extensions_for(kind);

        if let Some(cache) = &self.cache {
            for ext in extensions {
                let file = format!("{}.{}", self.drive_path(logical), ext);
                if let Some(bytes) = cache.read(&file)? {
                    tracing::trace!("{}: '{}' served from cache", self.name, file);
                    return self.decoders.decode(kind, logical, ext, &bytes).map(Some);
                }
            }
        }

        // One listing of the parent folder tells which extension exists.
        let listing = self.client.list(&self.drive_path(path::parent(logical))).await?;
        let name = path::file_name(logical);
        let found = extensions.iter().find(|ext| {
            listing.iter().any(|entry| {
                entry
                    .stem_and_extension()
                    .is_some_and(|(stem, e)| stem == name && e.eq_ignore_ascii_case(ext))
            })
        });
        let Some(ext) = found else {
            return Ok(None);
        };

        let file = format!("{}.{}", self.drive_path(logical), ext);
        let Some(bytes) = self.client.download(&file).await? else {
            return Ok(None);
        };
        tracing::debug!("{}: downloaded '{}' ({} bytes)", self.name, file, bytes.len());
        if let Some(cache) = &self.cache {
            cache.write(&file, &bytes);
        }
        self.decoders.decode(kind, logical, ext, &bytes).map(Some)
    }

    async fn locate(&self, folder: &str, kind: ResourceKind) -> ResourceResult<Vec<LocationRecord>> {
        let mut records = Vec::new();
        let mut pending = vec![folder.to_string()];

        while let Some(current) = pending.pop() {
            for entry in self.client.list(&self.drive_path(&current)).await? {
                if entry.is_folder {
                    pending.push(path::join(&current, &entry.name));
                    continue;
                }
                if let Some((stem, ext)) = entry.stem_and_extension()
                    && self.decoders.handles(kind, ext)
                {
                    records.push(LocationRecord::new(path::join(&current, stem), kind));
                }
            }
        }

        records.sort();
        records.dedup();
        Ok(records)
    }

    async fn folders(&self, folder: &str) -> ResourceResult<Vec<FolderRecord>> {
        let mut folders: Vec<_> = self
            .client
            .list(&self.drive_path(folder))
            .await?
            .into_iter()
            .filter(|entry| entry.is_folder)
            .map(|entry| FolderRecord::new(path::join(folder, &entry.name)))
            .collect();
        folders.sort();
        Ok(folders)
    }
}

/// Serves files from a cloud drive, decoded through a [`DecoderRegistry`].
///
/// Downloads can be kept on disk so later loads skip the network. Listings
/// are not cached here; the provider caches them per folder.
pub struct DriveBackend {
    inner: Rc<DriveInner>,
}

impl DriveBackend {
    /// Create a backend over `client`.
    ///
    /// Opens (and with [`CachingPolicy::PurgeAllOnInit`] empties) the cache
    /// directory, which can fail.
    pub fn new(
        client: impl DriveClient,
        decoders: DecoderRegistry,
        config: DriveConfig,
    ) -> ResourceResult<Self> {
        let cache = config
            .cache_dir
            .map(|dir| DiskCache::open(dir, config.policy))
            .transpose()?;

        Ok(Self {
            inner: Rc::new(DriveInner {
                name: "drive".to_string(),
                client: Rc::new(client),
                root: path::normalize(&config.root_path),
                decoders,
                cache,
            }),
        })
    }
}

impl Backend for DriveBackend {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn supports(&self, kind: ResourceKind) -> bool {
        self.inner.decoders.supports(kind)
    }

    fn load(&self, path: &str, kind: ResourceKind) -> RunFuture<Option<ErasedPayload>> {
        let inner = Rc::clone(&self.inner);
        let path = path.to_string();
        async move { inner.load(&path, kind).await }.boxed_local()
    }

    fn locate_resources(&self, folder: &str, kind: ResourceKind) -> RunFuture<Vec<LocationRecord>> {
        let inner = Rc::clone(&self.inner);
        let folder = folder.to_string();
        async move { inner.locate(&folder, kind).await }.boxed_local()
    }

    fn locate_folders(&self, folder: &str) -> RunFuture<Vec<FolderRecord>> {
        let inner = Rc::clone(&self.inner);
        let folder = folder.to_string();
        async move { inner.folders(&folder).await }.boxed_local()
    }
}
