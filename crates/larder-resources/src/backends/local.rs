//! Local filesystem backend.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use futures::FutureExt;
use walkdir::WalkDir;

use crate::backend::Backend;
use crate::decoder::DecoderRegistry;
use crate::error::{ResourceError, ResourceResult};
use crate::kind::{ErasedPayload, ResourceKind};
use crate::path;
use crate::resource::{FolderRecord, LocationRecord};
use crate::runner::RunFuture;

struct LocalInner {
    name: String,
    root: PathBuf,
    decoders: DecoderRegistry,
}

impl LocalInner {
    /// Resolve a logical path (plus optional extension) below the root.
    fn resolve(&self, logical: &str, extension: Option<&str>) -> PathBuf {
        let mut file = self.root.clone();
        file.extend(logical.split('/').filter(|s| !s.is_empty()));
        match extension {
            Some(ext) => {
                let mut name = file.into_os_string();
                name.push(".");
                name.push(ext);
                PathBuf::from(name)
            }
            None => file,
        }
    }

    /// The logical path of a file below the root: relative, `/`-separated,
    /// extension stripped.
    fn logical(&self, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(&self.root).ok()?.with_extension("");
        let segments: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        Some(segments.join("/"))
    }

    fn read(&self, logical: &str, kind: ResourceKind) -> ResourceResult<Option<ErasedPayload>> {
        for ext in self.decoders.extensions_for(kind) {
            let file = self.resolve(logical, Some(ext.as_str()));
            match std::fs::read(&file) {
                Ok(bytes) => {
                    tracing::trace!("{}: read {} bytes from {}", self.name, bytes.len(), file.display());
                    return self.decoders.decode(kind, logical, ext, &bytes).map(Some);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(ResourceError::io(file, e)),
            }
        }
        Ok(None)
    }

    fn walk(&self, folder: &str, kind: ResourceKind) -> ResourceResult<Vec<LocationRecord>> {
        let dir = self.resolve(folder, None);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in WalkDir::new(&dir).follow_links(true) {
            let entry = entry.map_err(|e| walk_error(&dir, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if !self.decoders.handles(kind, ext) {
                continue;
            }
            if let Some(logical) = self.logical(entry.path()) {
                records.push(LocationRecord::new(logical, kind));
            }
        }

        records.sort();
        records.dedup();
        Ok(records)
    }

    fn subfolders(&self, folder: &str) -> ResourceResult<Vec<FolderRecord>> {
        let dir = self.resolve(folder, None);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| walk_error(&dir, e))?;
            if entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy();
                records.push(FolderRecord::new(path::join(folder, &name)));
            }
        }
        records.sort();
        Ok(records)
    }
}

fn walk_error(dir: &Path, error: walkdir::Error) -> ResourceError {
    let path = error
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.to_path_buf());
    match error.into_io_error() {
        Some(io) => ResourceError::io(path, io),
        None => ResourceError::backend("local", format!("filesystem loop at {}", path.display())),
    }
}

/// Serves files below a root directory, decoded through a [`DecoderRegistry`].
///
/// `Sprites/Hero/Idle` resolves to `<root>/Sprites/Hero/Idle.<ext>` for each
/// extension registered for the requested kind, in registration order.
/// Reads are blocking and wrapped in futures that yield once first.
#[derive(Clone)]
pub struct LocalBackend {
    inner: Rc<LocalInner>,
}

impl LocalBackend {
    /// Create a backend serving files below `root`.
    pub fn new(root: impl AsRef<Path>, decoders: DecoderRegistry) -> Self {
        Self {
            inner: Rc::new(LocalInner {
                name: "local".to_string(),
                root: root.as_ref().to_path_buf(),
                decoders,
            }),
        }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.inner.root
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn supports(&self, kind: ResourceKind) -> bool {
        self.inner.decoders.supports(kind)
    }

    fn load(&self, path: &str, kind: ResourceKind) -> RunFuture<Option<ErasedPayload>> {
        let inner = Rc::clone(&self.inner);
        let path = path.to_string();
        async move {
            futures_lite::future::yield_now().await;
            inner.read(&path, kind)
        }
        .boxed_local()
    }

    fn locate_resources(&self, folder: &str, kind: ResourceKind) -> RunFuture<Vec<LocationRecord>> {
        let inner = Rc::clone(&self.inner);
        let folder = folder.to_string();
        async move {
            futures_lite::future::yield_now().await;
            inner.walk(&folder, kind)
        }
        .boxed_local()
    }

    fn locate_folders(&self, folder: &str) -> RunFuture<Vec<FolderRecord>> {
        let inner = Rc::clone(&self.inner);
        let folder = folder.to_string();
        async move {
            futures_lite::future::yield_now().await;
            inner.subfolders(&folder)
        }
        .boxed_local()
    }
}
