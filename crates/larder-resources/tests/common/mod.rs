//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::Shared;

use larder_resources::*;

// ============================================================================
// Test Payload Types
// ============================================================================

/// A payload kind no test backend supports.
#[derive(Debug)]
pub struct Unsupported;

impl Payload for Unsupported {
    fn kind() -> ResourceKind {
        ResourceKind::new("unsupported")
    }
}

// ============================================================================
// Scripted Backend
// ============================================================================

#[derive(Default)]
pub struct Script {
    /// Path -> text content; served as `String` or `Vec<u8>`.
    pub assets: RefCell<Vec<(String, String)>>,
    /// Paths that always serve this exact payload.
    pub fixed: RefCell<Vec<(String, ErasedPayload)>>,
    /// Paths whose loads fail with a backend fault.
    pub faults: RefCell<Vec<String>>,
    pub gate: RefCell<Option<Shared<oneshot::Receiver<()>>>>,
    /// Gate for locate, folder and catalog listings.
    pub locate_gate: RefCell<Option<Shared<oneshot::Receiver<()>>>>,
    pub with_catalog: Cell<bool>,

    pub load_calls: Cell<usize>,
    pub locate_calls: Cell<usize>,
    pub folder_calls: Cell<usize>,
    pub catalog_calls: Cell<usize>,
    pub disposed: RefCell<Vec<(String, ResourceKind)>>,
}

/// In-memory backend that counts what the provider asks of it.
///
/// Every load builds a fresh payload object, so two resources share an
/// object only if they came out of the same load.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    pub script: Rc<Script>,
}

impl ScriptedBackend {
    pub fn new(assets: &[(&str, &str)]) -> Self {
        let backend = Self::default();
        for (path, contents) in assets {
            backend
                .script
                .assets
                .borrow_mut()
                .push((path.to_string(), contents.to_string()));
        }
        backend
    }

    pub fn with_catalog(self) -> Self {
        self.script.with_catalog.set(true);
        self
    }

    pub fn with_fixed(self, path: &str, payload: ErasedPayload) -> Self {
        self.script
            .fixed
            .borrow_mut()
            .push((path.to_string(), payload));
        self
    }

    pub fn with_fault(self, path: &str) -> Self {
        self.script.faults.borrow_mut().push(path.to_string());
        self
    }

    /// Suspend every subsequent load until the returned sender fires.
    pub fn hold_loads(&self) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        *self.script.gate.borrow_mut() = Some(receiver.shared());
        sender
    }

    /// Suspend every subsequent listing until the returned sender fires.
    pub fn hold_locates(&self) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        *self.script.locate_gate.borrow_mut() = Some(receiver.shared());
        sender
    }

    pub fn loads(&self) -> usize {
        self.script.load_calls.get()
    }

    pub fn locates(&self) -> usize {
        self.script.locate_calls.get()
    }

    pub fn disposed(&self) -> Vec<(String, ResourceKind)> {
        self.script.disposed.borrow().clone()
    }

    /// Resolve `value` once the locate gate (if any) opens.
    fn listing<T: 'static>(&self, value: T) -> RunFuture<T> {
        let gate = self.script.locate_gate.borrow().clone();
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(value)
        }
        .boxed_local()
    }

    fn records(&self, kind: ResourceKind) -> Vec<LocationRecord> {
        let mut records: Vec<_> = self
            .script
            .assets
            .borrow()
            .iter()
            .map(|(path, _)| LocationRecord::new(path.clone(), kind))
            .chain(
                self.script
                    .fixed
                    .borrow()
                    .iter()
                    .filter(|(_, payload)| payload.kind() == kind)
                    .map(|(path, _)| LocationRecord::new(path.clone(), kind)),
            )
            .collect();
        records.sort();
        records
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supports(&self, kind: ResourceKind) -> bool {
        kind == String::kind() || kind == Vec::<u8>::kind()
    }

    fn load(&self, path: &str, kind: ResourceKind) -> RunFuture<Option<ErasedPayload>> {
        let script = Rc::clone(&self.script);
        script.load_calls.set(script.load_calls.get() + 1);
        let gate = script.gate.borrow().clone();
        let path = path.to_string();

        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if script.faults.borrow().contains(&path) {
                return Err(ResourceError::backend("scripted", "service unavailable"));
            }
            if let Some((_, payload)) = script.fixed.borrow().iter().find(|(p, _)| *p == path) {
                return Ok(Some(payload.clone()));
            }

            let assets = script.assets.borrow();
            let Some((_, contents)) = assets.iter().find(|(p, _)| *p == path) else {
                return Ok(None);
            };
            let payload = if kind == String::kind() {
                ErasedPayload::new(contents.clone())
            } else {
                ErasedPayload::new(contents.clone().into_bytes())
            };
            Ok(Some(payload))
        }
        .boxed_local()
    }

    fn locate_resources(&self, folder: &str, kind: ResourceKind) -> RunFuture<Vec<LocationRecord>> {
        self.script
            .locate_calls
            .set(self.script.locate_calls.get() + 1);
        let records: Vec<_> = self
            .records(kind)
            .into_iter()
            .filter(|r| r.is_in_folder(folder))
            .collect();
        self.listing(records)
    }

    fn locate_folders(&self, folder: &str) -> RunFuture<Vec<FolderRecord>> {
        self.script
            .folder_calls
            .set(self.script.folder_calls.get() + 1);
        let mut folders: Vec<_> = self
            .records(String::kind())
            .iter()
            .filter_map(|r| larder_resources::path::child_folder(folder, &r.path))
            .map(FolderRecord::new)
            .collect();
        folders.sort();
        folders.dedup();
        self.listing(folders)
    }

    fn catalog(&self) -> Option<RunFuture<Vec<LocationRecord>>> {
        if !self.script.with_catalog.get() {
            return None;
        }
        self.script
            .catalog_calls
            .set(self.script.catalog_calls.get() + 1);
        let mut records = self.records(String::kind());
        records.extend(self.records(Vec::<u8>::kind()));
        Some(self.listing(records))
    }

    fn dispose(&self, path: &str, payload: ErasedPayload) {
        self.script
            .disposed
            .borrow_mut()
            .push((path.to_string(), payload.kind()));
    }
}

/// A provider over a fresh scripted backend, plus a handle to the backend.
pub fn scripted_provider(assets: &[(&str, &str)]) -> (ResourceProvider, ScriptedBackend) {
    let backend = ScriptedBackend::new(assets);
    (ResourceProvider::new(backend.clone()), backend)
}
