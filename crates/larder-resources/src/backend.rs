//! The contract storage backends implement.

use crate::kind::{ErasedPayload, ResourceKind};
use crate::resource::{FolderRecord, LocationRecord};
use crate::runner::RunFuture;

/// A storage medium able to load and locate resources.
///
/// Backends hand out `'static` futures; they keep whatever state those
/// futures need behind an `Rc`. The [`ResourceProvider`](crate::ResourceProvider)
/// wrapping a backend takes care of deduplication, caching and progress, so
/// a backend only has to translate its medium into the result shapes below:
///
/// - a missing asset resolves to `Ok(None)` / an empty listing,
/// - a genuine fault of the medium resolves to `Err`.
pub trait Backend: 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Check whether this backend can produce payloads of `kind`.
    fn supports(&self, kind: ResourceKind) -> bool;

    /// Check whether a payload cached as `cached` may be handed out for a
    /// request of `requested`.
    fn compatible(&self, cached: ResourceKind, requested: ResourceKind) -> bool {
        cached == requested
    }

    /// Load the payload stored at `path` as `kind`.
    fn load(&self, path: &str, kind: ResourceKind) -> RunFuture<Option<ErasedPayload>>;

    /// List resources of `kind` anywhere below `folder`.
    fn locate_resources(&self, folder: &str, kind: ResourceKind) -> RunFuture<Vec<LocationRecord>>;

    /// List the folders directly below `folder`.
    fn locate_folders(&self, folder: &str) -> RunFuture<Vec<FolderRecord>>;

    /// Enumerate every resource the backend holds, when the medium allows
    /// listing everything up front.
    ///
    /// Backends returning `Some` are enumerated once, on the first locate or
    /// existence query; every later query is answered from that listing.
    fn catalog(&self) -> Option<RunFuture<Vec<LocationRecord>>> {
        None
    }

    /// Release a payload the provider no longer caches.
    fn dispose(&self, path: &str, payload: ErasedPayload) {
        tracing::trace!("{}: dropping payload for '{}'", self.name(), path);
        drop(payload);
    }
}
