//! Resource handles and location records.

use std::fmt;
use std::rc::Rc;

use crate::error::{ResourceError, ResourceResult};
use crate::kind::{ErasedPayload, Payload, ResourceKind};
use crate::path;

/// A loaded, typed, path-addressed payload.
///
/// A resource is valid when it carries a payload. Backends and loaders
/// report missing assets as invalid resources rather than errors; callers
/// decide whether absence matters.
///
/// Cloning is cheap: clones share the payload, so two resources produced by
/// one load compare equal under [`Resource::same_object`].
pub struct Resource<T> {
    path: String,
    object: Option<Rc<T>>,
}

impl<T> Resource<T> {
    /// Create a valid resource.
    pub fn new(path: impl Into<String>, object: Rc<T>) -> Self {
        Self {
            path: path.into(),
            object: Some(object),
        }
    }

    /// Create an invalid resource for a path that could not be resolved.
    pub fn invalid(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            object: None,
        }
    }

    /// The path this resource was requested under.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns `true` if the resource carries a payload.
    pub fn is_valid(&self) -> bool {
        self.object.is_some()
    }

    /// Get the payload, if any.
    pub fn object(&self) -> Option<&Rc<T>> {
        self.object.as_ref()
    }

    /// Get the payload, failing with [`ResourceError::NotFound`] when absent.
    pub fn require(&self) -> ResourceResult<&Rc<T>> {
        self.object.as_ref().ok_or_else(|| ResourceError::NotFound {
            path: self.path.clone(),
        })
    }

    /// Check whether two resources share one payload object.
    pub fn same_object(&self, other: &Resource<T>) -> bool {
        match (&self.object, &other.object) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T: Payload> Resource<T> {
    /// Build a typed resource from a cached, type-erased payload.
    pub(crate) fn from_erased(path: &str, payload: &ErasedPayload) -> ResourceResult<Self> {
        payload
            .downcast::<T>()
            .map(|object| Resource::new(path, object))
            .ok_or_else(|| ResourceError::TypeMismatch {
                path: path.to_string(),
                expected: T::kind(),
                actual: payload.kind(),
            })
    }
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            object: self.object.clone(),
        }
    }
}

impl<T> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("path", &self.path)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// A (path, kind) pair describing a resource a backend can serve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationRecord {
    /// The logical path.
    pub path: String,
    /// The payload kind.
    pub kind: ResourceKind,
}

impl LocationRecord {
    /// Create a new location record.
    pub fn new(path: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Check whether this location lies below `folder`.
    pub fn is_in_folder(&self, folder: &str) -> bool {
        path::is_under(folder, &self.path)
    }

    /// The last path segment.
    pub fn name(&self) -> &str {
        path::file_name(&self.path)
    }

    /// The folder containing this location.
    pub fn folder(&self) -> &str {
        path::parent(&self.path)
    }
}

/// A folder found by a folder-locate query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FolderRecord {
    /// The logical path of the folder.
    pub path: String,
}

impl FolderRecord {
    /// Create a new folder record.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity() {
        let valid = Resource::new("Sprites/Hero", Rc::new("data".to_string()));
        assert!(valid.is_valid());
        assert!(valid.require().is_ok());

        let invalid: Resource<String> = Resource::invalid("Sprites/Missing");
        assert!(!invalid.is_valid());
        assert!(invalid.require().unwrap_err().is_not_found());
    }

    #[test]
    fn test_same_object() {
        let shared = Rc::new(vec![1u8]);
        let a = Resource::new("a", Rc::clone(&shared));
        let b = Resource::new("b", shared);
        let c = Resource::new("a", Rc::new(vec![1u8]));
        let invalid: Resource<Vec<u8>> = Resource::invalid("a");

        assert!(a.same_object(&b));
        assert!(a.same_object(&a.clone()));
        assert!(!a.same_object(&c));
        assert!(!invalid.same_object(&invalid));
    }

    #[test]
    fn test_from_erased_checks_type() {
        let payload = ErasedPayload::new("text".to_string());
        assert!(Resource::<String>::from_erased("a", &payload).is_ok());

        let err = Resource::<Vec<u8>>::from_erased("a", &payload).unwrap_err();
        assert!(matches!(err, ResourceError::TypeMismatch { .. }));
    }

    #[test]
    fn test_location_folder_scoping() {
        let kind = String::kind();
        let record = LocationRecord::new("folder/sub/item", kind);
        assert!(record.is_in_folder("folder/sub"));
        assert!(record.is_in_folder("folder"));
        assert!(!record.is_in_folder("folder/su"));
        assert_eq!(record.name(), "item");
        assert_eq!(record.folder(), "folder/sub");
    }
}
