//! Payload kinds and type-erased payload storage.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Tag identifying a kind of payload (texture, audio clip, script text...).
///
/// Caches, in-flight tables and location records are keyed by kind rather
/// than by Rust type, so backends declare the closed set of kinds they can
/// serve when they are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKind(&'static str);

impl ResourceKind {
    /// Create a kind tag with the given name.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// The name of this kind.
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Trait for types that can be loaded as resources.
///
/// # Example
///
/// ```ignore
/// struct Texture { width: u32, height: u32, pixels: Vec<u8> }
///
/// impl Payload for Texture {
///     fn kind() -> ResourceKind {
///         ResourceKind::new("texture")
///     }
/// }
/// ```
pub trait Payload: Any {
    /// The kind tag payloads of this type are cached and located under.
    fn kind() -> ResourceKind;
}

impl Payload for String {
    fn kind() -> ResourceKind {
        ResourceKind::new("text")
    }
}

impl Payload for Vec<u8> {
    fn kind() -> ResourceKind {
        ResourceKind::new("bytes")
    }
}

/// A loaded payload with its type erased.
///
/// Cloning is cheap and shares the underlying object.
#[derive(Clone)]
pub struct ErasedPayload {
    kind: ResourceKind,
    object: Rc<dyn Any>,
}

impl ErasedPayload {
    /// Wrap a payload.
    pub fn new<T: Payload>(object: T) -> Self {
        Self::from_rc(Rc::new(object))
    }

    /// Wrap an already shared payload.
    pub fn from_rc<T: Payload>(object: Rc<T>) -> Self {
        Self {
            kind: T::kind(),
            object,
        }
    }

    /// Wrap a shared object under an explicit kind.
    ///
    /// Used by backends that serve one Rust type under several kinds.
    pub fn with_kind(kind: ResourceKind, object: Rc<dyn Any>) -> Self {
        Self { kind, object }
    }

    /// The kind this payload was produced as.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Check whether the payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.object.is::<T>()
    }

    /// Get the shared payload as a `T`.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.object).downcast::<T>().ok()
    }

    /// Check whether two payloads share one underlying object.
    pub fn ptr_eq(&self, other: &ErasedPayload) -> bool {
        Rc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for ErasedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedPayload")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_shares_object() {
        let payload = ErasedPayload::new("hello".to_string());
        assert_eq!(payload.kind(), String::kind());
        assert!(payload.is::<String>());

        let a = payload.downcast::<String>().unwrap();
        let b = payload.downcast::<String>().unwrap();
        assert!(Rc::ptr_eq(&a, &b));
        assert!(payload.downcast::<Vec<u8>>().is_none());
    }

    #[test]
    fn test_ptr_eq() {
        let shared = Rc::new(vec![1u8, 2, 3]);
        let a = ErasedPayload::from_rc(Rc::clone(&shared));
        let b = ErasedPayload::from_rc(shared);
        let c = ErasedPayload::new(vec![1u8, 2, 3]);

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn test_with_kind_overrides_tag() {
        const SPRITE: ResourceKind = ResourceKind::new("sprite");
        let payload = ErasedPayload::with_kind(SPRITE, Rc::new(vec![0u8]));
        assert_eq!(payload.kind(), SPRITE);
        assert!(payload.is::<Vec<u8>>());
    }
}
