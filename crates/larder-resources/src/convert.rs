//! Kind conversions: one stored payload kind standing in for another.
//!
//! A backend holding, say, raw `Vec<u8>` assets can serve `String` requests
//! through a registered conversion. The table is built once when the backend
//! is constructed; each requested kind maps to exactly one source kind.

use std::rc::Rc;

use larder_core::alloc::HashMap;

use crate::error::{ResourceError, ResourceResult};
use crate::kind::{ErasedPayload, Payload, ResourceKind};

type ConvertFn = Rc<dyn Fn(&str, &ErasedPayload) -> ResourceResult<ErasedPayload>>;

struct Conversion {
    source: ResourceKind,
    convert: ConvertFn,
}

/// Mapping from requested kind to (source kind, conversion function).
#[derive(Default)]
pub struct KindConversions {
    by_target: HashMap<ResourceKind, Conversion>,
}

impl KindConversions {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a conversion and return the table.
    pub fn with<S, T, F>(mut self, convert: F) -> Self
    where
        S: Payload,
        T: Payload,
        F: Fn(&S) -> ResourceResult<T> + 'static,
    {
        self.register(convert);
        self
    }

    /// Register a conversion from `S` payloads to `T` payloads.
    ///
    /// Registering a second conversion to the same `T` replaces the first.
    pub fn register<S, T, F>(&mut self, convert: F)
    where
        S: Payload,
        T: Payload,
        F: Fn(&S) -> ResourceResult<T> + 'static,
    {
        let convert: ConvertFn = Rc::new(move |path, payload| {
            let source = payload
                .downcast::<S>()
                .ok_or_else(|| ResourceError::TypeMismatch {
                    path: path.to_string(),
                    expected: S::kind(),
                    actual: payload.kind(),
                })?;
            convert(&source).map(ErasedPayload::new)
        });

        self.by_target.insert(
            T::kind(),
            Conversion {
                source: S::kind(),
                convert,
            },
        );
    }

    /// The source kind a request for `target` is served from, if any.
    pub fn source_of(&self, target: ResourceKind) -> Option<ResourceKind> {
        self.by_target.get(&target).map(|c| c.source)
    }

    /// Kinds that can be produced from `source` payloads.
    pub fn targets_of(&self, source: ResourceKind) -> impl Iterator<Item = ResourceKind> + '_ {
        self.by_target
            .iter()
            .filter(move |(_, c)| c.source == source)
            .map(|(target, _)| *target)
    }

    /// Convert a payload stored as the source of `target`.
    pub fn convert(
        &self,
        target: ResourceKind,
        path: &str,
        payload: &ErasedPayload,
    ) -> ResourceResult<ErasedPayload> {
        let conversion = self
            .by_target
            .get(&target)
            .ok_or(ResourceError::UnsupportedKind { kind: target })?;
        (conversion.convert)(path, payload)
    }

    /// Check whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }
}
