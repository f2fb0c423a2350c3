//! Raw-data decoders: the conversion table byte-oriented backends use to
//! turn stored files into payloads.

use std::rc::Rc;

use larder_core::alloc::HashMap;

use crate::error::{ResourceError, ResourceResult};
use crate::kind::{ErasedPayload, Payload, ResourceKind};

/// Context provided to decoders.
pub struct DecodeContext<'a> {
    /// The logical path of the resource being decoded.
    pub path: &'a str,
    /// The raw bytes.
    pub bytes: &'a [u8],
    /// The extension the bytes were stored under (without the dot).
    pub extension: &'a str,
}

impl<'a> DecodeContext<'a> {
    /// Create a new decode context.
    pub fn new(path: &'a str, bytes: &'a [u8], extension: &'a str) -> Self {
        Self {
            path,
            bytes,
            extension,
        }
    }
}

/// Default priority for decoders.
pub const DEFAULT_DECODER_PRIORITY: i32 = 0;

/// Trait for turning raw bytes into a payload.
///
/// # Example
///
/// ```ignore
/// struct PngDecoder;
///
/// impl Decoder for PngDecoder {
///     type Output = Texture;
///
///     fn extensions(&self) -> &[&str] {
///         &["png"]
///     }
///
///     fn decode(&self, ctx: DecodeContext<'_>) -> ResourceResult<Texture> {
///         // Decode PNG bytes into a Texture...
///     }
/// }
/// ```
pub trait Decoder: 'static {
    /// The payload type this decoder produces.
    type Output: Payload;

    /// The file extensions this decoder handles (without dots).
    fn extensions(&self) -> &[&str];

    /// Decode a payload.
    fn decode(&self, ctx: DecodeContext<'_>) -> ResourceResult<Self::Output>;

    /// Priority for this decoder. When several decoders handle the same
    /// extension for the same kind, the highest priority wins.
    fn priority(&self) -> i32 {
        DEFAULT_DECODER_PRIORITY
    }
}

/// Type-erased decoder for dynamic dispatch.
pub trait ErasedDecoder {
    /// The kind of payload this decoder produces.
    fn kind(&self) -> ResourceKind;

    /// The file extensions this decoder handles.
    fn extensions(&self) -> &[&str];

    /// The priority of this decoder.
    fn priority(&self) -> i32;

    /// Decode a payload with its type erased.
    fn decode_erased(&self, ctx: DecodeContext<'_>) -> ResourceResult<ErasedPayload>;
}

impl<D: Decoder> ErasedDecoder for D {
    fn kind(&self) -> ResourceKind {
        <D::Output as Payload>::kind()
    }

    fn extensions(&self) -> &[&str] {
        Decoder::extensions(self)
    }

    fn priority(&self) -> i32 {
        Decoder::priority(self)
    }

    fn decode_erased(&self, ctx: DecodeContext<'_>) -> ResourceResult<ErasedPayload> {
        self.decode(ctx).map(ErasedPayload::new)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DecoderKey {
    kind: ResourceKind,
    extension: String,
}

struct DecoderEntry {
    decoder: Rc<dyn ErasedDecoder>,
    priority: i32,
}

/// Registry of decoders, indexed by payload kind and extension.
///
/// Built once per backend; the backend supports exactly the kinds that have
/// at least one decoder registered.
#[derive(Default)]
pub struct DecoderRegistry {
    /// Decoders indexed by (kind, extension), sorted by priority (highest first).
    by_kind_and_ext: HashMap<DecoderKey, Vec<DecoderEntry>>,
    /// Extensions per kind, in registration order.
    extensions: HashMap<ResourceKind, Vec<String>>,
}

impl DecoderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding [`TextDecoder`] and [`BytesDecoder`].
    pub fn with_defaults() -> Self {
        Self::new().with(TextDecoder).with(BytesDecoder)
    }

    /// Register a decoder and return the registry.
    pub fn with<D: Decoder>(mut self, decoder: D) -> Self {
        self.register(decoder);
        self
    }

    /// Register a decoder for its declared extensions.
    pub fn register<D: Decoder>(&mut self, decoder: D) {
        let decoder: Rc<dyn ErasedDecoder> = Rc::new(decoder);
        let kind = decoder.kind();
        let priority = decoder.priority();

        for ext in decoder.extensions() {
            let ext_lower = ext.to_lowercase();

            let known = self.extensions.entry(kind).or_default();
            if !known.contains(&ext_lower) {
                known.push(ext_lower.clone());
            }

            let entries = self
                .by_kind_and_ext
                .entry(DecoderKey {
                    kind,
                    extension: ext_lower,
                })
                .or_default();
            entries.push(DecoderEntry {
                decoder: Rc::clone(&decoder),
                priority,
            });
            entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
    }

    /// Check if any decoder produces `kind`.
    pub fn supports(&self, kind: ResourceKind) -> bool {
        self.extensions.contains_key(&kind)
    }

    /// The extensions registered for `kind`, in registration order.
    pub fn extensions_for(&self, kind: ResourceKind) -> &[String] {
        self.extensions
            .get(&kind)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Check if a decoder handles `extension` for `kind`.
    pub fn handles(&self, kind: ResourceKind, extension: &str) -> bool {
        self.get(kind, extension).is_some()
    }

    /// Get the best decoder for a kind and extension.
    pub fn get(&self, kind: ResourceKind, extension: &str) -> Option<&Rc<dyn ErasedDecoder>> {
        let key = DecoderKey {
            kind,
            extension: extension.to_lowercase(),
        };
        self.by_kind_and_ext
            .get(&key)
            .and_then(|entries| entries.first())
            .map(|entry| &entry.decoder)
    }

    /// Decode `bytes` stored under `extension` into a payload of `kind`.
    pub fn decode(
        &self,
        kind: ResourceKind,
        path: &str,
        extension: &str,
        bytes: &[u8],
    ) -> ResourceResult<ErasedPayload> {
        let decoder = self
            .get(kind, extension)
            .ok_or(ResourceError::UnsupportedKind { kind })?;
        decoder.decode_erased(DecodeContext::new(path, bytes, extension))
    }
}

/// Decodes UTF-8 text files into `String`.
pub struct TextDecoder;

impl Decoder for TextDecoder {
    type Output = String;

    fn extensions(&self) -> &[&str] {
        &["txt", "text", "md", "json"]
    }

    fn decode(&self, ctx: DecodeContext<'_>) -> ResourceResult<Self::Output> {
        String::from_utf8(ctx.bytes.to_vec()).map_err(|e| ResourceError::Decode {
            path: ctx.path.to_string(),
            message: format!("Invalid UTF-8: {}", e),
        })
    }
}

/// Passes raw bytes through as `Vec<u8>`.
pub struct BytesDecoder;

impl Decoder for BytesDecoder {
    type Output = Vec<u8>;

    fn extensions(&self) -> &[&str] {
        &["bin", "bytes", "dat"]
    }

    fn decode(&self, ctx: DecodeContext<'_>) -> ResourceResult<Self::Output> {
        Ok(ctx.bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct TestData {
        value: i32,
    }

    impl Payload for TestData {
        fn kind() -> ResourceKind {
            ResourceKind::new("test-data")
        }
    }

    struct LowPriorityDecoder;

    impl Decoder for LowPriorityDecoder {
        type Output = TestData;

        fn extensions(&self) -> &[&str] {
            &["dat"]
        }

        fn priority(&self) -> i32 {
            -10
        }

        fn decode(&self, _ctx: DecodeContext<'_>) -> ResourceResult<Self::Output> {
            Ok(TestData { value: 1 })
        }
    }

    struct HighPriorityDecoder;

    impl Decoder for HighPriorityDecoder {
        type Output = TestData;

        fn extensions(&self) -> &[&str] {
            &["dat"]
        }

        fn priority(&self) -> i32 {
            10
        }

        fn decode(&self, _ctx: DecodeContext<'_>) -> ResourceResult<Self::Output> {
            Ok(TestData { value: 100 })
        }
    }

    #[test]
    fn test_registry_by_kind() {
        let registry = DecoderRegistry::with_defaults();

        assert!(registry.handles(String::kind(), "txt"));
        assert!(registry.handles(String::kind(), "TXT"));
        assert!(registry.handles(Vec::<u8>::kind(), "bin"));
        assert!(!registry.handles(String::kind(), "bin"));
        assert!(!registry.supports(TestData::kind()));
        assert_eq!(registry.extensions_for(String::kind())[0], "txt");
    }

    #[test]
    fn test_priority_wins_regardless_of_order() {
        for registry in [
            DecoderRegistry::new()
                .with(LowPriorityDecoder)
                .with(HighPriorityDecoder),
            DecoderRegistry::new()
                .with(HighPriorityDecoder)
                .with(LowPriorityDecoder),
        ] {
            let payload = registry.decode(TestData::kind(), "a", "dat", b"").unwrap();
            assert_eq!(payload.downcast::<TestData>().unwrap().value, 100);
            assert_eq!(registry.extensions_for(TestData::kind()).len(), 1);
        }
    }

    #[test]
    fn test_text_decoder_rejects_invalid_utf8() {
        let registry = DecoderRegistry::with_defaults();
        let err = registry
            .decode(String::kind(), "Scripts/Intro", "txt", &[0xff, 0xfe])
            .unwrap_err();
        assert!(matches!(err, ResourceError::Decode { .. }));
    }

    #[test]
    fn test_unknown_kind_is_unsupported() {
        let registry = DecoderRegistry::with_defaults();
        let err = registry
            .decode(TestData::kind(), "a", "dat", b"")
            .unwrap_err();
        assert!(matches!(err, ResourceError::UnsupportedKind { .. }));
    }
}
