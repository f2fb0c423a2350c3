//! Collection types used across larder.
//!
//! Resource tables are keyed by short path strings and hit on every lookup,
//! so they use AHash instead of SipHash.

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet, RandomState};

/// Type alias for a HashMap with AHash.
pub type AHashMap<K, V> = ahash::AHashMap<K, V>;

/// Type alias for a HashSet with AHash.
pub type AHashSet<T> = ahash::AHashSet<T>;
