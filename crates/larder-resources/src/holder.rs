//! Holder identities for reference-counted loading.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HOLDER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of an object keeping resources alive through a
/// [`ResourceLoader`](crate::ResourceLoader).
///
/// Holding is set-based: holding a path twice with the same id counts once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HolderId(u64);

impl HolderId {
    /// Allocate a fresh, process-unique holder id.
    pub fn new() -> Self {
        Self(NEXT_HOLDER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a holder id from a raw value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw value.
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for HolderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "holder#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = HolderId::new();
        let b = HolderId::new();
        assert_ne!(a, b);
        assert_eq!(HolderId::from_raw(a.raw()), a);
    }
}
