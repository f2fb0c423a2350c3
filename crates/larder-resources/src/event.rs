//! Provider events for change detection.

use crate::kind::ResourceKind;

/// Events emitted by a resource provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// A resource finished loading and entered the cache.
    Loaded {
        /// The path of the resource.
        path: String,
        /// The kind it was loaded as.
        kind: ResourceKind,
    },

    /// A resource was removed from the cache.
    Unloaded {
        /// The path of the resource.
        path: String,
    },

    /// A cached resource was evicted because it was requested as another kind.
    Evicted {
        /// The path of the resource.
        path: String,
        /// The kind that was cached.
        cached: ResourceKind,
        /// The kind that was requested.
        requested: ResourceKind,
    },

    /// A load finished with a backend fault.
    LoadFailed {
        /// The path of the resource.
        path: String,
        /// Error message.
        error: String,
    },

    /// Aggregate load progress changed.
    ProgressChanged {
        /// The new progress, in `0.0..=1.0`.
        progress: f32,
    },
}

impl ProviderEvent {
    /// Get the path this event relates to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            ProviderEvent::Loaded { path, .. }
            | ProviderEvent::Unloaded { path }
            | ProviderEvent::Evicted { path, .. }
            | ProviderEvent::LoadFailed { path, .. } => Some(path),
            ProviderEvent::ProgressChanged { .. } => None,
        }
    }

    /// Check if this is a load event.
    pub fn is_loaded(&self) -> bool {
        matches!(self, ProviderEvent::Loaded { .. })
    }

    /// Check if this is an unload event.
    pub fn is_unloaded(&self) -> bool {
        matches!(self, ProviderEvent::Unloaded { .. })
    }

    /// Check if this is an eviction event.
    pub fn is_evicted(&self) -> bool {
        matches!(self, ProviderEvent::Evicted { .. })
    }

    /// Check if this is a progress event.
    pub fn is_progress(&self) -> bool {
        matches!(self, ProviderEvent::ProgressChanged { .. })
    }
}

/// A buffer of provider events, drained by the owner.
#[derive(Debug, Default)]
pub struct EventBuffer {
    events: Vec<ProviderEvent>,
}

impl EventBuffer {
    /// Create a new empty event buffer.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Push an event to the buffer.
    pub fn push(&mut self, event: ProviderEvent) {
        self.events.push(event);
    }

    /// Drain all events from the buffer.
    pub fn drain(&mut self) -> impl Iterator<Item = ProviderEvent> + '_ {
        self.events.drain(..)
    }

    /// Get an iterator over events without draining.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderEvent> {
        self.events.iter()
    }

    /// Check if there are any events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_drain() {
        let mut buffer = EventBuffer::new();
        buffer.push(ProviderEvent::Unloaded {
            path: "a".to_string(),
        });
        buffer.push(ProviderEvent::ProgressChanged { progress: 1.0 });
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.iter().filter(|e| e.is_progress()).count(), 1);
        assert_eq!(buffer.len(), 2);

        let drained: Vec<_> = buffer.drain().collect();
        assert!(drained[0].is_unloaded());
        assert_eq!(drained[0].path(), Some("a"));
        assert!(drained[1].is_progress());
        assert_eq!(drained[1].path(), None);
        assert!(buffer.is_empty());
    }
}
