//! Larder Resources - asynchronous resource provisioning and caching
//!
//! This crate loads, locates and lifecycle-manages named assets from
//! interchangeable storage backends:
//! - [`ResourceProvider`] wraps one [`Backend`] and deduplicates in-flight
//!   work, caches loaded payloads and tracks load progress
//! - [`ResourceLoader`] scopes a chain of providers under a path prefix and
//!   tracks which holders keep each resource resident
//! - [`backends`] ships local filesystem, embedded, remote-service and
//!   cloud-drive media
//!
//! Everything runs on one thread: providers hand out `!Send` futures that
//! any single-threaded executor can poll. Every async operation takes a
//! [`CancellationToken`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use larder_resources::prelude::*;
//!
//! # fn main() -> ResourceResult<()> {
//! let provider = ResourceProvider::new(LocalBackend::new("assets", DecoderRegistry::with_defaults()));
//! let loader = ResourceLoader::new("Scripts", vec![provider]);
//! let cancel = CancellationToken::new();
//! let owner = HolderId::new();
//!
//! pollster::block_on(async {
//!     let intro = loader.load_and_hold::<String>("Intro", owner, &cancel).await?;
//!     if let Some(text) = intro.object() {
//!         println!("{}", text);
//!     }
//!     loader.release_all(owner, true);
//!     Ok::<_, ResourceError>(())
//! })
//! # }
//! ```

pub mod backend;
pub mod backends;
pub mod config;
pub mod convert;
pub mod decoder;
pub mod error;
pub mod event;
pub mod holder;
pub mod kind;
pub mod loader;
pub mod manager;
pub mod path;
pub mod provider;
pub mod resource;
mod runner;

pub use backend::Backend;
pub use backends::{
    AssetService, CachingPolicy, DriveBackend, DriveClient, DriveConfig, DriveEntry,
    EmbeddedBackend, LocalBackend, RemoteBackend, RemoteConfig, RemoteLocation,
};
pub use config::{LoaderConfig, ProviderConfig};
pub use convert::KindConversions;
pub use decoder::{
    BytesDecoder, DecodeContext, Decoder, DecoderRegistry, ErasedDecoder, TextDecoder,
    DEFAULT_DECODER_PRIORITY,
};
pub use error::{ResourceError, ResourceResult};
pub use event::{EventBuffer, ProviderEvent};
pub use holder::HolderId;
pub use kind::{ErasedPayload, Payload, ResourceKind};
pub use loader::ResourceLoader;
pub use manager::ProviderManager;
pub use provider::ResourceProvider;
pub use resource::{FolderRecord, LocationRecord, Resource};
pub use runner::RunFuture;

pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Backend, CancellationToken, DecoderRegistry, EmbeddedBackend, HolderId, LoaderConfig,
        LocalBackend, Payload, ProviderManager, Resource, ResourceError, ResourceKind,
        ResourceLoader, ResourceProvider, ResourceResult,
    };
}
