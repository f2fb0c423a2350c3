//! Backend implementations for the supported storage media.

mod drive;
mod embedded;
mod local;
mod remote;

pub use drive::{CachingPolicy, DriveBackend, DriveClient, DriveConfig, DriveEntry};
pub use embedded::EmbeddedBackend;
pub use local::LocalBackend;
pub use remote::{AssetService, RemoteBackend, RemoteConfig, RemoteLocation};
