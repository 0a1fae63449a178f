//! Multi-device synchronization.
//!
//! Each state category (settings, statistics, achievements, timer) is one
//! document in a remote store keyed by user. Local changes overwrite the
//! remote document; remote changes overwrite local state.

pub mod coordinator;
pub mod device_id;
pub mod http_store;
pub mod remote;
pub mod types;

pub use coordinator::SyncCoordinator;
pub use device_id::{
    get_or_create_device_id, get_or_create_device_id_at, new_device_id, DeviceIdError,
};
pub use http_store::HttpRemoteStore;
pub use remote::{MemoryRemoteStore, RemoteStore};
pub use types::{DocumentKey, SyncCategory, SyncDocument, SyncError, SyncStatus};
