// Adapters layer: concrete implementations of the domain ports.

pub mod events;
pub mod rpc;
pub mod sqlite;
pub mod storage;

pub use events::BroadcastEventBus;
pub use rpc::JsonRpcClient;
pub use sqlite::SqliteStore;
pub use storage::LocalStorage;
#[cfg(feature = "s3")]
pub use storage::S3Storage;
