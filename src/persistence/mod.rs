//! Durable storage for the session: pluggable backends plus the gateway
//! that decides which one to trust.

mod gateway;
mod provider;

pub use gateway::{LoadSource, LoadedSession, PersistenceGateway, SaveOutcome, SaveTarget, StorageKeys};
pub use provider::{
    JsonFileProvider, KeyValueStore, MemoryKvStore, SessionFileProvider, SqliteKvStore,
};
