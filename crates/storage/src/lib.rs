pub mod repository;
pub mod sqlite;

pub use repository::{InMemoryStore, KeyedStore, Storage, StorageError};
