//! Durable key-value storage: the platform interface, composite keys, record
//! envelopes and the bundled backends.

pub mod error;
pub(crate) mod envelope;
pub mod file;
pub mod keys;
pub mod memory;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use keys::{Namespace, StorageKey};
pub use memory::MemoryStore;
pub use traits::KeyValueStore;
