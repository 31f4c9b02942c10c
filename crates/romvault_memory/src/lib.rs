//! # romvault in-memory backends
//!
//! Process-local implementations of the [`RecordStore`] and
//! [`StorageBackend`] seams. Everything is lost when the process exits, so
//! these are meant for tests, demos and single-node development servers.
//!
//! [`MemoryRecords`] serialises every operation behind one lock, which gives
//! each trait method the transactional behaviour the managers rely on.
//!
//! ```
//! use romvault_memory::{MemoryRecords, MemoryStorage};
//!
//! let records = MemoryRecords::new();
//! let storage = MemoryStorage::new().with_public_base_url("http://localhost:3000/public");
//! ```
//!
//! [`RecordStore`]: romvault_core::traits::RecordStore
//! [`StorageBackend`]: romvault_core::traits::StorageBackend

mod records;
mod storage;

pub use records::MemoryRecords;
pub use storage::MemoryStorage;
