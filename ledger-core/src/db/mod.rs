pub mod memory;
pub mod repository;
pub mod store;

pub use memory::{MemoryRepository, MemoryStore};
pub use repository::{LedgerRepository, RepositoryError};
pub use store::{Backend, LedgerStores, StoreConfig, StoreOpener};
