//! SQLite storage for material ledgers.

mod quantities;
pub mod repository;
pub mod store;

pub use repository::SqliteRepository;
pub use store::SqliteStore;
