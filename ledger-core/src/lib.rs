pub mod db;
pub mod models;
pub mod quantity;
pub mod reconcile;

pub use db::repository::{LedgerRepository, RepositoryError};
pub use models::*;
pub use reconcile::{
    AutoFill, EntryForm, FieldValue, GroupReport, GroupSummary, IdentityContext, LedgerError,
    LedgerManager, MaterialLedger, Snapshot, StaleSnapshot, StaticIdentity,
};
