//! Reconciliation of running quantities across a material's ledger.
//!
//! [`aggregate`] holds the pure group arithmetic, [`autofill`] derives form
//! defaults from it, and [`lifecycle`] snapshots it into every persisted
//! write.

pub mod aggregate;
pub mod autofill;
pub mod ledger;
pub mod lifecycle;
pub mod report;

pub use aggregate::{GroupSummary, Snapshot, aggregate, replay};
pub use autofill::{AutoFill, EntryForm, FieldValue};
pub use ledger::MaterialLedger;
pub use lifecycle::{IdentityContext, LedgerError, LedgerManager, StaticIdentity};
pub use report::{GroupReport, StaleSnapshot, audit, group_reports};
