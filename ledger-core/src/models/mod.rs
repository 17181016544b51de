mod fail_qty;
mod group_key;
mod ledger_entry;
mod material;

pub use fail_qty::{FailQty, NOT_APPLICABLE};
pub use group_key::GroupKey;
pub use ledger_entry::{EntryInput, LedgerEntry, NewLedgerEntry};
pub use material::{Material, NewMaterial};
