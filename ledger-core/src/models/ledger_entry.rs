use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{FailQty, GroupKey};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub material_id: i64,
    pub name_or_spec: GroupKey,

    // Delivery and inspection
    pub order_qty: Option<Decimal>,
    pub receive_date: Option<NaiveDate>,
    pub receive_qty: Option<Decimal>,
    pub pass_qty_current: Option<Decimal>,
    pub fail_qty: Option<FailQty>,
    pub action: Option<String>,

    // Release
    pub release_date: Option<NaiveDate>,
    pub release_qty: Option<Decimal>,

    // Group snapshots, stored on write
    pub pass_qty_total: Option<Decimal>,
    pub remain_qty: Option<Decimal>,

    pub supervisor_confirm: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn fail_qty_numeric(&self) -> Decimal {
        self.fail_qty
            .as_ref()
            .map(FailQty::numeric)
            .unwrap_or(Decimal::ZERO)
    }

    /// The user-editable part of this entry.
    pub fn to_input(&self) -> EntryInput {
        EntryInput {
            name_or_spec: self.name_or_spec.clone(),
            order_qty: self.order_qty,
            receive_date: self.receive_date,
            receive_qty: self.receive_qty,
            pass_qty_current: self.pass_qty_current,
            fail_qty: self.fail_qty.clone(),
            action: self.action.clone(),
            release_date: self.release_date,
            release_qty: self.release_qty,
        }
    }
}

/// For creating new entries (no id or timestamps)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub material_id: i64,
    pub name_or_spec: GroupKey,
    pub order_qty: Option<Decimal>,
    pub receive_date: Option<NaiveDate>,
    pub receive_qty: Option<Decimal>,
    pub pass_qty_current: Option<Decimal>,
    pub fail_qty: Option<FailQty>,
    pub action: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub release_qty: Option<Decimal>,
    pub pass_qty_total: Option<Decimal>,
    pub remain_qty: Option<Decimal>,
    pub created_by: Option<String>,
}

/// Values a user submits for one entry, before group snapshots are taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInput {
    pub name_or_spec: GroupKey,
    pub order_qty: Option<Decimal>,
    pub receive_date: Option<NaiveDate>,
    pub receive_qty: Option<Decimal>,
    pub pass_qty_current: Option<Decimal>,
    pub fail_qty: Option<FailQty>,
    pub action: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub release_qty: Option<Decimal>,
}

impl EntryInput {
    pub fn fail_qty_numeric(&self) -> Decimal {
        self.fail_qty
            .as_ref()
            .map(FailQty::numeric)
            .unwrap_or(Decimal::ZERO)
    }
}
