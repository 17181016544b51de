//! Group arithmetic over ledger entries.
//!
//! A group is the creation-ordered run of a material's entries that share a
//! [`GroupKey`](crate::GroupKey). Two running quantities are tracked per
//! group:
//!
//! | Quantity         | Rule                                                      |
//! |------------------|-----------------------------------------------------------|
//! | `pass_qty_total` | previous total + `pass_qty_current`                       |
//! | `remain_qty`     | previous remain + (`receive_qty` − fail) − `release_qty`  |
//!
//! Missing quantities count as zero, and only a numeric fail quantity is
//! subtracted.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use ledger_core::{EntryInput, FailQty, GroupSummary};
//!
//! let summary = GroupSummary {
//!     first_order_qty: Some(dec!(100)),
//!     cumulative_pass: dec!(30),
//!     last_remain: dec!(10),
//! };
//! let input = EntryInput {
//!     receive_qty: Some(dec!(50)),
//!     pass_qty_current: Some(dec!(45)),
//!     fail_qty: Some(FailQty::Numeric(dec!(5))),
//!     release_qty: Some(dec!(20)),
//!     ..EntryInput::default()
//! };
//!
//! let snapshot = summary.advance(&input);
//!
//! assert_eq!(summary.remaining_to_order(), dec!(70));
//! assert_eq!(snapshot.pass_qty_total, dec!(75));
//! assert_eq!(snapshot.remain_qty, dec!(35));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{EntryInput, LedgerEntry};
use crate::quantity::max;

/// Running totals of a group, as seen by the next entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Order quantity of the group's first entry. This is the
    /// authoritative order for the whole group.
    pub first_order_qty: Option<Decimal>,
    /// Sum of `pass_qty_current` over the group.
    pub cumulative_pass: Decimal,
    /// Stored `remain_qty` of the group's last entry.
    pub last_remain: Decimal,
}

/// Values snapshotted into an entry when it is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub pass_qty_total: Decimal,
    pub remain_qty: Decimal,
}

impl GroupSummary {
    /// Order quantity not yet covered by passed deliveries, floored at zero.
    pub fn remaining_to_order(&self) -> Decimal {
        let ordered = self.first_order_qty.unwrap_or(Decimal::ZERO);
        max(ordered - self.cumulative_pass, Decimal::ZERO)
    }

    /// Snapshot for an entry appended after this summary.
    pub fn advance(
        &self,
        input: &EntryInput,
    ) -> Snapshot {
        let pass = input.pass_qty_current.unwrap_or(Decimal::ZERO);
        let receive = input.receive_qty.unwrap_or(Decimal::ZERO);
        let release = input.release_qty.unwrap_or(Decimal::ZERO);

        Snapshot {
            pass_qty_total: self.cumulative_pass + pass,
            remain_qty: self.last_remain + (receive - input.fail_qty_numeric()) - release,
        }
    }

    /// Folds a freshly computed snapshot into the totals.
    fn absorb(
        &mut self,
        order_qty: Option<Decimal>,
        snapshot: Snapshot,
        is_first: bool,
    ) {
        if is_first {
            self.first_order_qty = order_qty;
        }
        self.cumulative_pass = snapshot.pass_qty_total;
        self.last_remain = snapshot.remain_qty;
    }
}

/// Summarizes one group's entries, skipping `exclude` when given.
///
/// `entries` must already be restricted to a single group and be in
/// creation order.
pub fn aggregate<'a, I>(
    entries: I,
    exclude: Option<i64>,
) -> GroupSummary
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut summary = GroupSummary::default();
    let mut seen_first = false;

    for entry in entries.into_iter().filter(|e| Some(e.id) != exclude) {
        if !seen_first {
            summary.first_order_qty = entry.order_qty;
            seen_first = true;
        }
        summary.cumulative_pass += entry.pass_qty_current.unwrap_or(Decimal::ZERO);
        summary.last_remain = entry.remain_qty.unwrap_or(Decimal::ZERO);
    }

    summary
}

/// Snapshots every entry of a group would carry if the group were written
/// again from its first entry, in the same order as `entries`.
///
/// Stored snapshots are never touched; this is a read-only view.
pub fn replay<'a, I>(entries: I) -> Vec<Snapshot>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut summary = GroupSummary::default();
    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let snapshot = summary.advance(&entry.to_input());
            summary.absorb(entry.order_qty, snapshot, index == 0);
            snapshot
        })
        .collect()
}
