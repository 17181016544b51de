use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::GroupKey;

use super::aggregate::{Snapshot, replay};
use super::ledger::MaterialLedger;

/// Current standing of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupReport {
    pub name_or_spec: GroupKey,
    pub entry_count: usize,
    pub order_qty: Option<Decimal>,
    pub pass_qty_total: Decimal,
    pub remain_qty: Decimal,
    pub remaining_to_order: Decimal,
}

/// An entry whose stored snapshot no longer matches its group.
///
/// Editing or deleting an earlier entry leaves later snapshots untouched,
/// so these accumulate over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleSnapshot {
    pub entry_id: i64,
    pub name_or_spec: GroupKey,
    pub stored_pass_qty_total: Option<Decimal>,
    pub stored_remain_qty: Option<Decimal>,
    pub expected: Snapshot,
}

/// One report per group, in order of first appearance.
pub fn group_reports(ledger: &MaterialLedger) -> Vec<GroupReport> {
    ledger
        .group_keys()
        .into_iter()
        .map(|key| {
            let summary = ledger.summary(&key, None);
            GroupReport {
                entry_count: ledger.group(&key).count(),
                order_qty: summary.first_order_qty,
                pass_qty_total: summary.cumulative_pass,
                remain_qty: summary.last_remain,
                remaining_to_order: summary.remaining_to_order(),
                name_or_spec: key,
            }
        })
        .collect()
}

/// Compares every stored snapshot against a full replay of its group.
pub fn audit(ledger: &MaterialLedger) -> Vec<StaleSnapshot> {
    let mut stale = Vec::new();

    for key in ledger.group_keys() {
        let entries: Vec<_> = ledger.group(&key).collect();
        for (entry, expected) in entries.iter().zip(replay(entries.iter().copied())) {
            let stored_pass = entry.pass_qty_total.unwrap_or(Decimal::ZERO);
            let stored_remain = entry.remain_qty.unwrap_or(Decimal::ZERO);
            if stored_pass == expected.pass_qty_total && stored_remain == expected.remain_qty {
                continue;
            }

            warn!(
                material = %ledger.material().name,
                entry_id = entry.id,
                group = %key,
                stored_remain = %stored_remain,
                expected_remain = %expected.remain_qty,
                "stale group snapshot"
            );
            stale.push(StaleSnapshot {
                entry_id: entry.id,
                name_or_spec: key.clone(),
                stored_pass_qty_total: entry.pass_qty_total,
                stored_remain_qty: entry.remain_qty,
                expected,
            });
        }
    }

    stale
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{LedgerEntry, Material};

    fn entry(
        id: i64,
        key: &str,
        order: Option<Decimal>,
        receive: Decimal,
        pass: Decimal,
        release: Decimal,
        snapshot: (Decimal, Decimal),
    ) -> LedgerEntry {
        LedgerEntry {
            id,
            material_id: 1,
            name_or_spec: GroupKey::new(key),
            order_qty: order,
            receive_date: None,
            receive_qty: Some(receive),
            pass_qty_current: Some(pass),
            fail_qty: None,
            action: None,
            release_date: None,
            release_qty: Some(release),
            pass_qty_total: Some(snapshot.0),
            remain_qty: Some(snapshot.1),
            supervisor_confirm: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ledger(entries: Vec<LedgerEntry>) -> MaterialLedger {
        let material = Material {
            id: 1,
            name: "Sand".to_string(),
            unit: "m3".to_string(),
            created_at: Utc::now(),
        };
        MaterialLedger::new(material, entries)
    }

    #[test]
    fn reports_each_group_separately() {
        let ledger = ledger(vec![
            entry(1, "fine", Some(dec!(100)), dec!(40), dec!(40), dec!(10), (dec!(40), dec!(30))),
            entry(2, "coarse", Some(dec!(20)), dec!(20), dec!(20), dec!(0), (dec!(20), dec!(20))),
            entry(3, "fine", None, dec!(30), dec!(30), dec!(50), (dec!(70), dec!(10))),
        ]);

        let reports = group_reports(&ledger);

        assert_eq!(
            reports,
            vec![
                GroupReport {
                    name_or_spec: GroupKey::new("fine"),
                    entry_count: 2,
                    order_qty: Some(dec!(100)),
                    pass_qty_total: dec!(70),
                    remain_qty: dec!(10),
                    remaining_to_order: dec!(30),
                },
                GroupReport {
                    name_or_spec: GroupKey::new("coarse"),
                    entry_count: 1,
                    order_qty: Some(dec!(20)),
                    pass_qty_total: dec!(20),
                    remain_qty: dec!(20),
                    remaining_to_order: dec!(0),
                },
            ]
        );
    }

    #[test]
    fn audit_is_empty_for_consistent_ledger() {
        let ledger = ledger(vec![
            entry(1, "fine", Some(dec!(100)), dec!(40), dec!(40), dec!(10), (dec!(40), dec!(30))),
            entry(2, "fine", None, dec!(30), dec!(30), dec!(50), (dec!(70), dec!(10))),
        ]);

        assert_eq!(audit(&ledger), Vec::new());
    }

    #[test]
    fn audit_flags_snapshots_left_behind_by_a_delete() {
        // Entry 1 (receive 40, release 10) was deleted after entry 2 was written.
        let ledger = ledger(vec![entry(
            2,
            "fine",
            None,
            dec!(30),
            dec!(30),
            dec!(50),
            (dec!(70), dec!(10)),
        )]);

        let stale = audit(&ledger);

        assert_eq!(
            stale,
            vec![StaleSnapshot {
                entry_id: 2,
                name_or_spec: GroupKey::new("fine"),
                stored_pass_qty_total: Some(dec!(70)),
                stored_remain_qty: Some(dec!(10)),
                expected: Snapshot {
                    pass_qty_total: dec!(30),
                    remain_qty: dec!(-20),
                },
            }]
        );
    }
}
