//! The numeric columns of `ledger_entries`, read and bound as one unit.
//!
//! Quantities are stored as REAL. Rows written by hand or by older tools may
//! hold INTEGER values instead; both read back as [`Decimal`].

use ledger_core::{FailQty, LedgerEntry, NewLedgerEntry, RepositoryError};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};

/// Column names in the order [`QuantityColumns::bind`] binds them.
pub const QUANTITY_COLUMNS: [&str; 7] = [
    "order_qty",
    "receive_qty",
    "pass_qty_current",
    "pass_qty_total",
    "fail_qty",
    "release_qty",
    "remain_qty",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuantityColumns {
    pub order_qty: Option<Decimal>,
    pub receive_qty: Option<Decimal>,
    pub pass_qty_current: Option<Decimal>,
    pub pass_qty_total: Option<Decimal>,
    /// Numeric half of the fail quantity; the text half lives in `fail_qty_text`.
    pub fail_qty: Option<Decimal>,
    pub release_qty: Option<Decimal>,
    pub remain_qty: Option<Decimal>,
}

impl QuantityColumns {
    /// Reads every quantity column of an entry row.
    pub fn read(row: &SqliteRow) -> Result<Self, RepositoryError> {
        let [
            order_qty,
            receive_qty,
            pass_qty_current,
            pass_qty_total,
            fail_qty,
            release_qty,
            remain_qty,
        ] = QUANTITY_COLUMNS.map(|column| read_quantity(row, column));

        Ok(Self {
            order_qty: order_qty?,
            receive_qty: receive_qty?,
            pass_qty_current: pass_qty_current?,
            pass_qty_total: pass_qty_total?,
            fail_qty: fail_qty?,
            release_qty: release_qty?,
            remain_qty: remain_qty?,
        })
    }

    /// Binds the columns as REAL values, in [`QUANTITY_COLUMNS`] order.
    pub fn bind<'q>(
        &self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        self.values()
            .into_iter()
            .fold(query, |query, value| query.bind(value.map(to_real)))
    }

    fn values(&self) -> [Option<Decimal>; 7] {
        [
            self.order_qty,
            self.receive_qty,
            self.pass_qty_current,
            self.pass_qty_total,
            self.fail_qty,
            self.release_qty,
            self.remain_qty,
        ]
    }
}

impl From<&NewLedgerEntry> for QuantityColumns {
    fn from(entry: &NewLedgerEntry) -> Self {
        Self {
            order_qty: entry.order_qty,
            receive_qty: entry.receive_qty,
            pass_qty_current: entry.pass_qty_current,
            pass_qty_total: entry.pass_qty_total,
            fail_qty: fail_amount(&entry.fail_qty),
            release_qty: entry.release_qty,
            remain_qty: entry.remain_qty,
        }
    }
}

impl From<&LedgerEntry> for QuantityColumns {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            order_qty: entry.order_qty,
            receive_qty: entry.receive_qty,
            pass_qty_current: entry.pass_qty_current,
            pass_qty_total: entry.pass_qty_total,
            fail_qty: fail_amount(&entry.fail_qty),
            release_qty: entry.release_qty,
            remain_qty: entry.remain_qty,
        }
    }
}

fn fail_amount(fail_qty: &Option<FailQty>) -> Option<Decimal> {
    fail_qty.as_ref().and_then(|fail| fail.to_columns().0)
}

fn read_quantity(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<Decimal>, RepositoryError> {
    let raw = row
        .try_get_raw(column)
        .map_err(|e| RepositoryError::Database(format!("missing quantity column '{column}': {e}")))?;
    if raw.is_null() {
        return Ok(None);
    }

    let stored_as = raw.type_info().name().to_string();
    let amount = match stored_as.as_str() {
        "INTEGER" => row
            .try_get::<i64, _>(column)
            .map(Decimal::from)
            .map_err(|e| e.to_string()),
        "REAL" => row
            .try_get::<f64, _>(column)
            .map_err(|e| e.to_string())
            .and_then(|value| Decimal::try_from(value).map_err(|e| format!("{value}: {e}"))),
        _ => {
            return Err(RepositoryError::Database(format!(
                "quantity column '{column}' holds {stored_as}, expected a number"
            )));
        }
    };

    amount
        .map(Some)
        .map_err(|e| RepositoryError::Database(format!("failed to read quantity '{column}': {e}")))
}

fn to_real(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}
