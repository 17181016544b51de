use std::io::Read;

use chrono::NaiveDate;
use ledger_core::quantity::parse_optional_quantity;
use ledger_core::{EntryInput, FailQty, GroupKey, LedgerError, LedgerManager};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur when importing a paper ledger.
#[derive(Debug, Error)]
pub enum LedgerImportError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("row {0} has no material name")]
    MissingMaterial(usize),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl From<csv::Error> for LedgerImportError {
    fn from(err: csv::Error) -> Self {
        LedgerImportError::CsvParse(err.to_string())
    }
}

/// One transcribed ledger line.
///
/// Columns are matched by header name; all but `material` may be omitted.
/// Quantities accept `,` thousands separators, and the `fail_qty` column
/// takes a number, `-`, or a free-text note.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LedgerCsvRecord {
    pub material: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub name_or_spec: String,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub order_qty: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub receive_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub receive_qty: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub pass_qty: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_fail_qty")]
    pub fail_qty: Option<FailQty>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub release_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub release_qty: Option<Decimal>,
}

impl LedgerCsvRecord {
    pub fn to_input(&self) -> EntryInput {
        EntryInput {
            name_or_spec: GroupKey::new(&self.name_or_spec),
            order_qty: self.order_qty,
            receive_date: self.receive_date,
            receive_qty: self.receive_qty,
            pass_qty_current: self.pass_qty,
            fail_qty: self.fail_qty.clone(),
            action: self.action.clone(),
            release_date: self.release_date,
            release_qty: self.release_qty,
        }
    }
}

fn deserialize_quantity<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.as_deref().and_then(parse_optional_quantity))
}

fn deserialize_fail_qty<'de, D>(deserializer: D) -> Result<Option<FailQty>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.as_deref().and_then(FailQty::parse))
}

fn deserialize_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

/// Counts of what an import wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub materials_created: usize,
    pub entries_created: usize,
}

/// Imports paper ledgers through [`LedgerManager::create_entry`], so every
/// row is snapshotted exactly as if it had been typed into the form.
pub struct LedgerImporter;

impl LedgerImporter {
    /// Parse ledger records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<LedgerCsvRecord>, LedgerImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: LedgerCsvRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Writes records in file order.
    ///
    /// Materials are matched by name against the ledgers the manager has
    /// loaded, so call [`LedgerManager::load_all`] first to append to
    /// existing materials. Unknown names are created with the row's unit.
    /// A failing row stops the import; earlier rows stay written.
    pub async fn load(
        manager: &mut LedgerManager,
        records: &[LedgerCsvRecord],
    ) -> Result<ImportSummary, LedgerImportError> {
        let mut summary = ImportSummary::default();

        for (index, record) in records.iter().enumerate() {
            let name = record.material.trim();
            if name.is_empty() {
                return Err(LedgerImportError::MissingMaterial(index + 1));
            }

            let material_id = match manager.find_material(name) {
                Some(ledger) => ledger.material().id,
                None => {
                    let id = manager.create_material(name, &record.unit).await?.material().id;
                    summary.materials_created += 1;
                    id
                }
            };

            let entry = manager.create_entry(material_id, record.to_input()).await?;
            debug!(row = index + 1, entry_id = entry.id, "imported ledger row");
            summary.entries_created += 1;
        }

        info!(
            materials = summary.materials_created,
            entries = summary.entries_created,
            "ledger import finished"
        );
        Ok(summary)
    }
}
