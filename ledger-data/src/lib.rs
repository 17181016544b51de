pub mod importer;
pub mod summary;

pub use importer::{ImportSummary, LedgerCsvRecord, LedgerImportError, LedgerImporter};
pub use summary::render_summary;
