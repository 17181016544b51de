use async_trait::async_trait;
use ledger_core::db::{Backend, StoreOpener};
use ledger_core::{LedgerRepository, RepositoryError};

use crate::repository::SqliteRepository;

/// Opener for [`Backend::Sqlite`]. The location is a database file path,
/// created if missing, or `:memory:`. Migrations run on every open.
///
/// ```rust,no_run
/// use ledger_core::db::LedgerStores;
/// use ledger_db_sqlite::SqliteStore;
///
/// let stores = LedgerStores::new().with(Box::new(SqliteStore));
/// ```
pub struct SqliteStore;

#[async_trait]
impl StoreOpener for SqliteStore {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    async fn open(
        &self,
        location: &str,
    ) -> Result<Box<dyn LedgerRepository>, RepositoryError> {
        let repo = SqliteRepository::new(location)
            .await
            .map_err(|e| RepositoryError::Connection(format!("{e:#}")))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        tracing::info!(path = %location, "opened sqlite ledger store");
        Ok(Box::new(repo))
    }
}
