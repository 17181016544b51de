use async_trait::async_trait;
use thiserror::Error;

use crate::models::{LedgerEntry, Material, NewLedgerEntry, NewMaterial};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Storage backend for materials and their ledger entries.
///
/// Entries come back in creation order (ascending id); group arithmetic
/// relies on it.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    // Materials
    async fn create_material(
        &self,
        material: NewMaterial,
    ) -> Result<Material, RepositoryError>;
    async fn get_material(&self, id: i64) -> Result<Material, RepositoryError>;
    async fn list_materials(&self) -> Result<Vec<Material>, RepositoryError>;

    /// Deletes the material and every entry that belongs to it.
    async fn delete_material(&self, id: i64) -> Result<(), RepositoryError>;

    // Ledger entries
    async fn insert_entry(
        &self,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, RepositoryError>;

    async fn get_entry(&self, id: i64) -> Result<LedgerEntry, RepositoryError>;

    /// Overwrites every column of the row and returns it as stored.
    async fn update_entry(
        &self,
        entry: &LedgerEntry,
    ) -> Result<LedgerEntry, RepositoryError>;

    async fn delete_entry(&self, id: i64) -> Result<(), RepositoryError>;

    async fn list_entries(
        &self,
        material_id: i64,
    ) -> Result<Vec<LedgerEntry>, RepositoryError>;

    /// Sets `supervisor_confirm` on every listed entry, or on none of them.
    async fn sign_entries(
        &self,
        ids: &[i64],
        signature: &str,
    ) -> Result<(), RepositoryError>;
}
