use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::repository::{LedgerRepository, RepositoryError};
use super::store::{Backend, StoreOpener};
use crate::models::{LedgerEntry, Material, NewLedgerEntry, NewMaterial};

#[derive(Debug, Default)]
struct MemoryState {
    last_material_id: i64,
    last_entry_id: i64,
    materials: BTreeMap<i64, Material>,
    entries: BTreeMap<i64, LedgerEntry>,
}

/// Process-local ledger store. Ids increase monotonically and are never
/// reused, matching SQLite rowid behaviour closely enough for creation
/// order to hold.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Database("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl LedgerRepository for MemoryRepository {
    async fn create_material(
        &self,
        material: NewMaterial,
    ) -> Result<Material, RepositoryError> {
        let mut state = self.state()?;
        state.last_material_id += 1;
        let created = Material {
            id: state.last_material_id,
            name: material.name,
            unit: material.unit,
            created_at: Utc::now(),
        };
        state.materials.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_material(&self, id: i64) -> Result<Material, RepositoryError> {
        self.state()?
            .materials
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_materials(&self) -> Result<Vec<Material>, RepositoryError> {
        Ok(self.state()?.materials.values().cloned().collect())
    }

    async fn delete_material(&self, id: i64) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if state.materials.remove(&id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        state.entries.retain(|_, entry| entry.material_id != id);
        Ok(())
    }

    async fn insert_entry(
        &self,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, RepositoryError> {
        let mut state = self.state()?;
        if !state.materials.contains_key(&entry.material_id) {
            return Err(RepositoryError::Database(format!(
                "material {} does not exist",
                entry.material_id
            )));
        }

        state.last_entry_id += 1;
        let now = Utc::now();
        let created = LedgerEntry {
            id: state.last_entry_id,
            material_id: entry.material_id,
            name_or_spec: entry.name_or_spec,
            order_qty: entry.order_qty,
            receive_date: entry.receive_date,
            receive_qty: entry.receive_qty,
            pass_qty_current: entry.pass_qty_current,
            fail_qty: entry.fail_qty,
            action: entry.action,
            release_date: entry.release_date,
            release_qty: entry.release_qty,
            pass_qty_total: entry.pass_qty_total,
            remain_qty: entry.remain_qty,
            supervisor_confirm: None,
            created_by: entry.created_by,
            created_at: now,
            updated_at: now,
        };
        state.entries.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_entry(&self, id: i64) -> Result<LedgerEntry, RepositoryError> {
        self.state()?
            .entries
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_entry(
        &self,
        entry: &LedgerEntry,
    ) -> Result<LedgerEntry, RepositoryError> {
        let mut state = self.state()?;
        let stored = state
            .entries
            .get_mut(&entry.id)
            .ok_or(RepositoryError::NotFound)?;

        *stored = LedgerEntry {
            created_at: stored.created_at,
            updated_at: Utc::now(),
            ..entry.clone()
        };
        Ok(stored.clone())
    }

    async fn delete_entry(&self, id: i64) -> Result<(), RepositoryError> {
        self.state()?
            .entries
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_entries(
        &self,
        material_id: i64,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        Ok(self
            .state()?
            .entries
            .values()
            .filter(|entry| entry.material_id == material_id)
            .cloned()
            .collect())
    }

    async fn sign_entries(
        &self,
        ids: &[i64],
        signature: &str,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if ids.iter().any(|id| !state.entries.contains_key(id)) {
            return Err(RepositoryError::NotFound);
        }

        let now = Utc::now();
        for id in ids {
            if let Some(entry) = state.entries.get_mut(id) {
                entry.supervisor_confirm = Some(signature.to_string());
                entry.updated_at = now;
            }
        }
        Ok(())
    }
}

/// Opener for [`Backend::Memory`]. Every open returns a fresh, empty
/// store.
pub struct MemoryStore;

#[async_trait]
impl StoreOpener for MemoryStore {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    async fn open(
        &self,
        _location: &str,
    ) -> Result<Box<dyn LedgerRepository>, RepositoryError> {
        Ok(Box::new(MemoryRepository::new()))
    }
}
