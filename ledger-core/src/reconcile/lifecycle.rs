use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use thiserror::Error;
use tracing::{error, info};

use crate::db::repository::{LedgerRepository, RepositoryError};
use crate::models::{EntryInput, LedgerEntry, NewLedgerEntry, NewMaterial};

use super::autofill::AutoFill;
use super::ledger::MaterialLedger;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("failed to persist ledger change: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("material {0} is not loaded")]
    UnknownMaterial(i64),

    #[error("ledger entry {0} is not loaded")]
    UnknownEntry(i64),
}

/// Source of the acting user's id, recorded on new entries.
pub trait IdentityContext: Send + Sync {
    fn user_id(&self) -> Option<String>;
}

/// Fixed identity, for CLI runs and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity(Option<String>);

impl StaticIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(Some(user_id.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityContext for StaticIdentity {
    fn user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Creates, edits, deletes and signs ledger entries, snapshotting group
/// totals into each write.
///
/// Loaded ledgers are cached locally and only change after the repository
/// call they mirror has succeeded.
pub struct LedgerManager {
    repo: Box<dyn LedgerRepository>,
    identity: Box<dyn IdentityContext>,
    ledgers: BTreeMap<i64, MaterialLedger>,
}

impl LedgerManager {
    pub fn new(
        repo: Box<dyn LedgerRepository>,
        identity: Box<dyn IdentityContext>,
    ) -> Self {
        Self {
            repo,
            identity,
            ledgers: BTreeMap::new(),
        }
    }

    pub fn repository(&self) -> &dyn LedgerRepository {
        self.repo.as_ref()
    }

    /// Loaded ledgers, by material id.
    pub fn ledgers(&self) -> impl Iterator<Item = &MaterialLedger> {
        self.ledgers.values()
    }

    pub fn ledger(
        &self,
        material_id: i64,
    ) -> Option<&MaterialLedger> {
        self.ledgers.get(&material_id)
    }

    /// First loaded material with exactly this name.
    pub fn find_material(
        &self,
        name: &str,
    ) -> Option<&MaterialLedger> {
        self.ledgers.values().find(|ledger| ledger.material().name == name)
    }

    /// Replaces local state with every material in the repository.
    pub async fn load_all(&mut self) -> Result<(), LedgerError> {
        let mut ledgers = BTreeMap::new();
        for material in self.repo.list_materials().await? {
            let entries = self.repo.list_entries(material.id).await?;
            ledgers.insert(material.id, MaterialLedger::new(material, entries));
        }
        info!(materials = ledgers.len(), "loaded ledgers");
        self.ledgers = ledgers;
        Ok(())
    }

    pub async fn load_material(
        &mut self,
        material_id: i64,
    ) -> Result<&MaterialLedger, LedgerError> {
        let material = match self.repo.get_material(material_id).await {
            Ok(material) => material,
            Err(RepositoryError::NotFound) => return Err(LedgerError::UnknownMaterial(material_id)),
            Err(e) => return Err(e.into()),
        };
        let entries = self.repo.list_entries(material_id).await?;

        Ok(self.cache(MaterialLedger::new(material, entries)))
    }

    pub async fn create_material(
        &mut self,
        name: &str,
        unit: &str,
    ) -> Result<&MaterialLedger, LedgerError> {
        let material = self
            .repo
            .create_material(NewMaterial {
                name: name.trim().to_string(),
                unit: unit.trim().to_string(),
            })
            .await
            .inspect_err(|e| error!(material = %name, "failed to create material: {}", e))?;

        info!(material_id = material.id, name = %material.name, "created material");
        Ok(self.cache(MaterialLedger::new(material, Vec::new())))
    }

    /// Deletes the material and, through the repository, all its entries.
    pub async fn delete_material(
        &mut self,
        material_id: i64,
    ) -> Result<(), LedgerError> {
        if !self.ledgers.contains_key(&material_id) {
            return Err(LedgerError::UnknownMaterial(material_id));
        }
        self.repo
            .delete_material(material_id)
            .await
            .inspect_err(|e| error!(material_id, "failed to delete material: {}", e))?;

        self.ledgers.remove(&material_id);
        info!(material_id, "deleted material");
        Ok(())
    }

    pub fn new_entry_form(
        &self,
        material_id: i64,
    ) -> Result<AutoFill<'_>, LedgerError> {
        self.ledgers
            .get(&material_id)
            .map(AutoFill::for_new)
            .ok_or(LedgerError::UnknownMaterial(material_id))
    }

    pub fn edit_entry_form(
        &self,
        entry_id: i64,
    ) -> Result<AutoFill<'_>, LedgerError> {
        let material_id = self.owner_of(entry_id)?;
        self.ledgers
            .get(&material_id)
            .and_then(|ledger| AutoFill::for_edit(ledger, entry_id))
            .ok_or(LedgerError::UnknownEntry(entry_id))
    }

    /// Appends an entry to the end of its group.
    pub async fn create_entry(
        &mut self,
        material_id: i64,
        input: EntryInput,
    ) -> Result<LedgerEntry, LedgerError> {
        let ledger = self
            .ledgers
            .get(&material_id)
            .ok_or(LedgerError::UnknownMaterial(material_id))?;
        let snapshot = ledger.summary(&input.name_or_spec, None).advance(&input);

        let new_entry = NewLedgerEntry {
            material_id,
            name_or_spec: input.name_or_spec,
            order_qty: input.order_qty,
            receive_date: input.receive_date,
            receive_qty: input.receive_qty,
            pass_qty_current: input.pass_qty_current,
            fail_qty: input.fail_qty,
            action: input.action,
            release_date: input.release_date,
            release_qty: input.release_qty,
            pass_qty_total: Some(snapshot.pass_qty_total),
            remain_qty: Some(snapshot.remain_qty),
            created_by: self.identity.user_id(),
        };

        let stored = self
            .repo
            .insert_entry(new_entry)
            .await
            .inspect_err(|e| error!(material_id, "failed to save ledger entry: {}", e))?;

        info!(
            entry_id = stored.id,
            material_id,
            group = %stored.name_or_spec,
            remain = %snapshot.remain_qty,
            "created ledger entry"
        );
        if let Some(ledger) = self.ledgers.get_mut(&material_id) {
            ledger.push(stored.clone());
        }
        Ok(stored)
    }

    /// Rewrites an entry in place. Its snapshot is recomputed against its
    /// (possibly new) group without itself; other entries keep theirs.
    pub async fn update_entry(
        &mut self,
        entry_id: i64,
        input: EntryInput,
    ) -> Result<LedgerEntry, LedgerError> {
        let material_id = self.owner_of(entry_id)?;
        let ledger = self
            .ledgers
            .get(&material_id)
            .ok_or(LedgerError::UnknownMaterial(material_id))?;
        let current = ledger
            .entry(entry_id)
            .ok_or(LedgerError::UnknownEntry(entry_id))?;
        let snapshot = ledger
            .summary(&input.name_or_spec, Some(entry_id))
            .advance(&input);

        let updated = LedgerEntry {
            name_or_spec: input.name_or_spec,
            order_qty: input.order_qty,
            receive_date: input.receive_date,
            receive_qty: input.receive_qty,
            pass_qty_current: input.pass_qty_current,
            fail_qty: input.fail_qty,
            action: input.action,
            release_date: input.release_date,
            release_qty: input.release_qty,
            pass_qty_total: Some(snapshot.pass_qty_total),
            remain_qty: Some(snapshot.remain_qty),
            ..current.clone()
        };

        let stored = self
            .repo
            .update_entry(&updated)
            .await
            .inspect_err(|e| error!(entry_id, "failed to update ledger entry: {}", e))?;

        info!(entry_id, material_id, group = %stored.name_or_spec, "updated ledger entry");
        if let Some(ledger) = self.ledgers.get_mut(&material_id) {
            ledger.replace(stored.clone());
        }
        Ok(stored)
    }

    /// Removes an entry. Later entries of the group are not recomputed.
    pub async fn delete_entry(
        &mut self,
        entry_id: i64,
    ) -> Result<(), LedgerError> {
        let material_id = self.owner_of(entry_id)?;
        self.repo
            .delete_entry(entry_id)
            .await
            .inspect_err(|e| error!(entry_id, "failed to delete ledger entry: {}", e))?;

        if let Some(ledger) = self.ledgers.get_mut(&material_id) {
            ledger.remove(entry_id);
        }
        info!(entry_id, material_id, "deleted ledger entry");
        Ok(())
    }

    /// Records a supervisor signature on every listed entry in one
    /// repository call.
    pub async fn batch_sign(
        &mut self,
        entry_ids: &[i64],
        signature: &str,
    ) -> Result<(), LedgerError> {
        let owners = entry_ids
            .iter()
            .map(|&id| self.owner_of(id).map(|material_id| (material_id, id)))
            .collect::<Result<Vec<_>, _>>()?;

        self.repo
            .sign_entries(entry_ids, signature)
            .await
            .inspect_err(|e| error!(entries = entry_ids.len(), "failed to sign ledger entries: {}", e))?;

        for (material_id, entry_id) in owners {
            if let Some(entry) = self
                .ledgers
                .get_mut(&material_id)
                .and_then(|ledger| ledger.entry_mut(entry_id))
            {
                entry.supervisor_confirm = Some(signature.to_string());
            }
        }
        info!(entries = entry_ids.len(), "signed ledger entries");
        Ok(())
    }

    fn cache(
        &mut self,
        ledger: MaterialLedger,
    ) -> &MaterialLedger {
        match self.ledgers.entry(ledger.material().id) {
            Entry::Occupied(mut slot) => {
                slot.insert(ledger);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(ledger),
        }
    }

    fn owner_of(
        &self,
        entry_id: i64,
    ) -> Result<i64, LedgerError> {
        self.ledgers
            .iter()
            .find(|(_, ledger)| ledger.entry(entry_id).is_some())
            .map(|(&material_id, _)| material_id)
            .ok_or(LedgerError::UnknownEntry(entry_id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::memory::MemoryRepository;
    use crate::models::{FailQty, GroupKey, Material};

    /// Memory store whose writes can be switched to fail.
    struct FlakyRepository {
        inner: MemoryRepository,
        fail_writes: Arc<AtomicBool>,
    }

    impl FlakyRepository {
        fn check(&self) -> Result<(), RepositoryError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(RepositoryError::Connection("storage offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl LedgerRepository for FlakyRepository {
        async fn create_material(
            &self,
            material: NewMaterial,
        ) -> Result<Material, RepositoryError> {
            self.check()?;
            self.inner.create_material(material).await
        }

        async fn get_material(&self, id: i64) -> Result<Material, RepositoryError> {
            self.inner.get_material(id).await
        }

        async fn list_materials(&self) -> Result<Vec<Material>, RepositoryError> {
            self.inner.list_materials().await
        }

        async fn delete_material(&self, id: i64) -> Result<(), RepositoryError> {
            self.check()?;
            self.inner.delete_material(id).await
        }

        async fn insert_entry(
            &self,
            entry: NewLedgerEntry,
        ) -> Result<LedgerEntry, RepositoryError> {
            self.check()?;
            self.inner.insert_entry(entry).await
        }

        async fn get_entry(&self, id: i64) -> Result<LedgerEntry, RepositoryError> {
            self.inner.get_entry(id).await
        }

        async fn update_entry(
            &self,
            entry: &LedgerEntry,
        ) -> Result<LedgerEntry, RepositoryError> {
            self.check()?;
            self.inner.update_entry(entry).await
        }

        async fn delete_entry(&self, id: i64) -> Result<(), RepositoryError> {
            self.check()?;
            self.inner.delete_entry(id).await
        }

        async fn list_entries(
            &self,
            material_id: i64,
        ) -> Result<Vec<LedgerEntry>, RepositoryError> {
            self.inner.list_entries(material_id).await
        }

        async fn sign_entries(
            &self,
            ids: &[i64],
            signature: &str,
        ) -> Result<(), RepositoryError> {
            self.check()?;
            self.inner.sign_entries(ids, signature).await
        }
    }

    fn flaky_manager() -> (LedgerManager, Arc<AtomicBool>) {
        let fail_writes = Arc::new(AtomicBool::new(false));
        let repo = FlakyRepository {
            inner: MemoryRepository::new(),
            fail_writes: fail_writes.clone(),
        };
        let manager = LedgerManager::new(Box::new(repo), Box::new(StaticIdentity::new("site-engineer")));
        (manager, fail_writes)
    }

    fn input(
        key: &str,
        receive: rust_decimal::Decimal,
        pass: rust_decimal::Decimal,
        release: rust_decimal::Decimal,
    ) -> EntryInput {
        EntryInput {
            name_or_spec: GroupKey::new(key),
            receive_qty: Some(receive),
            pass_qty_current: Some(pass),
            fail_qty: Some(FailQty::NotApplicable),
            release_qty: Some(release),
            ..EntryInput::default()
        }
    }

    #[tokio::test]
    async fn create_entry_snapshots_group_totals() {
        let (mut manager, _) = flaky_manager();
        let material_id = manager.create_material("Cement", "bag").await.unwrap().material().id;

        let first = manager
            .create_entry(material_id, input("PC", dec!(40), dec!(40), dec!(10)))
            .await
            .unwrap();
        let second = manager
            .create_entry(material_id, input("PC", dec!(20), dec!(15), dec!(30)))
            .await
            .unwrap();

        assert_eq!(first.pass_qty_total, Some(dec!(40)));
        assert_eq!(first.remain_qty, Some(dec!(30)));
        assert_eq!(second.pass_qty_total, Some(dec!(55)));
        assert_eq!(second.remain_qty, Some(dec!(20)));
        assert_eq!(second.created_by.as_deref(), Some("site-engineer"));
        assert_eq!(manager.ledger(material_id).unwrap().entries().len(), 2);
    }

    #[tokio::test]
    async fn create_entry_for_unknown_material_fails() {
        let (mut manager, _) = flaky_manager();

        let result = manager.create_entry(5, EntryInput::default()).await;

        assert_eq!(result, Err(LedgerError::UnknownMaterial(5)));
    }

    #[tokio::test]
    async fn failed_write_leaves_local_state_untouched() {
        let (mut manager, fail_writes) = flaky_manager();
        let material_id = manager.create_material("Cement", "bag").await.unwrap().material().id;
        let entry = manager
            .create_entry(material_id, input("PC", dec!(40), dec!(40), dec!(0)))
            .await
            .unwrap();
        let before = manager.ledger(material_id).unwrap().clone();

        fail_writes.store(true, Ordering::SeqCst);
        let created = manager
            .create_entry(material_id, input("PC", dec!(1), dec!(1), dec!(0)))
            .await;
        let updated = manager
            .update_entry(entry.id, input("PC", dec!(2), dec!(2), dec!(0)))
            .await;
        let deleted = manager.delete_entry(entry.id).await;
        let signed = manager.batch_sign(&[entry.id], "signed:kim").await;

        let offline = LedgerError::Persistence(RepositoryError::Connection("storage offline".to_string()));
        assert_eq!(created, Err(offline.clone()));
        assert_eq!(updated, Err(offline.clone()));
        assert_eq!(deleted, Err(offline.clone()));
        assert_eq!(signed, Err(offline));
        assert_eq!(manager.ledger(material_id), Some(&before));
    }

    #[tokio::test]
    async fn update_entry_excludes_itself_and_keeps_others() {
        let (mut manager, _) = flaky_manager();
        let material_id = manager.create_material("Cement", "bag").await.unwrap().material().id;
        let first = manager
            .create_entry(material_id, input("PC", dec!(40), dec!(40), dec!(10)))
            .await
            .unwrap();
        let second = manager
            .create_entry(material_id, input("PC", dec!(20), dec!(20), dec!(0)))
            .await
            .unwrap();

        let edited = manager
            .update_entry(second.id, input("PC", dec!(25), dec!(25), dec!(5)))
            .await
            .unwrap();

        assert_eq!(edited.pass_qty_total, Some(dec!(65)));
        assert_eq!(edited.remain_qty, Some(dec!(50)));
        assert_eq!(edited.created_at, second.created_at);
        assert_eq!(manager.ledger(material_id).unwrap().entry(first.id), Some(&first));
    }

    #[tokio::test]
    async fn update_entry_into_another_group_aggregates_there() {
        let (mut manager, _) = flaky_manager();
        let material_id = manager.create_material("Rebar", "ton").await.unwrap().material().id;
        manager
            .create_entry(material_id, input("D13", dec!(10), dec!(10), dec!(0)))
            .await
            .unwrap();
        let moved = manager
            .create_entry(material_id, input("D16", dec!(4), dec!(4), dec!(0)))
            .await
            .unwrap();

        let edited = manager
            .update_entry(moved.id, input("D13", dec!(4), dec!(4), dec!(0)))
            .await
            .unwrap();

        assert_eq!(edited.pass_qty_total, Some(dec!(14)));
        assert_eq!(edited.remain_qty, Some(dec!(14)));
    }

    #[tokio::test]
    async fn batch_sign_updates_local_entries() {
        let (mut manager, _) = flaky_manager();
        let material_id = manager.create_material("Cement", "bag").await.unwrap().material().id;
        let a = manager
            .create_entry(material_id, input("PC", dec!(1), dec!(1), dec!(0)))
            .await
            .unwrap();
        let b = manager
            .create_entry(material_id, input("PC", dec!(1), dec!(1), dec!(0)))
            .await
            .unwrap();

        manager.batch_sign(&[a.id, b.id], "signed:kim").await.unwrap();

        let ledger = manager.ledger(material_id).unwrap();
        assert!(
            ledger
                .entries()
                .iter()
                .all(|e| e.supervisor_confirm.as_deref() == Some("signed:kim"))
        );
    }

    #[tokio::test]
    async fn batch_sign_rejects_unknown_entries_before_writing() {
        let (mut manager, _) = flaky_manager();
        let material_id = manager.create_material("Cement", "bag").await.unwrap().material().id;
        let a = manager
            .create_entry(material_id, input("PC", dec!(1), dec!(1), dec!(0)))
            .await
            .unwrap();

        let result = manager.batch_sign(&[a.id, 77], "signed:kim").await;

        assert_eq!(result, Err(LedgerError::UnknownEntry(77)));
        assert_eq!(
            manager.repository().get_entry(a.id).await.unwrap().supervisor_confirm,
            None
        );
    }

    #[tokio::test]
    async fn delete_material_drops_local_ledger() {
        let (mut manager, _) = flaky_manager();
        let material_id = manager.create_material("Cement", "bag").await.unwrap().material().id;
        manager
            .create_entry(material_id, input("PC", dec!(1), dec!(1), dec!(0)))
            .await
            .unwrap();

        manager.delete_material(material_id).await.unwrap();

        assert!(manager.ledger(material_id).is_none());
        assert_eq!(manager.repository().list_entries(material_id).await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn load_all_restores_ledgers_from_repository() {
        let (mut manager, _) = flaky_manager();
        let material_id = manager.create_material("Cement", "bag").await.unwrap().material().id;
        manager
            .create_entry(material_id, input("PC", dec!(1), dec!(1), dec!(0)))
            .await
            .unwrap();
        let expected = manager.ledger(material_id).unwrap().clone();

        manager.load_all().await.unwrap();

        assert_eq!(manager.ledger(material_id), Some(&expected));
        assert_eq!(manager.find_material("Cement").map(|l| l.material().id), Some(material_id));
    }

    #[tokio::test]
    async fn load_material_reports_unknown_id() {
        let (mut manager, _) = flaky_manager();

        let result = manager.load_material(3).await.map(|ledger| ledger.material().id);

        assert_eq!(result, Err(LedgerError::UnknownMaterial(3)));
    }

    #[tokio::test]
    async fn forms_require_loaded_records() {
        let (manager, _) = flaky_manager();

        assert_eq!(manager.new_entry_form(1).err(), Some(LedgerError::UnknownMaterial(1)));
        assert_eq!(manager.edit_entry_form(1).err(), Some(LedgerError::UnknownEntry(1)));
    }
}
