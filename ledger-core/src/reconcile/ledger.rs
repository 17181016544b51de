use crate::models::{GroupKey, LedgerEntry, Material};

use super::aggregate::{GroupSummary, aggregate};

/// A material together with its entries, held in creation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialLedger {
    material: Material,
    entries: Vec<LedgerEntry>,
}

impl MaterialLedger {
    pub fn new(
        material: Material,
        mut entries: Vec<LedgerEntry>,
    ) -> Self {
        entries.sort_by_key(|entry| entry.id);
        Self { material, entries }
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn entry(
        &self,
        id: i64,
    ) -> Option<&LedgerEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Entries sharing `key`, oldest first.
    pub fn group<'a>(
        &'a self,
        key: &'a GroupKey,
    ) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
        self.entries
            .iter()
            .filter(move |entry| &entry.name_or_spec == key)
    }

    pub fn summary(
        &self,
        key: &GroupKey,
        exclude: Option<i64>,
    ) -> GroupSummary {
        aggregate(self.group(key), exclude)
    }

    /// Distinct group keys in order of first appearance.
    pub fn group_keys(&self) -> Vec<GroupKey> {
        let mut keys: Vec<GroupKey> = Vec::new();
        for entry in &self.entries {
            if !keys.contains(&entry.name_or_spec) {
                keys.push(entry.name_or_spec.clone());
            }
        }
        keys
    }

    /// Group key of the most recently created entry.
    pub fn last_group_key(&self) -> Option<&GroupKey> {
        self.entries.last().map(|entry| &entry.name_or_spec)
    }

    pub(crate) fn push(
        &mut self,
        entry: LedgerEntry,
    ) {
        self.entries.push(entry);
    }

    pub(crate) fn replace(
        &mut self,
        entry: LedgerEntry,
    ) {
        if let Some(slot) = self.entries.iter_mut().find(|e| e.id == entry.id) {
            *slot = entry;
        }
    }

    pub(crate) fn remove(
        &mut self,
        id: i64,
    ) {
        self.entries.retain(|entry| entry.id != id);
    }

    pub(crate) fn entry_mut(
        &mut self,
        id: i64,
    ) -> Option<&mut LedgerEntry> {
        self.entries.iter_mut().find(|entry| entry.id == id)
    }
}
