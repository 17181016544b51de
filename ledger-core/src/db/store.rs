//! Opening a ledger store and loading it into a [`LedgerManager`].
//!
//! Two backends ship: SQLite (in `ledger-db-sqlite`) and the in-memory
//! store in this crate. Backend crates export a [`StoreOpener`], which the
//! binary adds to a [`LedgerStores`] set at startup.
//!
//! | backend  | location                          | persistent |
//! |----------|-----------------------------------|------------|
//! | `sqlite` | file path, or `:memory:`          | yes        |
//! | `memory` | ignored                           | no         |

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use tracing::{info, warn};

use super::memory::MemoryStore;
use super::repository::{LedgerRepository, RepositoryError};
use crate::reconcile::{IdentityContext, LedgerError, LedgerManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Sqlite,
    Memory,
}

impl Backend {
    pub const ALL: [Backend; 2] = [Backend::Sqlite, Backend::Memory];

    pub fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Memory => "memory",
        }
    }

    /// Whether ledgers written through this backend outlive the process.
    pub fn is_persistent(self) -> bool {
        matches!(self, Self::Sqlite)
    }
}

impl fmt::Display for Backend {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = RepositoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|backend| backend.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                RepositoryError::Configuration(format!(
                    "unknown backend '{}'; available: {}",
                    wanted,
                    backend_list(&Self::ALL)
                ))
            })
    }
}

fn backend_list(backends: &[Backend]) -> String {
    backends
        .iter()
        .map(|backend| backend.name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where the ledgers live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: Backend,
    /// Backend-specific location, passed to [`StoreOpener::open`] as is.
    pub location: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            location: "ledger.db".to_string(),
        }
    }
}

/// Opens one backend. Implementations run any schema setup before
/// returning.
#[async_trait]
pub trait StoreOpener: Send + Sync {
    fn backend(&self) -> Backend;

    async fn open(
        &self,
        location: &str,
    ) -> Result<Box<dyn LedgerRepository>, RepositoryError>;
}

/// The backends linked into this build.
pub struct LedgerStores {
    openers: Vec<Box<dyn StoreOpener>>,
}

impl LedgerStores {
    /// A set holding only the in-memory backend.
    pub fn new() -> Self {
        Self {
            openers: vec![Box::new(MemoryStore)],
        }
    }

    /// Adds a backend, replacing any opener already present for it.
    pub fn with(
        mut self,
        opener: Box<dyn StoreOpener>,
    ) -> Self {
        self.openers.retain(|existing| existing.backend() != opener.backend());
        self.openers.push(opener);
        self
    }

    /// Linked backends, in [`Backend::ALL`] order.
    pub fn available(&self) -> Vec<Backend> {
        Backend::ALL
            .into_iter()
            .filter(|backend| self.opener(*backend).is_some())
            .collect()
    }

    fn opener(
        &self,
        backend: Backend,
    ) -> Option<&dyn StoreOpener> {
        self.openers
            .iter()
            .find(|opener| opener.backend() == backend)
            .map(|opener| opener.as_ref())
    }

    pub async fn open(
        &self,
        config: &StoreConfig,
    ) -> Result<Box<dyn LedgerRepository>, RepositoryError> {
        let opener = self.opener(config.backend).ok_or_else(|| {
            RepositoryError::Configuration(format!(
                "backend '{}' is not linked into this build; available: {}",
                config.backend,
                backend_list(&self.available())
            ))
        })?;

        if !config.backend.is_persistent() {
            warn!(backend = %config.backend, "ledger changes will not be saved");
        }
        opener.open(&config.location).await
    }

    /// Opens the store and loads every material ledger it holds.
    pub async fn open_manager(
        &self,
        config: &StoreConfig,
        identity: Box<dyn IdentityContext>,
    ) -> Result<LedgerManager, LedgerError> {
        let repo = self.open(config).await?;
        let mut manager = LedgerManager::new(repo, identity);
        manager.load_all().await?;

        info!(
            backend = %config.backend,
            location = %config.location,
            materials = manager.ledgers().count(),
            "ledger store ready"
        );
        Ok(manager)
    }
}

impl Default for LedgerStores {
    fn default() -> Self {
        Self::new()
    }
}
