use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use ledger_core::{
    FailQty, GroupKey, LedgerEntry, LedgerRepository, Material, NewLedgerEntry, NewMaterial,
    RepositoryError,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::quantities::{QUANTITY_COLUMNS, QuantityColumns};

const ENTRY_COLUMNS: &str = "id, material_id, name_or_spec, order_qty, receive_date, receive_qty,
    pass_qty_current, pass_qty_total, fail_qty, fail_qty_text, action, release_date,
    release_qty, remain_qty, supervisor_confirm, created_by, created_at, updated_at";

/// `INSERT` for an entry. Quantity placeholders come last, bound by
/// [`QuantityColumns::bind`].
fn insert_entry_sql() -> String {
    format!(
        "INSERT INTO ledger_entries (
            material_id, name_or_spec, receive_date, fail_qty_text, action,
            release_date, created_by, created_at, updated_at, {}
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, {})",
        QUANTITY_COLUMNS.join(", "),
        vec!["?"; QUANTITY_COLUMNS.len()].join(", ")
    )
}

/// `UPDATE` for an entry. Quantity assignments come last, followed by the id.
fn update_entry_sql() -> String {
    let quantities: Vec<String> = QUANTITY_COLUMNS
        .iter()
        .map(|column| format!("{column} = ?"))
        .collect();
    format!(
        "UPDATE ledger_entries SET
            name_or_spec = ?, receive_date = ?, fail_qty_text = ?, action = ?,
            release_date = ?, supervisor_confirm = ?, updated_at = ?, {}
         WHERE id = ?",
        quantities.join(", ")
    )
}

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens a database file, creating it if missing. `":memory:"` opens a
    /// private in-memory database on a single connection.
    pub async fn new(path: &str) -> Result<Self> {
        let pool = if path == ":memory:" {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await
        } else {
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .foreign_keys(true);
            SqlitePoolOptions::new().connect_with(options).await
        }
        .with_context(|| format!("Failed to connect to database: {}", path))?;
        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn row_to_material(row: &SqliteRow) -> Result<Material, RepositoryError> {
    Ok(Material {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        unit: row.try_get("unit").map_err(db_err)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| RepositoryError::Database(format!("Failed to get created_at: {}", e)))?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<LedgerEntry, RepositoryError> {
    let quantities = QuantityColumns::read(row)?;
    let fail_text: Option<String> = row.try_get("fail_qty_text").map_err(db_err)?;

    Ok(LedgerEntry {
        id: row.try_get("id").map_err(db_err)?,
        material_id: row.try_get("material_id").map_err(db_err)?,
        name_or_spec: GroupKey::new(&row.try_get::<String, _>("name_or_spec").map_err(db_err)?),
        order_qty: quantities.order_qty,
        receive_date: row
            .try_get::<Option<NaiveDate>, _>("receive_date")
            .map_err(db_err)?,
        receive_qty: quantities.receive_qty,
        pass_qty_current: quantities.pass_qty_current,
        fail_qty: FailQty::from_columns(quantities.fail_qty, fail_text),
        action: row.try_get("action").map_err(db_err)?,
        release_date: row
            .try_get::<Option<NaiveDate>, _>("release_date")
            .map_err(db_err)?,
        release_qty: quantities.release_qty,
        pass_qty_total: quantities.pass_qty_total,
        remain_qty: quantities.remain_qty,
        supervisor_confirm: row.try_get("supervisor_confirm").map_err(db_err)?,
        created_by: row.try_get("created_by").map_err(db_err)?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| RepositoryError::Database(format!("Failed to get created_at: {}", e)))?,
        updated_at: row
            .try_get::<DateTime<Utc>, _>("updated_at")
            .map_err(|e| RepositoryError::Database(format!("Failed to get updated_at: {}", e)))?,
    })
}

fn fail_text(fail_qty: &Option<FailQty>) -> Option<String> {
    fail_qty.as_ref().and_then(|fail| fail.to_columns().1)
}

#[async_trait]
impl LedgerRepository for SqliteRepository {
    async fn create_material(
        &self,
        material: NewMaterial,
    ) -> Result<Material, RepositoryError> {
        let result = sqlx::query("INSERT INTO materials (name, unit, created_at) VALUES (?, ?, ?)")
            .bind(&material.name)
            .bind(&material.unit)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        self.get_material(result.last_insert_rowid()).await
    }

    async fn get_material(
        &self,
        id: i64,
    ) -> Result<Material, RepositoryError> {
        let row = sqlx::query("SELECT id, name, unit, created_at FROM materials WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_material(&row)
    }

    async fn list_materials(&self) -> Result<Vec<Material>, RepositoryError> {
        let rows = sqlx::query("SELECT id, name, unit, created_at FROM materials ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter().map(row_to_material).collect()
    }

    async fn delete_material(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM ledger_entries WHERE material_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        let result = sqlx::query("DELETE FROM materials WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await.map_err(db_err)
    }

    async fn insert_entry(
        &self,
        entry: NewLedgerEntry,
    ) -> Result<LedgerEntry, RepositoryError> {
        let now = Utc::now();
        let sql = insert_entry_sql();

        let query = sqlx::query(&sql)
            .bind(entry.material_id)
            .bind(entry.name_or_spec.as_str())
            .bind(entry.receive_date)
            .bind(fail_text(&entry.fail_qty))
            .bind(&entry.action)
            .bind(entry.release_date)
            .bind(&entry.created_by)
            .bind(now)
            .bind(now);
        let result = QuantityColumns::from(&entry)
            .bind(query)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        self.get_entry(result.last_insert_rowid()).await
    }

    async fn get_entry(
        &self,
        id: i64,
    ) -> Result<LedgerEntry, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM ledger_entries WHERE id = ?", ENTRY_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_entry(&row)
    }

    async fn update_entry(
        &self,
        entry: &LedgerEntry,
    ) -> Result<LedgerEntry, RepositoryError> {
        let sql = update_entry_sql();

        let query = sqlx::query(&sql)
            .bind(entry.name_or_spec.as_str())
            .bind(entry.receive_date)
            .bind(fail_text(&entry.fail_qty))
            .bind(&entry.action)
            .bind(entry.release_date)
            .bind(&entry.supervisor_confirm)
            .bind(Utc::now());
        let result = QuantityColumns::from(entry)
            .bind(query)
            .bind(entry.id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        self.get_entry(entry.id).await
    }

    async fn delete_entry(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM ledger_entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_entries(
        &self,
        material_id: i64,
    ) -> Result<Vec<LedgerEntry>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM ledger_entries WHERE material_id = ? ORDER BY id",
            ENTRY_COLUMNS
        ))
        .bind(material_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(row_to_entry).collect()
    }

    async fn sign_entries(
        &self,
        ids: &[i64],
        signature: &str,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for id in ids {
            let result = sqlx::query(
                "UPDATE ledger_entries SET supervisor_confirm = ?, updated_at = ? WHERE id = ?",
            )
            .bind(signature)
            .bind(now)
            .bind(*id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            // Dropping the transaction rolls back rows already signed.
            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound);
            }
        }

        tx.commit().await.map_err(db_err)?;
        tracing::debug!(entries = ids.len(), "signed ledger entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    async fn setup_test_db() -> SqliteRepository {
        let repo = SqliteRepository::new(":memory:")
            .await
            .expect("Failed to create in-memory database");
        repo.run_migrations()
            .await
            .expect("Failed to run migrations");
        repo
    }

    async fn create_test_material(repo: &SqliteRepository) -> Material {
        repo.create_material(NewMaterial {
            name: "Ready-mix concrete".to_string(),
            unit: "m3".to_string(),
        })
        .await
        .expect("Should create material")
    }

    fn create_test_entry(material_id: i64) -> NewLedgerEntry {
        NewLedgerEntry {
            material_id,
            name_or_spec: GroupKey::new("25-24-150"),
            order_qty: Some(dec!(1200)),
            receive_date: NaiveDate::from_ymd_opt(2024, 5, 14),
            receive_qty: Some(dec!(60.5)),
            pass_qty_current: Some(dec!(58)),
            fail_qty: Some(FailQty::Numeric(dec!(2.5))),
            action: Some("returned to plant".to_string()),
            release_date: None,
            release_qty: Some(dec!(40)),
            pass_qty_total: Some(dec!(58)),
            remain_qty: Some(dec!(18)),
            created_by: Some("inspector".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_materials() {
        let repo = setup_test_db().await;

        let created = create_test_material(&repo).await;
        let listed = repo.list_materials().await.expect("Should list materials");

        assert!(created.id > 0);
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn test_get_material_not_found() {
        let repo = setup_test_db().await;

        assert_eq!(repo.get_material(99999).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_insert_and_get_entry() {
        let repo = setup_test_db().await;
        let material = create_test_material(&repo).await;

        let created = repo
            .insert_entry(create_test_entry(material.id))
            .await
            .expect("Should insert entry");

        assert!(created.id > 0);
        assert_eq!(created.name_or_spec.as_str(), "25-24-150");
        assert_eq!(created.order_qty, Some(dec!(1200)));
        assert_eq!(created.receive_date, NaiveDate::from_ymd_opt(2024, 5, 14));
        assert_eq!(created.receive_qty, Some(dec!(60.5)));
        assert_eq!(created.fail_qty, Some(FailQty::Numeric(dec!(2.5))));
        assert_eq!(created.release_date, None);
        assert_eq!(created.remain_qty, Some(dec!(18)));
        assert_eq!(created.supervisor_confirm, None);
        assert_eq!(created.created_by.as_deref(), Some("inspector"));

        let fetched = repo.get_entry(created.id).await.expect("Should fetch entry");
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_text_fail_quantities_round_trip() {
        let repo = setup_test_db().await;
        let material = create_test_material(&repo).await;

        for fail in [FailQty::NotApplicable, FailQty::Custom("cracked cubes".to_string())] {
            let mut entry = create_test_entry(material.id);
            entry.fail_qty = Some(fail.clone());

            let created = repo.insert_entry(entry).await.expect("Should insert entry");

            assert_eq!(created.fail_qty, Some(fail));
        }
    }

    #[tokio::test]
    async fn test_insert_entry_requires_material() {
        let repo = setup_test_db().await;

        let result = repo.insert_entry(create_test_entry(42)).await;

        assert!(matches!(result, Err(RepositoryError::Database(_))));
    }

    #[tokio::test]
    async fn test_update_entry() {
        let repo = setup_test_db().await;
        let material = create_test_material(&repo).await;
        let mut created = repo
            .insert_entry(create_test_entry(material.id))
            .await
            .expect("Should insert entry");

        created.name_or_spec = GroupKey::new("25-21-120");
        created.fail_qty = Some(FailQty::NotApplicable);
        created.remain_qty = Some(dec!(20.5));

        let updated = repo.update_entry(&created).await.expect("Should update entry");

        assert_eq!(updated.name_or_spec.as_str(), "25-21-120");
        assert_eq!(updated.fail_qty, Some(FailQty::NotApplicable));
        assert_eq!(updated.remain_qty, Some(dec!(20.5)));
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_update_entry_not_found() {
        let repo = setup_test_db().await;
        let material = create_test_material(&repo).await;
        let mut created = repo
            .insert_entry(create_test_entry(material.id))
            .await
            .expect("Should insert entry");

        created.id = 99999;

        assert_eq!(repo.update_entry(&created).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let repo = setup_test_db().await;
        let material = create_test_material(&repo).await;
        let created = repo
            .insert_entry(create_test_entry(material.id))
            .await
            .expect("Should insert entry");

        repo.delete_entry(created.id).await.expect("Should delete entry");

        assert_eq!(repo.get_entry(created.id).await, Err(RepositoryError::NotFound));
        assert_eq!(repo.delete_entry(created.id).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_list_entries_in_creation_order() {
        let repo = setup_test_db().await;
        let material = create_test_material(&repo).await;
        let other = create_test_material(&repo).await;

        let first = repo.insert_entry(create_test_entry(material.id)).await.unwrap();
        repo.insert_entry(create_test_entry(other.id)).await.unwrap();
        let second = repo.insert_entry(create_test_entry(material.id)).await.unwrap();

        let ids: Vec<i64> = repo
            .list_entries(material.id)
            .await
            .expect("Should list entries")
            .iter()
            .map(|e| e.id)
            .collect();

        assert_eq!(ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn test_delete_material_removes_entries() {
        let repo = setup_test_db().await;
        let material = create_test_material(&repo).await;
        repo.insert_entry(create_test_entry(material.id)).await.unwrap();

        repo.delete_material(material.id).await.expect("Should delete material");

        assert_eq!(repo.list_entries(material.id).await, Ok(Vec::new()));
        assert_eq!(repo.delete_material(material.id).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_sign_entries() {
        let repo = setup_test_db().await;
        let material = create_test_material(&repo).await;
        let a = repo.insert_entry(create_test_entry(material.id)).await.unwrap();
        let b = repo.insert_entry(create_test_entry(material.id)).await.unwrap();

        repo.sign_entries(&[a.id, b.id], "signed:park")
            .await
            .expect("Should sign entries");

        for id in [a.id, b.id] {
            let entry = repo.get_entry(id).await.unwrap();
            assert_eq!(entry.supervisor_confirm.as_deref(), Some("signed:park"));
        }
    }

    #[tokio::test]
    async fn test_sign_entries_rolls_back_on_unknown_id() {
        let repo = setup_test_db().await;
        let material = create_test_material(&repo).await;
        let a = repo.insert_entry(create_test_entry(material.id)).await.unwrap();

        let result = repo.sign_entries(&[a.id, 99999], "signed:park").await;

        assert_eq!(result, Err(RepositoryError::NotFound));
        assert_eq!(repo.get_entry(a.id).await.unwrap().supervisor_confirm, None);
    }
}
