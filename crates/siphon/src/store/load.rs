//! Sea-orm backed load sink for loader tables.
//!
//! Loader tables are named per element (`<element>_loader`) and are owned by
//! the target store, so inserts are built dynamically with sea-query —
//! identifiers are quoted and values bound, never spliced into SQL text.

use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Query, SimpleExpr, Value};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};

use crate::db;
use crate::source::Row;

use super::LoadSink;
use super::errors::{Result, StoreError, is_integrity_db_error};

/// Upper bound on bound parameters per INSERT statement.
///
/// SQLite's historical default limit is 999; staying under it keeps one page
/// loadable regardless of how wide the element's field list is.
const INSERT_PARAM_BUDGET: usize = 800;

/// Load sink over a sea-orm connection.
///
/// The sink remembers its connection URL so [`LoadSink::reconnect`] can
/// replace the handle after an infrastructure fault. The loader task is the
/// sole owner, so the swap needs no coordination.
pub struct SeaOrmLoadSink {
    url: String,
    db: DatabaseConnection,
}

impl SeaOrmLoadSink {
    /// Connect to the target store.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = db::connect(database_url).await?;
        Ok(Self {
            url: database_url.to_string(),
            db,
        })
    }

    /// Access the underlying connection.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn chunk_size(columns: usize) -> usize {
        (INSERT_PARAM_BUDGET / columns.max(1)).max(1)
    }

    fn build_insert(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Row],
    ) -> Result<sea_orm::Statement> {
        let mut insert = Query::insert();
        insert.into_table(Alias::new(table));
        insert.columns(columns.iter().map(|c| Alias::new(c.as_str())));

        for row in rows {
            // An empty field value means the source omitted the field; it
            // lands as NULL rather than an empty string.
            let values = row.iter().map(|v| -> SimpleExpr {
                if v.is_empty() {
                    Value::String(None).into()
                } else {
                    Value::from(v.as_str()).into()
                }
            });
            insert.values(values).map_err(|e| {
                StoreError::invalid_input(format!(
                    "row does not match {} column(s) of {table}: {e}",
                    columns.len()
                ))
            })?;
        }

        Ok(self.db.get_database_backend().build(&insert))
    }
}

fn map_load_error(err: sea_orm::DbErr) -> StoreError {
    if is_integrity_db_error(&err) {
        StoreError::integrity(err.to_string())
    } else {
        StoreError::Database(err)
    }
}

#[async_trait]
impl LoadSink for SeaOrmLoadSink {
    async fn bulk_load(&mut self, table: &str, columns: &[String], rows: &[Row]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        if columns.is_empty() {
            return Err(StoreError::invalid_input(format!(
                "no columns given for loader table {table}"
            )));
        }

        // One transaction per page: either every row of the batch commits or
        // none do, which is what makes a post-failure retry safe.
        let txn = self.db.begin().await.map_err(map_load_error)?;

        let mut written = 0u64;
        for chunk in rows.chunks(Self::chunk_size(columns.len())) {
            let stmt = self.build_insert(table, columns, chunk)?;
            let res = txn.execute(stmt).await.map_err(map_load_error)?;
            written += res.rows_affected();
        }

        txn.commit().await.map_err(map_load_error)?;
        tracing::debug!(table, rows = written, "Bulk load committed");
        Ok(written)
    }

    async fn reconnect(&mut self) -> Result<()> {
        tracing::warn!(url = %self.url, "Reacquiring store connection");
        self.db = db::connect(&self.url).await?;
        Ok(())
    }
}
