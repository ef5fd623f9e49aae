use crate::{pg_err, store::PostgresStore};
use umbra_core::error::Result;
use umbra_core::traits::SchemaApplier;
use umbra_core::StoreConfig;

/// DDL application against PostgreSQL
pub struct PostgresSchema {
    config: StoreConfig,
}

impl PostgresSchema {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }
}

impl SchemaApplier for PostgresSchema {
    fn exec_sql(&self, sql: &str) -> Result<()> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        client.batch_execute(sql).map_err(pg_err)
    }

    fn exec_batch(&self, statements: &[String]) -> Result<()> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let mut txn = client.transaction().map_err(pg_err)?;
        for statement in statements {
            txn.batch_execute(statement).map_err(pg_err)?;
        }
        txn.commit().map_err(pg_err)
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let row = client
            .query_one("SELECT to_regclass($1) IS NOT NULL", &[&table])
            .map_err(pg_err)?;
        Ok(row.get(0))
    }

    fn row_count(&self, table: &str) -> Result<u64> {
        let mut client = PostgresStore::connect_with(&self.config)?;
        let sql = format!("SELECT count(*) FROM {table}");
        let row = client.query_one(sql.as_str(), &[]).map_err(pg_err)?;
        Ok(row.get::<_, i64>(0) as u64)
    }

    fn truncate_table(&self, table: &str) -> Result<()> {
        self.exec_sql(&format!("TRUNCATE {table}"))
    }

    fn create_schema(&self, name: &str) -> Result<()> {
        self.exec_sql(&format!("CREATE SCHEMA IF NOT EXISTS {name}"))
    }

    fn drop_schema(&self, name: &str) -> Result<()> {
        self.exec_sql(&format!("DROP SCHEMA IF EXISTS {name} CASCADE"))
    }

    fn create_table_like(&self, source: &str, target: &str) -> Result<()> {
        self.exec_sql(&format!(
            "CREATE TABLE IF NOT EXISTS {target} (LIKE {source} INCLUDING ALL)"
        ))
    }
}
