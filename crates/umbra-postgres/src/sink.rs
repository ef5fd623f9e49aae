use crate::{pg_err, store::PostgresStore};
use bytes::BytesMut;
use parking_lot::Mutex;
use postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use postgres::{Client, Transaction};
use std::io::Write;
use umbra_core::error::Result;
use umbra_core::traits::{BulkSink, FlushMode, TableFlush};
use umbra_core::types::Value;
use umbra_core::StoreConfig;

/// Flush target for one replay worker.
///
/// Owns a dedicated connection; a worker's whole commit — every table's
/// batch — runs in one transaction, so a group either lands completely or
/// not at all. Large batches stream through `COPY ... FROM STDIN (FORMAT
/// csv)`, small ones go through a single multi-row insert.
pub struct PostgresSink {
    client: Mutex<Client>,
}

impl PostgresSink {
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            client: Mutex::new(PostgresStore::connect_with(config)?),
        })
    }
}

impl BulkSink for PostgresSink {
    fn flush(&self, batches: &[TableFlush]) -> Result<()> {
        let mut client = self.client.lock();
        let mut txn = client.transaction().map_err(pg_err)?;
        for batch in batches {
            match batch.mode {
                FlushMode::Copy => copy_rows(&mut txn, batch)?,
                FlushMode::Insert => insert_rows(&mut txn, batch)?,
            }
            tracing::debug!(
                table = %batch.table,
                rows = batch.row_count(),
                mode = ?batch.mode,
                "flushed batch"
            );
        }
        txn.commit().map_err(pg_err)
    }
}

fn insert_rows(txn: &mut Transaction<'_>, batch: &TableFlush) -> Result<()> {
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ",
        batch.table,
        batch.columns.join(", ")
    );
    let width = batch.columns.len();
    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(width * batch.rows.len());
    let wrapped: Vec<Vec<PgValue<'_>>> = batch
        .rows
        .iter()
        .map(|row| row.iter().map(PgValue).collect())
        .collect();
    for (row_idx, row) in wrapped.iter().enumerate() {
        if row_idx > 0 {
            sql.push_str(", ");
        }
        sql.push('(');
        for (col_idx, value) in row.iter().enumerate() {
            if col_idx > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("${}", row_idx * width + col_idx + 1));
            params.push(value);
        }
        sql.push(')');
    }
    txn.execute(sql.as_str(), &params).map_err(pg_err)?;
    Ok(())
}

fn copy_rows(txn: &mut Transaction<'_>, batch: &TableFlush) -> Result<()> {
    let sql = format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv)",
        batch.table,
        batch.columns.join(", ")
    );
    let mut writer = txn.copy_in(sql.as_str()).map_err(pg_err)?;
    let mut line = String::new();
    for row in &batch.rows {
        line.clear();
        write_csv_row(&mut line, row);
        writer.write_all(line.as_bytes())?;
    }
    writer.finish().map_err(pg_err)?;
    Ok(())
}

/// CSV for COPY: quoted fields with doubled quotes; NULL is the unquoted
/// empty field (a quoted empty field would load as an empty string).
fn write_csv_row(out: &mut String, row: &[Value]) {
    for (idx, value) in row.iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        if let Some(text) = value.copy_text() {
            out.push('"');
            for ch in text.chars() {
                if ch == '"' {
                    out.push('"');
                }
                out.push(ch);
            }
            out.push('"');
        }
    }
    out.push('\n');
}

/// Adapter delegating to the driver's native encodings per variant
#[derive(Debug)]
struct PgValue<'a>(&'a Value);

impl ToSql for PgValue<'_> {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => v.to_sql(ty, out),
            Value::Float(v) => v.to_sql(ty, out),
            Value::Text(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
        }
    }

    // Values are cast to their column types before flush; trust that here
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_csv_null_is_unquoted_empty() {
        let mut line = String::new();
        write_csv_row(&mut line, &[Value::Int(1), Value::Null, Value::Text("x".into())]);
        assert_eq!(line, "\"1\",,\"x\"\n");
    }

    #[test]
    fn test_csv_escapes_quotes_and_keeps_newlines() {
        let mut line = String::new();
        write_csv_row(&mut line, &[Value::Text("say \"hi\"\nthere".into())]);
        assert_eq!(line, "\"say \"\"hi\"\"\nthere\"\n");
    }

    #[test]
    fn test_csv_uuid_and_bool_rendering() {
        let id = Uuid::from_u128(5);
        let mut line = String::new();
        write_csv_row(&mut line, &[Value::Uuid(id), Value::Bool(false)]);
        assert_eq!(line, format!("\"{id}\",\"f\"\n"));
    }
}
