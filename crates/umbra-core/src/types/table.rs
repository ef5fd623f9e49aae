use super::value::{ColumnType, Value};
use serde::{Deserialize, Serialize};

/// A column of a managed view table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: ColumnType,

    /// Value merged into newly created records when the column is absent
    #[serde(default)]
    pub default: Option<Value>,
}

/// Shape of a view table managed by a projector
///
/// Declares the columns the replay persistor buffers and flushes, plus the
/// column tuples that get an in-memory lookup index during replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnSpec>,

    /// Column tuples to index during replay. When empty, `[aggregate_id]`
    /// is indexed if such a column exists.
    #[serde(default)]
    pub indexes: Vec<Vec<String>>,
}

impl TableSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            ty,
            default: None,
        });
        self
    }

    pub fn column_with_default(
        mut self,
        name: impl Into<String>,
        ty: ColumnType,
        default: Value,
    ) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            ty,
            default: Some(default),
        });
        self
    }

    pub fn index(mut self, columns: &[&str]) -> Self {
        self.indexes
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Indexed tuples, with the implicit `[aggregate_id]` default applied
    pub fn effective_indexes(&self) -> Vec<Vec<String>> {
        if !self.indexes.is_empty() {
            return self.indexes.clone();
        }
        if self.has_column("aggregate_id") {
            vec![vec!["aggregate_id".to_string()]]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_index_on_aggregate_id() {
        let spec = TableSpec::new("accounts")
            .column("aggregate_id", ColumnType::Uuid)
            .column("balance", ColumnType::BigInt);
        assert_eq!(spec.effective_indexes(), vec![vec!["aggregate_id".to_string()]]);

        let spec = TableSpec::new("totals").column("day", ColumnType::Text);
        assert!(spec.effective_indexes().is_empty());

        let spec = TableSpec::new("accounts")
            .column("aggregate_id", ColumnType::Uuid)
            .column("owner", ColumnType::Text)
            .index(&["owner"]);
        assert_eq!(spec.effective_indexes(), vec![vec!["owner".to_string()]]);
    }
}
