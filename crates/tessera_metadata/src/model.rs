use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub generated: bool,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            primary_key: false,
            generated: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
    #[serde(default)]
    pub indexes: Vec<IndexMetadata>,
}

impl TableMetadata {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnMetadata>) -> Self {
        Self {
            name: name.into(),
            columns,
            indexes: Vec::new(),
        }
    }

    pub fn with_indexes(mut self, indexes: Vec<IndexMetadata>) -> Self {
        self.indexes = indexes;
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The same metadata under `logic_name`. Index names carrying the
    /// `_<actual table>` suffix the rewriter appends lose it.
    pub fn into_logic(mut self, logic_name: &str) -> Self {
        let suffix = format!("_{}", self.name);
        for index in &mut self.indexes {
            if let Some(stripped) = index.name.strip_suffix(&suffix) {
                if !stripped.is_empty() {
                    index.name = stripped.to_string();
                }
            }
        }
        self.name = logic_name.to_string();
        self
    }
}

/// Logic tables of one schema, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    pub name: String,
    pub tables: IndexMap<String, TableMetadata>,
}

impl SchemaMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: IndexMap::new(),
        }
    }

    pub fn table(&self, logic_table: &str) -> Option<&TableMetadata> {
        self.tables.get(&logic_table.to_ascii_lowercase())
    }

    pub fn insert(&mut self, table: TableMetadata) {
        self.tables.insert(table.name.to_ascii_lowercase(), table);
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
