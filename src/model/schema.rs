use std::collections::HashMap;

use crate::value::CanonicalType;

/// The language-neutral type class the coercion logic needs; one-to-one
/// with the canonical SQL type vocabulary used by casts (§4.1/Glossary).
pub type DataClass = CanonicalType;

/// One resolved column: its real name, the backend's declared SQL type
/// name (used verbatim in the `/schema` response), and the data class used
/// to coerce bound values when no explicit `cast_type` is given.
#[derive(Debug, Clone)]
pub struct ColumnHandle {
    pub name: String,
    pub sql_type: String,
    pub data_class: DataClass,
}

/// Ordered, case-insensitive `column_name -> ColumnHandle` map cached per
/// `(descriptor, table)` pair (§4.3).
#[derive(Debug, Clone, Default)]
pub struct SchemaMap {
    columns: Vec<ColumnHandle>,
    index: HashMap<String, usize>,
}

impl SchemaMap {
    pub fn new(columns: Vec<ColumnHandle>) -> Self {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, col) in columns.iter().enumerate() {
            index.insert(col.name.to_ascii_lowercase(), i);
        }
        Self { columns, index }
    }

    pub fn get(&self, column_name: &str) -> Option<&ColumnHandle> {
        self.index
            .get(&column_name.to_ascii_lowercase())
            .map(|&i| &self.columns[i])
    }

    pub fn contains(&self, column_name: &str) -> bool {
        self.index.contains_key(&column_name.to_ascii_lowercase())
    }

    pub fn columns(&self) -> &[ColumnHandle] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
