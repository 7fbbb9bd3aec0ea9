use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field every table row is keyed by on the service side.
pub const ROW_ID_FIELD: &str = "sys_id";

/// A single table row as exchanged with the table API: string keys mapped to
/// loosely typed JSON values, in the order the service returned them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowData {
    pub entity: String,
    pub fields: Map<String, Value>,
}

impl RowData {
    pub fn new(entity: &str, fields: Map<String, Value>) -> Self {
        RowData {
            entity: entity.to_string(),
            fields,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn insert(&mut self, field: &str, value: Value) {
        self.fields.insert(field.to_string(), value);
    }

    /// Returns the row identifier when it is present and non-empty.
    pub fn row_id(&self) -> Option<&str> {
        self.get_str(ROW_ID_FIELD).filter(|id| !id.trim().is_empty())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn size_bytes(&self) -> usize {
        serde_json::to_vec(&self.fields)
            .map(|bytes| bytes.len())
            .unwrap_or(0)
    }
}
