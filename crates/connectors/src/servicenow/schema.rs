use model::records::row::RowData;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which path a schema probe serves; the write path also consults table metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePurpose {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    String,
    Integer,
    Decimal,
    Boolean,
    DateTime,
    Reference,
    Unknown,
}

impl ColumnKind {
    /// Best guess from the JSON shape of a sampled value.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(_) => ColumnKind::String,
            Value::Number(n) if n.is_i64() || n.is_u64() => ColumnKind::Integer,
            Value::Number(_) => ColumnKind::Decimal,
            Value::Bool(_) => ColumnKind::Boolean,
            Value::Object(_) => ColumnKind::Reference,
            Value::Null | Value::Array(_) => ColumnKind::Unknown,
        }
    }

    pub fn from_internal_type(internal_type: &str) -> Self {
        match internal_type.to_ascii_lowercase().as_str() {
            "integer" | "longint" | "count" => ColumnKind::Integer,
            "decimal" | "float" | "currency" | "price" | "percent_complete" => ColumnKind::Decimal,
            "boolean" => ColumnKind::Boolean,
            "glide_date_time" | "glide_date" | "due_date" | "calendar_date_time" => {
                ColumnKind::DateTime
            }
            "reference" | "document_id" => ColumnKind::Reference,
            "string" | "guid" | "sys_class_name" | "journal" | "journal_input" | "html"
            | "choice" | "translated_text" | "url" | "email" => ColumnKind::String,
            _ => ColumnKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColumnSource {
    Probe,
    Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    pub kind: ColumnKind,
    pub ordinal: usize,
    pub source: ColumnSource,
}

/// One entry of the table-schema metadata response.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataColumn {
    #[serde(alias = "value", alias = "element")]
    pub name: String,
    #[serde(default, alias = "type")]
    pub internal_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MetadataResponse {
    #[serde(default)]
    pub result: Vec<MetadataColumn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnMetadata>,
}

impl TableSchema {
    /// Column names and kinds from a sampled row; an empty table gives no columns.
    pub fn from_probe(table: &str, sample: Option<&RowData>) -> Self {
        let columns = sample
            .map(|row| {
                row.fields
                    .iter()
                    .enumerate()
                    .map(|(ordinal, (name, value))| ColumnMetadata {
                        name: name.clone(),
                        kind: ColumnKind::from_value(value),
                        ordinal,
                        source: ColumnSource::Probe,
                    })
                    .collect()
            })
            .unwrap_or_default();

        TableSchema {
            table: table.to_string(),
            columns,
        }
    }

    /// Metadata types override probed guesses; unseen columns are appended.
    pub fn merge_metadata(&mut self, entries: Vec<MetadataColumn>) {
        for entry in entries {
            let kind = entry
                .internal_type
                .as_deref()
                .map(ColumnKind::from_internal_type)
                .unwrap_or(ColumnKind::Unknown);

            match self.columns.iter_mut().find(|c| c.name == entry.name) {
                Some(column) => {
                    if kind != ColumnKind::Unknown {
                        column.kind = kind;
                    }
                    column.source = ColumnSource::Metadata;
                }
                None => {
                    let ordinal = self.columns.len();
                    self.columns.push(ColumnMetadata {
                        name: entry.name,
                        kind,
                        ordinal,
                        source: ColumnSource::Metadata,
                    });
                }
            }
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> RowData {
        match json!({
            "sys_id": "6816f79cc0a8016401c5a33be04be441",
            "active": true,
            "priority": 3,
            "caller_id": { "value": "abc", "display_value": "Abel Tuter" },
            "closed_at": null
        }) {
            Value::Object(fields) => RowData::new("incident", fields),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_probe_infers_kinds_from_values() {
        let schema = TableSchema::from_probe("incident", Some(&sample()));
        assert_eq!(
            schema.column_names(),
            vec!["sys_id", "active", "priority", "caller_id", "closed_at"]
        );
        assert_eq!(schema.column("active").unwrap().kind, ColumnKind::Boolean);
        assert_eq!(schema.column("priority").unwrap().kind, ColumnKind::Integer);
        assert_eq!(schema.column("caller_id").unwrap().kind, ColumnKind::Reference);
        assert_eq!(schema.column("closed_at").unwrap().kind, ColumnKind::Unknown);
    }

    #[test]
    fn test_probe_of_empty_table_has_no_columns() {
        assert!(TableSchema::from_probe("incident", None).is_empty());
    }

    #[test]
    fn test_metadata_overrides_and_extends_probe() {
        let mut schema = TableSchema::from_probe("incident", Some(&sample()));
        schema.merge_metadata(vec![
            MetadataColumn {
                name: "closed_at".to_string(),
                internal_type: Some("glide_date_time".to_string()),
            },
            MetadataColumn {
                name: "short_description".to_string(),
                internal_type: Some("string".to_string()),
            },
        ]);

        let closed = schema.column("closed_at").unwrap();
        assert_eq!(closed.kind, ColumnKind::DateTime);
        assert_eq!(closed.source, ColumnSource::Metadata);

        let added = schema.column("short_description").unwrap();
        assert_eq!(added.ordinal, 5);
        assert_eq!(added.kind, ColumnKind::String);
    }
}
