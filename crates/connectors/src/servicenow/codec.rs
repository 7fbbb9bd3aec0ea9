use crate::{
    http::HttpMethod,
    servicenow::{error::SchemaError, row_path, table_path},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use model::records::row::{ROW_ID_FIELD, RowData};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// How records are written to the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Always create rows; any identifier on the record is ignored.
    #[default]
    Insert,
    /// Update existing rows; every record must carry its identifier.
    Update,
    /// Update when the record carries an identifier, insert otherwise.
    Upsert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    pub name: String,
    pub value: String,
}

/// One sub-request of a batch call. The id is generated once and survives
/// every retry round so outcomes correlate back to the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteEnvelope {
    pub id: String,
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<RequestHeader>,
    /// Base64-encoded JSON payload.
    pub body: String,
    pub exclude_response_headers: bool,
}

impl WriteEnvelope {
    pub fn decode_body(&self) -> Result<Value, SchemaError> {
        let text = decode_text(&self.body)?;
        Ok(serde_json::from_str(&text)?)
    }
}

pub struct RequestCodec {
    table: String,
    mode: WriteMode,
}

impl RequestCodec {
    pub fn new(table: &str, mode: WriteMode) -> Self {
        RequestCodec {
            table: table.to_string(),
            mode,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn encode(&self, record: &RowData) -> Result<WriteEnvelope, SchemaError> {
        let row_id = record.row_id();

        let (method, url, payload) = match (self.mode, row_id) {
            (WriteMode::Insert, _) | (WriteMode::Upsert, None) => (
                HttpMethod::Post,
                table_path(&self.table),
                without_identifier(&record.fields),
            ),
            (WriteMode::Update, Some(id)) | (WriteMode::Upsert, Some(id)) => (
                HttpMethod::Put,
                row_path(&self.table, id),
                record.fields.clone(),
            ),
            (WriteMode::Update, None) => {
                return Err(SchemaError::MissingIdentifier {
                    table: self.table.clone(),
                    field: ROW_ID_FIELD.to_string(),
                });
            }
        };

        Ok(WriteEnvelope {
            id: Uuid::new_v4().to_string(),
            url,
            method,
            headers: json_headers(),
            body: encode_body(&Value::Object(payload))?,
            exclude_response_headers: true,
        })
    }
}

fn without_identifier(fields: &Map<String, Value>) -> Map<String, Value> {
    fields
        .iter()
        .filter(|(name, _)| name.as_str() != ROW_ID_FIELD)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn json_headers() -> Vec<RequestHeader> {
    ["Content-Type", "Accept"]
        .into_iter()
        .map(|name| RequestHeader {
            name: name.to_string(),
            value: "application/json".to_string(),
        })
        .collect()
}

pub fn encode_body(payload: &Value) -> Result<String, SchemaError> {
    Ok(STANDARD.encode(serde_json::to_vec(payload)?))
}

/// Decodes a base64 body into text.
pub fn decode_text(encoded: &str) -> Result<String, SchemaError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| SchemaError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SchemaError::Decode(e.to_string()))
}
