#![allow(dead_code)]

use connectors::{
    http::{HttpRequest, HttpResponse, RequestBody, mock::MockTransport},
    servicenow::codec::encode_body,
};
use model::records::row::RowData;
use serde_json::{Value, json};

pub const ACL_DENIAL_DETAIL: &str = "ACL Exception Insert Failed due to security constraints";
pub const BUDGET_MESSAGE: &str = "Transaction cancelled: maximum execution time exceeded";

/// `{"result": [...]}` holding `count` user rows numbered from `from`.
pub fn user_rows(from: usize, count: usize) -> Value {
    let result: Vec<Value> = (from..from + count)
        .map(|i| {
            json!({
                "sys_id": format!("{i:032x}"),
                "user_name": format!("user.{i}"),
                "active": "true",
            })
        })
        .collect();
    json!({ "result": result })
}

pub fn failure_body(message: &str, detail: &str) -> Value {
    json!({ "status": "failure", "error": { "message": message, "detail": detail } })
}

/// Scripts the one-row schema probe and the record-count read of a table.
pub fn script_table_prelude(transport: &MockTransport, total: usize) {
    transport.push_json(200, user_rows(0, 1));
    transport.push_reply(Ok(HttpResponse::new(200, user_rows(0, 1).to_string())
        .with_header("X-Total-Count", &total.to_string())));
}

pub fn incident(description: &str) -> RowData {
    let mut row = RowData::default();
    row.insert("short_description", json!(description));
    row.insert("urgency", json!("2"));
    row
}

/// Sub-request ids of a recorded batch call, in submission order.
pub fn batch_request_ids(request: &HttpRequest) -> Vec<String> {
    match &request.body {
        RequestBody::Json(body) => body["rest_requests"]
            .as_array()
            .map(|requests| {
                requests
                    .iter()
                    .filter_map(|r| r["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

pub fn serviced(id: &str, status: u16, body: &Value) -> Value {
    json!({ "id": id, "status_code": status, "body": encode_body(body).expect("encodable body") })
}

pub fn created(id: &str) -> Value {
    serviced(id, 201, &json!({ "result": { "sys_id": id } }))
}

pub fn batch_response(serviced: Vec<Value>, unserviced: Vec<String>) -> HttpResponse {
    let body = json!({
        "batch_request_id": "response",
        "serviced_requests": serviced,
        "unserviced_requests": unserviced,
    });
    HttpResponse::new(200, body.to_string())
}
