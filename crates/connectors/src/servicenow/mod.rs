//! Client for the table and batch REST APIs of a ServiceNow instance.

pub mod auth;
pub mod batch;
pub mod classifier;
pub mod client;
pub mod codec;
pub mod error;
pub mod fetcher;
pub mod query;
pub mod schema;

pub const OAUTH_PATH: &str = "/oauth_token.do";
pub const TABLE_API_PATH: &str = "/api/now/table";
pub const BATCH_API_PATH: &str = "/api/now/v1/batch";
pub const TABLE_SCHEMA_PATH: &str = "/api/now/doc/table/schema";
pub const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

/// Base URL of one instance; every endpoint is derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    base_url: String,
}

impl ServiceEndpoint {
    pub fn new(base_url: &str) -> Self {
        ServiceEndpoint {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token_url(&self) -> String {
        format!("{}{OAUTH_PATH}", self.base_url)
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}{}", self.base_url, table_path(table))
    }

    pub fn batch_url(&self) -> String {
        format!("{}{BATCH_API_PATH}", self.base_url)
    }

    pub fn table_schema_url(&self, table: &str) -> String {
        format!(
            "{}{TABLE_SCHEMA_PATH}/{}",
            self.base_url,
            urlencoding::encode(table)
        )
    }
}

/// Instance-relative path of a table's collection resource.
pub fn table_path(table: &str) -> String {
    format!("{TABLE_API_PATH}/{}", urlencoding::encode(table))
}

/// Instance-relative path of a single row.
pub fn row_path(table: &str, row_id: &str) -> String {
    format!("{}/{}", table_path(table), urlencoding::encode(row_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_urls_derive_from_base() {
        let endpoint = ServiceEndpoint::new("https://dev1234.service-now.com/");
        assert_eq!(
            endpoint.token_url(),
            "https://dev1234.service-now.com/oauth_token.do"
        );
        assert_eq!(
            endpoint.table_url("incident"),
            "https://dev1234.service-now.com/api/now/table/incident"
        );
        assert_eq!(
            endpoint.batch_url(),
            "https://dev1234.service-now.com/api/now/v1/batch"
        );
        assert_eq!(
            endpoint.table_schema_url("incident"),
            "https://dev1234.service-now.com/api/now/doc/table/schema/incident"
        );
    }

    #[test]
    fn test_path_segments_are_encoded() {
        let endpoint = ServiceEndpoint::new("https://dev1234.service-now.com");
        assert_eq!(
            endpoint.table_url("x_app/table?"),
            "https://dev1234.service-now.com/api/now/table/x_app%2Ftable%3F"
        );
        assert_eq!(
            endpoint.table_schema_url("u table"),
            "https://dev1234.service-now.com/api/now/doc/table/schema/u%20table"
        );
        assert_eq!(
            row_path("incident", "../sys_user#1"),
            "/api/now/table/incident/..%2Fsys_user%231"
        );
    }
}
