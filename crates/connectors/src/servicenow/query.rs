use crate::servicenow::ServiceEndpoint;
use model::pagination::window::{DateRange, FetchWindow};
use serde::{Deserialize, Serialize};

const CREATED_FIELD: &str = "sys_created_on";
const UPDATED_FIELD: &str = "sys_updated_on";

/// Which representation of field values the table API returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayValue {
    /// Raw database values.
    #[default]
    Actual,
    /// Human-readable display values.
    Display,
    /// Both, as `{ "value", "display_value" }` objects.
    All,
}

impl DisplayValue {
    pub fn as_param(&self) -> &'static str {
        match self {
            DisplayValue::Actual => "false",
            DisplayValue::Display => "true",
            DisplayValue::All => "all",
        }
    }
}

/// Encoded query matching rows created or updated inside `[start, end)`.
///
/// `^NQ` joins two query blocks with OR; each block bounds one timestamp.
pub fn date_filter(range: &DateRange) -> String {
    let start = range.start.format("%Y-%m-%d");
    let end = range.end.format("%Y-%m-%d");
    let block = |field: &str| {
        format!(
            "{field}>=javascript:gs.dateGenerate('{start}','00:00:00')^{field}<javascript:gs.dateGenerate('{end}','00:00:00')"
        )
    };
    format!("{}^NQ{}", block(CREATED_FIELD), block(UPDATED_FIELD))
}

pub fn table_read_url(
    endpoint: &ServiceEndpoint,
    window: &FetchWindow,
    display_value: DisplayValue,
) -> String {
    let mut url = format!(
        "{}?sysparm_offset={}&sysparm_limit={}&sysparm_display_value={}&sysparm_exclude_reference_link=true",
        endpoint.table_url(&window.table),
        window.offset,
        window.limit,
        display_value.as_param(),
    );

    if let Some(range) = &window.range {
        url.push_str("&sysparm_query=");
        url.push_str(&urlencoding::encode(&date_filter(range)));
    }

    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_date_filter_ors_created_and_updated() {
        assert_eq!(
            date_filter(&range()),
            "sys_created_on>=javascript:gs.dateGenerate('2024-01-01','00:00:00')\
             ^sys_created_on<javascript:gs.dateGenerate('2024-02-01','00:00:00')\
             ^NQsys_updated_on>=javascript:gs.dateGenerate('2024-01-01','00:00:00')\
             ^sys_updated_on<javascript:gs.dateGenerate('2024-02-01','00:00:00')"
        );
    }

    #[test]
    fn test_read_url_without_window_has_no_query() {
        let endpoint = ServiceEndpoint::new("https://dev.service-now.com");
        let url = table_read_url(
            &endpoint,
            &FetchWindow::new("sys_user", 5000, 5000),
            DisplayValue::Actual,
        );
        assert_eq!(
            url,
            "https://dev.service-now.com/api/now/table/sys_user?sysparm_offset=5000&sysparm_limit=5000\
             &sysparm_display_value=false&sysparm_exclude_reference_link=true"
        );
    }

    #[test]
    fn test_read_url_encodes_date_query() {
        let endpoint = ServiceEndpoint::new("https://dev.service-now.com");
        let window = FetchWindow::new("incident", 0, 10).with_range(Some(range()));
        let url = table_read_url(&endpoint, &window, DisplayValue::All);

        assert!(url.contains("sysparm_display_value=all"));
        let query = url.split("&sysparm_query=").nth(1).unwrap();
        assert!(!query.contains('^'));
        assert!(!query.contains('\''));
        assert_eq!(
            urlencoding::decode(query).unwrap(),
            date_filter(&range())
        );
    }
}
