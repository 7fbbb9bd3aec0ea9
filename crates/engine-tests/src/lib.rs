#![allow(dead_code)]

use connectors::http::mock::MockTransport;
use engine_config::settings::{ServiceSettings, retry::RetrySettings};
use engine_core::context::exec::ServiceContext;
use std::sync::Arc;

pub mod utils;

const TEST_ENDPOINT: &str = "https://dev12345.service-now.com";

/// Valid settings with every retry delay set to zero.
fn test_settings() -> ServiceSettings {
    ServiceSettings {
        endpoint: TEST_ENDPOINT.to_string(),
        client_id: "client".to_string(),
        client_secret: "s3cret".to_string(),
        username: "integration".to_string(),
        password: "hunter2".to_string(),
        retry: RetrySettings::immediate(),
        ..ServiceSettings::default()
    }
}

fn test_context(settings: ServiceSettings) -> (ServiceContext, Arc<MockTransport>) {
    let transport = Arc::new(MockTransport::new());
    let ctx = ServiceContext::with_transport(Arc::new(settings), transport.clone())
        .expect("valid test settings");
    (ctx, transport)
}
