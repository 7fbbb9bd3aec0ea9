use crate::{
    connectors::{sink::BatchedWriter, source::TableReader},
    error::EngineError,
    metrics::Metrics,
};
use connectors::{
    http::{HttpTransport, ReqwestTransport},
    servicenow::{
        batch::BatchWriteCoordinator,
        client::ServiceClient,
        codec::{WriteEnvelope, WriteMode},
        error::BatchError,
        fetcher::PageFetcher,
    },
};
use engine_config::settings::ServiceSettings;
use model::pagination::window::DateRange;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Immutable settings plus the client built from them. Cloned into every
/// reader and writer instead of being looked up from shared state.
#[derive(Clone)]
pub struct ServiceContext {
    settings: Arc<ServiceSettings>,
    client: ServiceClient,
    metrics: Metrics,
    pub run_id: String,
}

impl ServiceContext {
    pub fn new(settings: Arc<ServiceSettings>) -> Result<Self, EngineError> {
        let transport = ReqwestTransport::new(settings.request_timeout())?;
        Self::with_transport(settings, Arc::new(transport))
    }

    pub fn with_transport(
        settings: Arc<ServiceSettings>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, EngineError> {
        settings.validate()?;

        let client = ServiceClient::new(
            settings.service_endpoint(),
            settings.credentials(),
            transport,
            settings.retry.auth.policy(),
        );
        let run_id = format!("run-{}", Uuid::new_v4().simple());

        info!(
            run_id = %run_id,
            endpoint = %client.endpoint().base_url(),
            "Service context ready"
        );

        Ok(ServiceContext {
            settings,
            client,
            metrics: Metrics::new(),
            run_id,
        })
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn fetcher(&self) -> PageFetcher {
        PageFetcher::new(self.client.clone(), self.settings.value_type)
            .with_retry(self.settings.retry.fetch.policy())
    }

    pub fn coordinator(
        &self,
        table: &str,
        envelopes: Vec<WriteEnvelope>,
    ) -> Result<BatchWriteCoordinator, BatchError> {
        Ok(
            BatchWriteCoordinator::new(self.client.clone(), table, envelopes)?
                .with_retry(self.settings.retry.batch.policy())
                .with_max_rounds(self.settings.max_batch_rounds),
        )
    }

    pub fn reader(&self, table: &str, range: Option<DateRange>) -> TableReader {
        TableReader::new(
            self.fetcher(),
            table,
            range,
            self.settings.page_size,
            self.metrics.clone(),
        )
    }

    pub fn writer(&self, table: &str, mode: WriteMode) -> BatchedWriter {
        BatchedWriter::new(self.clone(), table, mode)
    }
}
