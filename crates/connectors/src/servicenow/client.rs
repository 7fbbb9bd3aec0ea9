use crate::{
    http::{HttpRequest, HttpResponse, HttpTransport, TransportError},
    retry::RetryPolicy,
    servicenow::{
        ServiceEndpoint,
        auth::{Credentials, TokenProvider},
        error::AuthError,
    },
};
use std::sync::Arc;

/// Endpoint, transport and token provider shared by the read and write paths.
#[derive(Clone)]
pub struct ServiceClient {
    endpoint: ServiceEndpoint,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenProvider>,
}

impl ServiceClient {
    pub fn new(
        endpoint: ServiceEndpoint,
        credentials: Credentials,
        transport: Arc<dyn HttpTransport>,
        auth_retry: RetryPolicy,
    ) -> Self {
        let tokens = TokenProvider::new(endpoint.clone(), credentials, transport.clone())
            .with_retry(auth_retry);
        ServiceClient {
            endpoint,
            transport,
            tokens: Arc::new(tokens),
        }
    }

    pub fn endpoint(&self) -> &ServiceEndpoint {
        &self.endpoint
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    /// Attaches a freshly acquired bearer token. Tokens are never reused.
    pub async fn authorize(&self, request: HttpRequest) -> Result<HttpRequest, AuthError> {
        let token = self.tokens.acquire_with_retry().await?;
        Ok(request.bearer(token.as_str()))
    }

    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.transport.send(request).await
    }
}
