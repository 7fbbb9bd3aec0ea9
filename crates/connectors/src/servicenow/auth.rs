use crate::{
    http::{HttpRequest, HttpTransport},
    retry::{RetryDisposition, RetryError, RetryPolicy},
    servicenow::{ServiceEndpoint, error::AuthError},
};
use serde::Deserialize;
use std::{fmt, sync::Arc};
use tracing::{debug, warn};

/// Resource-owner password credentials for one instance.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Opaque bearer token. Acquired per operation and never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

#[derive(Deserialize, Default)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

pub struct TokenProvider {
    endpoint: ServiceEndpoint,
    credentials: Credentials,
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
}

impl TokenProvider {
    pub fn new(
        endpoint: ServiceEndpoint,
        credentials: Credentials,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        TokenProvider {
            endpoint,
            credentials,
            transport,
            retry: RetryPolicy::for_auth(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Exchanges the credentials for a bearer token with a password grant.
    pub async fn acquire(&self) -> Result<AccessToken, AuthError> {
        let form = vec![
            ("grant_type".to_string(), "password".to_string()),
            ("client_id".to_string(), self.credentials.client_id.clone()),
            (
                "client_secret".to_string(),
                self.credentials.client_secret.clone(),
            ),
            ("username".to_string(), self.credentials.username.clone()),
            ("password".to_string(), self.credentials.password.clone()),
        ];

        debug!("Requesting access token for user '{}'", self.credentials.username);

        let response = self
            .transport
            .send(HttpRequest::post_form(self.endpoint.token_url(), form))
            .await?;

        if response.is_success() {
            let parsed: TokenResponse = serde_json::from_str(&response.body)
                .map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
            return match parsed.access_token {
                Some(token) if !token.is_empty() => Ok(AccessToken(token)),
                _ => Err(AuthError::InvalidResponse(
                    "response carries no access_token".to_string(),
                )),
            };
        }

        if response.status == 429 || response.status >= 500 {
            return Err(AuthError::Unavailable {
                status: response.status,
                body: response.body,
            });
        }

        let body: TokenErrorBody = serde_json::from_str(&response.body).unwrap_or_default();
        Err(AuthError::Rejected {
            status: response.status,
            error: body.error.unwrap_or_else(|| "unknown_error".to_string()),
            description: body.error_description.unwrap_or_default(),
        })
    }

    /// Retries transient failures only; rejected credentials fail on the first attempt.
    pub async fn acquire_with_retry(&self) -> Result<AccessToken, AuthError> {
        let result = self
            .retry
            .run(
                || self.acquire(),
                |err: &AuthError| {
                    if err.is_transient() {
                        RetryDisposition::Retry
                    } else {
                        RetryDisposition::Stop
                    }
                },
            )
            .await;

        match result {
            Ok(token) => Ok(token),
            Err(RetryError::Fatal(err)) => Err(err),
            Err(RetryError::AttemptsExceeded { attempts, last }) => {
                warn!("Giving up on token acquisition after {} attempts", attempts);
                Err(AuthError::Exhausted {
                    attempts,
                    last: Box::new(last),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{
        HttpResponse, RequestBody, TransportError,
        mock::{MOCK_TOKEN, MockTransport},
    };
    use serde_json::json;
    use std::time::Duration;

    fn credentials() -> Credentials {
        Credentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        }
    }

    fn provider(transport: Arc<MockTransport>) -> TokenProvider {
        TokenProvider::new(
            ServiceEndpoint::new("https://dev.service-now.com"),
            credentials(),
            transport,
        )
        .with_retry(RetryPolicy::fixed(5, Duration::ZERO))
    }

    #[tokio::test]
    async fn test_acquire_sends_password_grant() {
        let transport = Arc::new(MockTransport::new());
        let token = provider(transport.clone()).acquire().await.unwrap();
        assert_eq!(token.as_str(), MOCK_TOKEN);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://dev.service-now.com/oauth_token.do");
        match &requests[0].body {
            RequestBody::Form(fields) => {
                assert!(fields.contains(&("grant_type".to_string(), "password".to_string())));
                assert!(fields.contains(&("username".to_string(), "admin".to_string())));
                assert!(fields.contains(&("client_secret".to_string(), "secret".to_string())));
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejected_credentials_fail_fast() {
        let transport = Arc::new(MockTransport::new());
        transport.push_token_reply(Ok(HttpResponse::new(
            401,
            json!({ "error": "access_denied", "error_description": "Invalid credentials" })
                .to_string(),
        )));

        let err = provider(transport.clone())
            .acquire_with_retry()
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Rejected { status: 401, .. }));
        assert_eq!(transport.token_requests(), 1);
    }

    #[tokio::test]
    async fn test_transport_failures_are_retried() {
        let transport = Arc::new(MockTransport::new());
        transport
            .push_token_reply(Err(TransportError::Connection("reset".to_string())))
            .push_token_reply(Ok(HttpResponse::new(503, "maintenance")));

        let token = provider(transport.clone())
            .acquire_with_retry()
            .await
            .unwrap();

        assert_eq!(token.as_str(), MOCK_TOKEN);
        assert_eq!(transport.token_requests(), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_is_reported() {
        let transport = Arc::new(MockTransport::new());
        for _ in 0..5 {
            transport.push_token_reply(Err(TransportError::Connection("down".to_string())));
        }

        let err = provider(transport.clone())
            .acquire_with_retry()
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Exhausted { attempts: 5, .. }));
        assert_eq!(transport.token_requests(), 5);
    }

    #[tokio::test]
    async fn test_success_without_token_is_invalid() {
        let transport = Arc::new(MockTransport::new());
        transport.push_token_reply(Ok(HttpResponse::new(200, "{}")));

        let err = provider(transport).acquire_with_retry().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("admin"));
    }
}
