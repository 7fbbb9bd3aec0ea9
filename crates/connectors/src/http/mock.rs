//! Scripted in-memory transport for exercising the client without a network.

use crate::{
    http::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError},
    servicenow::OAUTH_PATH,
};
use async_trait::async_trait;
use serde_json::json;
use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

pub const MOCK_TOKEN: &str = "mock-access-token";

pub type MockReply = Result<HttpResponse, TransportError>;

type Handler = Box<dyn FnOnce(&HttpRequest) -> MockReply + Send>;

enum Scripted {
    Reply(MockReply),
    /// Builds the reply from the request, for replies that echo request ids.
    Handler(Handler),
}

/// Answers the OAuth endpoint with [`MOCK_TOKEN`] unless token replies were
/// queued, and serves every other request from the scripted queue in order.
/// Every request is recorded.
#[derive(Default)]
pub struct MockTransport {
    token_replies: Mutex<VecDeque<MockReply>>,
    replies: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_token_reply(&self, reply: MockReply) -> &Self {
        guard(&self.token_replies).push_back(reply);
        self
    }

    pub fn push_reply(&self, reply: MockReply) -> &Self {
        guard(&self.replies).push_back(Scripted::Reply(reply));
        self
    }

    pub fn push_handler<F>(&self, handler: F) -> &Self
    where
        F: FnOnce(&HttpRequest) -> MockReply + Send + 'static,
    {
        guard(&self.replies).push_back(Scripted::Handler(Box::new(handler)));
        self
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push_reply(Ok(HttpResponse::new(status, body.to_string())))
    }

    /// Every recorded request, token exchanges included.
    pub fn requests(&self) -> Vec<HttpRequest> {
        guard(&self.requests).clone()
    }

    /// Recorded requests excluding token exchanges.
    pub fn service_requests(&self) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| !r.url.ends_with(OAUTH_PATH))
            .collect()
    }

    pub fn token_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.url.ends_with(OAUTH_PATH))
            .count()
    }

    pub fn remaining_replies(&self) -> usize {
        guard(&self.replies).len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let is_token = request.url.ends_with(OAUTH_PATH);
        guard(&self.requests).push(request.clone());

        if is_token {
            return guard(&self.token_replies).pop_front().unwrap_or_else(|| {
                Ok(HttpResponse::new(
                    200,
                    json!({ "access_token": MOCK_TOKEN, "token_type": "Bearer" }).to_string(),
                ))
            });
        }

        let next = guard(&self.replies).pop_front();
        match next {
            Some(Scripted::Reply(reply)) => reply,
            Some(Scripted::Handler(handler)) => handler(&request),
            None => Err(TransportError::Connection(format!(
                "no scripted reply for {}",
                request.url
            ))),
        }
    }
}
