#![forbid(unsafe_code)]

//! Scripted gateway.

use std::collections::{BTreeMap, VecDeque};

use tweb_runtime::{Gateway, GatewayError, RemoteRequest};

/// Answers calls from per-endpoint queues.
///
/// An endpoint with nothing queued answers with an empty payload.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    replies: BTreeMap<String, VecDeque<Result<String, GatewayError>>>,
    requests: Vec<RemoteRequest>,
}

impl ScriptedGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply payload for the next call to `endpoint`.
    pub fn respond(&mut self, endpoint: &str, payload: impl Into<String>) -> &mut Self {
        self.replies
            .entry(endpoint.to_string())
            .or_default()
            .push_back(Ok(payload.into()));
        self
    }

    /// Queue a transport failure for the next call to `endpoint`.
    pub fn fail(&mut self, endpoint: &str, error: GatewayError) -> &mut Self {
        self.replies
            .entry(endpoint.to_string())
            .or_default()
            .push_back(Err(error));
        self
    }

    /// Every request seen, oldest first.
    #[must_use]
    pub fn requests(&self) -> &[RemoteRequest] {
        &self.requests
    }

    /// Requests whose endpoint is `endpoint`.
    pub fn requests_to<'a>(&'a self, endpoint: &'a str) -> impl Iterator<Item = &'a RemoteRequest> {
        self.requests
            .iter()
            .filter(move |r| r.call.endpoint == endpoint)
    }

    /// Forget recorded requests, keeping queued replies.
    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    /// Replies queued but never consumed.
    #[must_use]
    pub fn unconsumed(&self) -> usize {
        self.replies.values().map(VecDeque::len).sum()
    }
}

impl Gateway for ScriptedGateway {
    fn call(&mut self, request: &RemoteRequest) -> Result<String, GatewayError> {
        self.requests.push(request.clone());
        self.replies
            .get_mut(&request.call.endpoint)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(String::new()))
    }
}
