// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Scripted and relaying transports for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::transport::{Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Read,
    Write,
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

type Handler =
    dyn Fn(Method, &str, Option<&Value>) -> Result<Option<Value>, TransportError> + Send + Sync;

/// Answers requests from one-shot queued reads first, then from a handler.
/// Every request is recorded.
pub(crate) struct ScriptedTransport {
    handler: Box<Handler>,
    queued_reads: Mutex<HashMap<String, VecDeque<Value>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(Method, &str, Option<&Value>) -> Result<Option<Value>, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            queued_reads: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Queues `value` as the answer to the next read of `path`.
    pub fn push_read(&self, path: &str, value: Value) {
        self.queued_reads
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(value);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Body of the most recent write to `path`.
    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|c| c.method == Method::Write && c.path == path)
            .and_then(|c| c.body.clone())
    }

    fn record(&self, method: Method, path: &str, body: Option<Value>) {
        self.calls.lock().push(Call {
            method,
            path: path.to_string(),
            body,
        });
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn read(&self, path: &str) -> Result<Option<Value>, TransportError> {
        self.record(Method::Read, path, None);
        let queued = self
            .queued_reads
            .lock()
            .get_mut(path)
            .and_then(|queue| queue.pop_front());
        match queued {
            Some(value) => Ok(Some(value)),
            None => (self.handler)(Method::Read, path, None),
        }
    }

    async fn write(
        &self,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, TransportError> {
        self.record(Method::Write, path, body.clone());
        (self.handler)(Method::Write, path, body.as_ref())
    }
}

/// Forwards every request to another transport and records each exchange.
///
/// A read can be held back after the inner transport answered, which
/// makes its answer stale by the time the caller sees it.
pub(crate) struct RelayTransport {
    inner: Arc<dyn Transport>,
    held_reads: Mutex<HashMap<String, Duration>>,
    exchanges: Mutex<Vec<(Call, Option<Value>)>>,
}

impl RelayTransport {
    pub fn new(inner: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            held_reads: Mutex::new(HashMap::new()),
            exchanges: Mutex::new(Vec::new()),
        })
    }

    /// Delays the answer to the next read of `path` by `delay`.
    pub fn hold_next_read(&self, path: &str, delay: Duration) {
        self.held_reads.lock().insert(path.to_string(), delay);
    }

    /// Request and response bodies of every successful write to `path`.
    pub fn writes_to(&self, path: &str) -> Vec<(Value, Value)> {
        self.exchanges
            .lock()
            .iter()
            .filter(|(call, _)| call.method == Method::Write && call.path == path)
            .filter_map(|(call, response)| Some((call.body.clone()?, response.clone()?)))
            .collect()
    }

    fn record(&self, method: Method, path: &str, body: Option<Value>, response: Option<Value>) {
        let call = Call {
            method,
            path: path.to_string(),
            body,
        };
        self.exchanges.lock().push((call, response));
    }
}

#[async_trait]
impl Transport for RelayTransport {
    async fn read(&self, path: &str) -> Result<Option<Value>, TransportError> {
        let result = self.inner.read(path).await;
        let hold = self.held_reads.lock().remove(path);
        if let Some(delay) = hold {
            tokio::time::sleep(delay).await;
        }
        let response = result.as_ref().ok().cloned().flatten();
        self.record(Method::Read, path, None, response);
        result
    }

    async fn write(
        &self,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<Value>, TransportError> {
        let result = self.inner.write(path, body.clone()).await;
        let response = result.as_ref().ok().cloned().flatten();
        self.record(Method::Write, path, body, response);
        result
    }
}
