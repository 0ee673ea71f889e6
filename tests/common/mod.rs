//! Shared test transport that records every call and serves canned bodies.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use apiweave::Payload;
use apiweave::http::Method;
use apiweave::transport::{Auth, Transport, TransportError, TransportFuture};
use bytes::Bytes;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
}

enum Reply {
    Body(String),
    Fail(String),
}

/// Reads answer from the configured replies (unknown paths fail); writes
/// answer from the replies too, or echo their body back.
#[derive(Default)]
pub struct MockTransport {
    replies: HashMap<String, Reply>,
    calls: Arc<Mutex<Vec<Call>>>,
    pub auth: Option<Auth>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, path: &str, body: Value) -> Self {
        self.respond_raw(path, &body.to_string())
    }

    pub fn respond_raw(mut self, path: &str, raw: &str) -> Self {
        self.replies.insert(path.to_owned(), Reply::Body(raw.to_owned()));
        self
    }

    pub fn fail(mut self, path: &str, message: &str) -> Self {
        self.replies.insert(path.to_owned(), Reply::Fail(message.to_owned()));
        self
    }

    /// Handle onto the call log that survives moving the transport into a dispatcher.
    pub fn log(&self) -> CallLog {
        CallLog(Arc::clone(&self.calls))
    }

    fn reply(&self, path: &str) -> Option<Result<Bytes, TransportError>> {
        self.replies.get(path).map(|reply| match reply {
            Reply::Body(raw) => Ok(Bytes::from(raw.clone())),
            Reply::Fail(message) => Err(TransportError::request(path, message.clone())),
        })
    }
}

impl Transport for MockTransport {
    fn read<'a>(&'a self, path: &'a str) -> TransportFuture<'a> {
        self.calls.lock().unwrap().push(Call {
            method: "GET".to_owned(),
            path: path.to_owned(),
            body: None,
        });
        let reply = self
            .reply(path)
            .unwrap_or_else(|| Err(TransportError::request(path, "no reply configured")));
        Box::pin(async move { reply })
    }

    fn write<'a>(&'a self, path: &'a str, method: &'a Method, body: Bytes) -> TransportFuture<'a> {
        self.calls.lock().unwrap().push(Call {
            method: method.to_string(),
            path: path.to_owned(),
            body: serde_json::from_slice(&body).ok(),
        });
        let reply = self.reply(path).unwrap_or(Ok(body));
        Box::pin(async move { reply })
    }

    fn configure_auth(&mut self, auth: Auth) {
        self.auth = Some(auth);
    }
}

#[derive(Clone)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
