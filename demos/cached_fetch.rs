//! Cached fetch walkthrough over an in-memory transport.
//!
//! Run with `RUST_LOG=apiweave=debug cargo run --example cached_fetch` to see
//! cache hits, misses and evictions as they happen.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use apiweave::http::{Headers, Method};
use apiweave::middleware::LoggerTransform;
use apiweave::transport::{Auth, Transport, TransportError, TransportFuture};
use apiweave::{Dispatcher, InjectFields, Params, RouteTable};
use bytes::Bytes;
use tracing_subscriber::EnvFilter;

/// Serves fixed JSON documents and counts round trips.
struct InMemory {
    documents: HashMap<&'static str, &'static str>,
    headers: Headers,
    round_trips: AtomicUsize,
}

impl Transport for InMemory {
    fn read<'a>(&'a self, path: &'a str) -> TransportFuture<'a> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        tracing::info!(path, auth = ?self.headers.get("authorization"), "round trip");
        Box::pin(async move {
            self.documents
                .get(path)
                .map(|doc| Bytes::from_static(doc.as_bytes()))
                .ok_or_else(|| TransportError::request(path, "not found"))
        })
    }

    fn write<'a>(&'a self, path: &'a str, method: &'a Method, body: Bytes) -> TransportFuture<'a> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        tracing::info!(path, %method, bytes = body.len(), "round trip");
        Box::pin(async move { Ok(body) })
    }

    fn configure_auth(&mut self, auth: Auth) {
        auth.apply(&mut self.headers);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let transport = InMemory {
        documents: HashMap::from([
            ("/users/1", r#"{"name":"Alice"}"#),
            ("/users/2", r#"{"name":"Bob"}"#),
        ]),
        headers: Headers::new(),
        round_trips: AtomicUsize::new(0),
    };

    let mut api = Dispatcher::builder(transport).cache_capacity(8).build()?;
    api.configure_auth("Bearer", "", "demo-token")?;
    api.pipeline_mut().add_transform(InjectFields::new().field("cached", true));
    api.pipeline_mut().add_transform(LoggerTransform);

    let mut routes = RouteTable::new();
    routes.get_cached("user", "/users/:id", Duration::from_secs(60));
    routes.post("create_user", "/users");

    for id in [1, 2, 1, 1, 2] {
        let user = routes.call(&api, "user", &Params::new().with("id", id), None).await?;
        println!("user {id}: {}", serde_json::Value::Object(user));
    }

    let created = routes
        .call(&api, "create_user", &Params::new(), Some(serde_json::Map::new()))
        .await?;
    println!("created: {}", serde_json::Value::Object(created));

    api.invalidate(Some("/users/1"));
    api.fetch("/users/1", None).await?;

    let stats = api.cache_stats();
    println!(
        "round trips: {}, cache: {}",
        api.transport().round_trips.load(Ordering::Relaxed),
        serde_json::to_string(&stats)?
    );
    Ok(())
}
