mod common;

use std::sync::Arc;
use std::time::Duration;

use apiweave::middleware::{InjectFields, MissingField, RequireFields};
use apiweave::transport::TransportError;
use apiweave::{Auth, ConfigError, Dispatcher, DispatcherConfig, Error, Payload};
use common::{MockTransport, payload};
use serde_json::{Value, json};

const MINUTE: Duration = Duration::from_secs(60);

#[tokio::test(start_paused = true)]
async fn end_to_end_cached_fetch() {
    let transport = MockTransport::new().respond("/users/1", json!({ "name": "Alice" }));
    let log = transport.log();
    let mut api = Dispatcher::new(transport, 10).unwrap();
    api.pipeline_mut()
        .add_transform(InjectFields::new().field("cached", true));

    let first = api.fetch("/users/1", Some(MINUTE)).await.unwrap();
    assert_eq!(Value::Object(first.clone()), json!({ "name": "Alice", "cached": true }));

    tokio::time::advance(Duration::from_secs(59)).await;
    let second = api.fetch("/users/1", None).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(log.count("GET", "/users/1"), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    api.fetch("/users/1", None).await.unwrap();
    assert_eq!(log.count("GET", "/users/1"), 2);
}

#[tokio::test]
async fn cached_values_are_not_transformed_again() {
    let transport = MockTransport::new().respond("/counter", json!({}));
    let mut api = Dispatcher::new(transport, 10).unwrap();
    api.pipeline_mut().add_fn(|mut p| {
        let n = p.get("passes").and_then(Value::as_u64).unwrap_or(0);
        p.insert("passes".to_owned(), json!(n + 1));
        Ok(p)
    });

    api.fetch("/counter", Some(MINUTE)).await.unwrap();
    let hit = api.fetch("/counter", Some(MINUTE)).await.unwrap();
    assert_eq!(hit["passes"], 1);
}

#[tokio::test]
async fn uncached_fetch_leaves_no_entry() {
    let transport = MockTransport::new().respond("/a", json!({ "v": 1 }));
    let log = transport.log();
    let api = Dispatcher::new(transport, 10).unwrap();

    api.fetch("/a", None).await.unwrap();
    assert!(!api.is_cached("/a"));
    assert_eq!(api.cache_stats().entries, 0);

    api.fetch("/a", None).await.unwrap();
    assert_eq!(log.count("GET", "/a"), 2);
}

#[tokio::test]
async fn invalidate_is_scoped_to_one_path() {
    let transport = MockTransport::new()
        .respond("/a", json!({ "v": "a" }))
        .respond("/b", json!({ "v": "b" }));
    let log = transport.log();
    let api = Dispatcher::new(transport, 10).unwrap();

    api.fetch("/a", Some(MINUTE)).await.unwrap();
    api.fetch("/b", Some(MINUTE)).await.unwrap();
    api.invalidate(Some("/a"));

    assert!(!api.is_cached("/a"));
    assert!(api.is_cached("/b"));

    api.fetch("/b", None).await.unwrap();
    api.fetch("/a", None).await.unwrap();
    assert_eq!(log.count("GET", "/b"), 1);
    assert_eq!(log.count("GET", "/a"), 2);
}

#[tokio::test]
async fn invalidate_all_clears_everything() {
    let transport = MockTransport::new()
        .respond("/a", json!({}))
        .respond("/b", json!({}));
    let api = Dispatcher::new(transport, 10).unwrap();

    api.fetch("/a", Some(MINUTE)).await.unwrap();
    api.fetch("/b", Some(MINUTE)).await.unwrap();
    api.invalidate(None);

    assert_eq!(api.cache_stats().entries, 0);
    // Invalidating an unknown path is a no-op.
    api.invalidate(Some("/never-fetched"));
}

#[tokio::test]
async fn cache_capacity_evicts_least_recently_used_path() {
    let transport = MockTransport::new()
        .respond("/a", json!({}))
        .respond("/b", json!({}))
        .respond("/c", json!({}));
    let api = Dispatcher::new(transport, 2).unwrap();

    api.fetch("/a", Some(MINUTE)).await.unwrap();
    api.fetch("/b", Some(MINUTE)).await.unwrap();
    api.fetch("/a", None).await.unwrap();
    api.fetch("/c", Some(MINUTE)).await.unwrap();

    assert!(api.is_cached("/a"));
    assert!(!api.is_cached("/b"));
    assert!(api.is_cached("/c"));
    assert_eq!(api.cache_stats().evictions, 1);
}

#[tokio::test]
async fn transport_failure_is_not_cached() {
    let transport = MockTransport::new().fail("/down", "connection refused");
    let log = transport.log();
    let api = Dispatcher::new(transport, 10).unwrap();

    for _ in 0..2 {
        let err = api.fetch("/down", Some(MINUTE)).await.unwrap_err();
        assert!(matches!(err, Error::Transport(TransportError::Request { .. })));
        assert!(err.to_string().contains("connection refused"));
    }
    assert_eq!(log.count("GET", "/down"), 2);
    assert!(!api.is_cached("/down"));
}

#[tokio::test]
async fn undecodable_responses_are_transport_errors() {
    let transport = MockTransport::new()
        .respond_raw("/garbage", "<html>oops</html>")
        .respond("/list", json!([1, 2, 3]));
    let api = Dispatcher::new(transport, 10).unwrap();

    let err = api.fetch("/garbage", Some(MINUTE)).await.unwrap_err();
    assert!(matches!(err, Error::Transport(TransportError::Decode { .. })));

    let err = api.fetch("/list", Some(MINUTE)).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(TransportError::NotAnObject { found: "an array", .. })
    ));
    assert_eq!(api.cache_stats().entries, 0);
}

#[tokio::test]
async fn pipeline_failure_on_fetch_is_not_cached() {
    let transport = MockTransport::new().respond("/users/1", json!({ "name": "Alice" }));
    let mut api = Dispatcher::new(transport, 10).unwrap();
    api.pipeline_mut()
        .add_transform(RequireFields::new().field("id"));

    let err = api.fetch("/users/1", Some(MINUTE)).await.unwrap_err();
    let pipeline = match err {
        Error::Pipeline(pipeline) => pipeline,
        other => panic!("expected a pipeline error, got {other:?}"),
    };
    assert_eq!(pipeline.stage, 0);
    assert_eq!(
        pipeline.source.downcast_ref::<MissingField>().map(|m| m.name.as_str()),
        Some("id")
    );
    assert!(!api.is_cached("/users/1"));
}

#[tokio::test]
async fn send_transforms_outbound_payload_only() {
    let transport = MockTransport::new().respond("/users", json!({ "id": 7 }));
    let log = transport.log();
    let mut api = Dispatcher::new(transport, 10).unwrap();
    api.pipeline_mut()
        .add_transform(InjectFields::new().field("signed", true));

    let response = api
        .send("/users", "POST", payload(json!({ "name": "Bob" })))
        .await
        .unwrap();

    // The response is decoded but not run through the pipeline.
    assert_eq!(Value::Object(response), json!({ "id": 7 }));

    let calls = log.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, "POST");
    assert_eq!(calls[0].body, Some(json!({ "name": "Bob", "signed": true })));
    assert_eq!(api.cache_stats().entries, 0);
}

#[tokio::test]
async fn send_pipeline_failure_never_reaches_transport() {
    let transport = MockTransport::new();
    let log = transport.log();
    let mut api = Dispatcher::new(transport, 10).unwrap();
    api.pipeline_mut()
        .add_transform(RequireFields::new().field("name"));

    let err = api.send("/users", "PUT", Payload::new()).await.unwrap_err();
    assert!(matches!(err, Error::Pipeline(_)));
    assert_eq!(log.len(), 0);
}

#[tokio::test]
async fn send_rejects_unsupported_methods_before_anything_runs() {
    let transport = MockTransport::new();
    let log = transport.log();
    let mut api = Dispatcher::new(transport, 10).unwrap();
    api.pipeline_mut()
        .add_fn(|_| panic!("pipeline must not run for a rejected method"));

    let err = api.send("/users", "HEAD", Payload::new()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigError::UnsupportedMethod { ref method }) if method == "HEAD"
    ));
    assert_eq!(log.len(), 0);
}

#[tokio::test]
async fn send_does_not_invalidate_cached_reads() {
    let transport = MockTransport::new().respond("/users/1", json!({ "name": "Alice" }));
    let log = transport.log();
    let api = Dispatcher::new(transport, 10).unwrap();

    api.fetch("/users/1", Some(MINUTE)).await.unwrap();
    api.send("/users/1", "PATCH", payload(json!({ "name": "Alicia" })))
        .await
        .unwrap();
    let still = api.fetch("/users/1", None).await.unwrap();

    assert_eq!(still["name"], "Alice");
    assert_eq!(log.count("GET", "/users/1"), 1);
    assert_eq!(log.count("PATCH", "/users/1"), 1);
}

#[tokio::test]
async fn concurrent_fetches_share_one_dispatcher() {
    let mut transport = MockTransport::new();
    for i in 0..8 {
        transport = transport.respond(&format!("/items/{i}"), json!({ "id": i }));
    }
    let api = Arc::new(Dispatcher::new(transport, 4).unwrap());

    let mut tasks = Vec::new();
    for n in 0..64 {
        let api = Arc::clone(&api);
        tasks.push(tokio::spawn(async move {
            let path = format!("/items/{}", n % 8);
            let item = api.fetch(&path, Some(MINUTE)).await.unwrap();
            assert_eq!(item["id"], n % 8);
            if n % 16 == 0 {
                api.invalidate(None);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let stats = api.cache_stats();
    assert!(stats.entries <= 4);
    assert_eq!(stats.capacity, 4);
}

#[test]
fn config_drives_capacity() {
    let config: DispatcherConfig = serde_json::from_str(r#"{ "cache_capacity": 3 }"#).unwrap();
    let api = Dispatcher::with_config(MockTransport::new(), &config).unwrap();
    assert_eq!(api.cache_stats().capacity, 3);

    let zero = DispatcherConfig::default().cache_capacity(0);
    assert!(matches!(
        Dispatcher::with_config(MockTransport::new(), &zero),
        Err(ConfigError::ZeroCapacity)
    ));
}

#[test]
fn auth_reaches_the_transport() {
    let mut api = Dispatcher::new(MockTransport::new(), 1).unwrap();
    api.configure_auth("Basic", "user", "pass").unwrap();
    assert_eq!(
        api.transport().auth,
        Some(Auth::Basic {
            username: "user".to_owned(),
            password: "pass".to_owned()
        })
    );

    let err = api.configure_auth("Kerberos", "", "").unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigError::UnknownAuthScheme { .. })
    ));
}
