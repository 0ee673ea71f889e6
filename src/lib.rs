//! # apiweave
//!
//! A client-side request layer that sits in front of a remote transport:
//! logical `fetch` and `send` operations against named paths, a payload
//! middleware pipeline, and an expiring LRU cache for read results.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use apiweave::{Dispatcher, InjectFields, Payload};
//! use apiweave::transport::Transport;
//!
//! # async fn example(transport: impl Transport) -> Result<(), apiweave::Error> {
//! let mut api = Dispatcher::new(transport, 100)?;
//! api.configure_auth("Bearer", "", "my-token")?;
//! api.pipeline_mut().add_transform(InjectFields::new().field("client", "apiweave"));
//!
//! // Cached for a minute; the second call never reaches the transport.
//! let user = api.fetch("/users/1", Some(Duration::from_secs(60))).await?;
//! let same = api.fetch("/users/1", None).await?;
//! assert_eq!(user, same);
//!
//! api.send("/users", "POST", Payload::new()).await?;
//! api.invalidate(Some("/users/1"));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod transport;

/// The abstract payload shape: field name to arbitrarily nested value.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Boxed error returned by transforms and transport implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{CacheStats, ExpiringCache};
pub use config::{ConfigError, DispatcherConfig};
pub use dispatch::{Dispatcher, Error};
pub use http::Method;
pub use middleware::{InjectFields, Pipeline, PipelineError, RequireFields, Transform};
pub use routes::{Params, RouteTable};
pub use transport::{Auth, Transport, TransportError};
