//! Transport collaborator — the seam between the dispatcher and the wire.
//!
//! A [`Transport`] performs the actual request/response exchange against a
//! base URL and credential state it was configured with. It deals in raw
//! bytes only; decoding to and encoding from [`Payload`](crate::Payload) is
//! the dispatcher's job. Retries, timeouts, TLS and status-code handling all
//! live behind this trait.
//!
//! Methods return boxed futures, the same shape the middleware layer uses,
//! so `dyn Transport` stays object-safe without a proc-macro.

use std::{future::Future, pin::Pin};

use bytes::Bytes;
use thiserror::Error;

use crate::BoxError;
use crate::http::Method;

pub mod auth;

pub use auth::Auth;

/// The future returned by [`Transport::read`] and [`Transport::write`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<Bytes, TransportError>> + Send + 'a>>;

/// Failures surfaced while talking to the transport or converting its bytes.
///
/// None of these ever leave a mark on the cache.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {path} failed: {source}")]
    Request {
        path: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response from {path} is not an object (got {found})")]
    NotAnObject { path: String, found: &'static str },

    #[error("failed to encode request body for {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TransportError {
    /// Wraps an implementation-specific failure for `path`.
    ///
    /// # Examples
    ///
    /// ```
    /// use apiweave::transport::TransportError;
    ///
    /// let err = TransportError::request("/users/1", "connection refused");
    /// assert_eq!(err.to_string(), "request to /users/1 failed: connection refused");
    /// ```
    pub fn request(path: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Request {
            path: path.into(),
            source: source.into(),
        }
    }
}

/// The request executor a [`Dispatcher`](crate::dispatch::Dispatcher) owns.
///
/// # Contract
///
/// - `read` performs a read-style request against `path` and resolves to the
///   raw response body.
/// - `write` performs a write-style request with `method` and the encoded
///   `body`, resolving to the raw response body.
/// - `configure_auth` replaces the credential material used by every later
///   `read` and `write`.
/// - Implementations **must** be `Send + Sync`; a dispatcher is shared across
///   tasks and calls the transport without holding any lock.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use apiweave::http::Method;
/// use apiweave::transport::{Auth, Transport, TransportFuture};
///
/// struct Echo;
///
/// impl Transport for Echo {
///     fn read<'a>(&'a self, _path: &'a str) -> TransportFuture<'a> {
///         Box::pin(async { Ok(Bytes::from_static(b"{}")) })
///     }
///
///     fn write<'a>(&'a self, _path: &'a str, _method: &'a Method, body: Bytes) -> TransportFuture<'a> {
///         Box::pin(async move { Ok(body) })
///     }
///
///     fn configure_auth(&mut self, _auth: Auth) {}
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Fetches the raw body at `path`.
    fn read<'a>(&'a self, path: &'a str) -> TransportFuture<'a>;

    /// Sends `body` to `path` with `method` and returns the raw response body.
    fn write<'a>(&'a self, path: &'a str, method: &'a Method, body: Bytes) -> TransportFuture<'a>;

    /// Sets the credential material used by subsequent requests.
    fn configure_auth(&mut self, auth: Auth);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read<'a>(&'a self, path: &'a str) -> TransportFuture<'a> {
        (**self).read(path)
    }

    fn write<'a>(&'a self, path: &'a str, method: &'a Method, body: Bytes) -> TransportFuture<'a> {
        (**self).write(path, method, body)
    }

    fn configure_auth(&mut self, auth: Auth) {
        (**self).configure_auth(auth)
    }
}
