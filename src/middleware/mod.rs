//! Middleware pipeline — ordered payload transforms.
//!
//! Every payload the [`Dispatcher`](crate::dispatch::Dispatcher) receives from
//! its transport, and every payload it is asked to send, is folded through a
//! [`Pipeline`]: the output of transform *i* is the input of transform *i + 1*.
//! The first transform that fails aborts the fold and the caller gets a
//! [`PipelineError`] naming the failing stage.
//!
//! ## Core types
//!
//! - [`Transform`] — trait implemented by reusable transforms.
//! - [`TransformHandler`] — type-erased, cheaply-cloneable transform function.
//! - [`from_transform`] — converts a [`Transform`] into a [`TransformHandler`].
//! - [`Pipeline`] — the ordered stack itself.
//! - [`LoggerTransform`], [`InjectFields`], [`RequireFields`] — built-ins.
//!
//! Transforms are expected to be pure with respect to the pipeline; any side
//! effect they perform is their own business.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{BoxError, Payload};

pub mod fields;

pub use fields::{InjectFields, MissingField, RequireFields};

/// A type-erased, reference-counted transform function.
///
/// Every entry in the pipeline is stored as a `TransformHandler`. The [`Arc`]
/// wrapper makes a [`Pipeline`] cheap to clone.
///
/// Construct one with [`from_transform`] or by wrapping a closure directly:
///
/// ```
/// use std::sync::Arc;
/// use apiweave::{BoxError, Payload, middleware::TransformHandler};
///
/// let handler: TransformHandler = Arc::new(|mut payload: Payload| {
///     payload.insert("seen".to_owned(), true.into());
///     Ok::<_, BoxError>(payload)
/// });
/// ```
pub type TransformHandler = Arc<dyn Fn(Payload) -> Result<Payload, BoxError> + Send + Sync + 'static>;

/// Converts a [`Transform`] implementation into a [`TransformHandler`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use apiweave::middleware::{LoggerTransform, from_transform};
///
/// let handler = from_transform(Arc::new(LoggerTransform));
/// ```
pub fn from_transform<T>(transform: Arc<T>) -> TransformHandler
where
    T: Transform + 'static,
{
    Arc::new(move |payload: Payload| transform.apply(payload))
}

/// The core trait for reusable payload transforms.
///
/// # Contract
///
/// - Implementations **must** be `Send + Sync`; a dispatcher runs its pipeline
///   from whichever task is calling it.
/// - Returning `Err` aborts the pipeline. Nothing is cached and, on the write
///   path, nothing is sent.
pub trait Transform: Send + Sync {
    /// Maps one payload to the next.
    fn apply(&self, payload: Payload) -> Result<Payload, BoxError>;
}

/// A transform failed; the operation in progress was abandoned.
#[derive(Debug, Error)]
#[error("transform at stage {stage} failed: {source}")]
pub struct PipelineError {
    /// Zero-based position of the failing transform.
    pub stage: usize,
    #[source]
    pub source: BoxError,
}

/// An ordered, append-only sequence of transforms.
///
/// # Examples
///
/// ```
/// use apiweave::middleware::{InjectFields, Pipeline};
/// use apiweave::Payload;
///
/// let mut pipeline = Pipeline::new();
/// pipeline.add_transform(InjectFields::new().field("version", 2));
/// pipeline.add_fn(|mut payload| {
///     payload.remove("secret");
///     Ok(payload)
/// });
///
/// let mut input = Payload::new();
/// input.insert("secret".to_owned(), "hunter2".into());
///
/// let output = pipeline.apply(input).unwrap();
/// assert_eq!(output["version"], 2);
/// assert!(output.get("secret").is_none());
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<TransformHandler>,
}

impl Pipeline {
    /// Creates an empty pipeline; applying it returns the payload unchanged.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to the end of the pipeline. No dedup, no priority.
    pub fn add(&mut self, handler: TransformHandler) {
        self.stages.push(handler);
    }

    /// Appends a closure to the end of the pipeline.
    pub fn add_fn<F>(&mut self, transform: F)
    where
        F: Fn(Payload) -> Result<Payload, BoxError> + Send + Sync + 'static,
    {
        self.stages.push(Arc::new(transform));
    }

    /// Appends a [`Transform`] implementation to the end of the pipeline.
    pub fn add_transform<T>(&mut self, transform: T)
    where
        T: Transform + 'static,
    {
        self.stages.push(from_transform(Arc::new(transform)));
    }

    /// Folds `payload` through every transform in insertion order.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] carrying the index of the first transform
    /// that failed. Later transforms are not run.
    pub fn apply(&self, payload: Payload) -> Result<Payload, PipelineError> {
        self.stages
            .iter()
            .enumerate()
            .try_fold(payload, |payload, (stage, transform)| {
                transform(payload).map_err(|source| PipelineError { stage, source })
            })
    }

    /// Number of transforms in the pipeline.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if no transforms have been added.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.len())
            .finish()
    }
}

/// Built-in transform that logs the shape of each payload it sees.
///
/// Emits a single `tracing::debug!` line listing the top-level field names and
/// returns the payload untouched.
pub struct LoggerTransform;

impl Transform for LoggerTransform {
    fn apply(&self, payload: Payload) -> Result<Payload, BoxError> {
        let fields: Vec<&str> = payload.keys().map(String::as_str).collect();
        tracing::debug!(count = fields.len(), ?fields, "payload through pipeline");
        Ok(payload)
    }
}
