//! Route registration — named endpoints bound to a verb and a path template.
//!
//! A [`RouteTable`] is built once at startup and maps a route name to a
//! [`Route`]: an HTTP verb, a [`PathTemplate`] and, for reads, an optional
//! cache TTL. Calling a route expands its template against named [`Params`]
//! and forwards to [`Dispatcher::fetch`] or [`Dispatcher::send`].
//!
//! | Template                    | Params                    | Expanded path      |
//! |-----------------------------|---------------------------|--------------------|
//! | `/users`                    | *(none)*                  | `/users`           |
//! | `/users/:id`                | `id → 42`                 | `/users/42`        |
//! | `/users/:id/posts/:post_id` | `id → 7`, `post_id → 99`  | `/users/7/posts/99`|
//!
//! Trailing slashes are normalized, so `/users/` and `/users` are the same
//! template. Parameter values are inserted verbatim; encode them first if they
//! may contain `/` or `?`.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::Payload;
use crate::config::ConfigError;
use crate::dispatch::{Dispatcher, Error};
use crate::http::Method;
use crate::transport::Transport;

// A single path segment, either a literal string or a named parameter (`:name`).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Parameter(String),
}

/// A compiled path template such as `/users/:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    /// Parses a template string.
    ///
    /// Segments starting with `:` are named parameters; everything else is
    /// literal. A trailing slash (other than on the root `/`) is dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use apiweave::routes::{Params, PathTemplate};
    ///
    /// let template = PathTemplate::parse("/users/:id/posts/:post_id/");
    /// assert_eq!(template.params().collect::<Vec<_>>(), vec!["id", "post_id"]);
    ///
    /// let path = template.expand(&Params::new().with("id", 7).with("post_id", 99)).unwrap();
    /// assert_eq!(path, "/users/7/posts/99");
    /// ```
    pub fn parse(template: &str) -> Self {
        let raw = if template != "/" && template.ends_with('/') {
            &template[..template.len() - 1]
        } else {
            template
        };

        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Parameter(name.to_string()),
                None => Segment::Static(s.to_string()),
            })
            .collect();

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    /// Names of the parameters in template order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Parameter(name) => Some(name.as_str()),
            Segment::Static(_) => None,
        })
    }

    /// Substitutes every `:name` segment with its value from `params`.
    ///
    /// Unused entries in `params` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingParam`] for the first parameter with no
    /// value.
    pub fn expand(&self, params: &Params) -> Result<String, ConfigError> {
        if self.segments.is_empty() {
            return Ok("/".to_owned());
        }

        let mut path = String::with_capacity(self.raw.len());
        for seg in &self.segments {
            path.push('/');
            match seg {
                Segment::Static(s) => path.push_str(s),
                Segment::Parameter(name) => {
                    let value = params.get(name).ok_or_else(|| ConfigError::MissingParam {
                        name: name.clone(),
                        template: self.raw.clone(),
                    })?;
                    path.push_str(value);
                }
            }
        }
        Ok(path)
    }

    /// The normalized template string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Named arguments for template expansion.
#[derive(Default, Debug, Clone)]
pub struct Params {
    map: HashMap<String, String>,
}

impl Params {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert a value, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.map.insert(name.into(), value.to_string());
    }

    /// Get a value from the parameters map
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A registered endpoint.
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    template: PathTemplate,
    ttl: Option<Duration>,
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn template(&self) -> &PathTemplate {
        &self.template
    }

    /// Cache TTL applied to reads through this route, if any.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}

/// Name-addressed registration table of [`Route`]s.
///
/// Registering a name twice replaces the earlier route.
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use apiweave::dispatch::Dispatcher;
/// use apiweave::routes::{Params, RouteTable};
/// use apiweave::transport::Transport;
///
/// # async fn example<T: Transport>(dispatcher: Dispatcher<T>) -> Result<(), apiweave::dispatch::Error> {
/// let mut routes = RouteTable::new();
/// routes.get_cached("user", "/users/:id", Duration::from_secs(60));
/// routes.post("create_user", "/users");
///
/// let user = routes.call(&dispatcher, "user", &Params::new().with("id", 1), None).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
}

impl RouteTable {
    /// Create a new, empty `RouteTable`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an uncached `GET` route.
    pub fn get(&mut self, name: &str, template: &str) {
        self.add_route(name, Method::Get, template, None);
    }

    /// Register a `GET` route whose results are cached for `ttl`.
    pub fn get_cached(&mut self, name: &str, template: &str, ttl: Duration) {
        self.add_route(name, Method::Get, template, Some(ttl));
    }

    /// Register a `POST` route.
    pub fn post(&mut self, name: &str, template: &str) {
        self.add_route(name, Method::Post, template, None);
    }

    /// Register a `PUT` route.
    pub fn put(&mut self, name: &str, template: &str) {
        self.add_route(name, Method::Put, template, None);
    }

    /// Register a `PATCH` route.
    pub fn patch(&mut self, name: &str, template: &str) {
        self.add_route(name, Method::Patch, template, None);
    }

    /// Register a `DELETE` route.
    pub fn delete(&mut self, name: &str, template: &str) {
        self.add_route(name, Method::Delete, template, None);
    }

    fn add_route(&mut self, name: &str, method: Method, template: &str, ttl: Option<Duration>) {
        let route = Route {
            method,
            template: PathTemplate::parse(template),
            ttl,
        };
        self.routes.insert(name.to_owned(), route);
    }

    /// Looks up a route by name.
    pub fn route(&self, name: &str) -> Option<&Route> {
        self.routes.get(name)
    }

    /// Return the number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Expands the named route against `params` and dispatches it.
    ///
    /// `GET` routes go through [`Dispatcher::fetch`] with the route's TTL and
    /// ignore `body`. Write routes go through [`Dispatcher::send`] with `body`,
    /// or an empty payload when `body` is `None`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownRoute`] when no route is registered under `name`.
    /// - [`ConfigError::MissingParam`] when `params` lacks a template parameter.
    /// - Anything the dispatcher itself returns.
    pub async fn call<T: Transport>(
        &self,
        dispatcher: &Dispatcher<T>,
        name: &str,
        params: &Params,
        body: Option<Payload>,
    ) -> Result<Payload, Error> {
        let route = self
            .routes
            .get(name)
            .ok_or_else(|| ConfigError::UnknownRoute {
                name: name.to_owned(),
            })?;
        let path = route.template.expand(params)?;

        match &route.method {
            Method::Get => dispatcher.fetch(&path, route.ttl).await,
            method => {
                dispatcher
                    .send(&path, method.as_str(), body.unwrap_or_default())
                    .await
            }
        }
    }
}
