//! Credential material handed to a transport.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::config::ConfigError;
use crate::http::Headers;

/// Authentication scheme and secrets for outgoing requests.
///
/// The `Debug` representation never includes secrets.
///
/// # Examples
///
/// ```
/// use apiweave::http::Headers;
/// use apiweave::transport::Auth;
///
/// let auth = Auth::from_parts("Bearer", "", "t0ken").unwrap();
/// let mut headers = Headers::new();
/// auth.apply(&mut headers);
/// assert_eq!(headers.get("authorization"), Some("Bearer t0ken"));
///
/// let custom = Auth::from_parts("custom", "X-Api-Key", "k").unwrap();
/// assert_eq!(custom.header(), ("X-Api-Key".to_owned(), "k".to_owned()));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// `Authorization: Basic base64(<username>:<password>)`.
    Basic { username: String, password: String },
    /// An arbitrary `<name>: <value>` header.
    Custom { name: String, value: String },
}

impl Auth {
    /// Builds an `Auth` from a scheme name and its two string arguments.
    ///
    /// | scheme   | `key`      | `value`  |
    /// |----------|------------|----------|
    /// | `Bearer` | *(unused)* | token    |
    /// | `Basic`  | username   | password |
    /// | `Custom` | header name| value    |
    ///
    /// Scheme names are matched case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownAuthScheme`] for any other scheme.
    pub fn from_parts(scheme: &str, key: &str, value: &str) -> Result<Self, ConfigError> {
        if scheme.eq_ignore_ascii_case("bearer") {
            Ok(Self::Bearer(value.to_owned()))
        } else if scheme.eq_ignore_ascii_case("basic") {
            Ok(Self::Basic {
                username: key.to_owned(),
                password: value.to_owned(),
            })
        } else if scheme.eq_ignore_ascii_case("custom") {
            Ok(Self::Custom {
                name: key.to_owned(),
                value: value.to_owned(),
            })
        } else {
            Err(ConfigError::UnknownAuthScheme {
                scheme: scheme.to_owned(),
            })
        }
    }

    /// Renders the header name and value this credential produces.
    pub fn header(&self) -> (String, String) {
        match self {
            Self::Bearer(token) => ("Authorization".to_owned(), format!("Bearer {token}")),
            Self::Basic { username, password } => {
                let encoded = BASE64.encode(format!("{username}:{password}"));
                ("Authorization".to_owned(), format!("Basic {encoded}"))
            }
            Self::Custom { name, value } => (name.clone(), value.clone()),
        }
    }

    /// Sets the credential header on `headers`, replacing any previous value.
    pub fn apply(&self, headers: &mut Headers) {
        let (name, value) = self.header();
        headers.set(name, value);
    }

    /// Returns the scheme name accepted by [`from_parts`](Self::from_parts).
    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "Bearer",
            Self::Basic { .. } => "Basic",
            Self::Custom { .. } => "Custom",
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Self::Custom { name, .. } => f
                .debug_struct("Custom")
                .field("name", name)
                .field("value", &"***")
                .finish(),
        }
    }
}
