//! Error types for wiretap.
//!
//! Two classes of failure are kept apart:
//! - [`Error`] is a request failure returned by a doer. Middleware propagates it unchanged.
//! - [`SchemaError`] is a wiring mistake detected once, when a middleware is built
//!   around a collector whose label schema it cannot use.

use derive_more::{Display, Error, From};

// ============================================================================
// Request Error
// ============================================================================

/// Main error type for request execution.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

// ============================================================================
// Schema Error
// ============================================================================

/// A collector's label schema does not fit the middleware it is wired into.
///
/// These errors are raised while a middleware is constructed, never per request.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SchemaError {
    /// The collector yielded no descriptor.
    #[display("no description provided by collector")]
    NoDescription,

    /// The collector yielded several descriptors; only single-family collectors fit.
    #[display("more than one description provided by collector")]
    MultipleDescriptions,

    /// A zero-value sample could not be materialized from the descriptor.
    #[display("error checking metric for labels: {reason}")]
    Encoding {
        /// Why the sample was rejected.
        #[error(not(source))]
        reason: String,
    },

    /// The collector is partitioned by a label the middleware does not fill in.
    #[display("metric partitioned with non-supported label '{found}' (expected '{expected}')")]
    UnsupportedLabel {
        /// Label name the middleware requires.
        #[error(not(source))]
        expected: String,
        /// Label name the collector reported.
        #[error(not(source))]
        found: String,
    },
}

impl SchemaError {
    /// Create an encoding error.
    #[must_use]
    pub fn encoding(reason: impl Into<String>) -> Self {
        Self::Encoding {
            reason: reason.into(),
        }
    }
}
