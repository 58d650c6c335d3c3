//! Error types for Ubersmith API calls.
//!
//! Every failure the client can produce is a variant of [`Error`]. The variants
//! double as the outcome taxonomy of the API: callers pattern-match on
//! [`Error::Maintenance`] or [`Error::UpdatingToken`] instead of catching
//! distinct exception types, or use [`Error::kind`] for the coarse category.

use crate::response::Envelope;
use http::{HeaderMap, StatusCode};
use std::path::PathBuf;

/// The main error type for Ubersmith API calls.
///
/// # Examples
///
/// ```no_run
/// use ubersmith::{Error, Params, RequestHandler};
///
/// # async fn example() -> Result<(), Error> {
/// let handler = RequestHandler::builder()
///     .base_url("https://billing.example.com/api/2.0/")?
///     .credentials("admin", "secret")
///     .connect()
///     .await?;
///
/// match handler.process_request("client.get", Some(&Params::new().with("client_id", 50))).await {
///     Ok(response) => println!("raw data: {:?}", response.data()?),
///     Err(Error::Maintenance(envelope)) => {
///         eprintln!("Ubersmith is in maintenance: {}", envelope.error_message);
///     }
///     Err(Error::Response(envelope)) => {
///         eprintln!("API error {:?}: {}", envelope.error_code, envelope.error_message);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    ///
    /// Transport failures are never retried by this crate.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The requested method is not in the handler's method list.
    ///
    /// Raised before anything is sent over the network.
    #[error("Requested method is not valid: {method}")]
    InvalidMethod {
        /// The rejected method name
        method: String,
    },

    /// Required request fields were missing.
    ///
    /// Raised by [`Call::render`](crate::Call::render) before any network call.
    #[error("Validation failed for {method}: missing {}", missing.join(", "))]
    Validation {
        /// The method whose validation failed
        method: String,
        /// Human readable description of each unmet requirement
        missing: Vec<String>,
    },

    /// The API reported `status: false`.
    #[error("Ubersmith error {}: {}", .0.code_label(), .0.error_message)]
    Response(Envelope),

    /// The API reported that it is undergoing scheduled maintenance.
    #[error("Ubersmith is undergoing maintenance: {}", .0.error_message)]
    Maintenance(Envelope),

    /// Every attempt returned the HTML "Updating Token" page.
    #[error("Ubersmith kept returning an 'Updating Token' page after {attempts} attempts")]
    UpdatingToken {
        /// The number of attempts made
        attempts: usize,
    },

    /// The server returned a non-2xx status with a non-JSON body.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// A JSON response could not be decoded.
    ///
    /// Preserves the raw body and the serde message for debugging.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// A cleaner could not coerce a response field.
    #[error("Cannot coerce {field} value {value:?} to {expected}")]
    Coercion {
        /// Path of the field being cleaned
        field: String,
        /// The offending value, rendered as text
        value: String,
        /// The target type
        expected: &'static str,
    },

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Reading or writing a method index failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No method index file exists in the index directory.
    #[error("No method index found in {}", directory.display())]
    IndexNotFound {
        /// The directory that was searched
        directory: PathBuf,
    },

    /// A method index file is malformed.
    #[error("Invalid method index: {0}")]
    Index(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or unrecognized local request.
    Request,
    /// Required fields were missing.
    Validation,
    /// The service reported a logical failure.
    Response,
    /// The service is in maintenance.
    Maintenance,
    /// The service kept answering with the token-update page.
    UpdatingToken,
    /// Transport, HTTP status or decoding failure.
    Transport,
    /// Configuration, cleaning or index failure on this side.
    Local,
}

impl Error {
    /// Returns the coarse category of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use ubersmith::{Error, ErrorKind};
    ///
    /// let err = Error::UpdatingToken { attempts: 3 };
    /// assert_eq!(err.kind(), ErrorKind::UpdatingToken);
    ///
    /// let err = Error::InvalidMethod { method: "client.nope".to_string() };
    /// assert_eq!(err.kind(), ErrorKind::Request);
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidMethod { .. } => ErrorKind::Request,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Response(_) => ErrorKind::Response,
            Error::Maintenance(_) => ErrorKind::Maintenance,
            Error::UpdatingToken { .. } => ErrorKind::UpdatingToken,
            Error::Network(_) | Error::HttpError { .. } | Error::DeserializationFailed { .. } => {
                ErrorKind::Transport
            }
            Error::Coercion { .. }
            | Error::ConfigurationError(_)
            | Error::InvalidUrl(_)
            | Error::Io(_)
            | Error::IndexNotFound { .. }
            | Error::Index(_) => ErrorKind::Local,
        }
    }

    /// Returns `true` if retrying the same request later may succeed.
    ///
    /// Only the token-update and maintenance conditions qualify; the handler
    /// itself only ever retries the token-update page.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UpdatingToken { .. } | Error::Maintenance(_))
    }

    /// Returns the decoded error envelope for API-reported failures.
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            Error::Response(envelope) | Error::Maintenance(envelope) => Some(envelope),
            _ => None,
        }
    }

    /// Returns the API error code, if the service reported one.
    pub fn error_code(&self) -> Option<i64> {
        self.envelope()?.error_code
    }

    /// Returns the API error message, if the service reported one.
    pub fn error_message(&self) -> Option<&str> {
        self.envelope().map(|e| e.error_message.as_str())
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for Ubersmith API calls.
pub type Result<T> = std::result::Result<T, Error>;
