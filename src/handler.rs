//! HTTP request handling, authentication and the token-update retry loop.
//!
//! The [`RequestHandler`] is the main entry point for talking to Ubersmith.
//! Use [`RequestHandlerBuilder`] to configure one; connecting fetches the
//! method list and the service version before the handler is handed out.

use crate::{
    params::EncodedParams, retry::RetryStrategy, Error, Params, RawResponse, Result, Value,
};
use http::{HeaderMap, HeaderName, HeaderValue};
use indexmap::IndexMap;
use reqwest::multipart;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// The method used to discover every other method.
pub const METHOD_LIST: &str = "uber.method_list";
/// The method reporting the service version.
pub const SYSTEM_INFO: &str = "uber.system_info";
/// The method describing a single method, used to build indexes.
pub const METHOD_GET: &str = "uber.method_get";

const METHOD_LIST_DESCRIPTION: &str = "List Available API Methods";
const UNKNOWN_VERSION: &str = "Unknown";

/// Sends authenticated requests to an Ubersmith instance.
///
/// The handler is cheap to clone and designed to be created once at startup
/// and shared. Its method list and version are fixed at connection time.
///
/// # Examples
///
/// ```no_run
/// use ubersmith::{Params, RequestHandler};
///
/// # async fn example() -> Result<(), ubersmith::Error> {
/// let handler = RequestHandler::builder()
///     .base_url("https://billing.example.com/api/2.0/")?
///     .credentials("admin", "secret")
///     .connect()
///     .await?;
///
/// println!("Connected to Ubersmith {}", handler.version());
///
/// let response = handler
///     .process_request("client.get", Some(&Params::new().with("client_id", 50)))
///     .await?;
/// println!("Client: {}", response.data()?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RequestHandler {
    inner: Arc<HandlerInner>,
}

struct HandlerInner {
    http_client: reqwest::Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
    default_headers: HeaderMap,
    retry_strategy: RetryStrategy,
    timeout: Option<Duration>,
    methods: IndexMap<String, String>,
    version: String,
    latest_version: String,
}

impl RequestHandler {
    /// Creates a new `RequestHandlerBuilder`.
    pub fn builder() -> RequestHandlerBuilder {
        RequestHandlerBuilder::new()
    }

    /// Sends `method` with `data` and returns the raw response.
    ///
    /// The request is re-sent, after the retry strategy's delay, while
    /// Ubersmith answers with its "Updating Token" page. No other condition
    /// is retried.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidMethod`] if `method` is not in [`methods`](Self::methods);
    ///   nothing is sent
    /// - [`Error::UpdatingToken`] if every attempt hit the token-update page
    /// - [`Error::Maintenance`] or [`Error::Response`] if the envelope reports
    ///   `status: false`
    /// - [`Error::HttpError`] for a non-2xx, non-JSON response
    /// - [`Error::Network`] for transport failures
    pub async fn process_request(&self, method: &str, data: Option<&Params>) -> Result<RawResponse> {
        self.inner.process_request(method, data).await
    }

    /// Every method the server reported, mapped to its description.
    pub fn methods(&self) -> &IndexMap<String, String> {
        &self.inner.methods
    }

    pub fn is_valid_method(&self, method: &str) -> bool {
        self.inner.methods.contains_key(method)
    }

    /// The distinct module prefixes of the method list (`client`, `uber`, ...).
    pub fn modules(&self) -> BTreeSet<&str> {
        self.inner
            .methods
            .keys()
            .filter_map(|method| method.split_once('.').map(|(module, _)| module))
            .collect()
    }

    /// The Ubersmith version, or `"Unknown"`.
    pub fn version(&self) -> &str {
        &self.inner.version
    }

    /// The latest Ubersmith release the server knows of, or `"Unknown"`.
    pub fn latest_version(&self) -> &str {
        &self.inner.latest_version
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("base_url", &self.inner.base_url.as_str())
            .field("username", &self.inner.username)
            .field("version", &self.inner.version)
            .field("methods", &self.inner.methods.len())
            .finish_non_exhaustive()
    }
}

impl HandlerInner {
    async fn process_request(&self, method: &str, data: Option<&Params>) -> Result<RawResponse> {
        self.validate_request_method(method)?;

        let encoded = data.map(Params::encode).unwrap_or_default();
        let url = self.method_url(method);
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let response = self.execute_request(&url, method, &encoded, attempt).await?;
            let response = self.read_response(response, start_time, attempt).await?;

            if !response.is_token_page() {
                return self.classify_response(response);
            }

            match self.retry_strategy.delay_for_attempt(attempt) {
                Some(delay) => {
                    tracing::warn!(
                        method = method,
                        attempt = attempt,
                        delay_ms = delay.as_millis(),
                        "Ubersmith is updating its token, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    tracing::error!(
                        method = method,
                        attempts = attempt,
                        "Ubersmith still updating its token, giving up"
                    );
                    return Err(Error::UpdatingToken { attempts: attempt });
                }
            }
        }
    }

    fn validate_request_method(&self, method: &str) -> Result<()> {
        if self.methods.contains_key(method) {
            Ok(())
        } else {
            Err(Error::InvalidMethod {
                method: method.to_string(),
            })
        }
    }

    fn method_url(&self, method: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("method", method);
        url
    }

    /// Executes a single attempt.
    async fn execute_request(
        &self,
        url: &Url,
        method: &str,
        encoded: &EncodedParams,
        attempt: usize,
    ) -> Result<reqwest::Response> {
        tracing::debug!(
            method = method,
            url = %url,
            fields = encoded.fields.len(),
            files = encoded.files.len(),
            attempt = attempt,
            "Executing Ubersmith request"
        );

        let mut request = self.http_client.post(url.clone());

        for (name, value) in &self.default_headers {
            request = request.header(name, value);
        }

        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_ref());
        }

        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        request = if encoded.has_files() {
            request.multipart(multipart_form(encoded)?)
        } else {
            request.form(&encoded.fields)
        };

        Ok(request.send().await?)
    }

    async fn read_response(
        &self,
        response: reqwest::Response,
        start_time: Instant,
        attempt: usize,
    ) -> Result<RawResponse> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        let latency = start_time.elapsed();

        tracing::info!(
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            attempts = attempt,
            "Received Ubersmith response"
        );

        Ok(RawResponse::new(status, headers, body, latency, attempt))
    }

    /// Turns a non-token response into the handler's result.
    fn classify_response(&self, response: RawResponse) -> Result<RawResponse> {
        if response.is_json() {
            let envelope = response.envelope()?;
            if envelope.status {
                return Ok(response);
            }
            if envelope.is_maintenance() {
                tracing::warn!(
                    error_code = envelope.error_code,
                    "Ubersmith is undergoing maintenance"
                );
                return Err(Error::Maintenance(envelope));
            }
            tracing::warn!(
                error_code = envelope.error_code,
                error_message = %envelope.error_message,
                "Ubersmith reported an error"
            );
            return Err(Error::Response(envelope));
        }

        let status = response.status();
        if !status.is_success() {
            let raw_response = response.text();

            tracing::warn!(
                status = status.as_u16(),
                response = %raw_response,
                "Ubersmith answered with a non-JSON error"
            );

            return Err(Error::HttpError {
                status,
                raw_response,
                headers: response.headers().clone(),
            });
        }

        Ok(response)
    }

    async fn discover_methods(&mut self) -> Result<()> {
        let response = self.process_request(METHOD_LIST, None).await?;
        let methods = method_list(&response)?;
        self.methods.extend(methods);

        tracing::debug!(methods = self.methods.len(), "Discovered Ubersmith methods");
        Ok(())
    }

    async fn discover_version(&mut self) -> Result<()> {
        let info = match self.process_request(SYSTEM_INFO, None).await {
            Ok(response) => response.data()?,
            Err(e @ Error::Network(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read Ubersmith system info");
                Value::Null
            }
        };

        let field = |name: &str| match info.get(name) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Int(n)) => n.to_string(),
            Some(Value::Float(f)) => f.to_string(),
            _ => UNKNOWN_VERSION.to_string(),
        };
        self.version = field("version");
        self.latest_version = field("latest_version");
        Ok(())
    }
}

/// Reads the `uber.method_list` payload: method name to description.
///
/// A plain list of names is accepted too, with empty descriptions.
pub(crate) fn method_list(response: &RawResponse) -> Result<IndexMap<String, String>> {
    let mut methods = IndexMap::new();
    match response.data()? {
        Value::Map(entries) => {
            for (name, description) in entries {
                let description = match description {
                    Value::String(s) => s,
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                methods.insert(name, description);
            }
        }
        Value::List(names) => {
            for name in names {
                if let Value::String(name) = name {
                    methods.entry(name).or_default();
                }
            }
        }
        other => {
            return Err(Error::DeserializationFailed {
                raw_response: response.text(),
                serde_error: format!("expected a method map, found {}", other.type_name()),
                status: response.status(),
            })
        }
    }
    Ok(methods)
}

fn multipart_form(encoded: &EncodedParams) -> Result<multipart::Form> {
    let mut form = multipart::Form::new();
    for (name, value) in &encoded.fields {
        form = form.text(name.clone(), value.clone());
    }
    for (name, file) in &encoded.files {
        let mut part = multipart::Part::bytes(file.content.to_vec());
        if let Some(filename) = &file.filename {
            part = part.file_name(filename.clone());
        }
        if let Some(mime) = &file.mime {
            part = part.mime_str(mime).map_err(|e| {
                Error::ConfigurationError(format!("Invalid MIME type for {}: {}", name, e))
            })?;
        }
        form = form.part(name.clone(), part);
    }
    Ok(form)
}

/// Builder for configuring and connecting a [`RequestHandler`].
///
/// # Examples
///
/// ```no_run
/// use ubersmith::{RequestHandlerBuilder, RetryStrategy};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), ubersmith::Error> {
/// let handler = RequestHandlerBuilder::new()
///     .base_url("https://billing.example.com/api/2.0/")?
///     .credentials("admin", "secret")
///     .verify(false)
///     .timeout(Duration::from_secs(30))
///     .retry_strategy(RetryStrategy::Linear {
///         delay: Duration::from_secs(5),
///         max_retries: 4,
///     })
///     .default_header("User-Agent", "billing-sync/1.0")?
///     .connect()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct RequestHandlerBuilder {
    base_url: Option<Url>,
    username: Option<String>,
    password: Option<String>,
    verify: bool,
    default_headers: HeaderMap,
    retry_strategy: RetryStrategy,
    timeout: Option<Duration>,
    http_client: Option<reqwest::Client>,
}

impl RequestHandlerBuilder {
    /// Creates a builder with certificate verification on and the default
    /// token-update retry strategy.
    pub fn new() -> Self {
        Self {
            base_url: None,
            username: None,
            password: None,
            verify: true,
            default_headers: HeaderMap::new(),
            retry_strategy: RetryStrategy::default(),
            timeout: None,
            http_client: None,
        }
    }

    /// Sets the API endpoint, e.g. `https://billing.example.com/api/2.0/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Sets the basic-auth username and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Whether to verify the server's TLS certificate. Ignored when a custom
    /// [`http_client`](Self::http_client) is supplied.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets how many times, and how far apart, the token-update page is retried.
    pub fn retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Sets the per-attempt request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends requests through an existing `reqwest::Client` instead of a new one.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Connects to Ubersmith: fetches the method list, then the version.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was set or the method list cannot be
    /// fetched. A failing version lookup only leaves the version `"Unknown"`,
    /// unless it failed at the transport level.
    pub async fn connect(self) -> Result<RequestHandler> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .danger_accept_invalid_certs(!self.verify)
                .build()
                .map_err(|e| {
                    Error::ConfigurationError(format!("Failed to build HTTP client: {}", e))
                })?,
        };

        let mut methods = IndexMap::new();
        methods.insert(METHOD_LIST.to_string(), METHOD_LIST_DESCRIPTION.to_string());

        let mut inner = HandlerInner {
            http_client,
            base_url,
            username: self.username,
            password: self.password,
            default_headers: self.default_headers,
            retry_strategy: self.retry_strategy,
            timeout: self.timeout,
            methods,
            version: UNKNOWN_VERSION.to_string(),
            latest_version: UNKNOWN_VERSION.to_string(),
        };

        inner.discover_methods().await?;
        inner.discover_version().await?;

        tracing::info!(
            base_url = %inner.base_url,
            version = %inner.version,
            methods = inner.methods.len(),
            "Connected to Ubersmith"
        );

        Ok(RequestHandler {
            inner: Arc::new(inner),
        })
    }
}

impl Default for RequestHandlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
