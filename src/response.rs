//! Response types.
//!
//! A request first yields a [`RawResponse`]: the transport response with its
//! body held in memory and JSON decoded on demand. Cleaning turns it into a
//! [`TypedResponse`], which picks a wrapper by payload shape:
//!
//! - a JSON object becomes a [`MapResponse`], usable as a [`Map`]
//! - a JSON integer (or a field cleaned into one) becomes an [`IntResponse`],
//!   usable as an `i64`, operators included
//! - any other JSON value becomes a [`BaseResponse`]
//! - a non-JSON body becomes a [`FileResponse`] carrying the bytes and the
//!   filename from `Content-Disposition`
//!
//! Every wrapper is a [`Response<T>`], which dereferences to `T` and keeps the
//! HTTP metadata alongside.

use crate::{coerce, value::Map, Cleaner, Error, Result, Value};
use bytes::Bytes;
use http::{header, HeaderMap, StatusCode};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;
use std::time::Duration;

/// The message Ubersmith sends, with `error_code` 1, while in maintenance.
pub const MAINTENANCE_MESSAGE: &str =
    "We are currently undergoing maintenance, please check back shortly.";

const TOKEN_PAGE_MARKER: &[u8] = b"Updating Token";

/// The JSON envelope every Ubersmith API response is wrapped in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    /// Whether the call succeeded.
    pub status: bool,
    /// Ubersmith's error code, if any.
    pub error_code: Option<i64>,
    /// Ubersmith's error message; empty on success.
    pub error_message: String,
    /// The payload.
    pub data: serde_json::Value,
}

impl Envelope {
    /// Reads an envelope out of a decoded body.
    ///
    /// Ubersmith is loose with types here: `status` may be a boolean, a number
    /// or a string and `error_code` may arrive quoted, so both are read by
    /// truthiness and digits rather than failing the whole response.
    pub fn from_json(body: &serde_json::Value) -> Self {
        let status = body.get("status").is_some_and(json_truthy);
        let error_code = body.get("error_code").and_then(|code| match code {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });
        let error_message = match body.get("error_message") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let data = body.get("data").cloned().unwrap_or(serde_json::Value::Null);

        Self {
            status,
            error_code,
            error_message,
            data,
        }
    }

    /// Returns `true` if this is the scheduled-maintenance signature.
    pub fn is_maintenance(&self) -> bool {
        !self.status && self.error_code == Some(1) && self.error_message == MAINTENANCE_MESSAGE
    }

    pub(crate) fn code_label(&self) -> String {
        self.error_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

fn json_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(fields) => !fields.is_empty(),
    }
}

/// A successful transport response, before cleaning.
///
/// The body is decoded as JSON lazily and at most once.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    latency: Duration,
    attempts: usize,
    json: OnceLock<serde_json::Value>,
    cleaned: Option<Value>,
}

impl RawResponse {
    /// Creates a `RawResponse` from the parts of a received response.
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            latency,
            attempts,
            json: OnceLock::new(),
            cleaned: None,
        }
    }

    /// Returns a copy of this response whose [`data`](Self::data) is `cleaned`.
    pub fn with_cleaned(&self, cleaned: Value) -> Self {
        Self {
            cleaned: Some(cleaned),
            ..self.clone()
        }
    }

    /// Returns `true` once a cleaned value has been substituted for the payload.
    pub fn is_cleaned(&self) -> bool {
        self.cleaned.is_some()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Returns a header value by name, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The `Content-Type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE)?.to_str().ok()
    }

    /// Returns `true` if the content type is `application/json`, ignoring parameters.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
    }

    /// Returns `true` if this is Ubersmith's transient "Updating Token" HTML page.
    pub fn is_token_page(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
            && self
                .body
                .windows(TOKEN_PAGE_MARKER.len())
                .any(|window| window == TOKEN_PAGE_MARKER)
    }

    /// The decoded JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeserializationFailed`] if the body is not valid JSON.
    pub fn json(&self) -> Result<&serde_json::Value> {
        if let Some(json) = self.json.get() {
            return Ok(json);
        }
        let parsed = serde_json::from_slice(&self.body).map_err(|e| {
            tracing::error!(
                error = %e,
                raw_response = %self.text(),
                "Failed to deserialize response"
            );
            Error::DeserializationFailed {
                raw_response: self.text(),
                serde_error: e.to_string(),
                status: self.status,
            }
        })?;
        Ok(self.json.get_or_init(|| parsed))
    }

    /// The envelope of a JSON response.
    pub fn envelope(&self) -> Result<Envelope> {
        self.json().map(Envelope::from_json)
    }

    /// The payload: the cleaned value if one was substituted, else the
    /// envelope's `data` field.
    pub fn data(&self) -> Result<Value> {
        if let Some(cleaned) = &self.cleaned {
            return Ok(cleaned.clone());
        }
        let json = self.json()?;
        Ok(json
            .get("data")
            .cloned()
            .map(Value::from)
            .unwrap_or_default())
    }

    /// Moves the HTTP metadata into a [`Response`] around `data`.
    pub fn into_response<T>(self, data: T) -> Response<T> {
        Response::new(
            data,
            self.body,
            self.status,
            self.headers,
            self.latency,
            self.attempts,
        )
    }

    /// Cleans this response and picks the wrapper for its payload.
    ///
    /// JSON payloads are run through `cleaner` (if any) and wrapped by type;
    /// anything else becomes a [`FileResponse`].
    pub fn clean(self, cleaner: Option<&Cleaner>) -> Result<TypedResponse> {
        if !self.is_json() {
            let payload = FilePayload {
                filename: coerce::filename_from_disposition(
                    self.header(header::CONTENT_DISPOSITION.as_str()),
                ),
                content_type: self.content_type().map(str::to_string),
                content: self.body.clone(),
            };
            return Ok(TypedResponse::File(self.into_response(payload)));
        }

        let mut cleaned = self.data()?;
        if let Some(cleaner) = cleaner {
            cleaned = cleaner.apply(cleaned)?;
        }
        let raw = self.with_cleaned(cleaned.clone());

        Ok(match cleaned {
            Value::Map(map) => TypedResponse::Map(raw.into_response(map)),
            Value::Int(n) => TypedResponse::Int(raw.into_response(n)),
            other => TypedResponse::Base(raw.into_response(other)),
        })
    }
}

/// A typed payload together with the HTTP metadata of the exchange.
///
/// `Response<T>` dereferences to `T`, and compares, orders, iterates and
/// formats like it, so code written against a plain `Map` or `i64` works on
/// the wrapper unchanged.
///
/// # Examples
///
/// ```
/// # use ubersmith::Response;
/// # use bytes::Bytes;
/// # use http::{HeaderMap, StatusCode};
/// # use std::time::Duration;
/// let count = Response::new(
///     42i64,
///     Bytes::new(),
///     StatusCode::OK,
///     HeaderMap::new(),
///     Duration::from_millis(100),
///     1,
/// );
///
/// assert_eq!(count, 42);
/// assert_eq!(&count + 8, 50);
/// assert!(count > 40);
/// assert_eq!(count.to_float(), 42.0);
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The payload.
    pub data: T,

    /// The raw response body.
    pub raw_body: Bytes,

    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// Time from the first attempt being sent to the final response arriving,
    /// including any token-update pauses.
    pub latency: Duration,

    /// The number of attempts made, `1` unless the token-update page was hit.
    pub attempts: usize,
}

/// A response whose payload is a mapping.
pub type MapResponse = Response<Map>;
/// A response whose payload is an integer.
pub type IntResponse = Response<i64>;
/// A response whose body is a downloaded file.
pub type FileResponse = Response<FilePayload>;
/// A response with any other payload.
pub type BaseResponse = Response<Value>;

impl<T> Response<T> {
    pub fn new(
        data: T,
        raw_body: Bytes,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            raw_body,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the payload, keeping the metadata.
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            raw_body: self.raw_body,
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Discards the metadata.
    pub fn into_inner(self) -> T {
        self.data
    }

    /// Returns `true` if the token-update page forced a re-send.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a reference to a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}

impl<T> AsRef<T> for Response<T> {
    fn as_ref(&self) -> &T {
        &self.data
    }
}

impl<T> Deref for Response<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl<T> DerefMut for Response<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl<T: fmt::Display> fmt::Display for Response<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.data.fmt(f)
    }
}

/// Serializes as the bare payload.
impl<T: Serialize> Serialize for Response<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

/// Two responses are equal when their payloads are; metadata is ignored.
impl<T: PartialEq> PartialEq for Response<T> {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl<T: PartialOrd> PartialOrd for Response<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.data.partial_cmp(&other.data)
    }
}

impl<'a, T> IntoIterator for &'a Response<T>
where
    &'a T: IntoIterator,
{
    type Item = <&'a T as IntoIterator>::Item;
    type IntoIter = <&'a T as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        (&self.data).into_iter()
    }
}

impl IntoIterator for Response<Map> {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl PartialEq<Map> for Response<Map> {
    fn eq(&self, other: &Map) -> bool {
        &self.data == other
    }
}

impl PartialEq<Response<Map>> for Map {
    fn eq(&self, other: &Response<Map>) -> bool {
        self == &other.data
    }
}

impl Response<Map> {
    /// A copy of the mapping.
    pub fn to_map(&self) -> Map {
        self.data.clone()
    }

    /// Returns the value for `key`, or `default` when it is absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.data.get(key).unwrap_or(default)
    }

    /// Copies every entry of `other` in, replacing existing keys.
    pub fn update(&mut self, other: impl IntoIterator<Item = (String, Value)>) {
        self.data.extend(other);
    }

    /// Removes `key`, keeping the order of the remaining entries.
    pub fn pop(&mut self, key: &str) -> Option<Value> {
        self.data.shift_remove(key)
    }

    /// Removes and returns the last entry.
    pub fn pop_item(&mut self) -> Option<(String, Value)> {
        self.data.pop()
    }

    /// Inserts `value` under `key` unless the key exists; returns the stored value.
    pub fn set_default(&mut self, key: impl Into<String>, value: Value) -> &mut Value {
        self.data.entry(key.into()).or_insert(value)
    }
}

impl Response<i64> {
    pub fn to_int(&self) -> i64 {
        self.data
    }

    pub fn to_float(&self) -> f64 {
        self.data as f64
    }

    /// Division rounding toward negative infinity.
    ///
    /// # Panics
    ///
    /// Panics if `rhs` is zero, like integer division.
    pub fn floor_div(&self, rhs: i64) -> i64 {
        let q = self.data / rhs;
        if self.data % rhs != 0 && ((self.data < 0) != (rhs < 0)) {
            q - 1
        } else {
            q
        }
    }

    /// Remainder with the sign of `rhs`, pairing with [`floor_div`](Self::floor_div).
    pub fn floor_mod(&self, rhs: i64) -> i64 {
        self.data - self.floor_div(rhs) * rhs
    }

    /// Division as floating point.
    pub fn true_div(&self, rhs: f64) -> f64 {
        self.to_float() / rhs
    }
}

impl From<Response<i64>> for i64 {
    fn from(response: Response<i64>) -> Self {
        response.data
    }
}

impl From<&Response<i64>> for f64 {
    fn from(response: &Response<i64>) -> Self {
        response.to_float()
    }
}

impl PartialEq<i64> for Response<i64> {
    fn eq(&self, other: &i64) -> bool {
        self.data == *other
    }
}

impl PartialEq<Response<i64>> for i64 {
    fn eq(&self, other: &Response<i64>) -> bool {
        *self == other.data
    }
}

impl PartialOrd<i64> for Response<i64> {
    fn partial_cmp(&self, other: &i64) -> Option<Ordering> {
        self.data.partial_cmp(other)
    }
}

impl PartialOrd<Response<i64>> for i64 {
    fn partial_cmp(&self, other: &Response<i64>) -> Option<Ordering> {
        self.partial_cmp(&other.data)
    }
}

macro_rules! int_binary_ops {
    ($($trait:ident $method:ident),* $(,)?) => {
        $(
            impl std::ops::$trait<i64> for Response<i64> {
                type Output = i64;

                fn $method(self, rhs: i64) -> i64 {
                    std::ops::$trait::$method(self.data, rhs)
                }
            }

            impl std::ops::$trait<i64> for &Response<i64> {
                type Output = i64;

                fn $method(self, rhs: i64) -> i64 {
                    std::ops::$trait::$method(self.data, rhs)
                }
            }

            impl std::ops::$trait<Response<i64>> for i64 {
                type Output = i64;

                fn $method(self, rhs: Response<i64>) -> i64 {
                    std::ops::$trait::$method(self, rhs.data)
                }
            }

            impl std::ops::$trait<&Response<i64>> for i64 {
                type Output = i64;

                fn $method(self, rhs: &Response<i64>) -> i64 {
                    std::ops::$trait::$method(self, rhs.data)
                }
            }

            impl std::ops::$trait for Response<i64> {
                type Output = i64;

                fn $method(self, rhs: Response<i64>) -> i64 {
                    std::ops::$trait::$method(self.data, rhs.data)
                }
            }
        )*
    };
}

int_binary_ops!(
    Add add,
    Sub sub,
    Mul mul,
    Div div,
    Rem rem,
    BitAnd bitand,
    BitOr bitor,
    BitXor bitxor,
    Shl shl,
    Shr shr,
);

impl std::ops::Neg for Response<i64> {
    type Output = i64;

    fn neg(self) -> i64 {
        -self.data
    }
}

impl std::ops::Not for Response<i64> {
    type Output = i64;

    fn not(self) -> i64 {
        !self.data
    }
}

/// A downloaded file, such as an invoice PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePayload {
    /// The file bytes.
    pub content: Bytes,
    /// The filename from `Content-Disposition`, when it names one.
    pub filename: Option<String>,
    /// The `Content-Type` header.
    pub content_type: Option<String>,
}

impl FilePayload {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl AsRef<[u8]> for FilePayload {
    fn as_ref(&self) -> &[u8] {
        &self.content
    }
}

impl Serialize for FilePayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.content)
    }
}

impl fmt::Display for FilePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.content))
    }
}

/// The result of a cleaned call, wrapped according to the payload's shape.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedResponse {
    Map(MapResponse),
    Int(IntResponse),
    File(FileResponse),
    Base(BaseResponse),
}

impl TypedResponse {
    /// The integer payload, if this is an [`IntResponse`].
    pub fn to_int(&self) -> Option<i64> {
        match self {
            TypedResponse::Int(r) => Some(r.data),
            _ => None,
        }
    }

    /// The mapping payload, if this is a [`MapResponse`].
    pub fn to_map(&self) -> Option<&Map> {
        match self {
            TypedResponse::Map(r) => Some(&r.data),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<MapResponse> {
        match self {
            TypedResponse::Map(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_int(self) -> Option<IntResponse> {
        match self {
            TypedResponse::Int(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_file(self) -> Option<FileResponse> {
        match self {
            TypedResponse::File(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FilePayload> {
        match self {
            TypedResponse::File(r) => Some(&r.data),
            _ => None,
        }
    }

    /// The filename of a file response.
    pub fn filename(&self) -> Option<&str> {
        self.as_file()?.filename.as_deref()
    }

    /// The payload as a [`Value`]. `None` for files.
    pub fn to_value(&self) -> Option<Value> {
        match self {
            TypedResponse::Map(r) => Some(Value::Map(r.data.clone())),
            TypedResponse::Int(r) => Some(Value::Int(r.data)),
            TypedResponse::Base(r) => Some(r.data.clone()),
            TypedResponse::File(_) => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            TypedResponse::Map(r) => r.status,
            TypedResponse::Int(r) => r.status,
            TypedResponse::File(r) => r.status,
            TypedResponse::Base(r) => r.status,
        }
    }

    pub fn attempts(&self) -> usize {
        match self {
            TypedResponse::Map(r) => r.attempts,
            TypedResponse::Int(r) => r.attempts,
            TypedResponse::File(r) => r.attempts,
            TypedResponse::Base(r) => r.attempts,
        }
    }
}

impl fmt::Display for TypedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedResponse::Map(r) => Value::Map(r.data.clone()).fmt(f),
            TypedResponse::Int(r) => r.fmt(f),
            TypedResponse::File(r) => r.fmt(f),
            TypedResponse::Base(r) => r.fmt(f),
        }
    }
}

impl Serialize for TypedResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TypedResponse::Map(r) => r.serialize(serializer),
            TypedResponse::Int(r) => r.serialize(serializer),
            TypedResponse::File(r) => r.serialize(serializer),
            TypedResponse::Base(r) => r.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn raw(content_type: &str, body: impl Into<Bytes>) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        RawResponse::new(StatusCode::OK, headers, body.into(), Duration::ZERO, 1)
    }

    fn json_raw(body: serde_json::Value) -> RawResponse {
        raw("application/json", body.to_string())
    }

    fn int_response(n: i64) -> IntResponse {
        json_raw(json!({"status": true, "data": n}))
            .clean(None)
            .unwrap()
            .into_int()
            .unwrap()
    }

    #[test]
    fn test_envelope_lenient_fields() {
        let envelope = Envelope::from_json(&json!({
            "status": 0,
            "error_code": "3",
            "error_message": null,
        }));
        assert!(!envelope.status);
        assert_eq!(envelope.error_code, Some(3));
        assert_eq!(envelope.error_message, "");
        assert_eq!(envelope.data, serde_json::Value::Null);
    }

    #[test]
    fn test_maintenance_signature_requires_exact_message() {
        let down = Envelope::from_json(&json!({
            "status": false, "error_code": 1, "error_message": MAINTENANCE_MESSAGE,
        }));
        assert!(down.is_maintenance());

        let other = Envelope::from_json(&json!({
            "status": false, "error_code": 1, "error_message": "Something else",
        }));
        assert!(!other.is_maintenance());
    }

    #[test]
    fn test_json_content_type_with_parameters() {
        assert!(raw("application/json; charset=utf-8", "{}").is_json());
        assert!(!raw("text/html", "{}").is_json());
    }

    #[test]
    fn test_token_page_detection() {
        assert!(raw("text/html; charset=UTF-8", "<html>Updating Token</html>").is_token_page());
        assert!(!raw("text/html", "<html>Oops</html>").is_token_page());
        assert!(!raw("application/json", "\"Updating Token\"").is_token_page());
    }

    #[test]
    fn test_data_prefers_cleaned_value() {
        let response = json_raw(json!({"status": true, "data": {"a": "1"}}));
        assert!(!response.is_cleaned());
        assert_eq!(response.data().unwrap(), Value::from(json!({"a": "1"})));

        let cleaned = response.with_cleaned(Value::Int(7));
        assert!(cleaned.is_cleaned());
        assert_eq!(cleaned.data().unwrap(), Value::Int(7));
    }

    #[test]
    fn test_invalid_json_reports_body() {
        let err = raw("application/json", "not json").json().unwrap_err();
        assert_eq!(err.raw_response(), Some("not json"));
    }

    #[test]
    fn test_map_response_behaves_like_map() {
        let body = json!({"status": true, "data": {"clientid": "50", "first": "Bob"}});
        let mut response = json_raw(body).clean(None).unwrap().into_map().unwrap();

        let expected = match Value::from(json!({"first": "Bob", "clientid": "50"})) {
            Value::Map(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(response, expected);
        assert_eq!(response.len(), 2);
        assert!(response.contains_key("clientid"));
        assert_eq!(response["first"], Value::from("Bob"));
        assert_eq!(response.keys().collect::<Vec<_>>(), vec!["clientid", "first"]);
        assert_eq!((&response).into_iter().count(), 2);

        response.insert("last".to_string(), Value::from("Smith"));
        response.update([("first".to_string(), Value::from("Robert"))]);
        assert_eq!(response.get("first"), Some(&Value::from("Robert")));
        assert_eq!(response.pop("clientid"), Some(Value::from("50")));
        assert_eq!(response.pop("clientid"), None);
        assert_eq!(response.set_default("first", Value::Null), &Value::from("Robert"));
        assert_eq!(response.get_or("missing", &Value::Int(0)), &Value::Int(0));
        assert_eq!(response.pop_item(), Some(("last".to_string(), Value::from("Smith"))));
        response.clear();
        assert!(response.is_empty());
    }

    #[test]
    fn test_map_response_keeps_server_key_order() {
        let response = raw(
            "application/json",
            r#"{"status": true, "data": {"zeta": "1", "alpha": "2", "mid": "3"}}"#,
        );
        let cleaner = Cleaner::fields().field("alpha", Cleaner::Int);
        let mut map = response.clean(Some(&cleaner)).unwrap().into_map().unwrap();

        assert_eq!(map.keys().map(String::as_str).collect::<Vec<_>>(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(map.get("alpha"), Some(&Value::Int(2)));
        assert_eq!(map.pop_item(), Some(("mid".to_string(), Value::from("3"))));
        assert_eq!(map.pop("zeta"), Some(Value::from("1")));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["alpha"]);
    }

    #[test]
    fn test_int_response_behaves_like_int() {
        let n = int_response(42);

        assert_eq!(n, 42);
        assert_eq!(42, n);
        assert!(n > 41 && n < 43);
        assert!(40 < n);
        assert_eq!(n.clone() + 1, 43);
        assert_eq!(1 + n.clone(), 43);
        assert_eq!(&n - 2, 40);
        assert_eq!(100 - &n, 58);
        assert_eq!(&n * 2, 84);
        assert_eq!(&n / 5, 8);
        assert_eq!(&n % 5, 2);
        assert_eq!(&n & 0b1010, 0b1010);
        assert_eq!(&n | 1, 43);
        assert_eq!(&n ^ 42, 0);
        assert_eq!(&n << 1, 84);
        assert_eq!(&n >> 1, 21);
        assert_eq!(-n.clone(), -42);
        assert_eq!(!n.clone(), !42i64);
        assert_eq!(n.pow(2), 1764);
        assert_eq!(n.abs(), 42);
        assert_eq!(n.to_float(), 42.0);
        assert_eq!(n.true_div(8.0), 5.25);
        assert_eq!(i64::from(n), 42);
    }

    #[test]
    fn test_floor_division_matches_floor_semantics() {
        let n = int_response(-7);
        assert_eq!(n.floor_div(2), -4);
        assert_eq!(n.floor_mod(2), 1);
        let n = int_response(7);
        assert_eq!(n.floor_div(-2), -4);
        assert_eq!(n.floor_mod(-2), -1);
        assert_eq!(n.floor_div(2), 3);
    }

    #[test]
    fn test_wrapper_selection() {
        let base = json_raw(json!({"status": true, "data": "hello"})).clean(None).unwrap();
        assert!(matches!(base, TypedResponse::Base(_)));
        assert_eq!(base.to_string(), "hello");

        let list = json_raw(json!({"status": true, "data": [1, 2]})).clean(None).unwrap();
        assert_eq!(list.to_value(), Some(Value::List(vec![Value::Int(1), Value::Int(2)])));

        let flag = json_raw(json!({"status": true, "data": true})).clean(None).unwrap();
        assert!(matches!(flag, TypedResponse::Base(_)));

        let cleaned = json_raw(json!({"status": true, "data": "42"}))
            .clean(Some(&Cleaner::Int))
            .unwrap();
        assert_eq!(cleaned.to_int(), Some(42));
    }

    #[test]
    fn test_file_response_with_and_without_filename() {
        let mut file = raw("application/pdf", "Some PDF data.");
        file.headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("inline; filename=Invoice-60.pdf"),
        );
        let typed = file.clean(None).unwrap();
        assert_eq!(typed.filename(), Some("Invoice-60.pdf"));
        let payload = typed.as_file().unwrap();
        assert_eq!(payload.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(payload.to_string(), "Some PDF data.");

        let typed = raw("application/pdf", "Some PDF data.").clean(None).unwrap();
        assert!(typed.as_file().is_some());
        assert_eq!(typed.filename(), None);
    }

    #[test]
    fn test_serializes_as_payload() {
        let typed = json_raw(json!({"status": true, "data": {"a": 1}})).clean(None).unwrap();
        assert_eq!(serde_json::to_value(&typed).unwrap(), json!({"a": 1}));
    }
}
