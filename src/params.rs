//! Request data and its form encoding.
//!
//! Ubersmith is a PHP application, so nested request data travels as
//! bracketed form keys: `{a: {b: [1, 2]}}` becomes `a[b][0]=1&a[b][1]=2`.
//! [`Params`] holds the nested structure; [`Params::encode`] flattens it and
//! separates file uploads from plain fields.

use bytes::Bytes;
use indexmap::IndexMap;
use url::form_urlencoded;

/// A file to upload as part of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    /// The filename reported to the server.
    pub filename: Option<String>,
    /// The MIME type, if known.
    pub mime: Option<String>,
    /// The file content.
    pub content: Bytes,
}

impl FilePart {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            filename: None,
            mime: None,
            content: content.into(),
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// A single request parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// A scalar, already rendered as text.
    Text(String),
    /// Encoded as `key[0]`, `key[1]`, ...
    List(Vec<Param>),
    /// Encoded as `key[field]`.
    Map(Params),
    /// Sent as a multipart file part.
    File(FilePart),
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Text(s.to_string())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Text(s)
    }
}

impl From<&String> for Param {
    fn from(s: &String) -> Self {
        Param::Text(s.clone())
    }
}

macro_rules! param_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Param {
                fn from(n: $ty) -> Self {
                    Param::Text(n.to_string())
                }
            }
        )*
    };
}

param_from_display!(i32, i64, u32, u64, usize, f64, rust_decimal::Decimal);

/// Booleans are sent the way PHP reads them back: `1` or `0`.
impl From<bool> for Param {
    fn from(b: bool) -> Self {
        Param::Text(if b { "1" } else { "0" }.to_string())
    }
}

impl<T: Into<Param>> From<Vec<T>> for Param {
    fn from(items: Vec<T>) -> Self {
        Param::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Params> for Param {
    fn from(params: Params) -> Self {
        Param::Map(params)
    }
}

impl From<FilePart> for Param {
    fn from(file: FilePart) -> Self {
        Param::File(file)
    }
}

/// `null` becomes an empty field; strings are sent without JSON quoting.
impl From<serde_json::Value> for Param {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Param::Text(String::new()),
            serde_json::Value::Bool(b) => b.into(),
            serde_json::Value::Number(n) => Param::Text(n.to_string()),
            serde_json::Value::String(s) => Param::Text(s),
            serde_json::Value::Array(items) => {
                Param::List(items.into_iter().map(Param::from).collect())
            }
            serde_json::Value::Object(fields) => Param::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Param::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Named request parameters, in insertion order.
///
/// # Examples
///
/// ```
/// use ubersmith::Params;
///
/// let params = Params::new()
///     .with("client_id", 50)
///     .with("meta", Params::new().with("tags", vec!["vip", "net30"]));
///
/// let encoded = params.encode();
/// assert_eq!(
///     encoded.fields,
///     vec![
///         ("client_id".to_string(), "50".to_string()),
///         ("meta[tags][0]".to_string(), "vip".to_string()),
///         ("meta[tags][1]".to_string(), "net30".to_string()),
///     ]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(IndexMap<String, Param>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Param>) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds or replaces a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Param>) -> Option<Param> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Param> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Builds parameters from a JSON object. Returns `None` for anything else.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match Param::from(value) {
            Param::Map(params) => Some(params),
            _ => None,
        }
    }

    /// Flattens nested lists and maps into bracketed key paths.
    ///
    /// Empty lists and maps produce no keys.
    pub fn flatten(&self) -> Vec<(String, &Param)> {
        let mut out = Vec::new();
        for (key, value) in &self.0 {
            flatten_into(key.clone(), value, &mut out);
        }
        out
    }

    /// Flattens the parameters and splits off file uploads.
    pub fn encode(&self) -> EncodedParams {
        let mut encoded = EncodedParams::default();
        for (key, leaf) in self.flatten() {
            match leaf {
                Param::Text(text) => encoded.fields.push((key, text.clone())),
                Param::File(file) => encoded.files.push((key, file.clone())),
                Param::List(_) | Param::Map(_) => {}
            }
        }
        encoded
    }
}

fn flatten_into<'a>(key: String, value: &'a Param, out: &mut Vec<(String, &'a Param)>) {
    match value {
        Param::List(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(format!("{}[{}]", key, i), item, out);
            }
        }
        Param::Map(params) => {
            for (sub, item) in &params.0 {
                flatten_into(format!("{}[{}]", key, sub), item, out);
            }
        }
        leaf => out.push((key, leaf)),
    }
}

impl<K: Into<String>, V: Into<Param>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Request parameters ready to be put on the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedParams {
    /// Plain form fields, in order.
    pub fields: Vec<(String, String)>,
    /// File uploads, keyed by their flattened field name.
    pub files: Vec<(String, FilePart)>,
}

impl EncodedParams {
    /// Returns `true` if the request must be sent as `multipart/form-data`.
    pub fn has_files(&self) -> bool {
        !self.files.is_empty()
    }

    /// Renders the plain fields as an `application/x-www-form-urlencoded` body.
    pub fn to_form_string(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.fields)
            .finish()
    }
}
