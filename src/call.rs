//! Calls: validation, dispatch and cleaning of a single API method.
//!
//! A [`Call`] describes one remote method: its name, which request fields it
//! needs and how to clean its payload. [`Call::render`] runs the whole
//! pipeline against a [`RequestHandler`]. A [`Registry`] holds every call of
//! an index, grouped by module, built up front.

use crate::{
    index::MethodIndex, Cleaner, Error, Params, RawResponse, RequestHandler, Result,
    TypedResponse,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A request field requirement.
///
/// In an index file a plain string is a single field and an array is a
/// group of alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Required {
    /// The field must be present.
    Field(String),
    /// At least one of the fields must be present.
    AnyOf(Vec<String>),
}

impl Required {
    pub fn is_satisfied(&self, params: &Params) -> bool {
        match self {
            Required::Field(field) => params.contains_key(field),
            Required::AnyOf(fields) => fields.iter().any(|field| params.contains_key(field)),
        }
    }

    fn describe(&self) -> String {
        match self {
            Required::Field(field) => field.clone(),
            Required::AnyOf(fields) => format!("one of ({})", fields.join(", ")),
        }
    }
}

/// One remote method, with its validation rules and payload cleaner.
///
/// # Examples
///
/// ```no_run
/// use ubersmith::{Call, Cleaner, Params, RequestHandler};
///
/// # async fn example(handler: RequestHandler) -> Result<(), ubersmith::Error> {
/// let invoice_count = Call::new("client.invoice_count")
///     .require("client_id")
///     .cleaner(Cleaner::Int);
///
/// let count = invoice_count
///     .render(&handler, Some(&Params::new().with("client_id", 50)))
///     .await?;
/// assert_eq!(count.to_int(), Some(42));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Call {
    method: String,
    description: String,
    required: Vec<Required>,
    cleaner: Option<Cleaner>,
}

impl Call {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            description: String::new(),
            required: Vec::new(),
            cleaner: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Requires `field` to be present in the request data.
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(Required::Field(field.into()));
        self
    }

    /// Requires at least one of `fields` to be present.
    pub fn require_any<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required
            .push(Required::AnyOf(fields.into_iter().map(Into::into).collect()));
        self
    }

    pub fn requirements(mut self, required: impl IntoIterator<Item = Required>) -> Self {
        self.required.extend(required);
        self
    }

    pub fn cleaner(mut self, cleaner: Cleaner) -> Self {
        self.cleaner = Some(cleaner);
        self
    }

    /// The full method name, e.g. `client.get`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The module part of the method name, e.g. `client`.
    pub fn module(&self) -> &str {
        self.method
            .split_once('.')
            .map_or(self.method.as_str(), |(module, _)| module)
    }

    /// The method name without its module, e.g. `get`.
    pub fn name(&self) -> &str {
        self.method
            .split_once('.')
            .map_or(self.method.as_str(), |(_, name)| name)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn required(&self) -> &[Required] {
        &self.required
    }

    /// Checks the request data against the requirements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every unmet requirement.
    pub fn validate(&self, params: &Params) -> Result<()> {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|required| !required.is_satisfied(params))
            .map(Required::describe)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                method: self.method.clone(),
                missing,
            })
        }
    }

    /// Validates, sends and cleans the call.
    ///
    /// Validation failures are returned before anything is sent.
    pub async fn render(
        &self,
        handler: &RequestHandler,
        params: Option<&Params>,
    ) -> Result<TypedResponse> {
        let empty = Params::new();
        let params = params.unwrap_or(&empty);

        self.validate(params)?;
        let response = self.process_request(handler, params).await?;
        self.clean(response)
    }

    /// Sends the call without validating or cleaning it.
    pub async fn process_request(
        &self,
        handler: &RequestHandler,
        params: &Params,
    ) -> Result<RawResponse> {
        handler.process_request(&self.method, Some(params)).await
    }

    /// Cleans a raw response with this call's cleaner and wraps it by type.
    pub fn clean(&self, response: RawResponse) -> Result<TypedResponse> {
        response.clean(self.cleaner.as_ref())
    }

    /// Binds the call to a handler.
    pub fn bind<'a>(&'a self, handler: &'a RequestHandler) -> BoundCall<'a> {
        BoundCall {
            call: self,
            handler,
        }
    }
}

/// A [`Call`] bound to the handler that will fulfil it.
#[derive(Debug, Clone, Copy)]
pub struct BoundCall<'a> {
    call: &'a Call,
    handler: &'a RequestHandler,
}

impl<'a> BoundCall<'a> {
    pub fn call(&self) -> &'a Call {
        self.call
    }

    pub async fn invoke(&self, params: &Params) -> Result<TypedResponse> {
        self.call.render(self.handler, Some(params)).await
    }
}

/// Every known call, grouped by module.
///
/// # Examples
///
/// ```
/// use ubersmith::{Call, Cleaner, Registry};
///
/// let mut registry = Registry::new();
/// registry.insert(Call::new("client.get").require("client_id"));
/// registry.insert(Call::new("client.invoice_count"));
///
/// assert!(registry.set_cleaner("client.invoice_count", Cleaner::Int));
/// assert_eq!(registry.module_names().collect::<Vec<_>>(), vec!["client"]);
/// assert_eq!(registry.get("client.get").unwrap().name(), "get");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registry {
    modules: BTreeMap<String, IndexMap<String, Call>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a call for every method in the index.
    pub fn from_index(index: &MethodIndex) -> Self {
        let mut registry = Self::new();
        for methods in index.data().values() {
            for (method, info) in methods {
                let name = if info.method.is_empty() {
                    method.as_str()
                } else {
                    info.method.as_str()
                };
                registry.insert(
                    Call::new(name)
                        .describe(info.description.clone())
                        .requirements(info.required.iter().cloned()),
                );
            }
        }
        tracing::debug!(calls = registry.len(), "Built call registry");
        registry
    }

    /// Adds or replaces a call.
    pub fn insert(&mut self, call: Call) -> Option<Call> {
        self.modules
            .entry(call.module().to_string())
            .or_default()
            .insert(call.name().to_string(), call)
    }

    /// Looks a call up by full method name.
    pub fn get(&self, method: &str) -> Option<&Call> {
        let (module, name) = method.split_once('.')?;
        self.modules.get(module)?.get(name)
    }

    /// Attaches a cleaner to a registered call. Returns `false` if it is unknown.
    pub fn set_cleaner(&mut self, method: &str, cleaner: Cleaner) -> bool {
        let Some((module, name)) = method.split_once('.') else {
            return false;
        };
        match self.modules.get_mut(module).and_then(|calls| calls.get_mut(name)) {
            Some(call) => {
                call.cleaner = Some(cleaner);
                true
            }
            None => false,
        }
    }

    /// The calls of a module, keyed by name without the module prefix.
    pub fn module(&self, module: &str) -> Option<&IndexMap<String, Call>> {
        self.modules.get(module)
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.modules.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Binds a module's calls to `handler`.
    pub fn bind<'a>(&'a self, module: &str, handler: &'a RequestHandler) -> Option<BoundModule<'a>> {
        let (name, calls) = self.modules.get_key_value(module)?;
        Some(BoundModule {
            name,
            calls,
            handler,
        })
    }
}

/// A module's calls bound to a handler, e.g. every `client.*` method.
#[derive(Debug, Clone, Copy)]
pub struct BoundModule<'a> {
    name: &'a str,
    calls: &'a IndexMap<String, Call>,
    handler: &'a RequestHandler,
}

impl<'a> BoundModule<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Looks a call up by its name within the module, e.g. `get`.
    pub fn call(&self, name: &str) -> Option<BoundCall<'a>> {
        self.calls.get(name).map(|call| call.bind(self.handler))
    }

    pub fn call_names(&self) -> impl Iterator<Item = &'a str> {
        self.calls.keys().map(String::as_str)
    }

    /// Invokes `name` with `params`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMethod`] if the module has no such call.
    pub async fn invoke(&self, name: &str, params: &Params) -> Result<TypedResponse> {
        let call = self.call(name).ok_or_else(|| Error::InvalidMethod {
            method: format!("{}.{}", self.name, name),
        })?;
        call.invoke(params).await
    }
}
