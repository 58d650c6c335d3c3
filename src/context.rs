//! The connected handler, its method index and the call registry, held together.

use crate::{
    BoundModule, Call, Config, Error, MethodIndex, Params, Registry, RequestHandler, Result,
    TypedResponse,
};

/// Everything needed to make calls against one Ubersmith instance.
///
/// # Examples
///
/// ```no_run
/// use ubersmith::{Config, Context, Params};
///
/// # async fn example() -> Result<(), ubersmith::Error> {
/// let context = Context::connect(&Config::from_env()?).await?;
///
/// let client = context
///     .call("client.get", &Params::new().with("client_id", 50))
///     .await?;
/// println!("{}", client);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    handler: RequestHandler,
    index: MethodIndex,
    registry: Registry,
}

impl Context {
    /// Builds the registry from `index` and takes ownership of both.
    pub fn new(handler: RequestHandler, index: MethodIndex) -> Self {
        let registry = Registry::from_index(&index);
        Self {
            handler,
            index,
            registry,
        }
    }

    /// Connects the handler and loads the index matching the server's version.
    ///
    /// # Errors
    ///
    /// Fails if `config` has no `index_dir`, if connecting fails, or if the
    /// directory holds no index.
    pub async fn connect(config: &Config) -> Result<Self> {
        let index_dir = config.index_dir.clone().ok_or_else(|| {
            Error::ConfigurationError("An index directory is required".to_string())
        })?;

        let handler = config.builder()?.connect().await?;
        let index = MethodIndex::for_handler(index_dir, &handler).await?;
        if index.is_fallback() {
            tracing::warn!(
                server_version = handler.version(),
                index_version = index.version(),
                "Using a method index for a different Ubersmith version"
            );
        }
        Ok(Self::new(handler, index))
    }

    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    pub fn index(&self) -> &MethodIndex {
        &self.index
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// For attaching cleaners or hand-written calls after startup.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Binds a module, e.g. `client`, to the handler.
    pub fn module(&self, name: &str) -> Option<BoundModule<'_>> {
        self.registry.bind(name, &self.handler)
    }

    /// Renders `method` with `params`.
    ///
    /// Methods missing from the registry but known to the handler are sent
    /// without validation or cleaning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMethod`] if neither knows the method.
    pub async fn call(&self, method: &str, params: &Params) -> Result<TypedResponse> {
        match self.registry.get(method) {
            Some(call) => call.render(&self.handler, Some(params)).await,
            None if self.handler.is_valid_method(method) => {
                tracing::debug!(method = method, "Method not in index, calling it directly");
                Call::new(method).render(&self.handler, Some(params)).await
            }
            None => Err(Error::InvalidMethod {
                method: method.to_string(),
            }),
        }
    }
}
