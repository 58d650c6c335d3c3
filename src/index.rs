//! Version-pinned method indexes.
//!
//! An index is a JSON file named after an Ubersmith version (`4.6.1.json`)
//! that maps module name to method name to [`MethodInfo`]. It drives the
//! [`Registry`](crate::Registry) without querying the server for every method
//! on startup. [`MethodIndex::generate`] rebuilds one from a live server.

use crate::{
    call::Required,
    handler::{self, METHOD_GET, METHOD_LIST},
    Error, Params, RequestHandler, Result,
};
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const INDEX_EXTENSION: &str = "json";
const PROGRESS_TEMPLATE: &str = "{spinner:.green} Generating index for {prefix}: [{bar:30.cyan/blue}] {pos}/{len} {msg}";

/// Metadata about a single method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodInfo {
    /// The full method name. Falls back to the index key when empty.
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub description: String,
    /// Request fields the method needs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<Required>,
    /// Anything else the server reported about the method.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Module name to method name to metadata.
pub type IndexData = IndexMap<String, IndexMap<String, MethodInfo>>;

/// Options for [`MethodIndex::generate`].
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Pause between consecutive `uber.method_get` queries.
    pub delay: Duration,
    /// Rebuild even if an index for the version already exists.
    pub force: bool,
    /// Draw a progress bar on stderr.
    pub interactive: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            force: false,
            interactive: false,
        }
    }
}

/// A method index loaded from disk.
#[derive(Debug, Clone)]
pub struct MethodIndex {
    directory: PathBuf,
    index_name: String,
    wanted_version: String,
    data: IndexData,
}

/// Returns the file name of the index for `version`.
pub fn index_file_name(version: &str) -> String {
    format!("{}.{}", version, INDEX_EXTENSION)
}

fn parse_version(version: &str) -> Option<Vec<u64>> {
    version.split('.').map(|part| part.parse().ok()).collect()
}

impl MethodIndex {
    /// Loads the index for `version` from `directory`.
    ///
    /// When there is no file for `version`, logs a warning and loads the
    /// highest version present instead, comparing versions as dotted integers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexNotFound`] if the directory holds no index at all,
    /// and [`Error::Index`] if the chosen file is not a valid index.
    pub async fn load(directory: impl Into<PathBuf>, version: &str) -> Result<Self> {
        let directory = directory.into();
        let wanted = index_file_name(version);
        let available = Self::available_indexes(&directory).await?;

        let index_name = if available.contains(&wanted) {
            wanted
        } else {
            let latest = Self::latest_index(&available).ok_or_else(|| Error::IndexNotFound {
                directory: directory.clone(),
            })?;
            tracing::warn!(
                wanted_version = version,
                using = %latest,
                "The requested version of the API is not available, using the latest index instead"
            );
            latest
        };

        let path = directory.join(&index_name);
        let contents = tokio::fs::read_to_string(&path).await?;
        let mut data: IndexData = serde_json::from_str(&contents)
            .map_err(|e| Error::Index(format!("{}: {}", path.display(), e)))?;
        fill_method_names(&mut data);

        tracing::debug!(index = %path.display(), modules = data.len(), "Loaded method index");

        Ok(Self {
            directory,
            index_name,
            wanted_version: version.to_string(),
            data,
        })
    }

    /// Loads the index matching the handler's reported version.
    pub async fn for_handler(
        directory: impl Into<PathBuf>,
        handler: &RequestHandler,
    ) -> Result<Self> {
        Self::load(directory, handler.version()).await
    }

    /// Builds an index in memory, without a backing file.
    pub fn from_data(version: &str, mut data: IndexData) -> Self {
        fill_method_names(&mut data);
        Self {
            directory: PathBuf::new(),
            index_name: index_file_name(version),
            wanted_version: version.to_string(),
            data,
        }
    }

    /// Lists the index files in `directory`. A missing directory holds none.
    pub async fn available_indexes(directory: &Path) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(INDEX_EXTENSION) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Picks the highest-versioned name. Names that are not dotted integers are skipped.
    fn latest_index(names: &[String]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| {
                let stem = name.strip_suffix(INDEX_EXTENSION)?.strip_suffix('.')?;
                parse_version(stem).map(|version| (version, name))
            })
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, name)| name.clone())
    }

    /// The version of the index actually loaded.
    pub fn version(&self) -> &str {
        self.index_name
            .strip_suffix(INDEX_EXTENSION)
            .and_then(|stem| stem.strip_suffix('.'))
            .unwrap_or(&self.index_name)
    }

    /// The version that was asked for.
    pub fn wanted_version(&self) -> &str {
        &self.wanted_version
    }

    /// Returns `true` if a different version's index stood in for the wanted one.
    pub fn is_fallback(&self) -> bool {
        self.version() != self.wanted_version
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The whole index.
    pub fn data(&self) -> &IndexData {
        &self.data
    }

    /// The methods of `module`, keyed by full method name.
    pub fn get_methods(&self, module: &str) -> Option<&IndexMap<String, MethodInfo>> {
        self.data.get(module)
    }

    /// The method names of `module`; empty when the module is unknown.
    pub fn method_names(&self, module: &str) -> Vec<&str> {
        self.get_methods(module)
            .map(|methods| methods.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// The metadata for `method`, looked up under its module.
    pub fn get_method(&self, method: &str) -> Option<&MethodInfo> {
        let module = method.split_once('.').map_or(method, |(module, _)| module);
        self.data.get(module)?.get(method)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Rebuilds the index for the handler's version by querying every method.
    ///
    /// Queries run one at a time with `options.delay` between them. Methods
    /// whose metadata cannot be fetched are logged and left out. Returns
    /// `Ok(None)` without querying anything when the index already exists and
    /// `options.force` is not set.
    ///
    /// # Errors
    ///
    /// Fails if the method list cannot be fetched or the file cannot be written.
    pub async fn generate(
        handler: &RequestHandler,
        directory: impl AsRef<Path>,
        options: GenerateOptions,
    ) -> Result<Option<Self>> {
        let directory = directory.as_ref();
        let version = handler.version();
        let path = directory.join(index_file_name(version));

        let progress = if options.interactive {
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(PROGRESS_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_prefix(version.to_string());
            bar
        } else {
            ProgressBar::hidden()
        };
        progress.set_message("Starting...");

        if tokio::fs::try_exists(&path).await? {
            tracing::warn!(index = %path.display(), "The index for the current version already exists");
            if !options.force {
                progress.finish_with_message("Index already exists");
                return Ok(None);
            }
        }

        progress.set_message("Querying method list...");
        let listing = handler.process_request(METHOD_LIST, None).await?;
        let methods = handler::method_list(&listing)?;
        progress.set_length(methods.len() as u64);

        let mut data = IndexData::new();
        for (i, (method, description)) in methods.iter().enumerate() {
            if i > 0 && !options.delay.is_zero() {
                tokio::time::sleep(options.delay).await;
            }
            progress.set_message(format!("Querying method {}...", method));
            tracing::debug!(method = %method, position = i + 1, total = methods.len(), "Querying method");

            match fetch_method_info(handler, method, description).await {
                Ok(info) => {
                    let module = method.split_once('.').map_or(method.as_str(), |(m, _)| m);
                    data.entry(module.to_string())
                        .or_default()
                        .insert(method.clone(), info);
                }
                Err(e) => {
                    tracing::warn!(method = %method, error = %e, "Failed to get method");
                }
            }
            progress.inc(1);
        }

        progress.set_message("Writing index to disk...");
        tokio::fs::create_dir_all(directory).await?;
        let contents = serde_json::to_vec(&data)
            .map_err(|e| Error::Index(format!("Failed to serialize index: {}", e)))?;
        tokio::fs::write(&path, contents).await?;

        tracing::info!(
            index = %path.display(),
            modules = data.len(),
            methods = data.values().map(IndexMap::len).sum::<usize>(),
            "Generated method index"
        );
        progress.finish_with_message("Done!");

        Self::load(directory, version).await.map(Some)
    }
}

async fn fetch_method_info(
    handler: &RequestHandler,
    method: &str,
    description: &str,
) -> Result<MethodInfo> {
    let params = Params::new().with("method_name", method);
    let response = handler.process_request(METHOD_GET, Some(&params)).await?;

    let mut data = match response.json()?.get("data") {
        Some(serde_json::Value::Object(fields)) => fields.clone(),
        other => {
            let found = other.map_or("nothing", json_type_name);
            return Err(Error::Index(format!(
                "{}: expected method details, found {}",
                method, found
            )));
        }
    };
    data.remove("output");

    let mut info: MethodInfo = serde_json::from_value(serde_json::Value::Object(data))
        .map_err(|e| Error::Index(format!("{}: {}", method, e)))?;
    if info.method.is_empty() {
        info.method = method.to_string();
    }
    if info.description.is_empty() {
        info.description = description.to_string();
    }
    Ok(info)
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
}

fn fill_method_names(data: &mut IndexData) {
    for methods in data.values_mut() {
        for (name, info) in methods.iter_mut() {
            if info.method.is_empty() {
                info.method = name.clone();
            }
        }
    }
}
