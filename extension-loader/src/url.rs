use std::collections::HashMap;
use std::sync::Arc;

use multimap::MultiMap;

////////////////////////////////////////////////////////////////////////////////////////////////

/// Immutable, string-indexed runtime configuration carrier.
///
/// This is the sole runtime input to adaptive dispatch (§4.5) and to the
/// activate selector (§4.6): a `protocol` discriminator, a flat multi-map of
/// parameters, and optional per-method parameter overrides.
#[derive(Clone, Debug, Default)]
pub struct Url(Arc<UrlInner>);

#[derive(Debug, Default)]
struct UrlInner {
    protocol: String,
    host: String,
    port: u16,
    path: String,
    parameters: MultiMap<String, String>,
    method_parameters: HashMap<String, MultiMap<String, String>>,
}

impl Url {
    pub fn builder() -> UrlBuilder {
        UrlBuilder::default()
    }

    pub fn protocol(&self) -> &str {
        &self.0.protocol
    }

    pub fn host(&self) -> &str {
        &self.0.host
    }

    pub fn port(&self) -> u16 {
        self.0.port
    }

    pub fn path(&self) -> &str {
        &self.0.path
    }

    /// First value bound to `key`, if any.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.0
            .parameters
            .get(key)
            .map(std::string::String::as_str)
    }

    pub fn parameter_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.parameter(key).unwrap_or(default)
    }

    pub fn all_parameters(&self, key: &str) -> &[String] {
        self.0
            .parameters
            .get_vec(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn parameter_keys(&self) -> impl Iterator<Item = &str> {
        self.0.parameters.keys().map(std::string::String::as_str)
    }

    /// Looks up `key` scoped to `method`'s per-method overrides first,
    /// falling back to the plain parameter of the same name (§8 "Per-method
    /// key" property).
    pub fn method_parameter(&self, method: &str, key: &str) -> Option<&str> {
        self.0
            .method_parameters
            .get(method)
            .and_then(|m| m.get(key))
            .map(std::string::String::as_str)
            .or_else(|| self.parameter(key))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Default)]
pub struct UrlBuilder {
    protocol: String,
    host: String,
    port: u16,
    path: String,
    parameters: MultiMap<String, String>,
    method_parameters: HashMap<String, MultiMap<String, String>>,
}

impl UrlBuilder {
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn method_parameter(
        mut self,
        method: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.method_parameters
            .entry(method.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Url {
        Url(Arc::new(UrlInner {
            protocol: self.protocol,
            host: self.host,
            port: self.port,
            path: self.path,
            parameters: self.parameters,
            method_parameters: self.method_parameters,
        }))
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// Implemented by argument types that expose a URL getter rather than
/// being a URL themselves (§4.5 step 2: "a parameter whose type exposes a
/// zero-argument getter returning URL"). A parameter type is opted into
/// this path explicitly with `#[url]` in an `#[adaptive(...)]` method
/// signature; the macro then calls `HasUrl::url` on it instead of trying to
/// use the parameter as a `Url` directly.
pub trait HasUrl {
    fn url(&self) -> &Url;
}

impl HasUrl for Url {
    fn url(&self) -> &Url {
        self
    }
}

/// Extraction used by generated adaptive method bodies for parameters
/// typed `Url`/`&Url` directly (the common case, §4.5 step 2 "If a URL
/// argument is found directly").
pub trait ExtractUrl {
    fn extract_url(&self) -> Option<&Url>;
}

impl ExtractUrl for Url {
    fn extract_url(&self) -> Option<&Url> {
        Some(self)
    }
}

impl ExtractUrl for &Url {
    fn extract_url(&self) -> Option<&Url> {
        Some(self)
    }
}
