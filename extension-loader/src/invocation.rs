////////////////////////////////////////////////////////////////////////////////////////////////

/// A per-call descriptor. Adaptive dispatch consults `method_name()` to
/// perform per-method parameter lookups (§4.5 step 3); filters (§4.8)
/// receive it as the unit of propagation through the chain.
pub trait Invocation: Send + Sync {
    fn method_name(&self) -> &str;
}

/// Minimal concrete `Invocation`, handy for tests and for call sites that
/// have nothing richer to carry.
#[derive(Debug, Clone)]
pub struct SimpleInvocation {
    method_name: String,
}

impl SimpleInvocation {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
        }
    }
}

impl Invocation for SimpleInvocation {
    fn method_name(&self) -> &str {
        &self.method_name
    }
}

/// Opaque per-call return value produced by an `Invoker` (§4.8).
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub value: Option<String>,
}

impl Reply {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    pub fn empty() -> Self {
        Self { value: None }
    }
}
