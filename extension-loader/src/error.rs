use std::collections::HashMap;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////////////////////

/// Every failure mode described in the loader's error handling design.
///
/// `Clone` so that a sticky adaptive-synthesis failure can be re-raised
/// verbatim on every subsequent call without re-running the code that
/// produced it.
#[derive(Error, Debug, Clone)]
pub enum ExtensionError {
    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("{type_name} is not an extension point: {reason}")]
    NotAnExtensionPoint {
        type_name: &'static str,
        reason: &'static str,
    },

    #[error("no such extension \"{name}\" for {interface}{}", format_causes(.errors))]
    NoSuchExtension {
        interface: &'static str,
        name: String,
        errors: Vec<(String, String)>,
    },

    #[error("ambiguous adaptive extension for {interface}: both {first} and {second} are adaptive")]
    AmbiguousAdaptive {
        interface: &'static str,
        first: &'static str,
        second: &'static str,
    },

    #[error("duplicate extension name \"{name}\" for {interface}: bound to both {first} and {second}")]
    DuplicateName {
        interface: &'static str,
        name: String,
        first: &'static str,
        second: &'static str,
    },

    #[error("{interface} has no @Adaptive method; cannot synthesize a dispatcher")]
    NoAdaptiveMethod { interface: &'static str },

    #[error("no URL argument or URL-bearing parameter found in call to {interface}::{method}")]
    NoUrlInCall {
        interface: &'static str,
        method: &'static str,
    },

    #[error("failed to get extension name from url for {interface}, tried keys {keys:?}")]
    NoExtensionNameInUrl {
        interface: &'static str,
        keys: Vec<String>,
    },

    #[error("failed to instantiate {type_name}: {reason}")]
    InstantiationFailed {
        type_name: &'static str,
        reason: String,
    },

    #[error("calling {interface}::{method} is unsupported on the adaptive proxy (no @Adaptive annotation)")]
    UnsupportedOperation {
        interface: &'static str,
        method: &'static str,
    },
}

fn format_causes(errors: &[(String, String)]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let mut s = String::from(", caused by:");
    for (line, cause) in errors {
        s.push_str(&format!("\n  {line}: {cause}"));
    }
    s
}

////////////////////////////////////////////////////////////////////////////////////////////////

impl ExtensionError {
    pub fn no_such_extension(
        interface: &'static str,
        name: impl Into<String>,
        errors: &HashMap<String, String>,
    ) -> Self {
        let mut errors: Vec<_> = errors.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        errors.sort();
        Self::NoSuchExtension {
            interface,
            name: name.into(),
            errors,
        }
    }

    pub fn unsupported_operation(interface: &'static str, method: &'static str) -> Self {
        Self::UnsupportedOperation { interface, method }
    }

    pub fn no_extension_name_in_url(interface: &'static str, keys: &[&str]) -> Self {
        Self::NoExtensionNameInUrl {
            interface,
            keys: keys.iter().map(|s| s.to_string()).collect(),
        }
    }
}
