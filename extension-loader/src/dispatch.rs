use crate::error::ExtensionError;
use crate::url::Url;

////////////////////////////////////////////////////////////////////////////////////////////////

/// The URL-key fallback chain adaptive dispatch runs to pick an extension
/// name (§4.5 step 4). The nested fallback `getParameter(k1,
/// getParameter(k2, default))` is *built* last-to-first, but that means the
/// first-listed key is the one that wins when present, falling through to
/// later keys only when earlier ones are absent; `"protocol"` is
/// special-cased to [`Url::protocol`] rather than looked up as an ordinary
/// parameter. When `method` is `Some`, per-method overrides
/// ([`Url::method_parameter`]) take priority over the plain parameter of
/// the same name. Falls back to `default` if every key comes up empty, and
/// only then fails with [`ExtensionError::NoExtensionNameInUrl`].
pub fn resolve_extension_name(
    url: &Url,
    method: Option<&str>,
    keys: &[&str],
    default: &str,
    interface: &'static str,
) -> Result<String, ExtensionError> {
    for key in keys.iter() {
        let value = if *key == "protocol" {
            Some(url.protocol().to_owned())
        } else if let Some(method) = method {
            url.method_parameter(method, key).map(str::to_owned)
        } else {
            url.parameter(key).map(str::to_owned)
        };

        if let Some(value) = value {
            if !value.is_empty() {
                return Ok(value);
            }
        }
    }

    if !default.is_empty() {
        return Ok(default.to_owned());
    }

    Err(ExtensionError::no_extension_name_in_url(interface, keys))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_key_wins_over_later_ones() {
        let url = Url::builder().parameter("a", "from-a").parameter("b", "from-b").build();
        let name = resolve_extension_name(&url, None, &["a", "b"], "", "Iface").unwrap();
        assert_eq!(name, "from-a");
    }

    #[test]
    fn falls_through_to_a_later_key_when_the_earlier_one_is_absent() {
        let url = Url::builder().parameter("b", "from-b").build();
        let name = resolve_extension_name(&url, None, &["a", "b"], "", "Iface").unwrap();
        assert_eq!(name, "from-b");
    }

    #[test]
    fn protocol_key_reads_the_scheme_not_a_parameter() {
        let url = Url::builder().protocol("dubbo").build();
        let name = resolve_extension_name(&url, None, &["protocol"], "", "Iface").unwrap();
        assert_eq!(name, "dubbo");
    }

    #[test]
    fn method_scoped_parameter_takes_priority() {
        let url = Url::builder()
            .parameter("loadbalance", "random")
            .method_parameter("greet", "loadbalance", "roundrobin")
            .build();
        let name = resolve_extension_name(&url, Some("greet"), &["loadbalance"], "", "Iface").unwrap();
        assert_eq!(name, "roundrobin");
    }

    #[test]
    fn falls_back_to_default_then_errors() {
        let url = Url::builder().build();
        let name = resolve_extension_name(&url, None, &["missing"], "fallback", "Iface").unwrap();
        assert_eq!(name, "fallback");

        let err = resolve_extension_name(&url, None, &["missing"], "", "Iface").unwrap_err();
        assert!(matches!(err, ExtensionError::NoExtensionNameInUrl { .. }));
    }
}
