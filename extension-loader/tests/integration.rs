use std::sync::Arc;

use extension_loader::*;
use pretty_assertions::assert_eq;

////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn default_resolution_and_supported_extensions() {
    #[extension_point(default = "a")]
    trait Greeter: Send + Sync {
        #[adaptive(keys = "greeter")]
        fn greet(&self, url: &Url) -> Result<String, ExtensionError>;
    }

    struct GreeterA;
    #[named(names = "a", interface = "Greeter")]
    impl GreeterA {
        fn new() -> Self {
            Self
        }
    }
    impl Greeter for GreeterA {
        fn greet(&self, _url: &Url) -> Result<String, ExtensionError> {
            Ok("a".to_owned())
        }
    }

    struct GreeterB;
    #[named(names = "b", interface = "Greeter")]
    impl GreeterB {
        fn new() -> Self {
            Self
        }
    }
    impl Greeter for GreeterB {
        fn greet(&self, _url: &Url) -> Result<String, ExtensionError> {
            Ok("b".to_owned())
        }
    }

    let point = registry::get::<dyn Greeter>("Greeter");

    let mut names = point.names();
    names.sort();
    assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);

    let default = point.get("true", &NullInjector).unwrap();
    assert_eq!(default.greet(&Url::builder().build()).unwrap(), "a");

    let via_get_default = point.get_default(&NullInjector).unwrap();
    assert!(Arc::ptr_eq(&default, &via_get_default));
}

////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn adaptive_dispatch_lets_an_earlier_key_win_with_later_keys_as_fallback() {
    #[extension_point(default = "d")]
    trait FallbackGreeter: Send + Sync {
        #[adaptive(keys = "k1,k2")]
        fn greet(&self, url: &Url) -> Result<String, ExtensionError>;
    }

    struct D;
    #[named(names = "d", interface = "FallbackGreeter")]
    impl D {
        fn new() -> Self {
            Self
        }
    }
    impl FallbackGreeter for D {
        fn greet(&self, _url: &Url) -> Result<String, ExtensionError> {
            Ok("d".to_owned())
        }
    }

    struct X;
    #[named(names = "x", interface = "FallbackGreeter")]
    impl X {
        fn new() -> Self {
            Self
        }
    }
    impl FallbackGreeter for X {
        fn greet(&self, _url: &Url) -> Result<String, ExtensionError> {
            Ok("x".to_owned())
        }
    }

    struct Y;
    #[named(names = "y", interface = "FallbackGreeter")]
    impl Y {
        fn new() -> Self {
            Self
        }
    }
    impl FallbackGreeter for Y {
        fn greet(&self, _url: &Url) -> Result<String, ExtensionError> {
            Ok("y".to_owned())
        }
    }

    let adaptive = FallbackGreeterAdaptive::new();

    let url = Url::builder().parameter("k2", "x").build();
    assert_eq!(adaptive.greet(&url).unwrap(), "x");

    let url = Url::builder().build();
    assert_eq!(adaptive.greet(&url).unwrap(), "d");

    let url = Url::builder().parameter("k1", "y").parameter("k2", "x").build();
    assert_eq!(adaptive.greet(&url).unwrap(), "y");
}

////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn adaptive_dispatch_extracts_url_from_a_getter_bearing_argument() {
    struct Request {
        url: Url,
    }
    impl HasUrl for Request {
        fn url(&self) -> &Url {
            &self.url
        }
    }

    #[extension_point(default = "")]
    trait RequestGreeter: Send + Sync {
        #[adaptive(keys = "greeter")]
        fn greet(&self, #[url] req: &Request) -> Result<String, ExtensionError>;
    }

    struct Hi;
    #[named(names = "hi", interface = "RequestGreeter")]
    impl Hi {
        fn new() -> Self {
            Self
        }
    }
    impl RequestGreeter for Hi {
        fn greet(&self, _req: &Request) -> Result<String, ExtensionError> {
            Ok("hi".to_owned())
        }
    }

    let adaptive = RequestGreeterAdaptive::new();
    let req = Request {
        url: Url::builder().parameter("greeter", "hi").build(),
    };
    assert_eq!(adaptive.greet(&req).unwrap(), "hi");
}

////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn wrapper_decorates_the_named_instance() {
    trait Counter: Send + Sync {
        fn count(&self) -> u32;
    }

    struct Base;
    #[named(names = "base", interface = "Counter")]
    impl Base {
        fn new() -> Self {
            Self
        }
    }
    impl Counter for Base {
        fn count(&self) -> u32 {
            1
        }
    }

    struct Doubling {
        inner: Arc<dyn Counter>,
    }
    #[wrapper(interface = "Counter")]
    impl Doubling {
        fn new(inner: Arc<dyn Counter>) -> Self {
            Self { inner }
        }
    }
    impl Counter for Doubling {
        fn count(&self) -> u32 {
            self.inner.count() * 2
        }
    }

    let point = registry::get::<dyn Counter>("Counter");
    let instance = point.get("base", &NullInjector).unwrap();
    assert_eq!(instance.count(), 2);
}

////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn duplicate_name_across_registrations_is_fatal() {
    trait Dup: Send + Sync {
        fn tag(&self) -> &str;
    }

    struct First;
    #[named(names = "clash", interface = "Dup")]
    impl First {
        fn new() -> Self {
            Self
        }
    }
    impl Dup for First {
        fn tag(&self) -> &str {
            "first"
        }
    }

    struct Second;
    #[named(names = "clash", interface = "Dup")]
    impl Second {
        fn new() -> Self {
            Self
        }
    }
    impl Dup for Second {
        fn tag(&self) -> &str {
            "second"
        }
    }

    let point = registry::get::<dyn Dup>("Dup");
    let err = point.get("clash", &NullInjector).unwrap_err();
    assert!(matches!(err, ExtensionError::DuplicateName { ref name, .. } if name == "clash"));

    // Sticky: the next lookup on an unrelated name fails the same way.
    let err2 = point.get("clash", &NullInjector).unwrap_err();
    assert_eq!(err.to_string(), err2.to_string());
}

////////////////////////////////////////////////////////////////////////////////////////////////

#[test]
fn sticky_adaptive_failure_reraises_verbatim() {
    trait NoAdaptiveMethods: Send + Sync {
        fn noop(&self);
    }

    let point = registry::get::<dyn NoAdaptiveMethods>("NoAdaptiveMethods");
    let first = point.get_adaptive(&NullInjector).unwrap_err();
    let second = point.get_adaptive(&NullInjector).unwrap_err();
    assert!(matches!(first, ExtensionError::NoAdaptiveMethod { .. }));
    assert_eq!(first.to_string(), second.to_string());
}
