//! A pluggable extension loader: compile-time SPI discovery, field-based
//! dependency injection, decorator composition and URL-driven adaptive
//! dispatch, in the spirit of a Dubbo-style `ExtensionLoader` rebuilt
//! around Rust's trait objects and macros instead of classpath reflection.
//!
//! ```
//! use extension_loader::{extension_point, named, Url};
//!
//! #[extension_point(default = "hi")]
//! trait Greeter: Send + Sync {
//!     #[adaptive(keys = "greeter")]
//!     fn greet(&self, url: &Url) -> Result<String, extension_loader::ExtensionError>;
//! }
//!
//! struct HiGreeter;
//!
//! #[named(names = "hi", interface = "Greeter")]
//! impl HiGreeter {
//!     fn new() -> Self {
//!         Self
//!     }
//! }
//!
//! impl Greeter for HiGreeter {
//!     fn greet(&self, _url: &Url) -> Result<String, extension_loader::ExtensionError> {
//!         Ok("hi".to_owned())
//!     }
//! }
//!
//! let url = Url::builder().parameter("greeter", "hi").build();
//! let greeter = GreeterAdaptive::new();
//! assert_eq!(greeter.greet(&url).unwrap(), "hi");
//! ```

pub mod activate;
pub mod class_registry;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod filter;
pub mod injector;
pub mod invocation;
pub mod loader;
pub mod registry;
pub mod resource;
pub mod url;
pub mod weight;
pub mod limiter;

pub use activate::get_activate_extension;
pub use class_registry::{ActivateSpec, ClassRegistry, ExtensionPointBuilder, NamedFactory, Registration, WrapperFactory};
pub use dispatch::resolve_extension_name;
pub use error::ExtensionError;
pub use factory::{AdaptiveExtensionFactory, CompositeExtensionFactory, ExtensionFactory, FactoryResolver, SpiExtensionFactory};
pub use filter::{build_filter_chain, Filter, Invoker, TypeInfo};
pub use injector::{erase, Injector, InjectorExt, NullInjector};
pub use invocation::{Invocation, Reply, SimpleInvocation};
pub use loader::ExtensionPoint;
pub use limiter::TpsLimiter;
pub use resource::{derive_name, read_records, scan_search_path, Record, ResourceError, SEARCH_DIRS};
pub use url::{ExtractUrl, HasUrl, Url, UrlBuilder};
pub use weight::warmup_weight;

pub use extension_loader_macros::*;

/// Re-exported so macro-generated code can write `::extension_loader::inventory::submit!`
/// without callers needing `inventory` as a direct dependency of their own crate.
pub use inventory;
