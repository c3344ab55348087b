use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ExtensionError;
use crate::injector::Injector;

////////////////////////////////////////////////////////////////////////////////////////////////

/// A no-argument-constructible implementation (§3 "Named class"). Built by
/// `#[named]` (and, for the static-adaptive case, by hand).
pub trait NamedFactory<T: ?Sized>: Send + Sync {
    /// Short names this factory is bound to (first one is used for
    /// `derive_name`-free registrations).
    fn names(&self) -> &'static [&'static str];

    fn type_name(&self) -> &'static str;

    /// Identifies the concrete implementation type, independent of `T`.
    /// Used to key the process-wide raw-instance cache (§4.4, §5
    /// "EXTENSION_INSTANCES") so that one concrete class bound to several
    /// extension points is only ever constructed once.
    fn concrete_type_id(&self) -> TypeId;

    fn create(&self, injector: &dyn Injector) -> Result<Arc<T>, ExtensionError>;

    /// `Some` if this registration's `#[named(...)]` carried activate
    /// metadata (`group`/`value`/`order`/`before`/`after`).
    fn activate(&self) -> Option<&ActivateSpec> {
        None
    }
}

/// A single-argument-constructible decorator (§3 "Wrapper class"): its
/// constructor takes `T` itself.
pub trait WrapperFactory<T: ?Sized>: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn wrap(&self, inner: Arc<T>, injector: &dyn Injector) -> Result<Arc<T>, ExtensionError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// The predicate/ordering metadata attached to an auto-activated
/// extension (§3, §4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct ActivateSpec {
    pub group: &'static [&'static str],
    pub value: &'static [&'static str],
    pub order: i32,
    pub before: &'static [&'static str],
    pub after: &'static [&'static str],
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// Everything discovered for one extension point `T`, built once under a
/// double-checked holder in [`crate::loader::ExtensionPoint`] (§4.2, §4.4).
pub struct ClassRegistry<T: ?Sized + 'static> {
    pub named: HashMap<String, Arc<dyn NamedFactory<T>>>,
    pub wrappers: Vec<Arc<dyn WrapperFactory<T>>>,
    pub adaptive: Option<Arc<dyn NamedFactory<T>>>,
    pub activates: Vec<(String, ActivateSpec)>,
    pub default_name: Option<&'static str>,
    /// Per-offending-line diagnostics accumulated while loading resource
    /// files (§4.1, §7): non-fatal, surfaced on a later `NoSuchExtension`.
    pub load_errors: HashMap<String, String>,
}

impl<T: ?Sized + 'static> Default for ClassRegistry<T> {
    fn default() -> Self {
        Self {
            named: HashMap::new(),
            wrappers: Vec::new(),
            adaptive: None,
            activates: Vec::new(),
            default_name: None,
            load_errors: HashMap::new(),
        }
    }
}

impl<T: ?Sized + 'static> ClassRegistry<T> {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// Builder fed by macro-generated registration thunks (`Registration`,
/// below) or directly by test code (`add_extension`/`replace_extension`).
/// Mirrors `dill::CatalogBuilder`, specialized to a single interface.
pub struct ExtensionPointBuilder<T: ?Sized + 'static> {
    registry: ClassRegistry<T>,
}

impl<T: ?Sized + 'static> Default for ExtensionPointBuilder<T> {
    fn default() -> Self {
        Self {
            registry: ClassRegistry::default(),
        }
    }
}

impl<T: ?Sized + 'static> From<ClassRegistry<T>> for ExtensionPointBuilder<T> {
    /// Resumes building on top of an already-assembled registry — used by
    /// `ExtensionPoint::add_extension` to run the usual duplicate-name
    /// check against entries a test may have added earlier.
    fn from(registry: ClassRegistry<T>) -> Self {
        Self { registry }
    }
}

impl<T: ?Sized + 'static> ExtensionPointBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default_name(&mut self, name: &'static str) {
        self.registry.default_name = Some(name);
    }

    /// Fatal on a name bound to a *different* factory (`DuplicateName`,
    /// §4.2 rule 3), as replacing with an identical factory is idempotent.
    pub fn add_named(
        &mut self,
        factory: Arc<dyn NamedFactory<T>>,
        interface: &'static str,
    ) -> Result<(), ExtensionError> {
        if let Some(spec) = factory.activate() {
            if let Some(name) = factory.names().first() {
                self.registry
                    .activates
                    .push(((*name).to_owned(), spec.clone()));
            }
        }
        for name in factory.names() {
            self.insert_named(interface, name, factory.clone())?;
        }
        Ok(())
    }

    fn insert_named(
        &mut self,
        interface: &'static str,
        name: &str,
        factory: Arc<dyn NamedFactory<T>>,
    ) -> Result<(), ExtensionError> {
        if let Some(existing) = self.registry.named.get(name) {
            if existing.type_name() != factory.type_name() {
                return Err(ExtensionError::DuplicateName {
                    interface,
                    name: name.to_owned(),
                    first: existing.type_name(),
                    second: factory.type_name(),
                });
            }
            return Ok(());
        }
        self.registry.named.insert(name.to_owned(), factory);
        Ok(())
    }

    pub fn add_wrapper(&mut self, factory: Arc<dyn WrapperFactory<T>>) {
        self.registry.wrappers.push(factory);
    }

    /// Fatal if a distinct adaptive class was already registered
    /// (`AmbiguousAdaptive`, §4.2 rule 1).
    pub fn set_adaptive(
        &mut self,
        factory: Arc<dyn NamedFactory<T>>,
        interface: &'static str,
    ) -> Result<(), ExtensionError> {
        if let Some(existing) = &self.registry.adaptive {
            if existing.type_name() != factory.type_name() {
                return Err(ExtensionError::AmbiguousAdaptive {
                    interface,
                    first: existing.type_name(),
                    second: factory.type_name(),
                });
            }
            return Ok(());
        }
        self.registry.adaptive = Some(factory);
        Ok(())
    }

    pub fn merge_load_errors(&mut self, errors: HashMap<String, String>) {
        self.registry.load_errors.extend(errors);
    }

    pub fn build(self) -> ClassRegistry<T> {
        self.registry
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// A compile-time-registered factory submission. Rust has no classpath or
/// runtime reflection, so the REDESIGN FLAGS direction in §9 ("replace
/// reflection-driven discovery with a capability registered at build
/// time") is realized via `inventory`: every `#[named]`/`#[wrapper]`/
/// adaptive registration submits one of these, and
/// [`crate::loader::ExtensionPoint`]'s discovery sweep collects the ones
/// whose `interface` matches `TypeId::of::<T>()` and feeds them into a typed
/// `ExtensionPointBuilder<T>` via `register`.
pub struct Registration {
    pub interface: TypeId,
    pub register: fn(&mut dyn Any) -> Result<(), ExtensionError>,
}

inventory::collect!(Registration);

/// Helper used by generated `register` thunks to get at the typed builder.
pub fn downcast_builder<T: ?Sized + 'static>(
    any: &mut dyn Any,
) -> &mut ExtensionPointBuilder<T> {
    any.downcast_mut::<ExtensionPointBuilder<T>>()
        .expect("Registration.interface did not match the builder type it was invoked with")
}
