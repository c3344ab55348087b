use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::injector::Injector;

////////////////////////////////////////////////////////////////////////////////////////////////

/// A capability an `Injector` is built from (§2's "external DI container"
/// collaborator, §4.3's "ExtensionFactory" chain). `ExtensionFactory` is
/// itself an `Injector`, so the default composite can be handed straight
/// to `ExtensionPoint::get`/`build_raw` as the injector for every other
/// extension point's construction.
pub trait ExtensionFactory: Injector {}

impl<F: Injector> ExtensionFactory for F {}

////////////////////////////////////////////////////////////////////////////////////////////////

type Resolver = fn(property: &str, injector: &dyn Injector) -> Option<Arc<dyn Any + Send + Sync>>;

/// One `#[extension_point]`-generated resolver entry. Submitted at compile
/// time the same way [`crate::class_registry::Registration`] is, so
/// [`AdaptiveExtensionFactory`] can stay generic over every interface
/// without reflection.
pub struct FactoryResolver {
    pub interface: TypeId,
    pub resolve: Resolver,
}

inventory::collect!(FactoryResolver);

/// Resolves `Arc<dyn Iface>` fields by delegating to
/// `ExtensionPoint::<Iface>::get_adaptive`/`get(name)`, as chosen by the
/// resolver each `#[extension_point]` trait registers. §4.3 "Rationale":
/// this is the built-in factory that breaks the circular-bootstrap
/// problem, since it never needs its own `Injector` to be constructed.
#[derive(Default)]
pub struct AdaptiveExtensionFactory {
    resolvers: HashMap<TypeId, Resolver>,
}

impl AdaptiveExtensionFactory {
    pub fn new() -> Self {
        let mut resolvers = HashMap::new();
        for entry in inventory::iter::<FactoryResolver> {
            resolvers.insert(entry.interface, entry.resolve);
        }
        Self { resolvers }
    }
}

impl Injector for AdaptiveExtensionFactory {
    fn resolve_any(
        &self,
        type_id: TypeId,
        _type_name: &'static str,
        property: &str,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        let resolver = self.resolvers.get(&type_id)?;
        resolver(property, self)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// Delegates every lookup to an externally supplied `Injector` — the seam
/// for embedding this loader inside a host application's own DI container
/// (§2).
pub struct SpiExtensionFactory {
    delegate: Arc<dyn Injector>,
}

impl SpiExtensionFactory {
    pub fn new(delegate: Arc<dyn Injector>) -> Self {
        Self { delegate }
    }
}

impl Injector for SpiExtensionFactory {
    fn resolve_any(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        property: &str,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        self.delegate.resolve_any(type_id, type_name, property)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// Tries each factory in registration order, returning the first non-`None`
/// result (§4.3). The default `ExtensionFactory` handed to every extension
/// point's construction is a composite of `AdaptiveExtensionFactory`
/// followed by any host-supplied `SpiExtensionFactory`.
pub struct CompositeExtensionFactory {
    factories: Vec<Arc<dyn Injector>>,
}

impl CompositeExtensionFactory {
    pub fn new(factories: Vec<Arc<dyn Injector>>) -> Self {
        Self { factories }
    }

    pub fn with_defaults(extra: Vec<Arc<dyn Injector>>) -> Self {
        let mut factories: Vec<Arc<dyn Injector>> = vec![Arc::new(AdaptiveExtensionFactory::new())];
        factories.extend(extra);
        Self::new(factories)
    }
}

impl Injector for CompositeExtensionFactory {
    fn resolve_any(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        property: &str,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        self.factories
            .iter()
            .find_map(|factory| factory.resolve_any(type_id, type_name, property))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::{erase, InjectorExt, NullInjector};

    trait Marker: Send + Sync {}

    #[test]
    fn composite_falls_through_to_the_next_factory() {
        let composite = CompositeExtensionFactory::new(vec![
            Arc::new(NullInjector),
            Arc::new(NullInjector),
        ]);
        assert!(composite.resolve::<dyn Marker>("anything").is_none());
    }

    #[test]
    fn erase_round_trips_through_adaptive_extension_factory_resolvers() {
        trait Greeter: Send + Sync {
            fn greet(&self) -> &str;
        }
        struct Hi;
        impl Greeter for Hi {
            fn greet(&self) -> &str {
                "hi"
            }
        }

        let greeter: Arc<dyn Greeter> = Arc::new(Hi);
        let erased = erase(greeter);
        let recovered = erased.downcast::<Arc<dyn Greeter>>().unwrap();
        assert_eq!(recovered.greet(), "hi");
    }
}
