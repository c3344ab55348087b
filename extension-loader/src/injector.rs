use std::any::{Any, TypeId};
use std::sync::Arc;

////////////////////////////////////////////////////////////////////////////////////////////////

/// Resolves a single dependency by `(type, property name)` (§4.3).
///
/// Object-safe via `Any` erasure, the same move `dill` makes with its
/// `TypeCaster`: the erased payload handed back by `resolve_any` is always
/// an `Arc<T>` for the requested `T` (which may itself be a trait object,
/// e.g. `Arc<dyn Greeter>`) boxed a second time into `Arc<dyn Any + Send +
/// Sync>`. `Arc<T>` is `Sized` regardless of whether `T` is, so the
/// downcast in [`InjectorExt::resolve`] is an ordinary, safe `Any`
/// downcast — no unsafe fn-pointer cast table needed.
pub trait Injector: Send + Sync {
    fn resolve_any(
        &self,
        type_id: TypeId,
        type_name: &'static str,
        property: &str,
    ) -> Option<Arc<dyn Any + Send + Sync>>;
}

pub trait InjectorExt {
    fn resolve<T: 'static + Send + Sync + ?Sized>(&self, property: &str) -> Option<Arc<T>>;
}

impl<I: Injector + ?Sized> InjectorExt for I {
    fn resolve<T: 'static + Send + Sync + ?Sized>(&self, property: &str) -> Option<Arc<T>> {
        let any = self.resolve_any(TypeId::of::<T>(), std::any::type_name::<T>(), property)?;
        let boxed: Arc<Arc<T>> = any.downcast().ok()?;
        Some(Arc::clone(&boxed))
    }
}

/// Erases `value: Arc<T>` into the `Arc<dyn Any + Send + Sync>` shape that
/// [`Injector::resolve_any`] returns. Used by `AdaptiveExtensionFactory`
/// and by test doubles that implement `Injector` by hand.
pub fn erase<T: 'static + Send + Sync + ?Sized>(value: Arc<T>) -> Arc<dyn Any + Send + Sync> {
    Arc::new(value)
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// An `Injector` with nothing registered; every `resolve_any` call
/// returns `None`, which generated injection bodies treat as "leave the
/// field at its default" (§4.3 "on null, skip").
#[derive(Default, Clone, Copy)]
pub struct NullInjector;

impl Injector for NullInjector {
    fn resolve_any(
        &self,
        _type_id: TypeId,
        _type_name: &'static str,
        _property: &str,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Hi;
    impl Greeter for Hi {
        fn greet(&self) -> String {
            "hi".to_owned()
        }
    }

    struct MapInjector(std::collections::HashMap<&'static str, Arc<dyn Any + Send + Sync>>);

    impl Injector for MapInjector {
        fn resolve_any(
            &self,
            _type_id: TypeId,
            _type_name: &'static str,
            property: &str,
        ) -> Option<Arc<dyn Any + Send + Sync>> {
            self.0.get(property).cloned()
        }
    }

    #[test]
    fn round_trips_a_trait_object_through_erasure() {
        let greeter: Arc<dyn Greeter> = Arc::new(Hi);
        let mut map = std::collections::HashMap::new();
        map.insert("greeter", erase(greeter));
        let injector = MapInjector(map);

        let resolved = injector.resolve::<dyn Greeter>("greeter").unwrap();
        assert_eq!(resolved.greet(), "hi");
    }

    #[test]
    fn missing_property_resolves_to_none() {
        let injector = NullInjector;
        assert!(injector.resolve::<dyn Greeter>("missing").is_none());
    }
}
