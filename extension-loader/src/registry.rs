use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::sync::Arc;

use crate::loader::ExtensionPoint;

////////////////////////////////////////////////////////////////////////////////////////////////

/// The process-wide map from interface to its singleton [`ExtensionPoint`]
/// (§3 "getExtensionLoader is itself cached per interface", §5 concurrency
/// model). Generated `#[extension_point]` code and `AdaptiveExtensionFactory`
/// both go through this instead of holding their own statics, so a given
/// interface resolves to the same `ExtensionPoint` everywhere in a process.
static EXTENSION_POINTS: OnceLock<Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> =
    OnceLock::new();

fn extension_points() -> &'static Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>> {
    EXTENSION_POINTS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns the singleton `ExtensionPoint<T>`, creating it on first use.
pub fn get<T: ?Sized + 'static>(interface: &'static str) -> Arc<ExtensionPoint<T>> {
    let mut guard = extension_points().lock().unwrap_or_else(|e| e.into_inner());
    let entry = guard
        .entry(TypeId::of::<T>())
        .or_insert_with(|| Arc::new(ExtensionPoint::<T>::new(interface)) as Arc<dyn Any + Send + Sync>);
    entry
        .clone()
        .downcast::<ExtensionPoint<T>>()
        .expect("ExtensionPoint registry keyed on the wrong TypeId")
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Marker: Send + Sync {}

    #[test]
    fn repeated_lookups_return_the_same_instance() {
        let a = get::<dyn Marker>("Marker");
        let b = get::<dyn Marker>("Marker");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
