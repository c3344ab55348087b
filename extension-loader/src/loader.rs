use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::sync::Arc;

use crate::class_registry::{ClassRegistry, ExtensionPointBuilder, NamedFactory, Registration};
use crate::error::ExtensionError;
use crate::injector::Injector;

////////////////////////////////////////////////////////////////////////////////////////////////

/// Process-wide cache of raw (pre-wrapper) instances, keyed by the concrete
/// implementation type rather than by interface (§4.4, §5
/// "EXTENSION_INSTANCES"): a class bound to two different extension points
/// is still only built once.
static RAW_INSTANCES: OnceLock<Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> =
    OnceLock::new();

fn raw_instances() -> &'static Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>> {
    RAW_INSTANCES.get_or_init(|| Mutex::new(HashMap::new()))
}

struct State<T: ?Sized + 'static> {
    registry: ClassRegistry<T>,
    discovered: bool,
    /// A `DuplicateName`/`AmbiguousAdaptive` error raised while folding
    /// compile-time registrations into the class registry (§4.2 "fatal").
    /// Unlike resource-load errors (§4.1, non-fatal, accumulated for
    /// diagnostics), this is sticky: once set, every subsequent call that
    /// would otherwise build or enumerate extensions re-raises it verbatim
    /// rather than operating on a partially-classified registry.
    fatal: Option<ExtensionError>,
}

impl<T: ?Sized + 'static> Default for State<T> {
    fn default() -> Self {
        Self {
            registry: ClassRegistry::default(),
            discovered: false,
            fatal: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// The per-interface extension point (§3 "ExtensionLoader", generalized
/// from the Java singleton-per-interface-classloader to a singleton-per-
/// `T`, held by [`crate::registry`]).
///
/// Combines a lazily-discovered [`ClassRegistry<T>`], a per-name instance
/// holder (mirrors `dill`'s `Singleton` scope, generalized from per-type to
/// per-name) and a sticky adaptive-instance holder (§5/§7
/// `StickyAdaptiveFailure`).
pub struct ExtensionPoint<T: ?Sized + 'static> {
    interface: &'static str,
    state: Mutex<State<T>>,
    cached_instances: Mutex<HashMap<String, Arc<OnceLock<Result<Arc<T>, ExtensionError>>>>>,
    adaptive_instance: OnceLock<Result<Arc<T>, ExtensionError>>,
}

impl<T: ?Sized + 'static> ExtensionPoint<T> {
    pub fn new(interface: &'static str) -> Self {
        Self {
            interface,
            state: Mutex::new(State::default()),
            cached_instances: Mutex::new(HashMap::new()),
            adaptive_instance: OnceLock::new(),
        }
    }

    pub fn interface(&self) -> &'static str {
        self.interface
    }

    /// Runs the compile-time discovery sweep exactly once, merging into
    /// whatever a test may already have added via [`Self::add_extension`]
    /// (§4.2 discovery; test-only mutation documented in [MODULE C4]). The
    /// first `DuplicateName`/`AmbiguousAdaptive` raised while classifying a
    /// registration is fatal (§4.2, §6, §9): it is logged, recorded as
    /// sticky, and every remaining registration is still folded in (so
    /// `supportedExtensions`-style enumeration stays as complete as
    /// possible) but construction is refused from then on.
    fn ensure_discovered(&self, state: &mut State<T>) {
        if state.discovered {
            return;
        }
        let mut builder = ExtensionPointBuilder::<T>::new();
        for registration in inventory::iter::<Registration> {
            if registration.interface == TypeId::of::<T>() {
                if let Err(err) = (registration.register)(&mut builder as &mut dyn Any) {
                    tracing::error!(interface = self.interface, %err, "extension registration failed");
                    if state.fatal.is_none() {
                        state.fatal = Some(err);
                    }
                }
            }
        }
        let discovered = builder.build();
        merge_into(&mut state.registry, discovered);
        state.discovered = true;
    }

    fn with_classes<R>(&self, f: impl FnOnce(&ClassRegistry<T>) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.ensure_discovered(&mut guard);
        f(&guard.registry)
    }

    /// Runs discovery and returns the sticky fatal classification error, if
    /// any, cloned so the caller can propagate it without holding the lock.
    fn check_fatal(&self) -> Result<(), ExtensionError> {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.ensure_discovered(&mut guard);
        match &guard.fatal {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Resolves `name` to a built, fully-wrapped instance (§4.4). `"true"`
    /// redirects to [`Self::get_default`]; everything else goes through a
    /// double-checked per-name holder so concurrent callers requesting the
    /// same name block on one construction rather than racing.
    pub fn get(&self, name: &str, injector: &dyn Injector) -> Result<Arc<T>, ExtensionError> {
        if name == "true" {
            return self.get_default(injector);
        }
        self.check_fatal()?;

        let holder = {
            let mut guard = self.cached_instances.lock().unwrap_or_else(|e| e.into_inner());
            guard
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };

        holder.get_or_init(|| self.build(name, injector)).clone()
    }

    pub fn get_default(&self, injector: &dyn Injector) -> Result<Arc<T>, ExtensionError> {
        self.check_fatal()?;
        let (name, errors) =
            self.with_classes(|c| (c.default_name, c.load_errors.clone()));
        let Some(name) = name else {
            return Err(ExtensionError::no_such_extension(self.interface, "true", &errors));
        };
        self.get(name, injector)
    }

    /// The adaptive instance is built at most once and its failure is
    /// sticky: every later caller sees the exact same [`ExtensionError`]
    /// rather than re-attempting synthesis (§5, §7).
    pub fn get_adaptive(&self, injector: &dyn Injector) -> Result<Arc<T>, ExtensionError> {
        self.adaptive_instance
            .get_or_init(|| self.build_adaptive(injector))
            .clone()
    }

    fn build(&self, name: &str, injector: &dyn Injector) -> Result<Arc<T>, ExtensionError> {
        let (factory, wrappers, errors) = self.with_classes(|c| {
            (
                c.named.get(name).cloned(),
                c.wrappers.clone(),
                c.load_errors.clone(),
            )
        });
        let Some(factory) = factory else {
            return Err(ExtensionError::no_such_extension(self.interface, name, &errors));
        };

        let raw = build_raw(factory.as_ref(), injector)?;

        let mut decorated = raw;
        for wrapper in &wrappers {
            decorated = wrapper.wrap(decorated, injector)?;
        }
        Ok(decorated)
    }

    fn build_adaptive(&self, injector: &dyn Injector) -> Result<Arc<T>, ExtensionError> {
        self.check_fatal()?;
        let factory = self.with_classes(|c| c.adaptive.clone());
        let Some(factory) = factory else {
            return Err(ExtensionError::NoAdaptiveMethod {
                interface: self.interface,
            });
        };
        build_raw(factory.as_ref(), injector)
    }

    /// Lock-free-for-the-caller query over already-published names (§4.4
    /// "`get_loaded`"): never triggers construction.
    pub fn get_loaded(&self, name: &str) -> Option<Arc<T>> {
        let guard = self.cached_instances.lock().unwrap_or_else(|e| e.into_inner());
        guard
            .get(name)
            .and_then(|holder| holder.get())
            .and_then(|result| result.as_ref().ok().cloned())
    }

    pub fn loaded_names(&self) -> Vec<String> {
        let guard = self.cached_instances.lock().unwrap_or_else(|e| e.into_inner());
        guard.keys().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.with_classes(|c| c.names().map(str::to_owned).collect())
    }

    pub fn activates(&self) -> Vec<(String, crate::class_registry::ActivateSpec)> {
        self.with_classes(|c| c.activates.clone())
    }

    /// Test-only: adds one more named extension, failing on a genuine name
    /// collision with a different class the same way discovery does.
    pub fn add_extension(
        &self,
        name: &'static str,
        factory: Arc<dyn NamedFactory<T>>,
    ) -> Result<(), ExtensionError> {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.ensure_discovered(&mut guard);
        let mut builder = ExtensionPointBuilder::from(std::mem::take(&mut guard.registry));
        builder.add_named(factory, self.interface)?;
        guard.registry = builder.build();
        Ok(())
    }

    /// Test-only: unconditionally overwrites `name`, bypassing the
    /// duplicate-name check entirely (used to swap in fakes/mocks).
    pub fn replace_extension(&self, name: &'static str, factory: Arc<dyn NamedFactory<T>>) {
        let mut guard = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.ensure_discovered(&mut guard);
        guard.registry.named.insert(name.to_owned(), factory);
        self.cached_instances
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
    }
}

impl<T: ?Sized + 'static> Default for ExtensionPoint<T> {
    fn default() -> Self {
        Self::new(std::any::type_name::<T>())
    }
}

fn build_raw<T: ?Sized + 'static>(
    factory: &dyn NamedFactory<T>,
    injector: &dyn Injector,
) -> Result<Arc<T>, ExtensionError> {
    let concrete_id = factory.concrete_type_id();

    {
        let guard = raw_instances().lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = guard.get(&concrete_id) {
            if let Ok(typed) = existing.clone().downcast::<Arc<T>>() {
                return Ok((*typed).clone());
            }
        }
    }

    let built = factory.create(injector)?;

    let mut guard = raw_instances().lock().unwrap_or_else(|e| e.into_inner());
    let entry = guard
        .entry(concrete_id)
        .or_insert_with(|| Arc::new(built.clone()) as Arc<dyn Any + Send + Sync>);
    let typed: Arc<Arc<T>> = entry
        .clone()
        .downcast()
        .unwrap_or_else(|_| Arc::new(built.clone()));
    Ok((*typed).clone())
}

/// Folds compile-time-discovered classes into a registry that may already
/// hold test-added entries, without re-running the duplicate-name checks a
/// second time for entries that were already accepted.
fn merge_into<T: ?Sized + 'static>(into: &mut ClassRegistry<T>, discovered: ClassRegistry<T>) {
    for (name, factory) in discovered.named {
        into.named.entry(name).or_insert(factory);
    }
    for wrapper in discovered.wrappers {
        into.wrappers.push(wrapper);
    }
    if into.adaptive.is_none() {
        into.adaptive = discovered.adaptive;
    }
    into.activates.extend(discovered.activates);
    if into.default_name.is_none() {
        into.default_name = discovered.default_name;
    }
    into.load_errors.extend(discovered.load_errors);
}
