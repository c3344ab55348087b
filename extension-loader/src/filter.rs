use std::sync::Arc;

use crate::error::ExtensionError;
use crate::invocation::{Invocation, Reply};
use crate::url::Url;

////////////////////////////////////////////////////////////////////////////////////////////////

/// Identifies the interface an [`Invoker`] was built for; the Rust stand-in
/// for the `Class<?>` an `Invoker::getInterface()` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo(pub &'static str);

/// The innermost unit a filter chain dispatches onto (§4.8): a live,
/// callable remote/local endpoint bound to one `Url`.
pub trait Invoker: Send + Sync {
    fn interface(&self) -> TypeInfo;
    fn url(&self) -> &Url;
    fn is_available(&self) -> bool;
    fn invoke(&self, invocation: &dyn Invocation) -> Result<Reply, ExtensionError>;
    fn destroy(&self);
}

/// One link in the chain (§4.8). A filter that never calls `next.invoke`
/// is a deliberate short-circuit (auth rejection, rate limiting), not a
/// bug; `build_filter_chain` does not special-case that behavior.
pub trait Filter: Send + Sync {
    fn invoke(
        &self,
        next: &dyn Invoker,
        invocation: &dyn Invocation,
    ) -> Result<Reply, ExtensionError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////

/// Wraps one `Filter` around the next invoker in the chain. `interface`,
/// `url`, `is_available` and `destroy` all forward to the chain's
/// `terminal`, not to `next` — a filter only ever sees those through the
/// terminal invoker, matching the Java behavior of delegating metadata
/// calls past any number of filter layers (§4.8).
struct FilterInvoker {
    filter: Arc<dyn Filter>,
    next: Arc<dyn Invoker>,
    terminal: Arc<dyn Invoker>,
}

impl Invoker for FilterInvoker {
    fn interface(&self) -> TypeInfo {
        self.terminal.interface()
    }

    fn url(&self) -> &Url {
        self.terminal.url()
    }

    fn is_available(&self) -> bool {
        self.terminal.is_available()
    }

    fn invoke(&self, invocation: &dyn Invocation) -> Result<Reply, ExtensionError> {
        self.filter.invoke(self.next.as_ref(), invocation)
    }

    fn destroy(&self) {
        self.terminal.destroy()
    }
}

/// Folds `filters` right-to-left around `terminal` (§4.8): the first filter
/// in the list is the outermost layer a caller sees, so filters later in
/// the list run closer to the terminal invoker (§8 "Filter chain order":
/// `[A,B,C]` around `inv` observes `A.invoke -> B.invoke -> C.invoke ->
/// inv.invoke`). Passing an empty list returns `terminal` unchanged.
pub fn build_filter_chain(terminal: Arc<dyn Invoker>, filters: Vec<Arc<dyn Filter>>) -> Arc<dyn Invoker> {
    filters.into_iter().rev().fold(terminal.clone(), |next, filter| {
        Arc::new(FilterInvoker {
            filter,
            next,
            terminal: terminal.clone(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::SimpleInvocation;

    struct Echo;

    impl Invoker for Echo {
        fn interface(&self) -> TypeInfo {
            TypeInfo("Echo")
        }
        fn url(&self) -> &Url {
            panic!("not needed for this test")
        }
        fn is_available(&self) -> bool {
            true
        }
        fn invoke(&self, invocation: &dyn Invocation) -> Result<Reply, ExtensionError> {
            Ok(Reply::new(invocation.method_name().to_owned()))
        }
        fn destroy(&self) {}
    }

    struct Prefix(&'static str);

    impl Filter for Prefix {
        fn invoke(
            &self,
            next: &dyn Invoker,
            invocation: &dyn Invocation,
        ) -> Result<Reply, ExtensionError> {
            let reply = next.invoke(invocation)?;
            Ok(Reply::new(format!(
                "{}{}",
                self.0,
                reply.value.unwrap_or_default()
            )))
        }
    }

    struct ShortCircuit;

    impl Filter for ShortCircuit {
        fn invoke(&self, _next: &dyn Invoker, _invocation: &dyn Invocation) -> Result<Reply, ExtensionError> {
            Err(ExtensionError::BadArgument("denied".to_owned()))
        }
    }

    #[test]
    fn filters_apply_in_list_order_outermost_first() {
        let terminal: Arc<dyn Invoker> = Arc::new(Echo);
        let filters: Vec<Arc<dyn Filter>> = vec![Arc::new(Prefix("a:")), Arc::new(Prefix("b:"))];
        let chain = build_filter_chain(terminal, filters);

        let invocation = SimpleInvocation::new("call");
        let reply = chain.invoke(&invocation).unwrap();
        assert_eq!(reply.value.unwrap(), "a:b:call");
    }

    #[test]
    fn metadata_forwards_to_terminal_not_immediate_child() {
        let terminal: Arc<dyn Invoker> = Arc::new(Echo);
        let filters: Vec<Arc<dyn Filter>> = vec![Arc::new(Prefix("a:")), Arc::new(Prefix("b:"))];
        let chain = build_filter_chain(terminal, filters);
        assert_eq!(chain.interface(), TypeInfo("Echo"));
        assert!(chain.is_available());
    }

    #[test]
    fn a_filter_may_short_circuit_without_calling_next() {
        let terminal: Arc<dyn Invoker> = Arc::new(Echo);
        let filters: Vec<Arc<dyn Filter>> = vec![Arc::new(ShortCircuit)];
        let chain = build_filter_chain(terminal, filters);

        let invocation = SimpleInvocation::new("call");
        assert!(chain.invoke(&invocation).is_err());
    }
}
