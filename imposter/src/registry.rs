// vim: tw=80
//! Storage and resolution of setups

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use tracing::trace;

use crate::{
    invocation::InvocationKind,
    setup::MethodSetup,
    value::Value,
};

type Members = HashMap<String, Vec<Arc<MethodSetup>>>;

#[derive(Debug, Default)]
struct Inner {
    next_order: u64,
    by_kind: HashMap<InvocationKind, Members>,
}

impl Inner {
    fn all(&self) -> impl Iterator<Item=&Arc<MethodSetup>> {
        self.by_kind.values()
            .flat_map(|members| members.values())
            .flatten()
    }
}

/// Every setup registered on one mock.
///
/// Setups are grouped by member, and within a member kept in registration
/// order.  Resolution picks the newest setup whose matchers accept the
/// arguments, so a test can override an earlier, broader setup with a later,
/// more specific one.
#[derive(Debug, Default)]
pub struct SetupRegistry {
    inner: RwLock<Inner>,
}

impl SetupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a setup.  It becomes the newest setup for its member.
    pub fn register(&self, mut setup: MethodSetup) -> Arc<MethodSetup> {
        let mut inner = self.inner.write().unwrap();
        let order = inner.next_order;
        inner.next_order += 1;
        setup.set_order(order);
        let setup = Arc::new(setup);
        trace!(setup = %setup, order, "registering setup");
        inner.by_kind.entry(setup.kind())
            .or_default()
            .entry(setup.member().to_owned())
            .or_default()
            .push(setup.clone());
        setup
    }

    /// Find the setup that applies to an access of `member` with `args`.
    ///
    /// Returns `None` if no setup matches; that is an ordinary outcome, not an
    /// error.  Matchers run after the lock is released, so a predicate may
    /// itself use the mock.
    pub fn resolve(&self, kind: InvocationKind, member: &str, args: &[Value])
        -> Option<Arc<MethodSetup>>
    {
        let candidates = self.inner.read().unwrap()
            .by_kind.get(&kind)
            .and_then(|members| members.get(member))
            .cloned()
            .unwrap_or_default();
        candidates.into_iter()
            .rev()
            .find(|s| s.parameters().matches(args))
    }

    /// Every registered setup, in registration order.
    pub fn setups(&self) -> Vec<Arc<MethodSetup>> {
        let inner = self.inner.read().unwrap();
        let mut all = inner.all().cloned().collect::<Vec<_>>();
        all.sort_by_key(|s| s.registration_order());
        all
    }

    /// Setups that no invocation has ever resolved to.
    pub fn unused(&self) -> Vec<Arc<MethodSetup>> {
        self.setups()
            .into_iter()
            .filter(|s| s.match_count() == 0)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().all().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every setup.  Registration order keeps counting up.
    pub fn clear(&self) {
        self.inner.write().unwrap().by_kind.clear();
    }
}
