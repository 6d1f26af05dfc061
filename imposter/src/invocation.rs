// vim: tw=80
//! Invocation records and the interaction log

use std::{
    collections::{BTreeMap, BTreeSet, btree_map::Entry},
    fmt,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicU64, Ordering}
    }
};

use crate::value::{Value, render_values};

/// What sort of member access an [`Invocation`] records.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum InvocationKind {
    MethodCall,
    PropertyGet,
    PropertySet,
    IndexerGet,
    IndexerSet,
    EventSubscribe,
    EventUnsubscribe,
}

impl InvocationKind {
    /// Does this kind of access carry an assigned value?
    pub fn is_assignment(self) -> bool {
        matches!(self, InvocationKind::PropertySet | InvocationKind::IndexerSet)
    }
}

/// One recorded access of a mocked member.  Immutable once created.
#[derive(Clone, Debug)]
pub struct Invocation {
    index: u64,
    kind: InvocationKind,
    member: String,
    arguments: Vec<Value>,
    assigned: Option<Value>,
}

impl Invocation {
    pub fn new(index: u64, kind: InvocationKind, member: impl Into<String>,
               arguments: Vec<Value>) -> Self
    {
        Invocation {
            index,
            kind,
            member: member.into(),
            arguments,
            assigned: None,
        }
    }

    /// Shorthand for a [`InvocationKind::MethodCall`] record.
    pub fn method(index: u64, member: impl Into<String>,
                  arguments: Vec<Value>) -> Self
    {
        Self::new(index, InvocationKind::MethodCall, member, arguments)
    }

    /// Attach the value assigned by a property or indexer setter.
    pub fn with_assigned(mut self, value: Value) -> Self {
        self.assigned = Some(value);
        self
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn kind(&self) -> InvocationKind {
        self.kind
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn assigned(&self) -> Option<&Value> {
        self.assigned.as_ref()
    }

    /// The values that matchers are applied to: the arguments followed by
    /// the assigned value, if any.
    pub fn matched_values(&self) -> Vec<Value> {
        self.arguments.iter()
            .chain(self.assigned.iter())
            .cloned()
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = render_values(&self.arguments);
        match self.kind {
            InvocationKind::MethodCall => write!(f, "{}({})", self.member, args),
            InvocationKind::PropertyGet => write!(f, "get {}", self.member),
            InvocationKind::PropertySet => write!(f, "set {} = {:?}",
                self.member, self.assigned.as_ref().unwrap_or(&Value::null())),
            InvocationKind::IndexerGet => write!(f, "{}[{}]", self.member,
                                                 args),
            InvocationKind::IndexerSet => write!(f, "{}[{}] = {:?}",
                self.member, args,
                self.assigned.as_ref().unwrap_or(&Value::null())),
            InvocationKind::EventSubscribe =>
                write!(f, "subscribe {}", self.member),
            InvocationKind::EventUnsubscribe =>
                write!(f, "unsubscribe {}", self.member),
        }
    }
}

/// Append-only, thread-safe record of every access made to one mock.
///
/// Indices are handed out by a single atomic counter, so concurrent callers
/// never observe the same index and no index is skipped.  Records are stored
/// keyed by index, so the log always reads back in index order no matter how
/// writers interleave.
#[derive(Debug, Default)]
pub struct InteractionLog {
    next: AtomicU64,
    records: Mutex<BTreeMap<u64, Arc<Invocation>>>,
    verified: Mutex<BTreeSet<u64>>,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh index.
    pub fn next_index(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Store an invocation.
    ///
    /// # Panics
    ///
    /// If an invocation with the same index was already recorded.  Records
    /// are never replaced; reserve indices with
    /// [`next_index`](#method.next_index).
    #[track_caller]
    pub fn record(&self, invocation: Invocation) -> Arc<Invocation> {
        let invocation = Arc::new(invocation);
        let mut records = self.records.lock().unwrap();
        let existing = match records.entry(invocation.index) {
            Entry::Vacant(e) => {
                e.insert(invocation.clone());
                None
            },
            Entry::Occupied(e) => Some(e.get().clone())
        };
        drop(records);
        if let Some(existing) = existing {
            panic!("Invocation {} was already recorded as {}; cannot \
                    record {}", invocation.index, existing, invocation);
        }
        invocation
    }

    /// Reserve an index and record an invocation with it.
    pub(crate) fn register(&self, kind: InvocationKind, member: &str,
                           arguments: Vec<Value>, assigned: Option<Value>)
        -> Arc<Invocation>
    {
        let mut invocation = Invocation::new(self.next_index(), kind, member,
                                             arguments);
        invocation.assigned = assigned;
        self.record(invocation)
    }

    /// A snapshot of every invocation recorded so far, in index order.
    pub fn all(&self) -> Vec<Arc<Invocation>> {
        self.records.lock().unwrap()
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remember that these invocations were covered by a verification.
    pub fn mark_verified<I: IntoIterator<Item=u64>>(&self, indices: I) {
        self.verified.lock().unwrap().extend(indices);
    }

    /// Every invocation not yet covered by a successful verification.
    pub fn unverified(&self) -> Vec<Arc<Invocation>> {
        let verified = self.verified.lock().unwrap();
        self.all()
            .into_iter()
            .filter(|i| !verified.contains(&i.index))
            .collect()
    }
}
