// vim: tw=80
//! The per-subject facade: interception, arrangement and verification

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicU64, Ordering}
    }
};

use tracing::{debug, trace, warn};

use crate::{
    error::{MockError, Result},
    invocation::{InteractionLog, Invocation, InvocationKind},
    matcher::{Outputs, Param, Parameters},
    registry::SetupRegistry,
    setup::{MethodSetup, SetupBuilder, setter_parameters},
    value::{AnyValue, Arguments, Returned, Value},
    verify::{Query, VerificationResult},
};

/// Member name under which indexer accesses are recorded.
pub const INDEXER: &str = "Item";

/// How a [`Mock`] reacts to invocations that no setup covers.
///
/// The default is lenient: an uncovered invocation yields the default value
/// of its return type.
///
/// # Examples
/// ```
/// # use imposter::*;
/// let mock = Mock::with_behavior(MockBehavior::strict());
/// let e = mock.call::<u32>("count", vec![]).unwrap_err();
/// assert!(e.is_not_configured());
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MockBehavior {
    throw_when_not_setup: bool,
    call_base_class: bool,
}

impl MockBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every method call and getter that no setup matches with
    /// [`MockError::NotConfigured`].
    pub fn strict() -> Self {
        Self::default().with_throw_when_not_setup(true)
    }

    pub fn with_throw_when_not_setup(mut self, throw: bool) -> Self {
        self.throw_when_not_setup = throw;
        self
    }

    /// When no behavior supplies a return value, ask the proxy to run the
    /// real implementation instead of returning a default.
    pub fn with_call_base_class(mut self, call_base: bool) -> Self {
        self.call_base_class = call_base;
        self
    }

    pub fn throw_when_not_setup(&self) -> bool {
        self.throw_when_not_setup
    }

    pub fn call_base_class(&self) -> bool {
        self.call_base_class
    }
}

/// Where the result of an invocation comes from.
#[derive(Debug)]
pub enum Resolution {
    /// A return behavior produced this value.
    Returned(Returned),
    /// Nothing produced a value; the caller should use its type's default.
    Default,
    /// Nothing produced a value; the caller should run the base
    /// implementation.
    Base,
}

/// Everything a proxy needs to complete one intercepted call.
#[derive(Debug)]
pub struct Outcome {
    resolution: Resolution,
    outputs: Outputs,
    invocation: Arc<Invocation>,
    setup: Option<Arc<MethodSetup>>,
}

impl Outcome {
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Should the proxy delegate to the base implementation?
    pub fn is_base(&self) -> bool {
        matches!(self.resolution, Resolution::Base)
    }

    /// Out and ref values to write back to the caller.
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// The record of this invocation in the interaction log.
    pub fn invocation(&self) -> &Arc<Invocation> {
        &self.invocation
    }

    /// The setup that handled this invocation, if any.
    pub fn setup(&self) -> Option<&Arc<MethodSetup>> {
        self.setup.as_ref()
    }

    /// The returned value, if a return behavior produced one.
    ///
    /// Fails with [`MockError::TypeMismatch`] if the value, or the return
    /// type declared by the setup, is not an `R`.
    pub fn value<R: 'static>(self) -> Result<Option<R>> {
        if let Some(setup) = &self.setup {
            setup.check_return_type::<R>()?;
        }
        match self.resolution {
            Resolution::Returned(r) => r.take().map(Some),
            Resolution::Default | Resolution::Base => Ok(None),
        }
    }

    /// Like [`value`](#method.value), but substitutes `R::default()`.
    pub fn value_or_default<R: Default + 'static>(self) -> Result<R> {
        Ok(self.value::<R>()?.unwrap_or_default())
    }

    pub fn into_parts(self) -> (Resolution, Outputs) {
        (self.resolution, self.outputs)
    }
}

/// What the engine did with one recorded access, before any fallback.
struct Intercepted {
    invocation: Arc<Invocation>,
    setup: Option<Arc<MethodSetup>>,
    returned: Option<Returned>,
    outputs: Outputs,
}

/// An identifier for one event handler, needed to unsubscribe it.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Subscription(u64);

type Handler = Arc<dyn Fn(&Arguments) + Send + Sync>;

/// The engine behind one mocked subject.
///
/// A proxy, usually generated, forwards every member access to a `Mock`:
/// method calls through [`execute`](#method.execute), property and indexer
/// accesses through their dedicated methods.  Tests arrange behavior with the
/// `setup_*` methods beforehand and assert on the recorded interactions with
/// the `verify_*` methods afterwards.
///
/// `Mock` is `Send + Sync`; it may be shared between threads behind an `Arc`.
///
/// # Examples
/// ```
/// # use imposter::*;
/// let mock = Mock::new();
/// mock.setup_method::<u32>("add", [Param::any::<u32>(), Param::any::<u32>()])
///     .returning(|args| {
///         args.get::<u32>(0).unwrap() + args.get::<u32>(1).unwrap()
///     });
/// let sum = mock.call::<u32>("add", vec![Value::new(2u32), Value::new(3u32)]);
/// assert_eq!(sum.unwrap(), 5);
/// mock.verify_method("add", Parameters::Any).once();
/// ```
#[derive(Default)]
pub struct Mock {
    behavior: MockBehavior,
    log: InteractionLog,
    registry: SetupRegistry,
    properties: Mutex<HashMap<String, Value>>,
    handlers: Mutex<HashMap<String, Vec<(Subscription, Handler)>>>,
    next_subscription: AtomicU64,
}

impl Mock {
    /// A lenient mock.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Mock { behavior, ..Self::default() }
    }

    pub fn behavior(&self) -> MockBehavior {
        self.behavior
    }

    pub fn log(&self) -> &InteractionLog {
        &self.log
    }

    pub fn registry(&self) -> &SetupRegistry {
        &self.registry
    }

    /// Record an access, resolve its setup and run that setup's behaviors.
    fn intercept(&self, kind: InvocationKind, member: &str,
                 arguments: Vec<Value>, assigned: Option<Value>)
        -> Result<Intercepted>
    {
        let invocation = self.log.register(kind, member, arguments, assigned);
        trace!(index = invocation.index(), %invocation, "recorded invocation");
        let values = invocation.matched_values();
        let setup = match self.registry.resolve(kind, member, &values) {
            Some(setup) => setup,
            None => {
                debug!(%invocation, "no setup matches");
                return Ok(Intercepted {
                    invocation,
                    setup: None,
                    returned: None,
                    outputs: Outputs::default(),
                });
            }
        };
        debug!(%invocation, setup = %setup, "resolved setup");
        let returned = setup.apply(&Arguments::new(member, &values))?;
        let outputs = setup.parameters().outputs(&values)?;
        Ok(Intercepted { invocation, setup: Some(setup), returned, outputs })
    }

    fn not_configured(&self, invocation: &Invocation) -> Result<()> {
        if self.behavior.throw_when_not_setup {
            warn!(%invocation, "strict mock has no setup for invocation");
            Err(MockError::NotConfigured { signature: invocation.to_string() })
        } else {
            Ok(())
        }
    }

    /// Handle one intercepted method call.
    ///
    /// This is the single entry point used by proxies.  The invocation is
    /// recorded first, so it is visible to verification even if a behavior
    /// fails.  Then the newest matching setup runs its callbacks and picks a
    /// return or throw behavior.  Without a matching setup, a strict mock
    /// fails with [`MockError::NotConfigured`]; otherwise the outcome asks
    /// for a default value, or for the base implementation if so configured.
    pub fn execute(&self, member: &str, arguments: Vec<Value>)
        -> Result<Outcome>
    {
        let i = self.intercept(InvocationKind::MethodCall, member, arguments,
                               None)?;
        if i.setup.is_none() {
            self.not_configured(&i.invocation)?;
        }
        let resolution = match i.returned {
            Some(r) => Resolution::Returned(r),
            None if self.behavior.call_base_class => Resolution::Base,
            None => Resolution::Default,
        };
        Ok(Outcome {
            resolution,
            outputs: i.outputs,
            invocation: i.invocation,
            setup: i.setup,
        })
    }

    /// Execute a method call and return its value as an `R`, or `R`'s
    /// default if nothing produced one.
    pub fn call<R: Default + 'static>(&self, member: &str,
                                      arguments: Vec<Value>) -> Result<R>
    {
        self.execute(member, arguments)?.value_or_default()
    }

    /// Like [`call`](#method.call), but runs `base` when the mock is
    /// configured to call the base implementation and nothing produced a
    /// value.
    pub fn call_or_base<R, F>(&self, member: &str, arguments: Vec<Value>,
                              base: F) -> Result<R>
        where R: Default + 'static,
              F: FnOnce(&Arguments) -> R
    {
        let outcome = self.execute(member, arguments)?;
        if outcome.is_base() {
            if let Some(setup) = outcome.setup() {
                setup.check_return_type::<R>()?;
            }
            let invocation = outcome.invocation();
            Ok(base(&Arguments::new(member, invocation.arguments())))
        } else {
            outcome.value_or_default()
        }
    }

    /// Register a setup and return a builder for its behaviors.
    ///
    /// # Panics
    ///
    /// If the setup declared a return type other than `R`.
    #[track_caller]
    fn arrange<R: Send + 'static>(&self, setup: MethodSetup)
        -> SetupBuilder<R>
    {
        let setup = self.registry.register(setup.returning_type::<R>());
        match SetupBuilder::new(setup) {
            Ok(builder) => builder,
            Err(e) => panic!("{}", e),
        }
    }

    /// Arrange how calls of `member` with matching arguments behave.
    ///
    /// `R` is the member's return type; use `()` for members that return
    /// nothing.
    pub fn setup_method<R: Send + 'static>(&self, member: &str,
                                           parameters: impl Into<Parameters>)
        -> SetupBuilder<R>
    {
        self.arrange(MethodSetup::new(member, parameters))
    }

    /// Register a setup built by hand.
    pub fn register_setup(&self, setup: MethodSetup) -> Arc<MethodSetup> {
        self.registry.register(setup)
    }

    /// Verify calls of `member` with matching arguments.
    pub fn verify_method(&self, member: &str,
                         parameters: impl Into<Parameters>)
        -> VerificationResult<'_>
    {
        Query::method(member, parameters).run(&self.log)
    }

    /// Start a verification from an arbitrary query.
    pub fn verify(&self, query: Query) -> VerificationResult<'_> {
        query.run(&self.log)
    }

    /// Read a property.
    ///
    /// A matching getter setup wins.  Failing that, the value most recently
    /// assigned is returned.  Failing that, a strict mock fails with
    /// [`MockError::NotConfigured`] and a lenient one returns `T::default()`.
    ///
    /// # Examples
    /// ```
    /// # use imposter::*;
    /// let mock = Mock::new();
    /// mock.set_property("volume", Value::new(11u8)).unwrap();
    /// assert_eq!(mock.get_property::<u8>("volume").unwrap(), 11);
    /// mock.setup_property_get::<u8>("volume").returns(3);
    /// assert_eq!(mock.get_property::<u8>("volume").unwrap(), 3);
    /// ```
    pub fn get_property<T>(&self, name: &str) -> Result<T>
        where T: AnyValue + Clone + Default
    {
        let i = self.intercept(InvocationKind::PropertyGet, name, Vec::new(),
                               None)?;
        if let Some(setup) = &i.setup {
            setup.check_return_type::<T>()?;
        }
        if let Some(r) = i.returned {
            return r.take();
        }
        let stored = self.properties.lock().unwrap().get(name).cloned();
        match stored {
            Some(v) if v.is_null() => Ok(T::default()),
            Some(v) => v.cloned(),
            None => {
                if i.setup.is_none() {
                    self.not_configured(&i.invocation)?;
                }
                Ok(T::default())
            }
        }
    }

    /// Assign a property.
    ///
    /// The value is stored for later reads even if no setup matches; a
    /// setter never fails for lack of a setup.  A matching setter setup may
    /// still fail the assignment with a throw behavior.
    pub fn set_property(&self, name: &str, value: Value) -> Result<()> {
        self.intercept(InvocationKind::PropertySet, name, Vec::new(),
                       Some(value.clone()))?;
        self.properties.lock().unwrap().insert(name.to_owned(), value);
        Ok(())
    }

    /// Give a property a starting value, without recording an interaction.
    pub fn initialize_property(&self, name: &str, value: Value) {
        self.properties.lock().unwrap().insert(name.to_owned(), value);
    }

    pub fn setup_property_get<T: Send + 'static>(&self, name: &str)
        -> SetupBuilder<T>
    {
        self.arrange(MethodSetup::for_kind(InvocationKind::PropertyGet, name,
                                           Parameters::none()))
    }

    /// Arrange assignments of values matching `value`.
    pub fn setup_property_set(&self, name: &str, value: Param)
        -> SetupBuilder<()>
    {
        self.arrange(MethodSetup::for_kind(InvocationKind::PropertySet, name,
                                           value))
    }

    pub fn verify_property_get(&self, name: &str) -> VerificationResult<'_> {
        Query::property_get(name).run(&self.log)
    }

    pub fn verify_property_set(&self, name: &str, value: Param)
        -> VerificationResult<'_>
    {
        Query::property_set(name, value).run(&self.log)
    }

    /// Read through the indexer.  Indexers store nothing, so without a
    /// matching setup this takes the not-set-up path.
    pub fn get_indexer<T>(&self, index: Vec<Value>) -> Result<T>
        where T: Default + 'static
    {
        let i = self.intercept(InvocationKind::IndexerGet, INDEXER, index,
                               None)?;
        if let Some(setup) = &i.setup {
            setup.check_return_type::<T>()?;
        }
        match i.returned {
            Some(r) => r.take(),
            None => {
                if i.setup.is_none() {
                    self.not_configured(&i.invocation)?;
                }
                Ok(T::default())
            }
        }
    }

    /// Assign through the indexer.  Like a property setter, this never fails
    /// for lack of a setup.
    pub fn set_indexer(&self, index: Vec<Value>, value: Value) -> Result<()> {
        self.intercept(InvocationKind::IndexerSet, INDEXER, index, Some(value))
            .map(drop)
    }

    pub fn setup_indexer_get<T: Send + 'static>(&self,
                                                index: impl Into<Parameters>)
        -> SetupBuilder<T>
    {
        self.arrange(MethodSetup::for_kind(InvocationKind::IndexerGet, INDEXER,
                                           index))
    }

    pub fn setup_indexer_set(&self, index: impl Into<Parameters>, value: Param)
        -> SetupBuilder<()>
    {
        let parameters = setter_parameters(index.into(), value);
        self.arrange(MethodSetup::for_kind(InvocationKind::IndexerSet, INDEXER,
                                           parameters))
    }

    pub fn verify_indexer_get(&self, index: impl Into<Parameters>)
        -> VerificationResult<'_>
    {
        Query::indexer_get(INDEXER, index).run(&self.log)
    }

    pub fn verify_indexer_set(&self, index: impl Into<Parameters>,
                              value: Param) -> VerificationResult<'_>
    {
        Query::indexer_set(INDEXER, index, value).run(&self.log)
    }

    /// Attach a handler to `event`.
    ///
    /// The subscription is recorded, and any matching setup runs, before the
    /// handler is attached; a throw behavior therefore prevents the
    /// subscription.
    pub fn subscribe<F>(&self, event: &str, handler: F) -> Result<Subscription>
        where F: Fn(&Arguments) + Send + Sync + 'static
    {
        self.intercept(InvocationKind::EventSubscribe, event, Vec::new(),
                       None)?;
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let subscription = Subscription(id);
        let handler: Handler = Arc::new(handler);
        self.handlers.lock().unwrap()
            .entry(event.to_owned())
            .or_default()
            .push((subscription, handler));
        Ok(subscription)
    }

    /// Detach a handler.  Returns whether it was still attached.
    pub fn unsubscribe(&self, event: &str, subscription: Subscription)
        -> Result<bool>
    {
        self.intercept(InvocationKind::EventUnsubscribe, event, Vec::new(),
                       None)?;
        let mut handlers = self.handlers.lock().unwrap();
        let Some(list) = handlers.get_mut(event) else {
            return Ok(false);
        };
        let before = list.len();
        list.retain(|(s, _)| *s != subscription);
        Ok(list.len() < before)
    }

    /// Invoke every handler currently attached to `event`, in subscription
    /// order.  Returns the number of handlers invoked.
    ///
    /// # Examples
    /// ```
    /// # use imposter::*;
    /// # use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
    /// let mock = Mock::new();
    /// let total = Arc::new(AtomicU32::new(0));
    /// let t = total.clone();
    /// mock.subscribe("tick", move |args| {
    ///     t.fetch_add(*args.get::<u32>(0).unwrap(), Ordering::Relaxed);
    /// }).unwrap();
    /// mock.raise("tick", vec![Value::new(5u32)]);
    /// assert_eq!(total.load(Ordering::Relaxed), 5);
    /// ```
    pub fn raise(&self, event: &str, arguments: Vec<Value>) -> usize {
        // Handlers may subscribe or unsubscribe, so don't hold the lock
        let handlers: Vec<Handler> = self.handlers.lock().unwrap()
            .get(event)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        trace!(event = event, handlers = handlers.len(), "raising event");
        let args = Arguments::new(event, &arguments);
        for handler in handlers.iter() {
            handler(&args);
        }
        handlers.len()
    }

    pub fn verify_subscribed(&self, event: &str) -> VerificationResult<'_> {
        Query::subscribed(event).run(&self.log)
    }

    pub fn verify_unsubscribed(&self, event: &str) -> VerificationResult<'_> {
        Query::unsubscribed(event).run(&self.log)
    }

    /// Every interaction recorded so far, in the order it happened.
    pub fn interactions(&self) -> Vec<Arc<Invocation>> {
        self.log.all()
    }

    /// Drop every setup, so a test can arrange new behavior from scratch.
    /// Recorded interactions and property values are kept.
    pub fn checkpoint(&self) {
        debug!(setups = self.registry.len(), "checkpoint");
        self.registry.clear();
    }

    /// Setups that have never handled an invocation.
    pub fn unused_setups(&self) -> Vec<Arc<MethodSetup>> {
        self.registry.unused()
    }

    /// Assert that every setup handled at least one invocation.
    #[track_caller]
    pub fn verify_all_setups_used(&self) {
        let unused = self.unused_setups();
        if !unused.is_empty() {
            let list = unused.iter()
                .map(|s| format!("\n  {}", s))
                .collect::<String>();
            panic!("{} setup(s) were never used:{}", unused.len(), list);
        }
    }

    /// Assert that every recorded interaction was covered by a successful
    /// verification.
    #[track_caller]
    pub fn verify_all_interactions_verified(&self) {
        let unverified = self.log.unverified();
        if !unverified.is_empty() {
            let list = unverified.iter()
                .map(|i| format!("\n  [{}] {}", i.index(), i))
                .collect::<String>();
            panic!("{} interaction(s) were never verified:{}",
                   unverified.len(), list);
        }
    }
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mock")
            .field("behavior", &self.behavior)
            .field("interactions", &self.log.len())
            .field("setups", &self.registry.len())
            .finish_non_exhaustive()
    }
}
