// vim: tw=80
//! Setups: rules that tell a mock how to respond to matching invocations

use std::{
    any::{self, TypeId},
    fmt,
    marker::PhantomData,
    sync::{Arc, Mutex},
};

use tracing::trace;

use crate::{
    behavior::{self, Action, Behaviors, single_threaded},
    error::{BoxError, MockError, Result},
    invocation::InvocationKind,
    matcher::{Param, Parameters},
    value::{Arguments, Returned, Value},
};

#[derive(Clone, Copy, Debug)]
struct ReturnType {
    id: TypeId,
    name: &'static str,
}

/// A registered rule: a member, matchers for its arguments, and an ordered
/// list of behaviors.
///
/// Setups are normally created through [`Mock::setup_method`] and friends,
/// which register them immediately and hand back a [`SetupBuilder`].
///
/// [`Mock::setup_method`]: crate::Mock::setup_method
pub struct MethodSetup {
    kind: InvocationKind,
    member: String,
    parameters: Parameters,
    return_type: Option<ReturnType>,
    order: u64,
    behaviors: Mutex<Behaviors>,
}

impl MethodSetup {
    /// A setup for a method call.
    pub fn new(member: impl Into<String>, parameters: impl Into<Parameters>)
        -> Self
    {
        Self::for_kind(InvocationKind::MethodCall, member, parameters)
    }

    /// A setup for any kind of member access.
    ///
    /// For property and indexer setters, the last parameter matches the
    /// assigned value.
    pub fn for_kind(kind: InvocationKind, member: impl Into<String>,
                    parameters: impl Into<Parameters>) -> Self
    {
        MethodSetup {
            kind,
            member: member.into(),
            parameters: parameters.into(),
            return_type: None,
            order: 0,
            behaviors: Mutex::new(Behaviors::default()),
        }
    }

    /// Declare the member's return type.  Executing the setup for a caller
    /// that expects any other type is a [`MockError::TypeMismatch`].
    pub fn returning_type<R: 'static>(mut self) -> Self {
        self.return_type = Some(ReturnType {
            id: TypeId::of::<R>(),
            name: any::type_name::<R>(),
        });
        self
    }

    pub fn kind(&self) -> InvocationKind {
        self.kind
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Position of this setup in registration order.  Among several
    /// matching setups, the one registered last wins.
    pub fn registration_order(&self) -> u64 {
        self.order
    }

    /// How many invocations have been resolved to this setup so far.
    pub fn match_count(&self) -> u32 {
        self.behaviors.lock().unwrap().match_count()
    }

    /// Name of the declared return type, if any.
    pub fn return_type_name(&self) -> Option<&'static str> {
        self.return_type.map(|t| t.name)
    }

    /// Does this setup apply to an access of `member` with `args`?
    pub fn matches(&self, kind: InvocationKind, member: &str, args: &[Value])
        -> bool
    {
        self.kind == kind && self.member == member &&
            self.parameters.matches(args)
    }

    pub(crate) fn set_order(&mut self, order: u64) {
        self.order = order;
    }

    /// Fail unless a caller expecting an `R` may use this setup.
    pub(crate) fn check_return_type<R: 'static>(&self) -> Result<()> {
        match self.return_type {
            Some(t) if t.id != TypeId::of::<R>() => {
                Err(MockError::type_mismatch(
                    format!("return type of {}", self),
                    any::type_name::<R>(),
                    t.name))
            },
            _ => Ok(())
        }
    }

    pub(crate) fn apply(&self, args: &Arguments) -> Result<Option<Returned>> {
        behavior::apply(&self.behaviors, args)
    }

    fn configure<F>(&self, f: F) -> Result<()>
        where F: FnOnce(&mut Behaviors) -> Result<()>
    {
        f(&mut self.behaviors.lock().unwrap())
    }

    fn push(&self, action: Action) {
        trace!(setup = %self, "adding behavior");
        self.behaviors.lock().unwrap().push(action);
    }
}

impl fmt::Display for MethodSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (index, value) = match &self.parameters {
            Parameters::Positional(params) if self.kind.is_assignment() => {
                let (value, index) = params.split_last()
                    .map(|(v, i)| (v.to_string(), i.to_vec()))
                    .unwrap_or_default();
                (Parameters::Positional(index).to_string(), value)
            },
            p => (p.to_string(), "..".to_owned())
        };
        let member = &self.member;
        match self.kind {
            InvocationKind::MethodCall => write!(f, "{}({})", member, index),
            InvocationKind::PropertyGet => write!(f, "get {}", member),
            InvocationKind::PropertySet =>
                write!(f, "set {} = {}", member, value),
            InvocationKind::IndexerGet => write!(f, "{}[{}]", member, index),
            InvocationKind::IndexerSet =>
                write!(f, "{}[{}] = {}", member, index, value),
            InvocationKind::EventSubscribe =>
                write!(f, "subscribe {}", member),
            InvocationKind::EventUnsubscribe =>
                write!(f, "unsubscribe {}", member),
        }
    }
}

impl fmt::Debug for MethodSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSetup")
            .field("signature", &self.to_string())
            .field("order", &self.order)
            .field("return_type", &self.return_type_name())
            .finish()
    }
}

/// Fluent interface for adding behaviors to a registered [`MethodSetup`].
///
/// Behaviors are appended in order.  Gate modifiers like
/// [`for_times`](#method.for_times) or [`when`](#method.when) apply to the
/// behavior added most recently.  Misconfiguration is a test author error and
/// panics immediately; the `try_` variants return it instead.
///
/// # Examples
/// ```
/// # use imposter::*;
/// let mock = Mock::new();
/// mock.setup_method::<String>("greet", Parameters::Any)
///     .returns("hello".to_owned()).for_times(2)
///     .returns("bye".to_owned()).for_times(1);
/// let greetings = (0..4)
///     .map(|_| mock.call::<String>("greet", vec![]).unwrap())
///     .collect::<Vec<_>>();
/// assert_eq!(greetings, ["hello", "hello", "bye", ""]);
/// ```
pub struct SetupBuilder<R> {
    setup: Arc<MethodSetup>,
    _r: PhantomData<fn() -> R>,
}

impl<R: Send + 'static> SetupBuilder<R> {
    /// Configure an already registered setup.  Fails if the setup declared a
    /// return type other than `R`.
    pub fn new(setup: Arc<MethodSetup>) -> Result<Self> {
        setup.check_return_type::<R>()?;
        Ok(SetupBuilder { setup, _r: PhantomData })
    }

    /// The setup being configured.
    pub fn setup(&self) -> &Arc<MethodSetup> {
        &self.setup
    }

    #[track_caller]
    fn modify<F>(&mut self, f: F) -> &mut Self
        where F: FnOnce(&mut Behaviors) -> Result<()>
    {
        if let Err(e) = self.setup.configure(f) {
            panic!("{}: {}", self.setup, e);
        }
        self
    }

    /// Return a constant value.
    ///
    /// The value is cloned for every invocation that this behavior applies
    /// to.
    pub fn returns(&mut self, r: R) -> &mut Self
        where R: Clone
    {
        self.returning(move |_| r.clone())
    }

    /// Compute the return value from the invocation's arguments.
    pub fn returning<F>(&mut self, mut f: F) -> &mut Self
        where F: FnMut(&Arguments) -> R + Send + 'static
    {
        self.try_returning(move |args| Ok(f(args)))
    }

    /// Like [`returning`](#method.returning), but the closure may fail; for
    /// example when it reads an argument as the wrong type.
    pub fn try_returning<F>(&mut self, mut f: F) -> &mut Self
        where F: FnMut(&Arguments) -> Result<R> + Send + 'static
    {
        let rfunc = move |args: &Arguments| f(args).map(Returned::new);
        self.setup.push(Action::Return(Box::new(rfunc)));
        self
    }

    /// Single-threaded version of [`returning`](#method.returning).  Can be
    /// used when the closure isn't `Send`.
    ///
    /// It is a runtime error to invoke the mock from a different thread than
    /// the one that originally called this method.
    pub fn returning_st<F>(&mut self, f: F) -> &mut Self
        where F: FnMut(&Arguments) -> R + 'static
    {
        self.returning(single_threaded(f))
    }

    /// Supply an `FnOnce` closure that will provide the return value exactly
    /// once.  This is useful for return types that aren't `Clone`.  The
    /// behavior retires after its single use, as if followed by
    /// [`only_once`](#method.only_once).
    pub fn return_once<F>(&mut self, f: F) -> &mut Self
        where F: FnOnce(&Arguments) -> R + Send + 'static
    {
        let mut fopt = Some(f);
        self.try_returning(move |args| {
            fopt.take()
                .map(|f| f(args))
                .ok_or_else(|| MockError::invalid(
                    "a return_once behavior was applied twice"))
        }).only_once()
    }

    /// Fail the invocation with the error produced by `f`.
    pub fn throws<E, F>(&mut self, mut f: F) -> &mut Self
        where E: Into<BoxError>,
              F: FnMut(&Arguments) -> E + Send + 'static
    {
        let tfunc = move |args: &Arguments| -> BoxError { f(args).into() };
        self.setup.push(Action::Throw(Box::new(tfunc)));
        self
    }

    /// Fail the invocation with a copy of `e`.
    pub fn throw_const<E>(&mut self, e: E) -> &mut Self
        where E: Into<BoxError> + Clone + Send + 'static
    {
        self.throws(move |_| e.clone())
    }

    /// Run a side effect whenever this behavior applies.
    pub fn callback<F>(&mut self, mut f: F) -> &mut Self
        where F: FnMut(&Arguments) + Send + 'static
    {
        self.try_callback(move |args| {
            f(args);
            Ok(())
        })
    }

    /// Like [`callback`](#method.callback), but an error returned by the
    /// closure aborts the invocation.
    pub fn try_callback<F>(&mut self, f: F) -> &mut Self
        where F: FnMut(&Arguments) -> Result<()> + Send + 'static
    {
        self.setup.push(Action::Callback(Box::new(f)));
        self
    }

    /// Single-threaded version of [`callback`](#method.callback).
    pub fn callback_st<F>(&mut self, f: F) -> &mut Self
        where F: FnMut(&Arguments) + 'static
    {
        self.callback(single_threaded(f))
    }

    /// Only apply the last behavior to invocations for which `f` returns
    /// true.  `f` receives the 0-based number of earlier invocations that
    /// matched this setup.  A rejected behavior is skipped without consuming
    /// any of its budget.
    #[track_caller]
    pub fn when<F>(&mut self, f: F) -> &mut Self
        where F: Fn(u32) -> bool + Send + Sync + 'static
    {
        self.modify(move |b| b.when(Arc::new(f)))
    }

    /// Apply the last behavior for `n` consecutive invocations before moving
    /// on to the next one.  Once spent, the behavior never applies again.
    ///
    /// # Panics
    ///
    /// If `n` is zero, or there is no behavior to modify.
    #[track_caller]
    pub fn for_times(&mut self, n: u32) -> &mut Self {
        self.modify(|b| b.for_times(n))
    }

    /// Non-panicking version of [`for_times`](#method.for_times).
    pub fn try_for_times(&mut self, n: u32) -> Result<&mut Self> {
        self.setup.configure(|b| b.for_times(n))?;
        Ok(self)
    }

    /// Apply the last behavior to at most `n` invocations in total.
    ///
    /// # Panics
    ///
    /// If `n` is zero, or there is no behavior to modify.
    #[track_caller]
    pub fn only(&mut self, n: u32) -> &mut Self {
        self.modify(|b| b.only(n))
    }

    /// Non-panicking version of [`only`](#method.only).
    pub fn try_only(&mut self, n: u32) -> Result<&mut Self> {
        self.setup.configure(|b| b.only(n))?;
        Ok(self)
    }

    /// Shortcut for [`only(1)`](#method.only).
    #[track_caller]
    pub fn only_once(&mut self) -> &mut Self {
        self.only(1)
    }

    /// Keep applying the last behavior to every following invocation.
    #[track_caller]
    pub fn forever(&mut self) -> &mut Self {
        self.modify(|b| b.forever())
    }

    /// Fire the last callback on every invocation, independently of the
    /// sequential cursor.
    ///
    /// # Panics
    ///
    /// If the last behavior is a return or throw behavior.
    #[track_caller]
    pub fn in_parallel(&mut self) -> &mut Self {
        self.modify(|b| b.in_parallel())
    }
}

impl<R> fmt::Debug for SetupBuilder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SetupBuilder")
            .field(&*self.setup)
            .finish()
    }
}

/// Shorthand for a setup over a setter: the index parameters followed by the
/// assigned value.
pub(crate) fn setter_parameters(index: Parameters, value: Param)
    -> Parameters
{
    match index {
        Parameters::Any => Parameters::Any,
        Parameters::Positional(mut params) => {
            params.push(value);
            Parameters::Positional(params)
        }
    }
}
