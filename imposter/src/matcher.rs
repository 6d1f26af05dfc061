// vim: tw=80
//! Argument matchers
//!
//! A [`Param`] decides whether one argument is acceptable for a setup or a
//! verification.  Typed matchers are built from anything implementing
//! [`Predicate`], so the whole of the `predicates` crate is available, and are
//! then erased so that setups for members of any arity can be stored side by
//! side.

use std::{
    any,
    fmt,
    marker::PhantomData,
    sync::{Arc, Mutex},
};

use predicates::prelude::*;
use predicates_tree::CaseTreeExt;

use crate::{
    error::{MockError, Result},
    value::{AnyValue, Value},
};

/// Object-safe view of a single-argument matcher.
trait ErasedMatcher: Send + Sync {
    fn matches(&self, v: &Value) -> bool;

    fn describe(&self) -> String;

    /// Explain why `v` doesn't match, if it doesn't.
    fn explain(&self, v: &Value) -> Option<String> {
        if self.matches(v) {
            None
        } else {
            Some(format!("{:?} does not satisfy {}", v, self.describe()))
        }
    }

    /// The value to hand back through an out or ref parameter.
    fn output(&self, _supplied: &Value) -> Result<Option<Value>> {
        Ok(None)
    }
}

struct AnyMatcher<T>(PhantomData<fn(&T)>);

impl<T: AnyValue> ErasedMatcher for AnyMatcher<T> {
    fn matches(&self, v: &Value) -> bool {
        v.is_null() || v.is::<T>()
    }

    fn describe(&self) -> String {
        format!("any::<{}>()", any::type_name::<T>())
    }
}

struct NullMatcher;

impl ErasedMatcher for NullMatcher {
    fn matches(&self, v: &Value) -> bool {
        v.is_null()
    }

    fn describe(&self) -> String {
        "null".to_owned()
    }
}

struct PredicateMatcher<T, P> {
    pred: P,
    _t: PhantomData<fn(&T)>,
}

impl<T, P> ErasedMatcher for PredicateMatcher<T, P>
    where T: AnyValue, P: Predicate<T> + Send + Sync
{
    fn matches(&self, v: &Value) -> bool {
        v.downcast_ref::<T>()
            .map_or(false, |t| self.pred.eval(t))
    }

    fn describe(&self) -> String {
        self.pred.to_string()
    }

    fn explain(&self, v: &Value) -> Option<String> {
        match v.downcast_ref::<T>() {
            Some(t) => self.pred.find_case(false, t)
                .map(|case| case.tree().to_string()),
            None => Some(format!("expected `{}`, found `{}`",
                                 any::type_name::<T>(), v.type_name())),
        }
    }
}

struct OutMatcher<T, F> {
    f: F,
    _t: PhantomData<fn() -> T>,
}

impl<T, F> ErasedMatcher for OutMatcher<T, F>
    where T: AnyValue, F: Fn() -> T + Send + Sync
{
    fn matches(&self, _v: &Value) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("out::<{}>()", any::type_name::<T>())
    }

    fn output(&self, _supplied: &Value) -> Result<Option<Value>> {
        Ok(Some(Value::new((self.f)())))
    }
}

struct RefMatcher<T, F> {
    f: F,
    _t: PhantomData<fn(&T) -> T>,
}

impl<T, F> ErasedMatcher for RefMatcher<T, F>
    where T: AnyValue, F: Fn(&T) -> T + Send + Sync
{
    fn matches(&self, _v: &Value) -> bool {
        true
    }

    fn describe(&self) -> String {
        format!("by_ref::<{}>()", any::type_name::<T>())
    }

    /// A null ref produces no output.  A ref of any type other than `T` is
    /// an error.
    fn output(&self, supplied: &Value) -> Result<Option<Value>> {
        if supplied.is_null() {
            return Ok(None);
        }
        let t = supplied.downcast_ref::<T>().ok_or_else(|| {
            MockError::type_mismatch("ref parameter", any::type_name::<T>(),
                                     supplied.type_name())
        })?;
        Ok(Some(Value::new((self.f)(t))))
    }
}

struct MonitorMatcher<T> {
    inner: Arc<dyn ErasedMatcher>,
    values: Arc<Mutex<Vec<T>>>,
}

impl<T: AnyValue + Clone> ErasedMatcher for MonitorMatcher<T> {
    fn matches(&self, v: &Value) -> bool {
        let ok = self.inner.matches(v);
        if ok {
            if let Some(t) = v.downcast_ref::<T>() {
                self.values.lock().unwrap().push(t.clone());
            }
        }
        ok
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn explain(&self, v: &Value) -> Option<String> {
        self.inner.explain(v)
    }

    fn output(&self, supplied: &Value) -> Result<Option<Value>> {
        self.inner.output(supplied)
    }
}

/// A matcher for a single argument, optionally bound to the parameter's name.
///
/// # Examples
/// ```
/// # use imposter::*;
/// let p = Param::eq(5i32);
/// assert!(p.matches(&Value::new(5i32)));
/// assert!(!p.matches(&Value::new(6i32)));
/// // A matcher never accepts a value of a different type
/// assert!(!p.matches(&Value::new(5u8)));
///
/// let p = Param::with::<u32, _>(predicate::in_iter(vec![1u32, 2, 3]));
/// assert!(p.matches(&Value::new(2u32)));
/// ```
#[derive(Clone)]
pub struct Param {
    name: Option<String>,
    matcher: Arc<dyn ErasedMatcher>,
}

impl Param {
    fn from_matcher<M: ErasedMatcher + 'static>(m: M) -> Self {
        Param { name: None, matcher: Arc::new(m) }
    }

    /// Match any `T`, or null.
    pub fn any<T: AnyValue>() -> Self {
        Self::from_matcher(AnyMatcher::<T>(PhantomData))
    }

    /// Match only null values.
    pub fn null() -> Self {
        Self::from_matcher(NullMatcher)
    }

    /// Match a `T` that satisfies an arbitrary
    /// [`Predicate`](predicates::Predicate).
    pub fn with<T, P>(pred: P) -> Self
        where T: AnyValue, P: Predicate<T> + Send + Sync + 'static
    {
        Self::from_matcher(PredicateMatcher { pred, _t: PhantomData })
    }

    /// Match a `T` equal to `t`.
    pub fn eq<T: AnyValue + PartialEq>(t: T) -> Self {
        Self::with::<T, _>(predicate::eq(t))
    }

    /// Match a `T` for which `f` returns true.
    pub fn function<T, F>(f: F) -> Self
        where T: AnyValue, F: Fn(&T) -> bool + Send + Sync + 'static
    {
        Self::with::<T, _>(predicate::function(f))
    }

    /// An out parameter.  Matches anything; once the setup is selected, `f`
    /// produces the value written back to the caller.
    pub fn out<T, F>(f: F) -> Self
        where T: AnyValue, F: Fn() -> T + Send + Sync + 'static
    {
        Self::from_matcher(OutMatcher { f, _t: PhantomData })
    }

    /// A ref parameter.  Matches anything; once the setup is selected, `f`
    /// transforms the caller-supplied value into the one written back.  A
    /// supplied value that isn't a `T` fails the invocation with
    /// [`MockError::TypeMismatch`](crate::MockError::TypeMismatch).
    pub fn by_ref<T, F>(f: F) -> Self
        where T: AnyValue, F: Fn(&T) -> T + Send + Sync + 'static
    {
        Self::from_matcher(RefMatcher { f, _t: PhantomData })
    }

    /// Bind this matcher to a parameter name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Record every `T` accepted by this matcher.
    ///
    /// # Examples
    /// ```
    /// # use imposter::*;
    /// let (p, monitor) = Param::function(|x: &i32| *x > 0).monitor::<i32>();
    /// for x in [-1, 1, 0, 3] {
    ///     p.matches(&Value::new(x));
    /// }
    /// assert_eq!(monitor.values(), vec![1, 3]);
    /// ```
    pub fn monitor<T: AnyValue + Clone>(self) -> (Self, Monitor<T>) {
        let values = Arc::new(Mutex::new(Vec::new()));
        let m = MonitorMatcher {
            inner: self.matcher,
            values: values.clone(),
        };
        let p = Param { name: self.name, matcher: Arc::new(m) };
        (p, Monitor { values })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn matches(&self, v: &Value) -> bool {
        self.matcher.matches(v)
    }

    /// Explain why `v` doesn't match, or `None` if it does.
    pub fn explain(&self, v: &Value) -> Option<String> {
        self.matcher.explain(v)
    }

    pub(crate) fn output(&self, supplied: &Value) -> Result<Option<Value>> {
        self.matcher.output(supplied)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.matcher.describe()),
            None => f.write_str(&self.matcher.describe()),
        }
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Param({})", self)
    }
}

/// Read back the values seen by a monitored [`Param`].
#[derive(Clone)]
pub struct Monitor<T> {
    values: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone> Monitor<T> {
    /// Every accepted value so far, in the order they were tested.
    pub fn values(&self) -> Vec<T> {
        self.values.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: fmt::Debug> fmt::Debug for Monitor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Monitor")
            .field(&*self.values.lock().unwrap())
            .finish()
    }
}

/// The matchers for a member's whole argument list.
#[derive(Clone, Debug)]
pub enum Parameters {
    /// Matches any argument list, regardless of arity or types.  Useful when
    /// a test doesn't care which overload was called.
    Any,
    /// One matcher per argument, compared positionally.
    Positional(Vec<Param>),
}

impl Parameters {
    /// Matches only an empty argument list.
    pub fn none() -> Self {
        Parameters::Positional(Vec::new())
    }

    pub fn matches(&self, args: &[Value]) -> bool {
        match self {
            Parameters::Any => true,
            Parameters::Positional(params) => {
                params.len() == args.len() &&
                    params.iter().zip(args).all(|(p, a)| p.matches(a))
            }
        }
    }

    /// One line per mismatching argument, empty if `args` match.
    pub fn explain(&self, args: &[Value]) -> Vec<String> {
        match self {
            Parameters::Any => Vec::new(),
            Parameters::Positional(params) if params.len() != args.len() => {
                vec![format!("expected {} arguments, found {}", params.len(),
                             args.len())]
            },
            Parameters::Positional(params) => {
                params.iter()
                    .zip(args)
                    .enumerate()
                    .filter_map(|(i, (p, a))| {
                        p.explain(a).map(|why| {
                            let label = p.name().map(str::to_owned)
                                .unwrap_or_else(|| format!("argument {}", i));
                            format!("{}: {}", label, why)
                        })
                    }).collect()
            }
        }
    }

    /// Compute the values of any out and ref parameters.
    pub(crate) fn outputs(&self, args: &[Value]) -> Result<Outputs> {
        let mut outputs = Outputs::default();
        if let Parameters::Positional(params) = self {
            let nulls = std::iter::repeat(Value::null());
            let supplied = args.iter().cloned().chain(nulls);
            for (i, (p, a)) in params.iter().zip(supplied).enumerate() {
                if let Some(value) = p.output(&a)? {
                    outputs.0.push(Output {
                        position: i,
                        name: p.name().map(str::to_owned),
                        value
                    });
                }
            }
        }
        Ok(outputs)
    }
}

impl From<Vec<Param>> for Parameters {
    fn from(params: Vec<Param>) -> Self {
        Parameters::Positional(params)
    }
}

impl<const N: usize> From<[Param; N]> for Parameters {
    fn from(params: [Param; N]) -> Self {
        Parameters::Positional(params.into())
    }
}

impl From<Param> for Parameters {
    fn from(param: Param) -> Self {
        Parameters::Positional(vec![param])
    }
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameters::Any => f.write_str(".."),
            Parameters::Positional(params) => {
                let rendered = params.iter()
                    .map(Param::to_string)
                    .collect::<Vec<_>>();
                f.write_str(&rendered.join(", "))
            }
        }
    }
}

/// An out or ref value produced for one parameter.
#[derive(Clone, Debug)]
pub struct Output {
    pub position: usize,
    pub name: Option<String>,
    pub value: Value,
}

/// The out and ref values that a proxy must write back to its caller.
#[derive(Clone, Debug, Default)]
pub struct Outputs(Vec<Output>);

impl Outputs {
    /// The output for the parameter at `position`.
    pub fn get(&self, position: usize) -> Option<&Value> {
        self.0.iter()
            .find(|o| o.position == position)
            .map(|o| &o.value)
    }

    /// The output for the parameter bound to `name`.
    pub fn by_name(&self, name: &str) -> Option<&Value> {
        self.0.iter()
            .find(|o| o.name.as_deref() == Some(name))
            .map(|o| &o.value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Output> {
        self.0.iter()
    }
}
