// vim: tw=80
//! Type-erased values that flow between a proxy and the engine.

use std::{
    any::{self, Any as StdAny},
    fmt,
    slice,
    sync::Arc,
};

use downcast::{downcast, Any};

use crate::error::{MockError, Result};

/// Anything that can be passed to a mocked member as an argument.
///
/// Implemented for every `'static` type that is `Debug + Send + Sync`.
pub trait AnyValue: Any + fmt::Debug + Send + Sync {}
impl<T: Any + fmt::Debug + Send + Sync> AnyValue for T {}
downcast!(dyn AnyValue);

/// A single argument, out value or stored property value.
///
/// `Value`s are cheap to clone; clones share the underlying allocation so the
/// interaction log and any callbacks see the very same argument.  A `Value`
/// may be null, for arguments that have no meaningful content (the analog of
/// a null reference).
#[derive(Clone)]
pub struct Value {
    inner: Option<Arc<dyn AnyValue>>,
    type_name: &'static str,
}

impl Value {
    /// Wrap a concrete value.
    pub fn new<T: AnyValue>(t: T) -> Self {
        Value {
            inner: Some(Arc::new(t)),
            type_name: any::type_name::<T>(),
        }
    }

    /// The null value.
    pub fn null() -> Self {
        Value {
            inner: None,
            type_name: "null",
        }
    }

    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Does this value hold a `T`?
    pub fn is<T: AnyValue>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Name of the concrete type stored within, or `"null"`.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the contents as a `T`, if that is what they are.
    pub fn downcast_ref<T: AnyValue>(&self) -> Option<&T> {
        self.inner.as_deref()
            .and_then(|v| v.downcast_ref::<T>().ok())
    }

    /// Borrow the contents as a `T`, or fail with
    /// [`MockError::TypeMismatch`].
    pub fn get<T: AnyValue>(&self) -> Result<&T> {
        match self.inner.as_deref() {
            Some(v) => v.downcast_ref::<T>().map_err(MockError::from),
            None => Err(MockError::type_mismatch("value",
                                                 any::type_name::<T>(),
                                                 self.type_name))
        }
    }

    /// Like [`get`](#method.get), but returns an owned copy.
    pub fn cloned<T: AnyValue + Clone>(&self) -> Result<T> {
        self.get::<T>().cloned()
    }

    /// Are both `Value`s the very same allocation (or both null)?
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(v) => fmt::Debug::fmt(&**v, f),
            None => f.write_str("null"),
        }
    }
}

/// Render a list of values the way they would appear in a call expression.
pub(crate) fn render_values(values: &[Value]) -> String {
    values.iter()
        .map(|v| format!("{:?}", v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The arguments of one invocation, as seen by callbacks and return
/// functions.
#[derive(Clone, Copy, Debug)]
pub struct Arguments<'a> {
    member: &'a str,
    values: &'a [Value],
}

impl<'a> Arguments<'a> {
    pub fn new(member: &'a str, values: &'a [Value]) -> Self {
        Arguments { member, values }
    }

    /// Name of the member that was invoked.
    pub fn member(&self) -> &'a str {
        self.member
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The raw `Value` at position `i`.
    pub fn value(&self, i: usize) -> Option<&'a Value> {
        self.values.get(i)
    }

    /// Borrow the argument at position `i` as a `T`.
    ///
    /// Asking for the wrong type is always an error, never a silent coercion.
    pub fn get<T: AnyValue>(&self, i: usize) -> Result<&'a T> {
        let v = self.values.get(i).ok_or_else(|| {
            MockError::invalid(format!("{} has no argument at position {}",
                                       self.member, i))
        })?;
        v.downcast_ref::<T>().ok_or_else(|| {
            MockError::type_mismatch(
                format!("argument {} of {}", i, self.member),
                any::type_name::<T>(),
                v.type_name())
        })
    }

    pub fn iter(&self) -> slice::Iter<'a, Value> {
        self.values.iter()
    }

    pub fn as_slice(&self) -> &'a [Value] {
        self.values
    }
}

/// A value produced by a return behavior.
///
/// Unlike arguments, return values are owned and need not be `Debug` or
/// `Sync`; they are moved out to the caller exactly once.
pub struct Returned {
    value: Box<dyn StdAny + Send>,
    type_name: &'static str,
}

impl Returned {
    pub fn new<R: Send + 'static>(r: R) -> Self {
        Returned {
            value: Box::new(r),
            type_name: any::type_name::<R>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<R: 'static>(&self) -> bool {
        self.value.is::<R>()
    }

    /// Move the value out as an `R`.
    pub fn take<R: 'static>(self) -> Result<R> {
        let found = self.type_name;
        self.value.downcast::<R>()
            .map(|b| *b)
            .map_err(|_| MockError::type_mismatch("return value",
                                                  any::type_name::<R>(),
                                                  found))
    }
}

impl fmt::Debug for Returned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Returned")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}
