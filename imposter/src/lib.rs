// vim: tw=80
//! An in-memory engine for mock objects.
//!
//! Imposter implements everything a mock object does at runtime, except for
//! the object itself.  A proxy, usually generated by a procedural macro,
//! forwards each member access to a [`Mock`] as a member name plus a list of
//! type-erased [`Value`]s.  The `Mock` records the access, finds the setup
//! that applies to it, runs that setup's behaviors and tells the proxy what to
//! return.  Afterwards the test verifies the recorded interactions.
//!
//! # User Guide
//!
//! * [`Getting started`](#getting-started)
//! * [`Matching arguments`](#matching-arguments)
//! * [`Sequences of behaviors`](#sequences-of-behaviors)
//! * [`Callbacks`](#callbacks)
//! * [`Out and ref parameters`](#out-and-ref-parameters)
//! * [`Strict mocks`](#strict-mocks)
//! * [`Verification`](#verification)
//! * [`Properties, indexers and events`](#properties-indexers-and-events)
//! * [`Logging`](#logging)
//!
//! ## Getting Started
//! ```
//! use imposter::*;
//!
//! // What a generated proxy would do for `fn foo(&self, x: u32) -> u32`
//! fn foo(mock: &Mock, x: u32) -> u32 {
//!     mock.call::<u32>("foo", vec![Value::new(x)]).unwrap()
//! }
//!
//! let mock = Mock::new();
//! mock.setup_method::<u32>("foo", Param::eq(4u32))
//!     .returning(|args| args.get::<u32>(0).unwrap() + 1);
//! assert_eq!(5, foo(&mock, 4));
//! // Nothing was set up for 5, so the default value is returned
//! assert_eq!(0, foo(&mock, 5));
//! mock.verify_method("foo", Param::any::<u32>()).exactly(2);
//! ```
//!
//! ## Matching arguments
//!
//! A setup has one [`Param`] per argument.  A `Param` wraps any
//! [`Predicate`], so everything in the [`predicate`] module is available.  A
//! matcher never accepts a value of a different type than its own, which
//! lets several setups tell overloads apart.  [`Parameters::Any`] matches
//! any argument list at all.
//!
//! When several setups match the same invocation, the one registered last
//! wins.
//!
//! ```
//! # use imposter::*;
//! let mock = Mock::new();
//! mock.setup_method::<&'static str>("size", Param::any::<u64>())
//!     .returns("small");
//! mock.setup_method::<&'static str>("size",
//!         Param::with::<u64, _>(predicate::gt(1000u64)))
//!     .returns("large");
//! assert_eq!("small", mock.call::<&str>("size", vec![Value::new(7u64)])
//!                         .unwrap());
//! assert_eq!("large", mock.call::<&str>("size", vec![Value::new(5000u64)])
//!                         .unwrap());
//! ```
//!
//! ## Sequences of behaviors
//!
//! A setup may have several return and throw behaviors.  Successive
//! invocations move a cursor through them.  Without further configuration
//! the cursor cycles:
//!
//! ```
//! # use imposter::*;
//! let mock = Mock::new();
//! mock.setup_method::<&'static str>("next", Parameters::none())
//!     .returns("d")
//!     .returns("c")
//!     .returning(|_| "b");
//! let seq = (0..5)
//!     .map(|_| mock.call::<&str>("next", vec![]).unwrap())
//!     .collect::<Vec<_>>();
//! assert_eq!(seq, ["d", "c", "b", "d", "c"]);
//! ```
//!
//! [`for_times`](SetupBuilder::for_times) keeps the cursor on a behavior for
//! a number of invocations and then retires it.
//! [`only`](SetupBuilder::only) caps how often a behavior may ever apply,
//! [`forever`](SetupBuilder::forever) keeps it in place permanently, and
//! [`when`](SetupBuilder::when) skips it unless a predicate over the match
//! count holds.  Once every behavior is retired, invocations get the default
//! value.
//!
//! ```
//! # use imposter::*;
//! let mock = Mock::new();
//! mock.setup_method::<u32>("retry", Parameters::Any)
//!     .throws(|_| std::io::Error::other("busy")).for_times(2)
//!     .returns(42).forever();
//! assert!(mock.call::<u32>("retry", vec![]).is_err());
//! assert!(mock.call::<u32>("retry", vec![]).is_err());
//! assert_eq!(42, mock.call::<u32>("retry", vec![]).unwrap());
//! assert_eq!(42, mock.call::<u32>("retry", vec![]).unwrap());
//! ```
//!
//! ## Callbacks
//!
//! Callbacks run side effects.  They form their own sequence, independent of
//! the return values.  A callback marked [`in_parallel`] fires on every
//! invocation instead.
//!
//! [`in_parallel`]: SetupBuilder::in_parallel
//!
//! ```
//! # use imposter::*;
//! # use std::sync::{Arc, Mutex};
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let (s1, s2) = (seen.clone(), seen.clone());
//! let mock = Mock::new();
//! mock.setup_method::<()>("ping", Parameters::Any)
//!     .callback(move |_| s1.lock().unwrap().push("first"))
//!     .callback(move |_| s2.lock().unwrap().push("every")).in_parallel();
//! mock.call::<()>("ping", vec![]).unwrap();
//! mock.call::<()>("ping", vec![]).unwrap();
//! assert_eq!(*seen.lock().unwrap(), ["first", "every", "first", "every"]);
//! ```
//!
//! Callbacks, return functions, `when` gates and matchers all run without any
//! of the mock's locks held, so they may call back into the mock.  The one
//! exception is a behavior reentering itself, for example by recursively
//! invoking its own member: that invocation fails with
//! [`MockError::InvalidConfiguration`].
//!
//! ## Out and ref parameters
//!
//! [`Param::out`] and [`Param::by_ref`] accept any argument.  When their
//! setup handles an invocation they compute a value for the proxy to write
//! back, available from [`Outcome::outputs`].
//!
//! ```
//! # use imposter::*;
//! let mock = Mock::new();
//! mock.setup_method::<bool>("try_parse",
//!         [Param::any::<String>(), Param::out(|| 7i64).named("result")])
//!     .returns(true);
//! let outcome = mock.execute("try_parse",
//!     vec![Value::new("7".to_owned()), Value::null()]).unwrap();
//! assert_eq!(outcome.outputs().by_name("result").unwrap().get::<i64>()
//!                   .unwrap(), &7);
//! assert_eq!(outcome.value::<bool>().unwrap(), Some(true));
//! ```
//!
//! ## Strict mocks
//!
//! By default an invocation that no setup covers returns a default value.
//! [`MockBehavior::strict`] turns that into [`MockError::NotConfigured`].
//! [`MockBehavior::with_call_base_class`] instead asks the proxy to run the
//! real implementation; see [`Mock::call_or_base`].
//!
//! ## Verification
//!
//! Every access is recorded, whether or not a setup handled it.
//! [`VerificationResult`] offers assertions that panic with a description of
//! the expected call and of the calls that came close.  Ordering can be
//! checked with [`then`](VerificationResult::then).
//!
//! ```should_panic
//! # use imposter::*;
//! let mock = Mock::new();
//! mock.execute("foo", vec![Value::new(1u32)]).unwrap();
//! mock.verify_method("foo", Param::eq(2u32)).once();   // Panics!
//! ```
//!
//! ## Properties, indexers and events
//!
//! Properties remember their last assigned value unless a getter setup
//! overrides it.  Indexers behave like methods keyed by their index
//! arguments.  Events keep a list of subscribed handlers that
//! [`Mock::raise`] invokes.
//!
//! ## Logging
//!
//! Imposter emits [`tracing`] events: `trace` for every recorded invocation
//! and registered setup, `debug` for setup resolution and `warn` when a strict
//! mock rejects an invocation.  It never installs a subscriber.

mod behavior;
mod error;
mod invocation;
mod matcher;
mod mock;
mod registry;
mod setup;
mod value;
mod verify;

pub use error::{BoxError, MockError, Result};
pub use invocation::{InteractionLog, Invocation, InvocationKind};
pub use matcher::{Monitor, Output, Outputs, Param, Parameters};
pub use mock::{
    INDEXER,
    Mock,
    MockBehavior,
    Outcome,
    Resolution,
    Subscription
};
pub use predicates::prelude::{Predicate, predicate};
pub use registry::SetupRegistry;
pub use setup::{MethodSetup, SetupBuilder};
pub use value::{AnyValue, Arguments, Returned, Value};
pub use verify::{Query, Times, VerificationFailure, VerificationResult};
