// vim: tw=80
//! Verification of recorded interactions

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    invocation::{InteractionLog, Invocation, InvocationKind},
    matcher::{Param, Parameters},
    setup::setter_parameters,
};

/// How many times an interaction is expected to have happened.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Times {
    Never,
    Once,
    AtLeastOnce,
    AtMostOnce,
    Exactly(u32),
    AtLeast(u32),
    AtMost(u32),
    /// Inclusive on both ends
    Between(u32, u32),
}

impl Times {
    pub fn is_satisfied_by(self, count: u32) -> bool {
        match self {
            Times::Never => count == 0,
            Times::Once => count == 1,
            Times::AtLeastOnce => count >= 1,
            Times::AtMostOnce => count <= 1,
            Times::Exactly(n) => count == n,
            Times::AtLeast(n) => count >= n,
            Times::AtMost(n) => count <= n,
            Times::Between(lo, hi) => lo <= count && count <= hi,
        }
    }
}

fn times(n: u32) -> String {
    match n {
        1 => "once".to_owned(),
        2 => "twice".to_owned(),
        n => format!("{} times", n),
    }
}

impl fmt::Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Times::Never => f.write_str("never"),
            Times::Once => f.write_str("exactly once"),
            Times::AtLeastOnce => f.write_str("at least once"),
            Times::AtMostOnce => f.write_str("at most once"),
            Times::Exactly(n) => write!(f, "exactly {}", times(n)),
            Times::AtLeast(n) => write!(f, "at least {}", times(n)),
            Times::AtMost(n) => write!(f, "at most {}", times(n)),
            Times::Between(lo, hi) =>
                write!(f, "between {} and {} times", lo, hi),
        }
    }
}

/// A failed verification.
///
/// This is a test report, not an operational error: it describes the
/// expected interaction, how often it was expected, and how often it
/// actually happened.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub struct VerificationFailure {
    pub signature: String,
    pub expected: Times,
    pub actual: u32,
    /// Recorded interactions with the same member that did not match, and why
    pub details: String,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expected {} to be invoked {}, but it was invoked {}.{}",
               self.signature, self.expected, times(self.actual),
               self.details)
    }
}

/// Describes which recorded invocations a verification is about.
#[derive(Clone, Debug)]
pub struct Query {
    kind: InvocationKind,
    member: String,
    parameters: Parameters,
}

impl Query {
    pub fn new(kind: InvocationKind, member: impl Into<String>,
               parameters: impl Into<Parameters>) -> Self
    {
        Query {
            kind,
            member: member.into(),
            parameters: parameters.into(),
        }
    }

    pub fn method(member: impl Into<String>,
                  parameters: impl Into<Parameters>) -> Self
    {
        Self::new(InvocationKind::MethodCall, member, parameters)
    }

    pub fn property_get(name: impl Into<String>) -> Self {
        Self::new(InvocationKind::PropertyGet, name, Parameters::none())
    }

    pub fn property_set(name: impl Into<String>, value: Param) -> Self {
        Self::new(InvocationKind::PropertySet, name, value)
    }

    pub fn indexer_get(member: impl Into<String>,
                       index: impl Into<Parameters>) -> Self
    {
        Self::new(InvocationKind::IndexerGet, member, index)
    }

    pub fn indexer_set(member: impl Into<String>,
                       index: impl Into<Parameters>, value: Param) -> Self
    {
        let parameters = setter_parameters(index.into(), value);
        Self::new(InvocationKind::IndexerSet, member, parameters)
    }

    pub fn subscribed(event: impl Into<String>) -> Self {
        Self::new(InvocationKind::EventSubscribe, event, Parameters::Any)
    }

    pub fn unsubscribed(event: impl Into<String>) -> Self {
        Self::new(InvocationKind::EventUnsubscribe, event, Parameters::Any)
    }

    /// Is `invocation` one of the interactions this query is about?
    pub fn matches(&self, invocation: &Invocation) -> bool {
        self.is_same_member(invocation) &&
            self.parameters.matches(&invocation.matched_values())
    }

    fn is_same_member(&self, invocation: &Invocation) -> bool {
        invocation.kind() == self.kind && invocation.member() == self.member
    }

    /// Count the matching invocations in `log`.
    pub fn count(&self, log: &InteractionLog) -> u32 {
        log.all().iter().filter(|i| self.matches(i)).count() as u32
    }

    /// Run this query against a snapshot of `log`.
    ///
    /// Every invocation is matched exactly once, so a [`Monitor`] inside the
    /// query sees each value a single time.
    ///
    /// [`Monitor`]: crate::Monitor
    pub fn run(self, log: &InteractionLog) -> VerificationResult<'_> {
        let (matched, misses): (Vec<_>, Vec<_>) = log.all()
            .into_iter()
            .filter(|i| self.is_same_member(i))
            .partition(|i| self.parameters.matches(&i.matched_values()));
        VerificationResult { log, query: self, matched, misses }
    }

    /// A human-readable rendering of the expected call.
    pub fn signature(&self) -> String {
        let params = &self.parameters;
        match (self.kind, params) {
            (InvocationKind::MethodCall, _) =>
                format!("{}({})", self.member, params),
            (InvocationKind::PropertyGet, _) => format!("get {}", self.member),
            (InvocationKind::PropertySet, _) =>
                format!("set {} = {}", self.member, params),
            (InvocationKind::IndexerGet, _) =>
                format!("{}[{}]", self.member, params),
            (InvocationKind::IndexerSet, Parameters::Positional(p)) => {
                let (value, index) = p.split_last()
                    .map(|(v, i)| (v.to_string(), i.to_vec()))
                    .unwrap_or_default();
                format!("{}[{}] = {}", self.member,
                        Parameters::Positional(index), value)
            },
            (InvocationKind::IndexerSet, Parameters::Any) =>
                format!("{}[..] = ..", self.member),
            (InvocationKind::EventSubscribe, _) =>
                format!("subscribe {}", self.member),
            (InvocationKind::EventUnsubscribe, _) =>
                format!("unsubscribe {}", self.member),
        }
    }
}

/// The invocations selected by a [`Query`], ready to be asserted upon.
///
/// The assertion methods panic with a descriptive message when they fail, so
/// they read naturally in a test.  [`check`](#method.check) is the
/// non-panicking form.
///
/// # Examples
/// ```
/// # use imposter::*;
/// let mock = Mock::new();
/// mock.execute("dispense", vec![Value::new("Dark"), Value::new(2u32)])
///     .unwrap();
/// mock.verify_method("dispense", [Param::eq("Dark"), Param::any::<u32>()])
///     .once();
/// mock.verify_method("dispense", [Param::eq("White"), Param::any::<u32>()])
///     .never();
/// ```
pub struct VerificationResult<'a> {
    log: &'a InteractionLog,
    query: Query,
    matched: Vec<Arc<Invocation>>,
    /// Same member, different arguments
    misses: Vec<Arc<Invocation>>,
}

impl<'a> VerificationResult<'a> {
    /// The number of matching invocations.
    pub fn count(&self) -> u32 {
        self.matched.len() as u32
    }

    /// The matching invocations, in the order they happened.
    pub fn invocations(&self) -> &[Arc<Invocation>] {
        &self.matched
    }

    pub fn signature(&self) -> String {
        self.query.signature()
    }

    /// Assert that the number of matching invocations satisfies `expected`.
    ///
    /// On success, the matching invocations are marked as verified.
    pub fn check(&self, expected: Times) -> Result<(), VerificationFailure> {
        let actual = self.count();
        if expected.is_satisfied_by(actual) {
            self.log.mark_verified(self.matched.iter().map(|i| i.index()));
            Ok(())
        } else {
            Err(VerificationFailure {
                signature: self.signature(),
                expected,
                actual,
                details: self.details(),
            })
        }
    }

    /// Explain the near misses: same member, different arguments.
    fn details(&self) -> String {
        if self.misses.is_empty() {
            return String::new();
        }
        let mut s = String::from("\nOther interactions with the same member:");
        for i in &self.misses {
            s.push_str(&format!("\n  [{}] {}", i.index(), i));
            for why in self.query.parameters.explain(&i.matched_values()) {
                for line in why.lines() {
                    s.push_str("\n      ");
                    s.push_str(line);
                }
            }
        }
        s
    }

    #[track_caller]
    fn assert(&self, expected: Times) -> &Self {
        if let Err(e) = self.check(expected) {
            panic!("{}", e);
        }
        self
    }

    /// Assert that no matching invocation happened.
    #[track_caller]
    pub fn never(&self) -> &Self {
        self.assert(Times::Never)
    }

    /// Assert that exactly one matching invocation happened.
    #[track_caller]
    pub fn once(&self) -> &Self {
        self.assert(Times::Once)
    }

    #[track_caller]
    pub fn at_least_once(&self) -> &Self {
        self.assert(Times::AtLeastOnce)
    }

    #[track_caller]
    pub fn at_most_once(&self) -> &Self {
        self.assert(Times::AtMostOnce)
    }

    #[track_caller]
    pub fn exactly(&self, n: u32) -> &Self {
        self.assert(Times::Exactly(n))
    }

    #[track_caller]
    pub fn at_least(&self, n: u32) -> &Self {
        self.assert(Times::AtLeast(n))
    }

    #[track_caller]
    pub fn at_most(&self, n: u32) -> &Self {
        self.assert(Times::AtMost(n))
    }

    #[track_caller]
    pub fn between(&self, lo: u32, hi: u32) -> &Self {
        self.assert(Times::Between(lo, hi))
    }

    /// Verify ordering: some matching invocation of `next` happened after
    /// the earliest matching invocation of `self`.
    ///
    /// Returns `next`, restricted to the invocations after that point, so
    /// that calls can be chained to verify a longer sequence.
    pub fn try_then(self, mut next: VerificationResult<'a>)
        -> Result<VerificationResult<'a>, VerificationFailure>
    {
        let floor = match self.matched.first() {
            Some(first) => first.index(),
            None => return Err(VerificationFailure {
                signature: self.signature(),
                expected: Times::AtLeastOnce,
                actual: 0,
                details: String::new(),
            })
        };
        next.matched.retain(|i| i.index() > floor);
        if next.matched.is_empty() {
            Err(VerificationFailure {
                signature: format!("{} after {}", next.signature(),
                                   self.signature()),
                expected: Times::AtLeastOnce,
                actual: 0,
                details: String::new(),
            })
        } else {
            self.log.mark_verified([floor]);
            Ok(next)
        }
    }

    /// Panicking version of [`try_then`](#method.try_then).
    ///
    /// # Examples
    /// ```
    /// # use imposter::*;
    /// let mock = Mock::new();
    /// mock.execute("open", vec![]).unwrap();
    /// mock.execute("write", vec![Value::new(42u8)]).unwrap();
    /// mock.execute("close", vec![]).unwrap();
    /// mock.verify_method("open", Parameters::none())
    ///     .then(mock.verify_method("write", Parameters::Any))
    ///     .then(mock.verify_method("close", Parameters::none()));
    /// ```
    #[track_caller]
    pub fn then(self, next: VerificationResult<'a>) -> VerificationResult<'a>
    {
        match self.try_then(next) {
            Ok(next) => next,
            Err(e) => panic!("{}", e),
        }
    }
}

impl<'a> fmt::Debug for VerificationResult<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationResult")
            .field("signature", &self.signature())
            .field("count", &self.count())
            .finish()
    }
}
