// vim: tw=80
//! Behaviors and the cursor that sequences them
//!
//! A setup owns two independent lanes.  The outcome lane holds return and
//! throw behaviors; exactly one of them wins any given invocation.  The
//! callback lane holds callbacks, of which one sequential callback plus every
//! eligible parallel callback may fire per invocation.  Both lanes are
//! sequenced by the same [`Cursor`] rules.

use std::{
    sync::{Arc, Mutex},
    thread::{self, ThreadId},
};

use fragile::Fragile;

use crate::{
    error::{BoxError, MockError, Result},
    value::{Arguments, Returned},
};

pub(crate) type ReturnFn =
    Box<dyn FnMut(&Arguments) -> Result<Returned> + Send>;
pub(crate) type ThrowFn = Box<dyn FnMut(&Arguments) -> BoxError + Send>;
pub(crate) type CallbackFn = Box<dyn FnMut(&Arguments) -> Result<()> + Send>;
type WhenFn = Arc<dyn Fn(u32) -> bool + Send + Sync>;

/// Wrap a closure that isn't `Send` so it may be stored in a setup.
///
/// The closure may only be called from the thread that registered it.
pub(crate) fn single_threaded<F, O>(f: F) -> impl FnMut(&Arguments) -> O + Send
    where F: FnMut(&Arguments) -> O + 'static
{
    let mut fragile = Fragile::new(f);
    move |args: &Arguments| {
        (fragile.get_mut())(args)
    }
}

/// Controls whether, and for how long, a behavior applies.
#[derive(Default)]
pub(crate) struct Gate {
    when: Option<WhenFn>,
    for_times: Option<u32>,
    only: Option<u32>,
    forever: bool,
    parallel: bool,
}

pub(crate) enum Action {
    Return(ReturnFn),
    Throw(ThrowFn),
    Callback(CallbackFn),
}

/// Clears the owner of a [`Runner`] when its closure returns or unwinds.
struct Running<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        *self.0.lock().unwrap() = None;
    }
}

/// The closure of one behavior.
///
/// It is shared with the invocation that selected it, which runs it after
/// releasing the setup's lock.  Concurrent invocations take turns; an
/// invocation that reenters the closure from inside it fails instead of
/// deadlocking.
pub(crate) struct Runner {
    action: Mutex<Action>,
    owner: Mutex<Option<ThreadId>>,
}

impl Runner {
    fn run<T, F>(&self, f: F) -> Result<T>
        where F: FnOnce(&mut Action) -> Result<T>
    {
        let me = thread::current().id();
        if *self.owner.lock().unwrap() == Some(me) {
            return Err(MockError::invalid(
                "a behavior invoked its own member recursively"));
        }
        let mut action = self.action.lock().unwrap();
        *self.owner.lock().unwrap() = Some(me);
        let _running = Running(&self.owner);
        f(&mut *action)
    }
}

pub(crate) struct Behavior {
    runner: Arc<Runner>,
    outcome: bool,
    gate: Gate,
    /// Total number of times this behavior has been applied
    applied: u32,
    /// Consecutive applications charged against `for_times`
    run: u32,
    retired: bool,
}

impl Behavior {
    fn new(action: Action) -> Self {
        let outcome = !matches!(action, Action::Callback(_));
        Behavior {
            runner: Arc::new(Runner {
                action: Mutex::new(action),
                owner: Mutex::new(None),
            }),
            outcome,
            gate: Gate::default(),
            applied: 0,
            run: 0,
            retired: false,
        }
    }

    /// Did the `when` gate accept the current invocation?  `accepted` holds
    /// the verdicts of every behavior that existed when it began; later
    /// additions are only accepted if ungated.
    fn accepts(&self, i: usize, accepted: &[bool]) -> bool {
        accepted.get(i).copied().unwrap_or(self.gate.when.is_none())
    }

    /// Charge one application and retire the behavior if that exhausted it.
    fn charge(&mut self) {
        self.applied += 1;
        self.run += 1;
        if !self.gate.forever &&
            self.gate.for_times.map_or(false, |n| self.run >= n)
        {
            self.retired = true;
        }
        if self.gate.only.map_or(false, |n| self.applied >= n) {
            self.retired = true;
        }
    }
}

/// Position of a sequential lane.
///
/// The cursor scans forward from its position, wrapping around, and the first
/// behavior that is neither retired nor rejected by its `when` gate wins.  A
/// behavior with an explicit `for_times` budget holds the cursor until the
/// budget is spent and then retires for good; any other behavior has an
/// implicit budget of one that is replenished every lap, so a list of such
/// behaviors cycles.  A `forever` behavior pins the cursor once applied.
#[derive(Debug, Default)]
pub(crate) struct Cursor {
    position: usize,
    pinned: bool,
}

impl Cursor {
    /// Choose the winner among `lane`, which holds indices into `behaviors`.
    fn select(&mut self, behaviors: &mut [Behavior], lane: &[usize],
              accepted: &[bool]) -> Option<usize>
    {
        let n = lane.len();
        if n == 0 {
            return None;
        }
        // A behavior that the cursor rests on with budget left keeps its
        // place even when its `when` gate rejects this invocation.
        let home = self.position % n;
        let held = {
            let b = &behaviors[lane[home]];
            b.gate.for_times.is_some() && !b.retired
        };
        for step in 0..n {
            let slot = (home + step) % n;
            let i = lane[slot];
            let b = &mut behaviors[i];
            if b.retired || !b.accepts(i, accepted) {
                continue;
            }
            b.charge();
            if b.gate.forever && !b.retired {
                self.position = slot;
                self.pinned = true;
            } else if !self.pinned {
                if slot == home || !held {
                    let holds = b.gate.for_times.is_some() && !b.retired;
                    self.position = if holds { slot } else { (slot + 1) % n };
                }
            } else if b.retired && slot == home {
                // The pinned behavior ran out of its `only` allowance
                self.pinned = false;
                self.position = (slot + 1) % n;
            }
            return Some(i);
        }
        None
    }
}

/// Everything a setup needs in order to respond to an invocation.
#[derive(Default)]
pub(crate) struct Behaviors {
    list: Vec<Behavior>,
    outcome_cursor: Cursor,
    callback_cursor: Cursor,
    /// How many invocations this setup has matched so far
    matches: u32,
}

impl Behaviors {
    pub(crate) fn push(&mut self, action: Action) {
        self.list.push(Behavior::new(action));
    }

    pub(crate) fn match_count(&self) -> u32 {
        self.matches
    }

    fn last(&mut self, modifier: &str) -> Result<&mut Behavior> {
        self.list.last_mut().ok_or_else(|| MockError::invalid(format!(
            "`{}` must follow a behavior such as `returns` or `callback`",
            modifier)))
    }

    pub(crate) fn when(&mut self, f: WhenFn) -> Result<()> {
        self.last("when")?.gate.when = Some(f);
        Ok(())
    }

    pub(crate) fn for_times(&mut self, n: u32) -> Result<()> {
        if n == 0 {
            return Err(MockError::invalid(
                "a behavior must be repeated at least once"));
        }
        self.last("for_times")?.gate.for_times = Some(n);
        Ok(())
    }

    pub(crate) fn only(&mut self, n: u32) -> Result<()> {
        if n == 0 {
            return Err(MockError::invalid(
                "a behavior must be allowed to apply at least once"));
        }
        self.last("only")?.gate.only = Some(n);
        Ok(())
    }

    pub(crate) fn forever(&mut self) -> Result<()> {
        self.last("forever")?.gate.forever = true;
        Ok(())
    }

    pub(crate) fn in_parallel(&mut self) -> Result<()> {
        let b = self.last("in_parallel")?;
        if b.outcome {
            return Err(MockError::invalid(
                "only callbacks may run in parallel; a return or throw \
                 behavior always has a single winner"));
        }
        b.gate.parallel = true;
        Ok(())
    }

    /// Count one more match, returning the previous count and every
    /// behavior's `when` gate.
    fn begin(&mut self) -> (u32, Vec<Option<WhenFn>>) {
        let match_count = self.matches;
        self.matches += 1;
        let gates = self.list.iter()
            .map(|b| b.gate.when.clone())
            .collect();
        (match_count, gates)
    }

    fn lane<F: Fn(&Behavior) -> bool>(&self, f: F) -> Vec<usize> {
        self.list.iter()
            .enumerate()
            .filter(|(_, b)| f(b))
            .map(|(i, _)| i)
            .collect()
    }

    /// The callbacks to fire, in registration order.
    fn select_callbacks(&mut self, accepted: &[bool]) -> Vec<Arc<Runner>> {
        let sequential = self.lane(|b| !b.outcome && !b.gate.parallel);
        let mut fired: Vec<usize> = self.callback_cursor
            .select(&mut self.list, &sequential, accepted)
            .into_iter()
            .collect();
        for (i, b) in self.list.iter_mut().enumerate() {
            if b.gate.parallel && !b.retired && b.accepts(i, accepted) {
                b.charge();
                fired.push(i);
            }
        }
        fired.sort_unstable();
        fired.into_iter()
            .map(|i| self.list[i].runner.clone())
            .collect()
    }

    fn select_outcome(&mut self, accepted: &[bool]) -> Option<Arc<Runner>> {
        let outcomes = self.lane(|b| b.outcome);
        self.outcome_cursor.select(&mut self.list, &outcomes, accepted)
            .map(|i| self.list[i].runner.clone())
    }
}

/// Run the behaviors of a setup for one matching invocation.
///
/// Returns the value produced by the winning return behavior, `None` if no
/// return behavior applies, or the error of a winning throw behavior.
///
/// The lock is held only while behaviors are being chosen.  `when` gates,
/// callbacks and return functions run without it, so they may call back into
/// the mock.  A behavior that reenters its own closure, say by recursively
/// invoking the same member, fails with [`MockError::InvalidConfiguration`].
pub(crate) fn apply(behaviors: &Mutex<Behaviors>, args: &Arguments)
    -> Result<Option<Returned>>
{
    let (match_count, gates) = behaviors.lock().unwrap().begin();
    let accepted = gates.iter()
        .map(|when| when.as_ref().map_or(true, |f| f(match_count)))
        .collect::<Vec<_>>();

    let callbacks = behaviors.lock().unwrap().select_callbacks(&accepted);
    for runner in callbacks {
        runner.run(|action| match action {
            Action::Callback(f) => f(args),
            _ => unreachable!(),
        })?;
    }

    let winner = behaviors.lock().unwrap().select_outcome(&accepted);
    match winner {
        Some(runner) => runner.run(|action| match action {
            Action::Return(f) => f(args).map(Some),
            Action::Throw(f) => Err(MockError::thrown(f(args))),
            Action::Callback(_) => unreachable!(),
        }),
        None => Ok(None),
    }
}
