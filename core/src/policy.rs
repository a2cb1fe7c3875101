//! Declarative step metadata and a graph-walking policy over it.
//!
//! Some flows describe their steps as a graph rather than an ordered list:
//! each [`StepInfo`] names the steps that may legally follow it, a
//! precondition deciding whether the step may be entered, and an undo hook
//! that forgets whatever the step recorded. A [`FlowPolicy`] answers "what is
//! the latest step this user may be on" from that metadata.
//!
//! `S` is the caller's session type and `U` its user type; the policy never
//! inspects either, it only hands them to the step callbacks.
//!
//! # Examples
//!
//! ```
//! use waypoint_core::{FlowPolicy, NextLegalStep, StepGraphPolicy, StepInfo};
//!
//! #[derive(Default)]
//! struct IdvSession { welcome_visited: bool }
//!
//! let policy = StepGraphPolicy::new("welcome")
//!     .with_step(
//!         StepInfo::new("welcome", "idv/welcome", "show")
//!             .with_next_steps([NextLegalStep::step("agreement")]),
//!     )
//!     .with_step(
//!         StepInfo::new("agreement", "idv/agreement", "show")
//!             .with_preconditions(|s: &IdvSession, _: &()| s.welcome_visited),
//!     );
//!
//! let mut session = IdvSession::default();
//! assert_eq!(policy.latest_step(&session, &()), NextLegalStep::step("welcome"));
//!
//! session.welcome_visited = true;
//! assert_eq!(policy.latest_step(&session, &()), NextLegalStep::step("agreement"));
//! ```

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

/// Entry of a step's legal successors.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NextLegalStep {
    /// A step, by key.
    Step(String),
    /// The terminal sentinel: the flow is finished.
    Final,
}

impl NextLegalStep {
    /// Successor naming the step `key`.
    #[must_use]
    pub fn step(key: impl Into<String>) -> Self {
        Self::Step(key.into())
    }
}

/// Decides whether a step may be entered.
pub type Precondition<S, U> = Arc<dyn Fn(&S, &U) -> bool + Send + Sync>;

/// Forgets whatever a step recorded in the session.
pub type UndoStep<S, U> = Arc<dyn Fn(&mut S, &U) + Send + Sync>;

/// Declarative metadata for one step.
pub struct StepInfo<S, U> {
    key: String,
    controller: String,
    action: String,
    next_steps: Vec<NextLegalStep>,
    preconditions: Precondition<S, U>,
    undo_step: UndoStep<S, U>,
}

impl<S, U> StepInfo<S, U> {
    /// Step with no successors, always enterable, with nothing to undo.
    #[must_use]
    pub fn new(key: impl Into<String>, controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            controller: controller.into(),
            action: action.into(),
            next_steps: Vec::new(),
            preconditions: Arc::new(|_, _| true),
            undo_step: Arc::new(|_, _| {}),
        }
    }

    /// Set the legal successors, in priority order.
    #[must_use]
    pub fn with_next_steps(mut self, next_steps: impl IntoIterator<Item = NextLegalStep>) -> Self {
        self.next_steps = next_steps.into_iter().collect();
        self
    }

    /// Set the entry precondition.
    #[must_use]
    pub fn with_preconditions(mut self, preconditions: impl Fn(&S, &U) -> bool + Send + Sync + 'static) -> Self {
        self.preconditions = Arc::new(preconditions);
        self
    }

    /// Set the undo hook.
    #[must_use]
    pub fn with_undo_step(mut self, undo_step: impl Fn(&mut S, &U) + Send + Sync + 'static) -> Self {
        self.undo_step = Arc::new(undo_step);
        self
    }

    /// Step key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Controller serving the step.
    #[must_use]
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Controller action serving the step.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Legal successors, in priority order.
    #[must_use]
    pub fn next_steps(&self) -> &[NextLegalStep] {
        &self.next_steps
    }

    /// Evaluate the entry precondition.
    pub fn preconditions(&self, session: &S, user: &U) -> bool {
        (self.preconditions)(session, user)
    }

    /// Run the undo hook.
    pub fn undo_step(&self, session: &mut S, user: &U) {
        (self.undo_step)(session, user);
    }
}

impl<S, U> Clone for StepInfo<S, U> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            controller: self.controller.clone(),
            action: self.action.clone(),
            next_steps: self.next_steps.clone(),
            preconditions: Arc::clone(&self.preconditions),
            undo_step: Arc::clone(&self.undo_step),
        }
    }
}

impl<S, U> fmt::Debug for StepInfo<S, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepInfo")
            .field("key", &self.key)
            .field("controller", &self.controller)
            .field("action", &self.action)
            .field("next_steps", &self.next_steps)
            .finish_non_exhaustive()
    }
}

/// Resolver of legal transitions over [`StepInfo`] metadata.
pub trait FlowPolicy<S, U>: Send + Sync {
    /// Metadata for `key`.
    fn step_info(&self, key: &str) -> Option<&StepInfo<S, U>>;

    /// Whether the user may enter `key` now. Unknown keys are never allowed.
    fn step_allowed(&self, key: &str, session: &S, user: &U) -> bool {
        self.step_info(key)
            .is_some_and(|info| info.preconditions(session, user))
    }

    /// The furthest step the user may be on, or [`NextLegalStep::Final`].
    fn latest_step(&self, session: &S, user: &U) -> NextLegalStep;

    /// Undo every step reachable after `from`.
    fn undo_future_steps(&self, from: &str, session: &mut S, user: &U);
}

/// [`FlowPolicy`] walking a step graph from a root step.
pub struct StepGraphPolicy<S, U> {
    root: String,
    steps: BTreeMap<String, StepInfo<S, U>>,
    final_allowed: Precondition<S, U>,
}

impl<S, U> StepGraphPolicy<S, U> {
    /// Policy rooted at `root`. The terminal sentinel is never reached
    /// until [`StepGraphPolicy::with_final_preconditions`] says so.
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            steps: BTreeMap::new(),
            final_allowed: Arc::new(|_, _| false),
        }
    }

    /// Register step metadata, replacing any previous entry with its key.
    #[must_use]
    pub fn with_step(mut self, info: StepInfo<S, U>) -> Self {
        self.steps.insert(info.key.clone(), info);
        self
    }

    /// Decide when [`NextLegalStep::Final`] may be entered.
    #[must_use]
    pub fn with_final_preconditions(mut self, preconditions: impl Fn(&S, &U) -> bool + Send + Sync + 'static) -> Self {
        self.final_allowed = Arc::new(preconditions);
        self
    }

    /// Key of the root step.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }
}

impl<S, U> FlowPolicy<S, U> for StepGraphPolicy<S, U> {
    fn step_info(&self, key: &str) -> Option<&StepInfo<S, U>> {
        self.steps.get(key)
    }

    fn latest_step(&self, session: &S, user: &U) -> NextLegalStep {
        let mut current = self.root.as_str();
        let mut visited = HashSet::new();

        'walk: while visited.insert(current) {
            let Some(info) = self.steps.get(current) else {
                break;
            };
            for next in &info.next_steps {
                match next {
                    NextLegalStep::Step(key) => {
                        if !visited.contains(key.as_str()) && self.step_allowed(key, session, user) {
                            current = key;
                            continue 'walk;
                        }
                    }
                    NextLegalStep::Final => {
                        if (self.final_allowed)(session, user) {
                            return NextLegalStep::Final;
                        }
                    }
                }
            }
            break;
        }

        NextLegalStep::Step(current.to_string())
    }

    fn undo_future_steps(&self, from: &str, session: &mut S, user: &U) {
        let mut visited = HashSet::from([from]);
        let mut queue = VecDeque::from([from]);

        while let Some(key) = queue.pop_front() {
            let Some(info) = self.steps.get(key) else {
                continue;
            };
            for next in &info.next_steps {
                let NextLegalStep::Step(next) = next else {
                    continue;
                };
                if visited.insert(next.as_str()) {
                    if let Some(next_info) = self.steps.get(next) {
                        next_info.undo_step(session, user);
                    }
                    queue.push_back(next);
                }
            }
        }
    }
}

impl<S, U> fmt::Debug for StepGraphPolicy<S, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepGraphPolicy")
            .field("root", &self.root)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}
