//! State identity and the state interface.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::params::BehaviorParameters;
use crate::context::TickContext;
use crate::entity::Agent;

/// Names of the built-in states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateKind {
    /// Nothing to do
    Idle,
    /// Pursue a target
    Chase,
    /// Attack a target in range
    Fight,
    /// Retreat from threats
    Flee,
}

impl StateKind {
    /// All kinds in enumeration order.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Idle, Self::Chase, Self::Fight, Self::Flee]
    }

    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Chase => "chase",
            Self::Fight => "fight",
            Self::Flee => "flee",
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One candidate state of a utility state machine.
///
/// `enter` and `exit` are always called in pairs by the machine.
pub trait UtilityState: fmt::Debug + Send + Sync {
    /// Which state this is.
    fn kind(&self) -> StateKind;

    /// Utility of switching to (or staying in) this state. Must return a
    /// number for every input.
    fn score(&self, agent: &Agent, params: &BehaviorParameters, ctx: &TickContext<'_>) -> f32;

    /// Called when the state becomes active.
    fn enter(&mut self, _agent: &Agent, _params: &BehaviorParameters, _ctx: &TickContext<'_>) {}

    /// Per-tick logic while active.
    fn tick(&mut self, agent: &mut Agent, params: &BehaviorParameters, ctx: &mut TickContext<'_>);

    /// Called when the state stops being active.
    fn exit(&mut self, _agent: &Agent, _params: &BehaviorParameters, _ctx: &TickContext<'_>) {}
}
