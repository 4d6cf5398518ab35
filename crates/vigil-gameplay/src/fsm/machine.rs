//! The utility state machine.

use tracing::{debug, trace};

use super::params::BehaviorParameters;
use super::scoring::DEAD_UTILITY;
use super::state::{StateKind, UtilityState};
use super::states::build_state;
use crate::context::TickContext;
use crate::entity::Agent;
use crate::events::GameEvent;

/// Scores a fixed set of states every tick and keeps the best one active.
#[derive(Debug)]
pub struct UtilityStateMachine {
    states: Vec<Box<dyn UtilityState>>,
    default_index: usize,
    current: Option<usize>,
    params: BehaviorParameters,
    last_scores: Vec<f32>,
}

impl UtilityStateMachine {
    /// Creates a machine over `states` in enumeration order. The default
    /// state is the first Idle state, or the first state if there is none.
    /// Returns `None` for an empty state set.
    #[must_use]
    pub fn new(states: Vec<Box<dyn UtilityState>>, params: BehaviorParameters) -> Option<Self> {
        if states.is_empty() {
            return None;
        }
        let default_index = states
            .iter()
            .position(|state| state.kind() == StateKind::Idle)
            .unwrap_or(0);
        let count = states.len();
        Some(Self {
            states,
            default_index,
            current: None,
            params,
            last_scores: vec![0.0; count],
        })
    }

    /// Creates a machine from built-in state kinds.
    #[must_use]
    pub fn from_kinds(kinds: &[StateKind], params: BehaviorParameters) -> Option<Self> {
        Self::new(kinds.iter().copied().map(build_state).collect(), params)
    }

    /// Picks a different default state. Ignored if `kind` is not in the set
    /// or the machine has already started.
    #[must_use]
    pub fn with_default(mut self, kind: StateKind) -> Self {
        if self.current.is_none() {
            if let Some(index) = self.index_of(kind) {
                self.default_index = index;
            }
        }
        self
    }

    /// Index of the first state with the greatest score. A later state only
    /// wins with a strictly greater score, so ties go to enumeration order.
    /// NaN counts as negative infinity. Returns `None` when nothing beats
    /// negative infinity.
    #[must_use]
    pub fn select_best(scores: &[f32]) -> Option<usize> {
        let mut best = None;
        let mut best_score = f32::NEG_INFINITY;
        for (index, &score) in scores.iter().enumerate() {
            let score = if score.is_nan() { f32::NEG_INFINITY } else { score };
            if score > best_score {
                best_score = score;
                best = Some(index);
            }
        }
        best
    }

    /// Whether the default state has been entered.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.current.is_some()
    }

    /// Enters the default state. Runs once.
    pub fn initialize(&mut self, agent: &Agent, ctx: &mut TickContext<'_>) {
        if self.current.is_some() {
            return;
        }
        let index = self.default_index;
        self.states[index].enter(agent, &self.params, ctx);
        self.current = Some(index);
        let to = self.states[index].kind();
        debug!(entity = %agent.id(), state = %to, "state machine started");
        ctx.commands.notify(GameEvent::StateChanged {
            entity_id: agent.id(),
            from: None,
            to,
        });
    }

    /// Scores every state, switches to the best one if it differs from the
    /// current state, then runs the current state's tick.
    pub fn tick(&mut self, agent: &mut Agent, ctx: &mut TickContext<'_>) {
        self.initialize(agent, ctx);

        let dead = agent.is_dead();
        for (score, state) in self.last_scores.iter_mut().zip(&self.states) {
            *score = if dead {
                DEAD_UTILITY
            } else {
                state.score(agent, &self.params, ctx)
            };
        }
        trace!(entity = %agent.id(), scores = ?self.last_scores, "scored states");

        if let Some(best) = Self::select_best(&self.last_scores) {
            if self.current != Some(best) {
                self.transition(best, agent, ctx);
            }
        }

        if dead {
            return;
        }
        if let Some(index) = self.current {
            self.states[index].tick(agent, &self.params, ctx);
        }
    }

    /// Exits the active state. The machine can be started again with
    /// [`initialize`](Self::initialize).
    pub fn shutdown(&mut self, agent: &Agent, ctx: &TickContext<'_>) {
        if let Some(index) = self.current.take() {
            self.states[index].exit(agent, &self.params, ctx);
            debug!(entity = %agent.id(), state = %self.states[index].kind(), "state machine stopped");
        }
    }

    /// The active state, if the machine has started.
    #[must_use]
    pub fn current_state(&self) -> Option<StateKind> {
        self.current.map(|index| self.states[index].kind())
    }

    /// Kinds of all candidate states in enumeration order.
    #[must_use]
    pub fn state_kinds(&self) -> Vec<StateKind> {
        self.states.iter().map(|state| state.kind()).collect()
    }

    /// Scores from the most recent tick, in enumeration order.
    #[must_use]
    pub fn last_scores(&self) -> &[f32] {
        &self.last_scores
    }

    /// This entity's learnable parameters.
    #[must_use]
    pub const fn params(&self) -> &BehaviorParameters {
        &self.params
    }

    /// This entity's learnable parameters, for a tuning process.
    pub fn params_mut(&mut self) -> &mut BehaviorParameters {
        &mut self.params
    }

    fn index_of(&self, kind: StateKind) -> Option<usize> {
        self.states.iter().position(|state| state.kind() == kind)
    }

    fn transition(&mut self, to: usize, agent: &Agent, ctx: &mut TickContext<'_>) {
        let from = self.current.map(|index| self.states[index].kind());
        if let Some(index) = self.current {
            self.states[index].exit(agent, &self.params, ctx);
        }
        self.current = Some(to);
        self.states[to].enter(agent, &self.params, ctx);

        let to_kind = self.states[to].kind();
        debug!(entity = %agent.id(), from = ?from, to = %to_kind, "state transition");
        ctx.commands.notify(GameEvent::StateChanged {
            entity_id: agent.id(),
            from,
            to: to_kind,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandBuffer;
    use crate::entity::EntityCategory;
    use crate::registry::RegistrySnapshot;
    use crate::test_support::agent;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use vigil_common::Vec2;

    #[derive(Debug, Default)]
    struct Counters {
        enters: AtomicUsize,
        exits: AtomicUsize,
        ticks: AtomicUsize,
    }

    #[derive(Debug)]
    struct MockState {
        kind: StateKind,
        score: Arc<Mutex<f32>>,
        counters: Arc<Counters>,
    }

    impl UtilityState for MockState {
        fn kind(&self) -> StateKind {
            self.kind
        }

        fn score(&self, _agent: &Agent, _params: &BehaviorParameters, _ctx: &TickContext<'_>) -> f32 {
            *self.score.lock()
        }

        fn enter(&mut self, _agent: &Agent, _params: &BehaviorParameters, _ctx: &TickContext<'_>) {
            self.counters.enters.fetch_add(1, Ordering::SeqCst);
        }

        fn tick(&mut self, _agent: &mut Agent, _params: &BehaviorParameters, _ctx: &mut TickContext<'_>) {
            self.counters.ticks.fetch_add(1, Ordering::SeqCst);
        }

        fn exit(&mut self, _agent: &Agent, _params: &BehaviorParameters, _ctx: &TickContext<'_>) {
            self.counters.exits.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        machine: UtilityStateMachine,
        scores: Vec<Arc<Mutex<f32>>>,
        counters: Vec<Arc<Counters>>,
    }

    fn harness(kinds: &[(StateKind, f32)]) -> Harness {
        let mut states: Vec<Box<dyn UtilityState>> = Vec::new();
        let mut scores = Vec::new();
        let mut counters = Vec::new();
        for (kind, score) in kinds {
            let score = Arc::new(Mutex::new(*score));
            let counter = Arc::new(Counters::default());
            states.push(Box::new(MockState {
                kind: *kind,
                score: Arc::clone(&score),
                counters: Arc::clone(&counter),
            }));
            scores.push(score);
            counters.push(counter);
        }
        Harness {
            machine: UtilityStateMachine::new(states, BehaviorParameters::default())
                .expect("non-empty state set"),
            scores,
            counters,
        }
    }

    fn tick(machine: &mut UtilityStateMachine, me: &mut Agent, commands: &mut CommandBuffer) {
        let snapshot = RegistrySnapshot::default();
        let mut ctx = TickContext::new(&snapshot, commands, 0, 0.0, 0.1);
        machine.tick(me, &mut ctx);
    }

    fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    #[test]
    fn test_select_best_strictly_greater() {
        assert_eq!(UtilityStateMachine::select_best(&[0.5, 0.5, 0.2]), Some(0));
        assert_eq!(UtilityStateMachine::select_best(&[0.1, 0.5, 0.5]), Some(1));
        assert_eq!(UtilityStateMachine::select_best(&[0.4, 0.39]), Some(0));
        assert_eq!(
            UtilityStateMachine::select_best(&[f32::NEG_INFINITY, f32::NAN]),
            None
        );
        assert_eq!(UtilityStateMachine::select_best(&[f32::NAN, 0.0]), Some(1));
        assert_eq!(UtilityStateMachine::select_best(&[]), None);
    }

    #[test]
    fn test_empty_state_set() {
        assert!(UtilityStateMachine::new(Vec::new(), BehaviorParameters::default()).is_none());
    }

    #[test]
    fn test_close_scores_keep_idle() {
        let mut h = harness(&[(StateKind::Idle, 0.4), (StateKind::Chase, 0.39)]);
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let mut commands = CommandBuffer::new();

        tick(&mut h.machine, &mut me, &mut commands);
        tick(&mut h.machine, &mut me, &mut commands);

        assert_eq!(h.machine.current_state(), Some(StateKind::Idle));
        assert_eq!(count(&h.counters[0].enters), 1);
        assert_eq!(count(&h.counters[0].exits), 0);
        assert_eq!(count(&h.counters[0].ticks), 2);
        assert_eq!(count(&h.counters[1].enters), 0);
        // Only the initial entry is reported
        assert_eq!(commands.notices().len(), 1);
    }

    #[test]
    fn test_transition_pairs_exit_and_enter() {
        let mut h = harness(&[(StateKind::Idle, 0.4), (StateKind::Chase, 0.1)]);
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let mut commands = CommandBuffer::new();

        tick(&mut h.machine, &mut me, &mut commands);
        *h.scores[1].lock() = 0.9;
        tick(&mut h.machine, &mut me, &mut commands);

        assert_eq!(h.machine.current_state(), Some(StateKind::Chase));
        assert_eq!(count(&h.counters[0].exits), 1);
        assert_eq!(count(&h.counters[1].enters), 1);
        assert_eq!(count(&h.counters[1].ticks), 1);
        assert_eq!(
            commands.notices().last(),
            Some(&GameEvent::StateChanged {
                entity_id: me.id(),
                from: Some(StateKind::Idle),
                to: StateKind::Chase,
            })
        );
    }

    #[test]
    fn test_initial_state_entered_once() {
        let mut h = harness(&[(StateKind::Chase, 0.0), (StateKind::Idle, 0.0)]);
        let me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let snapshot = RegistrySnapshot::default();
        let mut commands = CommandBuffer::new();
        let mut ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 0.1);

        h.machine.initialize(&me, &mut ctx);
        h.machine.initialize(&me, &mut ctx);
        assert_eq!(h.machine.current_state(), Some(StateKind::Idle));
        assert_eq!(count(&h.counters[1].enters), 1);
    }

    #[test]
    fn test_equal_scores_do_not_oscillate() {
        let mut h = harness(&[(StateKind::Idle, 0.5), (StateKind::Chase, 0.5), (StateKind::Flee, 0.5)]);
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let mut commands = CommandBuffer::new();
        for _ in 0..5 {
            tick(&mut h.machine, &mut me, &mut commands);
        }
        assert_eq!(h.machine.current_state(), Some(StateKind::Idle));
        assert_eq!(count(&h.counters[0].enters), 1);
    }

    #[test]
    fn test_dead_owner_keeps_state_and_stops_ticking() {
        let mut h = harness(&[(StateKind::Idle, 0.1), (StateKind::Flee, 0.9)]);
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let mut commands = CommandBuffer::new();

        tick(&mut h.machine, &mut me, &mut commands);
        assert_eq!(h.machine.current_state(), Some(StateKind::Flee));
        let ticks_before = count(&h.counters[1].ticks);

        me.health_mut().apply_immediate(-1_000.0);
        *h.scores[0].lock() = 5.0;
        tick(&mut h.machine, &mut me, &mut commands);

        assert_eq!(h.machine.current_state(), Some(StateKind::Flee));
        assert!(h.machine.last_scores().iter().all(|s| *s == f32::NEG_INFINITY));
        assert_eq!(count(&h.counters[1].ticks), ticks_before);
        assert_eq!(count(&h.counters[0].enters), 1);
    }

    #[test]
    fn test_shutdown_exits_active_state() {
        let mut h = harness(&[(StateKind::Idle, 0.4)]);
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let mut commands = CommandBuffer::new();
        tick(&mut h.machine, &mut me, &mut commands);

        let snapshot = RegistrySnapshot::default();
        let ctx = TickContext::new(&snapshot, &mut commands, 1, 0.1, 0.1);
        h.machine.shutdown(&me, &ctx);
        h.machine.shutdown(&me, &ctx);
        assert_eq!(count(&h.counters[0].exits), 1);
        assert_eq!(h.machine.current_state(), None);
    }

    #[test]
    fn test_params_are_per_machine() {
        let template = BehaviorParameters::default();
        let mut a = UtilityStateMachine::from_kinds(&StateKind::all(), template.clone())
            .expect("non-empty state set");
        let b = UtilityStateMachine::from_kinds(&StateKind::all(), template.clone())
            .expect("non-empty state set");
        a.params_mut().aggro_distance.set(30.0);
        assert_eq!(b.params().aggro_distance.value(), 10.0);
        assert_eq!(template.aggro_distance.value(), 10.0);
        assert_eq!(a.state_kinds(), StateKind::all().to_vec());
    }
}
