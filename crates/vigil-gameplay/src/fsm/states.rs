//! Built-in states.
//!
//! Each state looks up its own target every tick. Two states may settle on
//! different targets in the same tick.

use tracing::{debug, trace};
use vigil_common::{step_away, step_towards};

use super::params::BehaviorParameters;
use super::scoring::{chase_utility, fight_utility, flee_utility, idle_utility};
use super::state::{StateKind, UtilityState};
use crate::context::TickContext;
use crate::entity::Agent;
use crate::targeting::{nearest_target, select_target};

/// Speed multiplier while fleeing.
pub const FLEE_SPEED_MULTIPLIER: f32 = 1.5;

/// Fraction of attack range the chase closes to.
const CHASE_APPROACH_FRACTION: f32 = 0.8;

/// Builds the built-in state for a kind.
#[must_use]
pub fn build_state(kind: StateKind) -> Box<dyn UtilityState> {
    match kind {
        StateKind::Idle => Box::new(IdleState),
        StateKind::Chase => Box::new(ChaseState::default()),
        StateKind::Fight => Box::new(FightState::default()),
        StateKind::Flee => Box::new(FleeState),
    }
}

/// Stands still.
#[derive(Debug, Default)]
pub struct IdleState;

impl UtilityState for IdleState {
    fn kind(&self) -> StateKind {
        StateKind::Idle
    }

    fn score(&self, agent: &Agent, _params: &BehaviorParameters, ctx: &TickContext<'_>) -> f32 {
        idle_utility(agent, ctx.registry)
    }

    fn tick(&mut self, _agent: &mut Agent, _params: &BehaviorParameters, _ctx: &mut TickContext<'_>) {}
}

/// Closes in on the best target inside aggro distance.
///
/// With the chase duration cap active, a chase that has lasted the full cap
/// scores zero, and once it ends the state keeps scoring zero for another
/// cap-length recovery window.
#[derive(Debug, Default)]
pub struct ChaseState {
    session_start: Option<f64>,
    recovery_until: Option<f64>,
}

impl ChaseState {
    /// Whether the cap currently blocks chasing.
    #[must_use]
    pub fn is_capped(&self, params: &BehaviorParameters, now: f64) -> bool {
        let Some(cap) = params.chase_duration_cap.effective() else {
            return false;
        };
        if self.recovery_until.map_or(false, |until| now < until) {
            return true;
        }
        self.session_start
            .map_or(false, |start| now - start >= f64::from(cap))
    }
}

impl UtilityState for ChaseState {
    fn kind(&self) -> StateKind {
        StateKind::Chase
    }

    fn score(&self, agent: &Agent, params: &BehaviorParameters, ctx: &TickContext<'_>) -> f32 {
        if self.is_capped(params, ctx.time) {
            return 0.0;
        }
        chase_utility(agent, params, ctx.registry)
    }

    fn enter(&mut self, _agent: &Agent, _params: &BehaviorParameters, ctx: &TickContext<'_>) {
        self.session_start = Some(ctx.time);
    }

    fn tick(&mut self, agent: &mut Agent, params: &BehaviorParameters, ctx: &mut TickContext<'_>) {
        let Some(aggro) = params.aggro_distance.effective() else {
            return;
        };
        let Some(target) = select_target(agent, ctx.registry, aggro, params) else {
            return;
        };
        let stop = params.attack_range().unwrap_or(0.0) * CHASE_APPROACH_FRACTION;
        let distance = target.distance_to(agent.position());
        if distance > stop {
            let step = (agent.stats().speed * ctx.dt).min(distance - stop);
            agent.set_position(step_towards(agent.position(), target.position, step));
        }
    }

    fn exit(&mut self, agent: &Agent, params: &BehaviorParameters, ctx: &TickContext<'_>) {
        if let (Some(start), Some(cap)) = (self.session_start, params.chase_duration_cap.effective()) {
            if ctx.time - start >= f64::from(cap) {
                self.recovery_until = Some(ctx.time + f64::from(cap));
                debug!(entity = %agent.id(), "chase capped, recovering");
            }
        }
        self.session_start = None;
    }
}

/// Attacks the best target in attack range on a cooldown.
#[derive(Debug, Default)]
pub struct FightState {
    last_attack: Option<f64>,
}

impl UtilityState for FightState {
    fn kind(&self) -> StateKind {
        StateKind::Fight
    }

    fn score(&self, agent: &Agent, params: &BehaviorParameters, ctx: &TickContext<'_>) -> f32 {
        fight_utility(agent, params, ctx.registry)
    }

    fn tick(&mut self, agent: &mut Agent, params: &BehaviorParameters, ctx: &mut TickContext<'_>) {
        let Some(range) = params.attack_range() else {
            return;
        };
        let Some(target) = select_target(agent, ctx.registry, range, params) else {
            return;
        };
        let cooldown = params
            .attack_cooldown
            .effective()
            .unwrap_or(agent.stats().attack_cooldown);
        if self
            .last_attack
            .map_or(false, |last| ctx.time - last < f64::from(cooldown))
        {
            return;
        }
        ctx.commands.damage(agent.id(), target.id, agent.stats().damage);
        self.last_attack = Some(ctx.time);
        trace!(entity = %agent.id(), target = %target.id, "attack queued");
    }
}

/// Runs from the nearest threat.
#[derive(Debug, Default)]
pub struct FleeState;

impl UtilityState for FleeState {
    fn kind(&self) -> StateKind {
        StateKind::Flee
    }

    fn score(&self, agent: &Agent, params: &BehaviorParameters, _ctx: &TickContext<'_>) -> f32 {
        flee_utility(agent.health().fraction(), params)
    }

    fn tick(&mut self, agent: &mut Agent, _params: &BehaviorParameters, ctx: &mut TickContext<'_>) {
        let Some(threat) = nearest_target(agent, ctx.registry, agent.stats().sensor_range) else {
            return;
        };
        let step = agent.stats().speed * FLEE_SPEED_MULTIPLIER * ctx.dt;
        agent.set_position(step_away(agent.position(), threat.position, step));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CommandBuffer;
    use crate::entity::EntityCategory;
    use crate::registry::RegistrySnapshot;
    use crate::test_support::{agent, view};
    use vigil_common::Vec2;

    #[test]
    fn test_fight_respects_cooldown() {
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[EntityCategory::Player]);
        let player = view(EntityCategory::Player, Vec2::new(1.0, 0.0), 100.0);
        let snapshot = RegistrySnapshot::from_views(vec![player]);
        let params = BehaviorParameters::default();
        let mut state = FightState::default();
        let mut commands = CommandBuffer::new();

        for (tick, time) in [(0_u64, 0.0), (1, 0.5), (2, 1.0)] {
            let mut ctx = TickContext::new(&snapshot, &mut commands, tick, time, 0.5);
            state.tick(&mut me, &params, &mut ctx);
        }
        assert_eq!(commands.requests().len(), 2);
        assert_eq!(commands.requests()[0].target, player.id);
        assert_eq!(commands.requests()[0].amount, -10.0);
    }

    #[test]
    fn test_chase_moves_until_attack_range() {
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[EntityCategory::Player]);
        let player = view(EntityCategory::Player, Vec2::new(3.0, 0.0), 100.0);
        let snapshot = RegistrySnapshot::from_views(vec![player]);
        let params = BehaviorParameters::default();
        let mut state = ChaseState::default();
        let mut commands = CommandBuffer::new();
        let mut ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 1.0);

        state.tick(&mut me, &params, &mut ctx);
        // Stops at 0.8 * 2.5 = 2.0 from the target
        assert!((me.position().x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_chase_cap_and_recovery() {
        let me = agent(EntityCategory::Enemy, Vec2::ZERO, &[EntityCategory::Player]);
        let player = view(EntityCategory::Player, Vec2::new(5.0, 0.0), 100.0);
        let snapshot = RegistrySnapshot::from_views(vec![player]);
        let mut params = BehaviorParameters::default();
        params.chase_duration_cap.set(2.0);
        let mut state = ChaseState::default();
        let mut commands = CommandBuffer::new();

        {
            let ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 0.5);
            state.enter(&me, &params, &ctx);
            assert!(state.score(&me, &params, &ctx) > 0.0);
        }
        {
            let ctx = TickContext::new(&snapshot, &mut commands, 4, 2.0, 0.5);
            assert_eq!(state.score(&me, &params, &ctx), 0.0);
            state.exit(&me, &params, &ctx);
        }
        {
            let ctx = TickContext::new(&snapshot, &mut commands, 6, 3.0, 0.5);
            assert_eq!(state.score(&me, &params, &ctx), 0.0);
        }
        let ctx = TickContext::new(&snapshot, &mut commands, 8, 4.0, 0.5);
        assert!(state.score(&me, &params, &ctx) > 0.0);
    }

    #[test]
    fn test_inactive_cap_never_blocks() {
        let mut params = BehaviorParameters::default();
        params.chase_duration_cap.set_active(false);
        let state = ChaseState {
            session_start: Some(0.0),
            recovery_until: None,
        };
        assert!(!state.is_capped(&params, 1_000.0));
    }

    #[test]
    fn test_flee_moves_away_faster() {
        let mut me = agent(EntityCategory::Neutral, Vec2::ZERO, &[EntityCategory::Enemy]);
        let enemy = view(EntityCategory::Enemy, Vec2::new(0.0, 2.0), 100.0);
        let snapshot = RegistrySnapshot::from_views(vec![enemy]);
        let mut commands = CommandBuffer::new();
        let mut ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 1.0);

        FleeState.tick(&mut me, &BehaviorParameters::default(), &mut ctx);
        assert!((me.position().y + 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_build_state_kinds() {
        for kind in StateKind::all() {
            assert_eq!(build_state(kind).kind(), kind);
        }
    }
}
