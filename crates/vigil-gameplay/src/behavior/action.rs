//! Actions a behavior unit can run.
//!
//! Each variant keeps its authored settings and its per-entity runtime state
//! in separate halves of a [`Capability`], so copying an action for a new
//! entity never carries over cached targets or cooldown timestamps.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use vigil_common::{step_away, step_towards};

use super::{require_non_negative, BehaviorResult};
use crate::capability::Capability;
use crate::context::TickContext;
use crate::entity::Agent;
use crate::registry::EntityRegistry;
use crate::targeting::{TargetCache, TargetFilter};

/// Move toward a target until within `stop_distance`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChaseConfig {
    /// Multiplier on the agent's base speed
    pub speed_multiplier: f32,
    /// Distance at which the chase stops closing in
    pub stop_distance: f32,
    /// What to chase
    pub target: TargetFilter,
}

impl Default for ChaseConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            stop_distance: 1.5,
            target: TargetFilter::Hostile,
        }
    }
}

impl ChaseConfig {
    /// Checks the numbers.
    pub fn validate(&self) -> BehaviorResult<()> {
        require_non_negative("chase", "speed_multiplier", self.speed_multiplier)?;
        require_non_negative("chase", "stop_distance", self.stop_distance)
    }
}

/// Move away from a threat until `safe_distance` is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleeConfig {
    /// Multiplier on the agent's base speed
    pub speed_multiplier: f32,
    /// Distance at which the agent stops running
    pub safe_distance: f32,
    /// What to run from
    pub target: TargetFilter,
}

impl Default for FleeConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.5,
            safe_distance: 8.0,
            target: TargetFilter::Hostile,
        }
    }
}

impl FleeConfig {
    /// Checks the numbers.
    pub fn validate(&self) -> BehaviorResult<()> {
        require_non_negative("flee", "speed_multiplier", self.speed_multiplier)?;
        require_non_negative("flee", "safe_distance", self.safe_distance)
    }
}

/// Ranged damage paid for with mana.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastConfig {
    /// Damage per cast
    pub damage: f32,
    /// Mana spent per cast
    pub mana_cost: f32,
    /// Maximum cast distance
    pub range: f32,
    /// Seconds between casts
    pub cooldown: f32,
    /// What to cast at
    pub target: TargetFilter,
}

impl Default for CastConfig {
    fn default() -> Self {
        Self {
            damage: 15.0,
            mana_cost: 10.0,
            range: 6.0,
            cooldown: 2.0,
            target: TargetFilter::Hostile,
        }
    }
}

impl CastConfig {
    /// Checks the numbers.
    pub fn validate(&self) -> BehaviorResult<()> {
        require_non_negative("cast", "damage", self.damage)?;
        require_non_negative("cast", "mana_cost", self.mana_cost)?;
        require_non_negative("cast", "range", self.range)?;
        require_non_negative("cast", "cooldown", self.cooldown)
    }
}

/// Self-heal paid for with mana, used below a health fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealConfig {
    /// Health restored per use
    pub amount: f32,
    /// Mana spent per use
    pub mana_cost: f32,
    /// Only heal while the health fraction is below this
    pub below_fraction: f32,
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            amount: 20.0,
            mana_cost: 15.0,
            below_fraction: 0.5,
        }
    }
}

impl HealConfig {
    /// Checks the numbers.
    pub fn validate(&self) -> BehaviorResult<()> {
        require_non_negative("heal", "amount", self.amount)?;
        require_non_negative("heal", "mana_cost", self.mana_cost)?;
        require_non_negative("heal", "below_fraction", self.below_fraction)
    }
}

/// Close-range hit using the agent's own damage stat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeleeConfig {
    /// Reach
    pub range: f32,
    /// Seconds between hits
    pub cooldown: f32,
    /// What to hit
    pub target: TargetFilter,
}

impl Default for MeleeConfig {
    fn default() -> Self {
        Self {
            range: 1.5,
            cooldown: 1.0,
            target: TargetFilter::Hostile,
        }
    }
}

impl MeleeConfig {
    /// Checks the numbers.
    pub fn validate(&self) -> BehaviorResult<()> {
        require_non_negative("melee", "range", self.range)?;
        require_non_negative("melee", "cooldown", self.cooldown)
    }
}

/// Authored description of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionConfig {
    /// Do nothing
    Idle,
    /// Close in on a target
    Chase(ChaseConfig),
    /// Run from a threat
    Flee(FleeConfig),
    /// Ranged mana attack
    Cast(CastConfig),
    /// Mana self-heal
    Heal(HealConfig),
    /// Close-range attack
    Melee(MeleeConfig),
}

impl ActionConfig {
    /// Catalog tag of this kind.
    #[must_use]
    pub const fn kind_tag(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Chase(_) => "chase",
            Self::Flee(_) => "flee",
            Self::Cast(_) => "cast",
            Self::Heal(_) => "heal",
            Self::Melee(_) => "melee",
        }
    }

    /// Checks the numbers.
    pub fn validate(&self) -> BehaviorResult<()> {
        match self {
            Self::Idle => Ok(()),
            Self::Chase(c) => c.validate(),
            Self::Flee(c) => c.validate(),
            Self::Cast(c) => c.validate(),
            Self::Heal(c) => c.validate(),
            Self::Melee(c) => c.validate(),
        }
    }
}

/// Runtime state for actions gated by a cooldown.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StrikeState {
    /// Cached target
    pub target: TargetCache,
    /// Simulation time of the last use
    pub last_used: Option<f64>,
}

impl StrikeState {
    fn ready(&self, now: f64, cooldown: f32) -> bool {
        self.last_used
            .map_or(true, |last| now - last >= f64::from(cooldown))
    }
}

/// A live action owned by one behavior unit.
#[derive(Debug)]
pub enum Action {
    /// Do nothing
    Idle,
    /// Close in on a target
    Chase(Capability<ChaseConfig, TargetCache>),
    /// Run from a threat
    Flee(Capability<FleeConfig, TargetCache>),
    /// Ranged mana attack
    Cast(Capability<CastConfig, StrikeState>),
    /// Mana self-heal
    Heal(Capability<HealConfig, ()>),
    /// Close-range attack
    Melee(Capability<MeleeConfig, StrikeState>),
}

impl Action {
    /// Builds a cold action from its configuration.
    #[must_use]
    pub fn from_config(config: ActionConfig) -> Self {
        match config {
            ActionConfig::Idle => Self::Idle,
            ActionConfig::Chase(c) => Self::Chase(Capability::new(c)),
            ActionConfig::Flee(c) => Self::Flee(Capability::new(c)),
            ActionConfig::Cast(c) => Self::Cast(Capability::new(c)),
            ActionConfig::Heal(c) => Self::Heal(Capability::new(c)),
            ActionConfig::Melee(c) => Self::Melee(Capability::new(c)),
        }
    }

    /// Returns the authored configuration.
    #[must_use]
    pub fn to_config(&self) -> ActionConfig {
        match self {
            Self::Idle => ActionConfig::Idle,
            Self::Chase(c) => ActionConfig::Chase(c.config().clone()),
            Self::Flee(c) => ActionConfig::Flee(c.config().clone()),
            Self::Cast(c) => ActionConfig::Cast(c.config().clone()),
            Self::Heal(c) => ActionConfig::Heal(c.config().clone()),
            Self::Melee(c) => ActionConfig::Melee(c.config().clone()),
        }
    }

    /// Catalog tag of this kind.
    #[must_use]
    pub const fn kind_tag(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Chase(_) => "chase",
            Self::Flee(_) => "flee",
            Self::Cast(_) => "cast",
            Self::Heal(_) => "heal",
            Self::Melee(_) => "melee",
        }
    }

    /// Copies the configuration into a new action with no runtime state.
    #[must_use]
    pub fn cold_clone(&self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            Self::Chase(c) => Self::Chase(c.cold_clone()),
            Self::Flee(c) => Self::Flee(c.cold_clone()),
            Self::Cast(c) => Self::Cast(c.cold_clone()),
            Self::Heal(c) => Self::Heal(c.cold_clone()),
            Self::Melee(c) => Self::Melee(c.cold_clone()),
        }
    }

    /// Cached target, for actions that aim at something.
    #[must_use]
    pub fn cached_target(&self) -> Option<vigil_common::EntityId> {
        match self {
            Self::Chase(c) => c.runtime().target(),
            Self::Flee(c) => c.runtime().target(),
            Self::Cast(c) => c.runtime().target.target(),
            Self::Melee(c) => c.runtime().target.target(),
            Self::Idle | Self::Heal(_) => None,
        }
    }

    /// Caches an initial target.
    pub fn on_initialize(&mut self, agent: &Agent, registry: &dyn EntityRegistry) {
        let sensor = agent.stats().sensor_range;
        match self {
            Self::Chase(c) => {
                let (config, cache) = c.parts_mut();
                cache.acquire(agent, config.target, registry, sensor);
            }
            Self::Flee(c) => {
                let (config, cache) = c.parts_mut();
                cache.acquire(agent, config.target, registry, sensor);
            }
            Self::Cast(c) => {
                let (config, state) = c.parts_mut();
                state.target.acquire(agent, config.target, registry, config.range);
            }
            Self::Melee(c) => {
                let (config, state) = c.parts_mut();
                state.target.acquire(agent, config.target, registry, config.range);
            }
            Self::Idle | Self::Heal(_) => {}
        }
    }

    /// Runs the action once. A missing target is a no-op, not an error.
    pub fn execute(&mut self, agent: &mut Agent, ctx: &mut TickContext<'_>) -> BehaviorResult<()> {
        match self {
            Self::Idle => Ok(()),
            Self::Chase(c) => {
                let (config, cache) = c.parts_mut();
                config.validate()?;
                let sensor = agent.stats().sensor_range;
                let Some(target) = cache.acquire(agent, config.target, ctx.registry, sensor) else {
                    return Ok(());
                };
                let distance = target.distance_to(agent.position());
                if distance > config.stop_distance {
                    let step = agent.stats().speed * config.speed_multiplier * ctx.dt;
                    let step = step.min(distance - config.stop_distance);
                    agent.set_position(step_towards(agent.position(), target.position, step));
                }
                Ok(())
            }
            Self::Flee(c) => {
                let (config, cache) = c.parts_mut();
                config.validate()?;
                let sensor = agent.stats().sensor_range;
                let Some(threat) = cache.acquire(agent, config.target, ctx.registry, sensor) else {
                    return Ok(());
                };
                if threat.distance_to(agent.position()) < config.safe_distance {
                    let step = agent.stats().speed * config.speed_multiplier * ctx.dt;
                    agent.set_position(step_away(agent.position(), threat.position, step));
                }
                Ok(())
            }
            Self::Cast(c) => {
                let (config, state) = c.parts_mut();
                config.validate()?;
                let Some(target) = state
                    .target
                    .acquire(agent, config.target, ctx.registry, config.range)
                else {
                    return Ok(());
                };
                if !state.ready(ctx.time, config.cooldown) {
                    return Ok(());
                }
                if !agent.mana_mut().try_spend(config.mana_cost) {
                    trace!(entity = %agent.id(), "cast skipped, not enough mana");
                    return Ok(());
                }
                ctx.commands.damage(agent.id(), target.id, config.damage);
                state.last_used = Some(ctx.time);
                debug!(entity = %agent.id(), target = %target.id, damage = config.damage, "cast");
                Ok(())
            }
            Self::Heal(c) => {
                let config = c.config();
                config.validate()?;
                if agent.health().fraction() >= config.below_fraction {
                    return Ok(());
                }
                if !agent.mana_mut().try_spend(config.mana_cost) {
                    trace!(entity = %agent.id(), "heal skipped, not enough mana");
                    return Ok(());
                }
                ctx.commands.heal(agent.id(), agent.id(), config.amount);
                Ok(())
            }
            Self::Melee(c) => {
                let (config, state) = c.parts_mut();
                config.validate()?;
                let Some(target) = state
                    .target
                    .acquire(agent, config.target, ctx.registry, config.range)
                else {
                    return Ok(());
                };
                if !state.ready(ctx.time, config.cooldown) {
                    return Ok(());
                }
                let damage = agent.stats().damage;
                ctx.commands.damage(agent.id(), target.id, damage);
                state.last_used = Some(ctx.time);
                debug!(entity = %agent.id(), target = %target.id, damage, "melee hit");
                Ok(())
            }
        }
    }

    /// Drops cached targets. Cooldown timestamps are kept so detaching and
    /// re-attaching a unit cannot skip a cooldown.
    pub fn on_cleanup(&mut self) {
        match self {
            Self::Chase(c) => c.runtime_mut().clear(),
            Self::Flee(c) => c.runtime_mut().clear(),
            Self::Cast(c) => c.runtime_mut().target.clear(),
            Self::Melee(c) => c.runtime_mut().target.clear(),
            Self::Idle | Self::Heal(_) => {}
        }
    }
}
