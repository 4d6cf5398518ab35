//! Conditions gating behavior units.

use serde::{Deserialize, Serialize};

use super::{require_non_negative, require_range, BehaviorResult};
use crate::capability::Capability;
use crate::context::TickContext;
use crate::entity::Agent;
use crate::registry::EntityRegistry;
use crate::targeting::{TargetCache, TargetFilter};

/// Met while a target is between `min` and `max` away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceConfig {
    /// Inclusive lower bound
    pub min: f32,
    /// Inclusive upper bound
    pub max: f32,
    /// What to measure against
    pub target: TargetFilter,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 5.0,
            target: TargetFilter::Hostile,
        }
    }
}

/// Met while the owner's health fraction is between `min` and `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthRangeConfig {
    /// Inclusive lower bound
    pub min: f32,
    /// Inclusive upper bound
    pub max: f32,
}

impl Default for HealthRangeConfig {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

/// Met once `seconds` have passed since the unit last executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Cooldown length
    pub seconds: f32,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self { seconds: 1.0 }
    }
}

/// Runtime state of a cooldown condition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CooldownTimer {
    /// Simulation time the owning unit last executed
    pub last_executed: Option<f64>,
}

/// Authored description of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionConfig {
    /// Always met
    AlwaysTrue,
    /// Target distance window
    DistanceInRange(DistanceConfig),
    /// Owner health window
    HealthInRange(HealthRangeConfig),
    /// Time since last execution
    CooldownElapsed(CooldownConfig),
}

impl ConditionConfig {
    /// Catalog tag of this kind.
    #[must_use]
    pub const fn kind_tag(&self) -> &'static str {
        match self {
            Self::AlwaysTrue => "always_true",
            Self::DistanceInRange(_) => "distance_in_range",
            Self::HealthInRange(_) => "health_in_range",
            Self::CooldownElapsed(_) => "cooldown_elapsed",
        }
    }

    /// Checks the numbers.
    pub fn validate(&self) -> BehaviorResult<()> {
        match self {
            Self::AlwaysTrue => Ok(()),
            Self::DistanceInRange(c) => require_range("distance_in_range", c.min, c.max),
            Self::HealthInRange(c) => require_range("health_in_range", c.min, c.max),
            Self::CooldownElapsed(c) => require_non_negative("cooldown_elapsed", "seconds", c.seconds),
        }
    }
}

/// A live condition owned by one behavior unit.
#[derive(Debug)]
pub enum Condition {
    /// Always met
    AlwaysTrue,
    /// Target distance window
    DistanceInRange(Capability<DistanceConfig, TargetCache>),
    /// Owner health window
    HealthInRange(Capability<HealthRangeConfig, ()>),
    /// Time since last execution
    CooldownElapsed(Capability<CooldownConfig, CooldownTimer>),
}

impl Condition {
    /// Builds a cold condition from its configuration.
    #[must_use]
    pub fn from_config(config: ConditionConfig) -> Self {
        match config {
            ConditionConfig::AlwaysTrue => Self::AlwaysTrue,
            ConditionConfig::DistanceInRange(c) => Self::DistanceInRange(Capability::new(c)),
            ConditionConfig::HealthInRange(c) => Self::HealthInRange(Capability::new(c)),
            ConditionConfig::CooldownElapsed(c) => Self::CooldownElapsed(Capability::new(c)),
        }
    }

    /// Returns the authored configuration.
    #[must_use]
    pub fn to_config(&self) -> ConditionConfig {
        match self {
            Self::AlwaysTrue => ConditionConfig::AlwaysTrue,
            Self::DistanceInRange(c) => ConditionConfig::DistanceInRange(c.config().clone()),
            Self::HealthInRange(c) => ConditionConfig::HealthInRange(c.config().clone()),
            Self::CooldownElapsed(c) => ConditionConfig::CooldownElapsed(c.config().clone()),
        }
    }

    /// Catalog tag of this kind.
    #[must_use]
    pub const fn kind_tag(&self) -> &'static str {
        match self {
            Self::AlwaysTrue => "always_true",
            Self::DistanceInRange(_) => "distance_in_range",
            Self::HealthInRange(_) => "health_in_range",
            Self::CooldownElapsed(_) => "cooldown_elapsed",
        }
    }

    /// Copies the configuration into a new condition with no runtime state.
    #[must_use]
    pub fn cold_clone(&self) -> Self {
        match self {
            Self::AlwaysTrue => Self::AlwaysTrue,
            Self::DistanceInRange(c) => Self::DistanceInRange(c.cold_clone()),
            Self::HealthInRange(c) => Self::HealthInRange(c.cold_clone()),
            Self::CooldownElapsed(c) => Self::CooldownElapsed(c.cold_clone()),
        }
    }

    /// When the owning unit last executed, for cooldown conditions.
    #[must_use]
    pub fn last_executed(&self) -> Option<f64> {
        match self {
            Self::CooldownElapsed(c) => c.runtime().last_executed,
            _ => None,
        }
    }

    /// Caches an initial target.
    pub fn on_initialize(&mut self, agent: &Agent, registry: &dyn EntityRegistry) {
        if let Self::DistanceInRange(c) = self {
            let (config, cache) = c.parts_mut();
            cache.acquire(agent, config.target, registry, agent.stats().sensor_range);
        }
    }

    /// Evaluates the condition. A missing target means "not met".
    pub fn is_met(&mut self, agent: &Agent, ctx: &TickContext<'_>) -> bool {
        match self {
            Self::AlwaysTrue => true,
            Self::DistanceInRange(c) => {
                let (config, cache) = c.parts_mut();
                let search = agent.stats().sensor_range.max(config.max);
                cache
                    .acquire(agent, config.target, ctx.registry, search)
                    .map_or(false, |target| {
                        let distance = target.distance_to(agent.position());
                        distance >= config.min && distance <= config.max
                    })
            }
            Self::HealthInRange(c) => {
                let config = c.config();
                let fraction = agent.health().fraction();
                fraction >= config.min && fraction <= config.max
            }
            Self::CooldownElapsed(c) => {
                let seconds = f64::from(c.config().seconds);
                c.runtime()
                    .last_executed
                    .map_or(true, |last| ctx.time - last >= seconds)
            }
        }
    }

    /// Notifies the condition that its unit executed at `time`.
    pub fn on_executed(&mut self, time: f64) {
        if let Self::CooldownElapsed(c) = self {
            c.runtime_mut().last_executed = Some(time);
        }
    }

    /// Drops cached targets. Cooldown timestamps are kept.
    pub fn on_cleanup(&mut self) {
        if let Self::DistanceInRange(c) = self {
            c.runtime_mut().clear();
        }
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
    fn test_always_true() {
        let me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let snapshot = RegistrySnapshot::default();
        let mut commands = CommandBuffer::new();
        let ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 0.1);
        assert!(Condition::AlwaysTrue.is_met(&me, &ctx));
    }

    #[test]
    fn test_distance_in_range() {
        let me = agent(EntityCategory::Enemy, Vec2::ZERO, &[EntityCategory::Player]);
        let player = view(EntityCategory::Player, Vec2::new(4.0, 0.0), 100.0);
        let snapshot = RegistrySnapshot::from_views(vec![player]);
        let mut commands = CommandBuffer::new();
        let ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 0.1);

        let mut inside = Condition::from_config(ConditionConfig::DistanceInRange(DistanceConfig {
            min: 0.0,
            max: 5.0,
            target: TargetFilter::Hostile,
        }));
        let mut outside = Condition::from_config(ConditionConfig::DistanceInRange(DistanceConfig {
            min: 0.0,
            max: 3.0,
            target: TargetFilter::Hostile,
        }));
        assert!(inside.is_met(&me, &ctx));
        assert!(!outside.is_met(&me, &ctx));
    }

    #[test]
    fn test_distance_without_target_not_met() {
        let me = agent(EntityCategory::Enemy, Vec2::ZERO, &[EntityCategory::Player]);
        let snapshot = RegistrySnapshot::default();
        let mut commands = CommandBuffer::new();
        let ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 0.1);
        let mut cond = Condition::from_config(ConditionConfig::DistanceInRange(DistanceConfig::default()));
        assert!(!cond.is_met(&me, &ctx));
    }

    #[test]
    fn test_health_in_range() {
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let snapshot = RegistrySnapshot::default();
        let mut cond = Condition::from_config(ConditionConfig::HealthInRange(HealthRangeConfig {
            min: 0.0,
            max: 0.3,
        }));

        let mut commands = CommandBuffer::new();
        {
            let ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 0.1);
            assert!(!cond.is_met(&me, &ctx));
        }
        me.health_mut().apply_immediate(-75.0);
        let ctx = TickContext::new(&snapshot, &mut commands, 1, 0.1, 0.1);
        assert!(cond.is_met(&me, &ctx));
    }

    #[test]
    fn test_cooldown_elapsed() {
        let me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let snapshot = RegistrySnapshot::default();
        let mut commands = CommandBuffer::new();
        let mut cond = Condition::from_config(ConditionConfig::CooldownElapsed(CooldownConfig {
            seconds: 2.0,
        }));

        let check = |cond: &mut Condition, commands: &mut CommandBuffer, time: f64| {
            let ctx = TickContext::new(&snapshot, commands, 0, time, 0.1);
            cond.is_met(&me, &ctx)
        };

        assert!(check(&mut cond, &mut commands, 0.0));
        cond.on_executed(0.0);
        assert!(!check(&mut cond, &mut commands, 1.0));
        assert!(check(&mut cond, &mut commands, 2.0));
    }

    #[test]
    fn test_cold_clone_resets_cooldown() {
        let mut template = Condition::from_config(ConditionConfig::CooldownElapsed(
            CooldownConfig::default(),
        ));
        template.on_executed(5.0);

        let mut clone = template.cold_clone();
        assert_eq!(clone.last_executed(), None);
        clone.on_executed(9.0);
        assert_eq!(template.last_executed(), Some(5.0));
        assert_eq!(clone.to_config(), template.to_config());
    }

    #[test]
    fn test_validate_rejects_reversed_range() {
        let config = ConditionConfig::HealthInRange(HealthRangeConfig { min: 0.8, max: 0.2 });
        assert!(config.validate().is_err());
        assert!(ConditionConfig::AlwaysTrue.validate().is_ok());
    }
}
