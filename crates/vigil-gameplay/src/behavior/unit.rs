//! Conditional behavior units and their authored templates.

use serde::{Deserialize, Serialize};
use tracing::trace;
use vigil_common::{ConfigError, ConfigResult};

use super::action::{Action, ActionConfig};
use super::condition::{Condition, ConditionConfig};
use super::BehaviorResult;
use crate::catalog::CapabilityCatalog;
use crate::context::TickContext;
use crate::entity::Agent;
use crate::registry::EntityRegistry;

/// How a template names its action: by catalog tag or inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionSpec {
    /// Default-configured instance from the catalog
    Kind(String),
    /// Explicit configuration
    Config(ActionConfig),
}

/// How a template names a condition: by catalog tag or inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConditionSpec {
    /// Default-configured instance from the catalog
    Kind(String),
    /// Explicit configuration
    Config(ConditionConfig),
}

/// Authored form of a behavior unit, as found in archetype records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTemplate {
    /// Name for logs and debugging
    pub name: String,
    /// The action; `None` makes the unit a no-op
    #[serde(default)]
    pub action: Option<ActionSpec>,
    /// Conditions, combined with AND
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
    /// Higher runs first
    #[serde(default)]
    pub priority: i32,
    /// Blocks lower priorities in the same tick once executed
    #[serde(default)]
    pub exclusive: bool,
}

/// An action gated by a list of conditions.
#[derive(Debug)]
pub struct ConditionalBehavior {
    name: String,
    action: Option<Action>,
    conditions: Vec<Condition>,
    priority: i32,
    exclusive: bool,
}

impl ConditionalBehavior {
    /// Creates a unit with no conditions, priority 0, not exclusive.
    pub fn new(name: impl Into<String>, action: Option<Action>) -> Self {
        Self {
            name: name.into(),
            action,
            conditions: Vec::new(),
            priority: 0,
            exclusive: false,
        }
    }

    /// Adds a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the exclusivity flag.
    #[must_use]
    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    /// Builds a cold unit from a template, resolving tags through the
    /// catalog.
    pub fn from_template(template: &UnitTemplate, catalog: &CapabilityCatalog) -> ConfigResult<Self> {
        let invalid = |reason: String| ConfigError::InvalidUnit {
            unit: template.name.clone(),
            reason,
        };

        let action = match &template.action {
            None => None,
            Some(ActionSpec::Kind(tag)) => Some(catalog.instantiate_action(tag)?),
            Some(ActionSpec::Config(config)) => {
                config.validate().map_err(|e| invalid(e.to_string()))?;
                Some(Action::from_config(config.clone()))
            }
        };

        let conditions = template
            .conditions
            .iter()
            .map(|spec| match spec {
                ConditionSpec::Kind(tag) => catalog.instantiate_condition(tag),
                ConditionSpec::Config(config) => {
                    config.validate().map_err(|e| invalid(e.to_string()))?;
                    Ok(Condition::from_config(config.clone()))
                }
            })
            .collect::<ConfigResult<Vec<_>>>()?;

        Ok(Self {
            name: template.name.clone(),
            action,
            conditions,
            priority: template.priority,
            exclusive: template.exclusive,
        })
    }

    /// Unit name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Priority.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Exclusivity flag.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// The action, if any.
    #[must_use]
    pub const fn action(&self) -> Option<&Action> {
        self.action.as_ref()
    }

    /// The conditions.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Fires setup hooks on the action and every condition.
    pub fn initialize(&mut self, agent: &Agent, registry: &dyn EntityRegistry) {
        if let Some(action) = &mut self.action {
            action.on_initialize(agent, registry);
        }
        for condition in &mut self.conditions {
            condition.on_initialize(agent, registry);
        }
    }

    /// AND over every condition. An empty list is met.
    pub fn should_execute(&mut self, agent: &Agent, ctx: &TickContext<'_>) -> bool {
        self.conditions
            .iter_mut()
            .all(|condition| condition.is_met(agent, ctx))
    }

    /// Runs the action once if the conditions hold. Returns whether the
    /// unit executed.
    pub fn execute(&mut self, agent: &mut Agent, ctx: &mut TickContext<'_>) -> BehaviorResult<bool> {
        if !self.should_execute(agent, ctx) {
            return Ok(false);
        }
        match &mut self.action {
            Some(action) => action.execute(agent, ctx)?,
            None => trace!(unit = %self.name, "unit has no action"),
        }
        for condition in &mut self.conditions {
            condition.on_executed(ctx.time);
        }
        Ok(true)
    }

    /// Fires teardown hooks on the action and every condition.
    pub fn cleanup(&mut self) {
        if let Some(action) = &mut self.action {
            action.on_cleanup();
        }
        for condition in &mut self.conditions {
            condition.on_cleanup();
        }
    }

    /// Fresh copy for another entity: cold action and conditions, same
    /// priority and exclusivity.
    #[must_use]
    pub fn clone_for_instance(&self) -> Self {
        Self {
            name: self.name.clone(),
            action: self.action.as_ref().map(Action::cold_clone),
            conditions: self.conditions.iter().map(Condition::cold_clone).collect(),
            priority: self.priority,
            exclusive: self.exclusive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::action::CastConfig;
    use crate::behavior::condition::{CooldownConfig, HealthRangeConfig};
    use crate::context::CommandBuffer;
    use crate::entity::EntityCategory;
    use crate::registry::RegistrySnapshot;
    use crate::test_support::{agent, view};
    use vigil_common::Vec2;

    #[test]
    fn test_empty_conditions_always_execute() {
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let snapshot = RegistrySnapshot::default();
        let mut commands = CommandBuffer::new();
        let mut ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 0.1);

        let mut unit = ConditionalBehavior::new("idle", Some(Action::Idle));
        assert!(unit.execute(&mut me, &mut ctx).expect("should run"));
    }

    #[test]
    fn test_missing_action_is_noop() {
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let snapshot = RegistrySnapshot::default();
        let mut commands = CommandBuffer::new();
        let mut ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 0.1);

        let mut unit = ConditionalBehavior::new("empty", None);
        assert!(unit.execute(&mut me, &mut ctx).expect("should run"));
        assert_eq!(me.position(), Vec2::ZERO);
    }

    #[test]
    fn test_conditions_are_anded() {
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let snapshot = RegistrySnapshot::default();
        let mut commands = CommandBuffer::new();
        let mut ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 0.1);

        let mut unit = ConditionalBehavior::new("gated", Some(Action::Idle))
            .with_condition(Condition::AlwaysTrue)
            .with_condition(Condition::from_config(ConditionConfig::HealthInRange(
                HealthRangeConfig { min: 0.0, max: 0.5 },
            )));
        assert!(!unit.execute(&mut me, &mut ctx).expect("should run"));
    }

    #[test]
    fn test_execute_starts_cooldown() {
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[]);
        let snapshot = RegistrySnapshot::default();
        let mut commands = CommandBuffer::new();

        let mut unit = ConditionalBehavior::new("throttled", Some(Action::Idle)).with_condition(
            Condition::from_config(ConditionConfig::CooldownElapsed(CooldownConfig {
                seconds: 1.0,
            })),
        );

        let mut results = Vec::new();
        for (tick, time) in [(0_u64, 0.0), (1, 0.5), (2, 1.0)] {
            let mut ctx = TickContext::new(&snapshot, &mut commands, tick, time, 0.5);
            results.push(unit.execute(&mut me, &mut ctx).expect("should run"));
        }
        assert_eq!(results, vec![true, false, true]);
    }

    #[test]
    fn test_clone_for_instance_is_independent() {
        let mut me = agent(EntityCategory::Enemy, Vec2::ZERO, &[EntityCategory::Player]);
        let player = view(EntityCategory::Player, Vec2::new(2.0, 0.0), 100.0);
        let snapshot = RegistrySnapshot::from_views(vec![player]);
        let mut commands = CommandBuffer::new();

        let template = ConditionalBehavior::new(
            "bolt",
            Some(Action::from_config(ActionConfig::Cast(CastConfig::default()))),
        )
        .with_condition(Condition::from_config(ConditionConfig::CooldownElapsed(
            CooldownConfig { seconds: 3.0 },
        )))
        .with_priority(40)
        .with_exclusive(true);

        let mut first = template.clone_for_instance();
        let second = template.clone_for_instance();
        {
            let mut ctx = TickContext::new(&snapshot, &mut commands, 0, 0.0, 0.1);
            assert!(first.execute(&mut me, &mut ctx).expect("should run"));
        }

        assert_eq!(first.conditions()[0].last_executed(), Some(0.0));
        assert_eq!(second.conditions()[0].last_executed(), None);
        assert_eq!(template.conditions()[0].last_executed(), None);
        assert!(second.action().and_then(Action::cached_target).is_none());
        assert_eq!(second.priority(), 40);
        assert!(second.is_exclusive());
    }

    #[test]
    fn test_from_template_resolves_tags() {
        let catalog = CapabilityCatalog::with_defaults();
        let template = UnitTemplate {
            name: "hunt".to_string(),
            action: Some(ActionSpec::Kind("chase".to_string())),
            conditions: vec![ConditionSpec::Kind("always_true".to_string())],
            priority: 10,
            exclusive: false,
        };
        let unit = ConditionalBehavior::from_template(&template, &catalog).expect("should build");
        assert_eq!(unit.action().map(Action::kind_tag), Some("chase"));
        assert_eq!(unit.conditions().len(), 1);
        assert_eq!(unit.priority(), 10);
    }

    #[test]
    fn test_from_template_unknown_kind() {
        let catalog = CapabilityCatalog::with_defaults();
        let template = UnitTemplate {
            name: "broken".to_string(),
            action: Some(ActionSpec::Kind("teleport".to_string())),
            conditions: Vec::new(),
            priority: 0,
            exclusive: false,
        };
        let err = ConditionalBehavior::from_template(&template, &catalog)
            .expect_err("unknown tag should fail");
        assert!(matches!(err, ConfigError::UnknownKind { family: "action", .. }));
    }

    #[test]
    fn test_from_template_rejects_bad_inline_config() {
        let catalog = CapabilityCatalog::with_defaults();
        let template = UnitTemplate {
            name: "bad".to_string(),
            action: None,
            conditions: vec![ConditionSpec::Config(ConditionConfig::HealthInRange(
                HealthRangeConfig { min: 1.0, max: 0.0 },
            ))],
            priority: 0,
            exclusive: false,
        };
        let err = ConditionalBehavior::from_template(&template, &catalog)
            .expect_err("reversed range should fail");
        assert!(matches!(err, ConfigError::InvalidUnit { .. }));
    }
}
