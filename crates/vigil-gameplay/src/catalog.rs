//! Registry of action and condition kinds, keyed by stable tags.
//!
//! Factories produce a fresh, independently owned instance on every call,
//! so no two entities ever share runtime state through the catalog.

use ahash::AHashMap;
use tracing::debug;
use vigil_common::{ConfigError, ConfigResult};

use crate::behavior::action::{
    Action, ActionConfig, CastConfig, ChaseConfig, FleeConfig, HealConfig, MeleeConfig,
};
use crate::behavior::condition::{
    Condition, ConditionConfig, CooldownConfig, DistanceConfig, HealthRangeConfig,
};

type ActionFactory = Box<dyn Fn() -> Action + Send + Sync>;
type ConditionFactory = Box<dyn Fn() -> Condition + Send + Sync>;

/// Tag-indexed constructors for actions and conditions.
#[derive(Default)]
pub struct CapabilityCatalog {
    actions: AHashMap<String, ActionFactory>,
    conditions: AHashMap<String, ConditionFactory>,
}

impl std::fmt::Debug for CapabilityCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityCatalog")
            .field("actions", &self.action_tags())
            .field("conditions", &self.condition_tags())
            .finish()
    }
}

impl CapabilityCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding every built-in kind plus a few presets.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut catalog = Self::new();

        catalog.register_action("idle", || Action::Idle);
        catalog.register_action("chase", || {
            Action::from_config(ActionConfig::Chase(ChaseConfig::default()))
        });
        catalog.register_action("flee", || {
            Action::from_config(ActionConfig::Flee(FleeConfig::default()))
        });
        catalog.register_action("cast", || {
            Action::from_config(ActionConfig::Cast(CastConfig::default()))
        });
        catalog.register_action("heal", || {
            Action::from_config(ActionConfig::Heal(HealConfig::default()))
        });
        catalog.register_action("melee", || {
            Action::from_config(ActionConfig::Melee(MeleeConfig::default()))
        });

        catalog.register_condition("always_true", || Condition::AlwaysTrue);
        catalog.register_condition("distance_in_range", || {
            Condition::from_config(ConditionConfig::DistanceInRange(DistanceConfig::default()))
        });
        catalog.register_condition("health_in_range", || {
            Condition::from_config(ConditionConfig::HealthInRange(HealthRangeConfig::default()))
        });
        catalog.register_condition("cooldown_elapsed", || {
            Condition::from_config(ConditionConfig::CooldownElapsed(CooldownConfig::default()))
        });

        // Presets
        catalog.register_condition("low_health", || {
            Condition::from_config(ConditionConfig::HealthInRange(HealthRangeConfig {
                min: 0.0,
                max: 0.3,
            }))
        });
        catalog.register_condition("in_melee_range", || {
            Condition::from_config(ConditionConfig::DistanceInRange(DistanceConfig {
                min: 0.0,
                max: MeleeConfig::default().range,
                ..DistanceConfig::default()
            }))
        });

        catalog
    }

    /// Registers an action factory. A later registration under the same tag
    /// replaces the earlier one.
    pub fn register_action<F>(&mut self, tag: impl Into<String>, factory: F)
    where
        F: Fn() -> Action + Send + Sync + 'static,
    {
        let tag = tag.into();
        debug!(tag = %tag, "registered action kind");
        self.actions.insert(tag, Box::new(factory));
    }

    /// Registers a condition factory. A later registration under the same
    /// tag replaces the earlier one.
    pub fn register_condition<F>(&mut self, tag: impl Into<String>, factory: F)
    where
        F: Fn() -> Condition + Send + Sync + 'static,
    {
        let tag = tag.into();
        debug!(tag = %tag, "registered condition kind");
        self.conditions.insert(tag, Box::new(factory));
    }

    /// Fresh action for `tag`.
    pub fn instantiate_action(&self, tag: &str) -> ConfigResult<Action> {
        self.actions
            .get(tag)
            .map(|factory| factory())
            .ok_or_else(|| ConfigError::UnknownKind {
                family: "action",
                tag: tag.to_string(),
            })
    }

    /// Fresh condition for `tag`.
    pub fn instantiate_condition(&self, tag: &str) -> ConfigResult<Condition> {
        self.conditions
            .get(tag)
            .map(|factory| factory())
            .ok_or_else(|| ConfigError::UnknownKind {
                family: "condition",
                tag: tag.to_string(),
            })
    }

    /// Whether an action kind is registered.
    #[must_use]
    pub fn contains_action(&self, tag: &str) -> bool {
        self.actions.contains_key(tag)
    }

    /// Whether a condition kind is registered.
    #[must_use]
    pub fn contains_condition(&self, tag: &str) -> bool {
        self.conditions.contains_key(tag)
    }

    /// Registered action tags, sorted.
    #[must_use]
    pub fn action_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Registered condition tags, sorted.
    #[must_use]
    pub fn condition_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.conditions.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_registered() {
        let catalog = CapabilityCatalog::with_defaults();
        for tag in ["idle", "chase", "flee", "cast", "heal", "melee"] {
            assert!(catalog.contains_action(tag), "missing action {tag}");
        }
        for tag in ["always_true", "distance_in_range", "health_in_range", "cooldown_elapsed"] {
            assert!(catalog.contains_condition(tag), "missing condition {tag}");
        }
    }

    #[test]
    fn test_unknown_kind() {
        let catalog = CapabilityCatalog::new();
        assert!(matches!(
            catalog.instantiate_action("chase"),
            Err(ConfigError::UnknownKind { family: "action", .. })
        ));
        assert!(matches!(
            catalog.instantiate_condition("nope"),
            Err(ConfigError::UnknownKind { family: "condition", .. })
        ));
    }

    #[test]
    fn test_instances_are_independent() {
        let catalog = CapabilityCatalog::with_defaults();
        let mut a = catalog
            .instantiate_condition("cooldown_elapsed")
            .expect("registered");
        let b = catalog
            .instantiate_condition("cooldown_elapsed")
            .expect("registered");
        a.on_executed(3.0);
        assert_eq!(a.last_executed(), Some(3.0));
        assert_eq!(b.last_executed(), None);
    }

    #[test]
    fn test_register_custom_kind() {
        let mut catalog = CapabilityCatalog::new();
        catalog.register_action("sprint", || {
            Action::from_config(ActionConfig::Chase(ChaseConfig {
                speed_multiplier: 2.5,
                ..ChaseConfig::default()
            }))
        });
        let action = catalog.instantiate_action("sprint").expect("registered");
        assert_eq!(action.kind_tag(), "chase");
        assert_eq!(catalog.action_tags(), vec!["sprint"]);
    }

    #[test]
    fn test_presets() {
        let catalog = CapabilityCatalog::with_defaults();
        let low = catalog.instantiate_condition("low_health").expect("registered");
        assert_eq!(
            low.to_config(),
            ConditionConfig::HealthInRange(HealthRangeConfig { min: 0.0, max: 0.3 })
        );
    }
}
