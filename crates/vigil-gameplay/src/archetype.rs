//! Archetype records and the library that turns them into entities.
//!
//! Records are authored in RON. Loading validates every record against the
//! capability catalog; a bad record is reported and skipped while the rest
//! of the file still loads.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};
use vigil_common::{ConfigError, ConfigResult, Vec2};

use crate::behavior::executor::BehaviorExecutor;
use crate::behavior::unit::{ConditionalBehavior, UnitTemplate};
use crate::brain::Brain;
use crate::catalog::CapabilityCatalog;
use crate::entity::{Agent, AgentStats, Entity, EntityCategory};
use crate::fsm::params::{BehaviorParameters, CategoryWeights};
use crate::fsm::{StateKind, UtilityStateMachine};
use crate::resources::{ManaPool, ResourceLedger};

/// Archetypes shipped with the crate.
pub const BUILTIN_ARCHETYPES: &str = include_str!("../assets/archetypes.ron");

/// Authored template for one kind of entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Archetype {
    /// Unique name
    pub name: String,
    /// Entity category
    pub category: EntityCategory,
    /// Maximum health
    pub max_health: f32,
    /// Health regenerated per second
    pub health_regen: f32,
    /// Maximum mana
    pub max_mana: f32,
    /// Mana regenerated per second
    pub mana_regen: f32,
    /// Movement speed
    pub speed: f32,
    /// Damage per attack
    pub damage: f32,
    /// Perception radius
    pub sensor_range: f32,
    /// Fallback attack cooldown
    pub attack_cooldown: f32,
    /// Categories treated as targets
    pub target_categories: Vec<EntityCategory>,
    /// Learnable parameter defaults
    pub parameters: BehaviorParameters,
    /// Target ranking weights per category
    pub target_weights: Vec<CategoryWeights>,
    /// State machine states in enumeration order; empty means no machine
    pub states: Vec<StateKind>,
    /// Behavior unit templates
    pub behaviors: Vec<UnitTemplate>,
}

impl Default for Archetype {
    fn default() -> Self {
        let stats = AgentStats::default();
        Self {
            name: String::new(),
            category: EntityCategory::Neutral,
            max_health: 100.0,
            health_regen: 0.0,
            max_mana: 0.0,
            mana_regen: 0.0,
            speed: stats.speed,
            damage: stats.damage,
            sensor_range: stats.sensor_range,
            attack_cooldown: stats.attack_cooldown,
            target_categories: Vec::new(),
            parameters: BehaviorParameters::default(),
            target_weights: Vec::new(),
            states: Vec::new(),
            behaviors: Vec::new(),
        }
    }
}

impl Archetype {
    /// Agent stats derived from the record.
    #[must_use]
    pub fn stats(&self) -> AgentStats {
        AgentStats {
            speed: self.speed,
            damage: self.damage,
            sensor_range: self.sensor_range,
            attack_cooldown: self.attack_cooldown,
            target_categories: self.target_categories.clone(),
        }
    }

    /// A fresh copy of the learnable parameters, with the record's target
    /// weights folded in.
    #[must_use]
    pub fn behavior_parameters(&self) -> BehaviorParameters {
        let mut params = self.parameters.clone();
        if !self.target_weights.is_empty() {
            params.target_weights = self.target_weights.clone();
        }
        params
    }

    /// Checks the record and builds its behavior unit templates.
    pub fn validate(&self, catalog: &CapabilityCatalog) -> ConfigResult<Vec<ConditionalBehavior>> {
        let invalid = |reason: String| ConfigError::InvalidArchetype {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty".to_string()));
        }
        if !(self.max_health.is_finite() && self.max_health > 0.0) {
            return Err(invalid(format!("max_health must be positive, got {}", self.max_health)));
        }
        for (field, value) in [
            ("health_regen", self.health_regen),
            ("max_mana", self.max_mana),
            ("mana_regen", self.mana_regen),
            ("speed", self.speed),
            ("damage", self.damage),
            ("sensor_range", self.sensor_range),
            ("attack_cooldown", self.attack_cooldown),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(format!("{field} must be non-negative, got {value}")));
            }
        }
        if let Some(id) = self.parameters.first_malformed() {
            return Err(invalid(format!("parameter {id:?} is out of bounds")));
        }
        for (index, state) in self.states.iter().enumerate() {
            if self.states[..index].contains(state) {
                return Err(invalid(format!("state {state} listed twice")));
            }
        }

        self.behaviors
            .iter()
            .map(|template| ConditionalBehavior::from_template(template, catalog))
            .collect()
    }
}

#[derive(Debug)]
struct Prototype {
    archetype: Archetype,
    units: Vec<ConditionalBehavior>,
}

/// Validated archetypes, ready to instantiate.
#[derive(Debug, Default)]
pub struct ArchetypeLibrary {
    prototypes: AHashMap<String, Prototype>,
    order: Vec<String>,
}

impl ArchetypeLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding the built-in archetypes.
    pub fn builtin(catalog: &CapabilityCatalog) -> ConfigResult<Self> {
        let mut library = Self::new();
        let rejected = library.load_ron(BUILTIN_ARCHETYPES, catalog)?;
        debug_assert!(rejected.is_empty(), "built-in archetypes rejected: {rejected:?}");
        Ok(library)
    }

    /// Parses a RON list of archetypes and adds every valid one.
    ///
    /// A syntax error fails the whole load. Records that parse but fail
    /// validation are skipped and returned.
    pub fn load_ron(&mut self, source: &str, catalog: &CapabilityCatalog) -> ConfigResult<Vec<ConfigError>> {
        let records: Vec<Archetype> =
            ron::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut rejected = Vec::new();
        for record in records {
            let name = record.name.clone();
            if let Err(e) = self.insert(record, catalog) {
                warn!(archetype = %name, "skipping archetype: {}", e);
                rejected.push(e);
            }
        }
        info!(loaded = self.len(), rejected = rejected.len(), "archetypes loaded");
        Ok(rejected)
    }

    /// Reads and loads a RON archetype file.
    pub fn load_file(&mut self, path: &Path, catalog: &CapabilityCatalog) -> ConfigResult<Vec<ConfigError>> {
        let source = std::fs::read_to_string(path)?;
        info!("Loading archetypes from {:?}", path);
        self.load_ron(&source, catalog)
    }

    /// Validates and adds one archetype, replacing any with the same name.
    pub fn insert(&mut self, archetype: Archetype, catalog: &CapabilityCatalog) -> ConfigResult<()> {
        let units = archetype.validate(catalog)?;
        let name = archetype.name.clone();
        if self
            .prototypes
            .insert(name.clone(), Prototype { archetype, units })
            .is_some()
        {
            debug!(archetype = %name, "archetype replaced");
        } else {
            self.order.push(name);
        }
        Ok(())
    }

    /// Looks up an archetype.
    pub fn get(&self, name: &str) -> ConfigResult<&Archetype> {
        self.prototypes
            .get(name)
            .map(|prototype| &prototype.archetype)
            .ok_or_else(|| ConfigError::MissingArchetype(name.to_string()))
    }

    /// Whether an archetype is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.prototypes.contains_key(name)
    }

    /// Archetype names in load order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Number of archetypes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    /// Returns true if the library is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }

    /// Builds a new entity. The state machine parameters and every behavior
    /// unit are fresh per-entity copies.
    pub fn instantiate(&self, name: &str, position: Vec2) -> ConfigResult<Entity> {
        let prototype = self
            .prototypes
            .get(name)
            .ok_or_else(|| ConfigError::MissingArchetype(name.to_string()))?;
        let archetype = &prototype.archetype;

        let agent = Agent::new(
            archetype.category,
            archetype.name.clone(),
            position,
            ResourceLedger::new(archetype.max_health, archetype.health_regen),
            ManaPool::new(archetype.max_mana, archetype.mana_regen),
            archetype.stats(),
        );
        let fsm = UtilityStateMachine::from_kinds(&archetype.states, archetype.behavior_parameters());
        let executor = BehaviorExecutor::with_units(
            prototype
                .units
                .iter()
                .map(ConditionalBehavior::clone_for_instance)
                .collect(),
        );
        Ok(Entity::new(agent, Brain::new(fsm, executor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn catalog() -> CapabilityCatalog {
        CapabilityCatalog::with_defaults()
    }

    #[test]
    fn test_builtin_archetypes_load() {
        let library = ArchetypeLibrary::builtin(&catalog()).expect("built-ins should parse");
        assert_eq!(
            library.names(),
            vec!["warrior", "goblin", "shaman", "spike_trap", "deer"]
        );
        let goblin = library.get("goblin").expect("goblin exists");
        assert_eq!(goblin.category, EntityCategory::Enemy);
        assert_eq!(goblin.behavior_parameters().target_weights.len(), 2);
    }

    #[test]
    fn test_missing_archetype() {
        let library = ArchetypeLibrary::new();
        assert!(matches!(
            library.get("dragon"),
            Err(ConfigError::MissingArchetype(_))
        ));
        assert!(library.instantiate("dragon", Vec2::ZERO).is_err());
    }

    #[test]
    fn test_bad_record_is_isolated() {
        let source = r#"[
            (name: "ok", category: Enemy, states: [Idle]),
            (name: "bad", category: Enemy, behaviors: [(name: "x", action: Some(Kind("teleport")))]),
            (name: "", category: Enemy),
            (name: "weak", category: Enemy, max_health: -5.0),
        ]"#;
        let mut library = ArchetypeLibrary::new();
        let rejected = library.load_ron(source, &catalog()).expect("file should parse");

        assert_eq!(library.names(), vec!["ok"]);
        assert_eq!(rejected.len(), 3);
        assert!(matches!(rejected[0], ConfigError::UnknownKind { family: "action", .. }));
        assert!(matches!(rejected[1], ConfigError::InvalidArchetype { .. }));
    }

    #[test]
    fn test_syntax_error_fails_load() {
        let mut library = ArchetypeLibrary::new();
        let result = library.load_ron("[ (name: ", &catalog());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_duplicate_state_rejected() {
        let archetype = Archetype {
            name: "twice".to_string(),
            states: vec![StateKind::Idle, StateKind::Idle],
            ..Archetype::default()
        };
        assert!(archetype.validate(&catalog()).is_err());
    }

    #[test]
    fn test_instances_do_not_share_state() {
        let library = ArchetypeLibrary::builtin(&catalog()).expect("built-ins should parse");
        let mut a = library
            .instantiate("warrior", Vec2::ZERO)
            .expect("warrior exists");
        let b = library
            .instantiate("warrior", Vec2::new(5.0, 0.0))
            .expect("warrior exists");

        assert_ne!(a.id(), b.id());
        let (_, brain) = a.split_mut();
        brain
            .fsm_mut()
            .expect("warrior has a state machine")
            .params_mut()
            .aggro_distance
            .set(30.0);

        let b_params = b.brain().fsm().expect("warrior has a state machine").params();
        assert_eq!(b_params.aggro_distance.value(), 12.0);
        assert_eq!(
            library
                .get("warrior")
                .expect("warrior exists")
                .parameters
                .aggro_distance
                .value(),
            12.0
        );
    }

    #[test]
    fn test_hazard_has_no_state_machine() {
        let library = ArchetypeLibrary::builtin(&catalog()).expect("built-ins should parse");
        let trap = library
            .instantiate("spike_trap", Vec2::ZERO)
            .expect("trap exists");
        assert!(trap.brain().fsm().is_none());
        assert_eq!(trap.brain().executor().len(), 1);
    }

    #[test]
    fn test_load_file() {
        let file = NamedTempFile::new().expect("Failed to create temp file");
        std::fs::write(file.path(), BUILTIN_ARCHETYPES).expect("Failed to write archetypes");

        let mut library = ArchetypeLibrary::new();
        let rejected = library
            .load_file(file.path(), &catalog())
            .expect("file should load");
        assert!(rejected.is_empty());
        assert_eq!(library.len(), 5);
    }

    #[test]
    fn test_load_missing_file() {
        let mut library = ArchetypeLibrary::new();
        let result = library.load_file(Path::new("/nonexistent/archetypes.ron"), &catalog());
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
