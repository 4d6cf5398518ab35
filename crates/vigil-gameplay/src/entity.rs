//! Entities and arena-based entity storage.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vigil_common::{EntityId, Vec2};

use crate::brain::Brain;
use crate::context::TickContext;
use crate::resources::{ManaPool, ResourceLedger};

/// Error types for entity operations.
#[derive(Debug, Error)]
pub enum EntityError {
    /// Entity not found
    #[error("Entity not found: {0}")]
    NotFound(EntityId),
    /// Entity already registered
    #[error("Entity already registered: {0}")]
    AlreadyRegistered(EntityId),
}

/// Result type for entity operations.
pub type EntityResult<T> = Result<T, EntityError>;

/// Broad classification used for targeting and registry lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityCategory {
    /// Player-controlled or player-allied
    Player,
    /// Hostile to players
    Enemy,
    /// Environmental damage source
    Hazard,
    /// Ignored by everyone unless provoked
    Neutral,
}

impl EntityCategory {
    /// All categories in enumeration order.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Player, Self::Enemy, Self::Hazard, Self::Neutral]
    }

    /// Display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Player => "Player",
            Self::Enemy => "Enemy",
            Self::Hazard => "Hazard",
            Self::Neutral => "Neutral",
        }
    }
}

/// Static combat and movement numbers copied from an archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentStats {
    /// Movement speed in world units per second
    pub speed: f32,
    /// Damage per attack
    pub damage: f32,
    /// How far the agent can perceive other entities
    pub sensor_range: f32,
    /// Fallback seconds between attacks
    pub attack_cooldown: f32,
    /// Categories this agent treats as targets
    pub target_categories: Vec<EntityCategory>,
}

impl Default for AgentStats {
    fn default() -> Self {
        Self {
            speed: 3.0,
            damage: 10.0,
            sensor_range: 15.0,
            attack_cooldown: 1.0,
            target_categories: Vec::new(),
        }
    }
}

/// The physical side of an entity: identity, position and vital resources.
///
/// This is what behaviors and states act upon. It is kept apart from the
/// entity's [`Brain`] so both can be borrowed mutably at once.
#[derive(Debug, Clone)]
pub struct Agent {
    id: EntityId,
    category: EntityCategory,
    archetype: String,
    position: Vec2,
    health: ResourceLedger,
    mana: ManaPool,
    stats: AgentStats,
}

impl Agent {
    /// Creates a new agent with a fresh ID.
    #[must_use]
    pub fn new(
        category: EntityCategory,
        archetype: impl Into<String>,
        position: Vec2,
        health: ResourceLedger,
        mana: ManaPool,
        stats: AgentStats,
    ) -> Self {
        Self {
            id: EntityId::new(),
            category,
            archetype: archetype.into(),
            position,
            health,
            mana,
            stats,
        }
    }

    /// Returns the agent's unique ID.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns the agent's category.
    #[must_use]
    pub const fn category(&self) -> EntityCategory {
        self.category
    }

    /// Returns the archetype name this agent was built from.
    #[must_use]
    pub fn archetype(&self) -> &str {
        &self.archetype
    }

    /// Returns the world position.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.position
    }

    /// Sets the world position.
    pub fn set_position(&mut self, pos: Vec2) {
        self.position = pos;
    }

    /// Returns the health ledger.
    #[must_use]
    pub const fn health(&self) -> &ResourceLedger {
        &self.health
    }

    /// Returns the health ledger mutably.
    pub fn health_mut(&mut self) -> &mut ResourceLedger {
        &mut self.health
    }

    /// Returns the mana pool.
    #[must_use]
    pub const fn mana(&self) -> &ManaPool {
        &self.mana
    }

    /// Returns the mana pool mutably.
    pub fn mana_mut(&mut self) -> &mut ManaPool {
        &mut self.mana
    }

    /// Returns the agent's stats.
    #[must_use]
    pub const fn stats(&self) -> &AgentStats {
        &self.stats
    }

    /// Returns whether the health ledger has died.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.health.is_dead()
    }
}

/// A live simulation participant.
#[derive(Debug)]
pub struct Entity {
    agent: Agent,
    brain: Brain,
    alive: bool,
}

impl Entity {
    /// Creates a new, live entity.
    #[must_use]
    pub fn new(agent: Agent, brain: Brain) -> Self {
        Self {
            agent,
            brain,
            alive: true,
        }
    }

    /// Returns the entity's unique ID.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.agent.id
    }

    /// Returns the entity category.
    #[must_use]
    pub const fn category(&self) -> EntityCategory {
        self.agent.category
    }

    /// Returns the physical side of the entity.
    #[must_use]
    pub const fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Returns the physical side of the entity mutably.
    pub fn agent_mut(&mut self) -> &mut Agent {
        &mut self.agent
    }

    /// Returns the decision-making side of the entity.
    #[must_use]
    pub const fn brain(&self) -> &Brain {
        &self.brain
    }

    /// Returns both halves mutably.
    pub fn split_mut(&mut self) -> (&mut Agent, &mut Brain) {
        (&mut self.agent, &mut self.brain)
    }

    /// Returns whether the entity is still live.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.alive
    }

    /// Flips liveness off. Returns `false` if it was already off.
    pub fn mark_dead(&mut self) -> bool {
        std::mem::replace(&mut self.alive, false)
    }

    /// Runs one decision step. Dead entities do nothing.
    pub fn tick(&mut self, ctx: &mut TickContext<'_>) {
        if !self.alive {
            return;
        }
        self.brain.tick(&mut self.agent, ctx);
    }

    /// Fires exit/cleanup hooks before the entity is dropped.
    pub fn teardown(&mut self, ctx: &mut TickContext<'_>) {
        self.brain.teardown(&self.agent, ctx);
    }
}

/// Arena-based entity storage for efficient allocation and lookup.
///
/// Uses a free list for O(1) allocation and deallocation, a map from
/// EntityId to slot index for O(1) access, and a per-category index for
/// typed lookups. Removal clears every index.
#[derive(Debug, Default)]
pub struct EntityArena {
    /// Storage slots for entities
    entities: Vec<Option<Entity>>,
    /// Free slot indices for reuse
    free_list: Vec<usize>,
    /// Map from EntityId to slot index for fast lookup
    id_to_index: AHashMap<EntityId, usize>,
    /// Entity IDs per category, in insertion order
    by_category: AHashMap<EntityCategory, Vec<EntityId>>,
}

impl EntityArena {
    /// Creates a new empty entity arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_index.len()
    }

    /// Returns true if there are no stored entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_index.is_empty()
    }

    /// Inserts an entity into the arena.
    pub fn insert(&mut self, entity: Entity) -> EntityResult<EntityId> {
        let id = entity.id();
        if self.id_to_index.contains_key(&id) {
            return Err(EntityError::AlreadyRegistered(id));
        }
        let category = entity.category();

        let index = if let Some(free_index) = self.free_list.pop() {
            // Reuse a free slot
            self.entities[free_index] = Some(entity);
            free_index
        } else {
            // Allocate a new slot
            let index = self.entities.len();
            self.entities.push(Some(entity));
            index
        };

        self.id_to_index.insert(id, index);
        self.by_category.entry(category).or_default().push(id);
        Ok(id)
    }

    /// Removes an entity by ID, returning it.
    pub fn remove(&mut self, id: EntityId) -> EntityResult<Entity> {
        let index = self
            .id_to_index
            .remove(&id)
            .ok_or(EntityError::NotFound(id))?;

        let entity = self.entities[index]
            .take()
            .ok_or(EntityError::NotFound(id))?;

        if let Some(ids) = self.by_category.get_mut(&entity.category()) {
            ids.retain(|other| *other != id);
        }
        self.free_list.push(index);
        Ok(entity)
    }

    /// Gets a reference to an entity by ID.
    pub fn get(&self, id: EntityId) -> EntityResult<&Entity> {
        let index = self.id_to_index.get(&id).ok_or(EntityError::NotFound(id))?;

        self.entities[*index]
            .as_ref()
            .ok_or(EntityError::NotFound(id))
    }

    /// Gets a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> EntityResult<&mut Entity> {
        let index = self.id_to_index.get(&id).ok_or(EntityError::NotFound(id))?;

        self.entities[*index]
            .as_mut()
            .ok_or(EntityError::NotFound(id))
    }

    /// Checks if an entity with the given ID exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.id_to_index.contains_key(&id)
    }

    /// Returns an iterator over all stored entities in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter_map(|opt| opt.as_ref())
    }

    /// Returns a mutable iterator over all stored entities in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut().filter_map(|opt| opt.as_mut())
    }

    /// Returns the IDs of entities in a category, in insertion order.
    #[must_use]
    pub fn ids_by_category(&self, category: EntityCategory) -> &[EntityId] {
        self.by_category
            .get(&category)
            .map_or(&[], |ids| ids.as_slice())
    }

    /// Returns all entity IDs in slot order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.iter().map(Entity::id).collect()
    }
}
