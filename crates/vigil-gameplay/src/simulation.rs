//! Two-phase simulation stepping.
//!
//! A tick runs in a fixed order:
//!
//! 1. Capture a registry snapshot and queue regeneration.
//! 2. Decision phase: every live entity ticks its brain against the
//!    snapshot. Health writes are collected as requests, never applied.
//! 3. Requests are queued on their targets' ledgers in issue order.
//! 4. Drain phase: every ledger drains exactly once; deaths are recorded.
//! 5. Dead entities are torn down and removed.
//! 6. Events and telemetry are published.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use vigil_common::{ConfigError, EntityId, Vec2};

use crate::archetype::ArchetypeLibrary;
use crate::behavior::executor::{SavedBehaviors, UnitHandle};
use crate::behavior::unit::{ConditionalBehavior, UnitTemplate};
use crate::catalog::CapabilityCatalog;
use crate::context::{CommandBuffer, TickContext};
use crate::entity::{Entity, EntityArena, EntityError};
use crate::events::{DestroyReason, EventBus, GameEvent};
use crate::fsm::{BehaviorParameters, StateKind};
use crate::registry::RegistrySnapshot;
use crate::resources::HealthEvent;
use crate::status::{StatusKind, StatusOutcome};
use crate::telemetry::{EntityTelemetry, TelemetryFrame, TelemetryHandle};

/// Errors from simulation-level operations.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Entity lookup failed
    #[error(transparent)]
    Entity(#[from] EntityError),
    /// Archetype or capability configuration failed
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for simulation operations.
pub type SimulationResult<T> = Result<T, SimulationError>;

/// What happened during one [`Simulation::step`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickSummary {
    /// Tick number
    pub tick: u64,
    /// Simulation time at the end of the tick
    pub time: f64,
    /// Health requests queued onto ledgers
    pub requests_applied: usize,
    /// Entities that died in the drain phase
    pub deaths: Vec<EntityId>,
    /// Entities removed at the end of the tick
    pub removed: Vec<EntityId>,
    /// Events published to the bus
    pub events_published: usize,
}

/// Owns every entity and drives ticks.
#[derive(Debug)]
pub struct Simulation {
    arena: EntityArena,
    catalog: CapabilityCatalog,
    library: ArchetypeLibrary,
    events: EventBus,
    telemetry: TelemetryHandle,
    tick: u64,
    time: f64,
    pending_removals: Vec<(EntityId, DestroyReason)>,
}

impl Simulation {
    /// Creates an empty simulation.
    #[must_use]
    pub fn new(catalog: CapabilityCatalog, library: ArchetypeLibrary) -> Self {
        Self {
            arena: EntityArena::new(),
            catalog,
            library,
            events: EventBus::default(),
            telemetry: TelemetryHandle::new(),
            tick: 0,
            time: 0.0,
            pending_removals: Vec::new(),
        }
    }

    /// Creates a simulation with the default catalog and built-in
    /// archetypes.
    pub fn with_builtins() -> SimulationResult<Self> {
        let catalog = CapabilityCatalog::with_defaults();
        let library = ArchetypeLibrary::builtin(&catalog)?;
        Ok(Self::new(catalog, library))
    }

    /// Uses a different event bus (for a custom capacity).
    #[must_use]
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Entity storage.
    #[must_use]
    pub const fn arena(&self) -> &EntityArena {
        &self.arena
    }

    /// Capability catalog.
    #[must_use]
    pub const fn catalog(&self) -> &CapabilityCatalog {
        &self.catalog
    }

    /// Archetype library.
    #[must_use]
    pub const fn library(&self) -> &ArchetypeLibrary {
        &self.library
    }

    /// Archetype library, for loading more records.
    pub fn library_mut(&mut self) -> &mut ArchetypeLibrary {
        &mut self.library
    }

    /// Library and catalog together, for loading records that reference
    /// the catalog.
    pub fn library_and_catalog(&mut self) -> (&mut ArchetypeLibrary, &CapabilityCatalog) {
        (&mut self.library, &self.catalog)
    }

    /// Event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Handle to the telemetry frame.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry.clone()
    }

    /// Ticks completed.
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Simulation time in seconds.
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Number of entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns true if there are no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Looks up an entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.arena.get(id).ok()
    }

    /// Active state of an entity's state machine.
    #[must_use]
    pub fn current_state(&self, id: EntityId) -> Option<StateKind> {
        self.entity(id).and_then(|entity| entity.brain().current_state())
    }

    /// Builds an entity from an archetype, initializes it and registers it.
    pub fn spawn(&mut self, archetype: &str, position: Vec2) -> SimulationResult<EntityId> {
        let mut entity = self.library.instantiate(archetype, position)?;
        let snapshot = RegistrySnapshot::capture(&self.arena);
        let mut commands = CommandBuffer::new();
        {
            let mut ctx = TickContext::new(&snapshot, &mut commands, self.tick, self.time, 0.0);
            let (agent, brain) = entity.split_mut();
            brain.initialize(agent, &mut ctx);
        }

        let category = entity.category();
        let id = self.arena.insert(entity)?;
        info!(entity = %id, archetype, "spawned");

        self.events.publish(GameEvent::EntitySpawned {
            entity_id: id,
            category,
            archetype: archetype.to_string(),
        });
        for notice in commands.take_notices() {
            self.events.publish(notice);
        }
        Ok(id)
    }

    /// Removes an entity now. Returns `false` if it was already gone.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.remove_entity(id, DestroyReason::Despawned)
    }

    /// Queues a health delta from outside the simulation. It is applied in
    /// the next drain phase.
    pub fn enqueue_health_delta(&mut self, id: EntityId, amount: f32) -> SimulationResult<()> {
        self.arena
            .get_mut(id)?
            .agent_mut()
            .health_mut()
            .enqueue_delta(amount);
        Ok(())
    }

    /// Changes an entity's maximum health. Events surface in the next drain
    /// phase.
    pub fn set_max_health(&mut self, id: EntityId, new_max: f32, adjust_current: bool) -> SimulationResult<()> {
        self.arena
            .get_mut(id)?
            .agent_mut()
            .health_mut()
            .set_max_health(new_max, adjust_current);
        Ok(())
    }

    /// An entity's learnable parameters, for a tuning process.
    pub fn parameters_mut(&mut self, id: EntityId) -> SimulationResult<Option<&mut BehaviorParameters>> {
        let (_, brain) = self.arena.get_mut(id)?.split_mut();
        Ok(brain.fsm_mut().map(|fsm| fsm.params_mut()))
    }

    /// Starts, refreshes or replaces a status effect on an entity.
    pub fn apply_status(&mut self, id: EntityId, kind: StatusKind, duration: f32) -> SimulationResult<StatusOutcome> {
        let snapshot = RegistrySnapshot::capture(&self.arena);
        let mut commands = CommandBuffer::new();
        let outcome = {
            let entity = self.arena.get_mut(id)?;
            let mut ctx = TickContext::new(&snapshot, &mut commands, self.tick, self.time, 0.0);
            let (agent, brain) = entity.split_mut();
            brain.apply_status(kind, duration, &self.catalog, agent, &mut ctx)?
        };
        for notice in commands.take_notices() {
            self.events.publish(notice);
        }
        Ok(outcome)
    }

    /// Ends an entity's status effect early.
    pub fn clear_status(&mut self, id: EntityId) -> SimulationResult<Option<StatusKind>> {
        let snapshot = RegistrySnapshot::capture(&self.arena);
        let mut commands = CommandBuffer::new();
        let cleared = {
            let entity = self.arena.get_mut(id)?;
            let mut ctx = TickContext::new(&snapshot, &mut commands, self.tick, self.time, 0.0);
            let (agent, brain) = entity.split_mut();
            brain.clear_status(agent, &mut ctx)
        };
        for notice in commands.take_notices() {
            self.events.publish(notice);
        }
        Ok(cleared)
    }

    /// Attaches a behavior unit to an entity.
    pub fn add_behavior(&mut self, id: EntityId, unit: ConditionalBehavior) -> SimulationResult<UnitHandle> {
        let snapshot = RegistrySnapshot::capture(&self.arena);
        let (agent, brain) = self.arena.get_mut(id)?.split_mut();
        Ok(brain.add_behavior(unit, agent, &snapshot))
    }

    /// Builds a unit from a template and attaches it.
    pub fn add_behavior_template(&mut self, id: EntityId, template: &UnitTemplate) -> SimulationResult<UnitHandle> {
        let unit = ConditionalBehavior::from_template(template, &self.catalog)?;
        self.add_behavior(id, unit)
    }

    /// Detaches a behavior unit from an entity.
    pub fn remove_behavior(&mut self, id: EntityId, handle: UnitHandle) -> SimulationResult<Option<ConditionalBehavior>> {
        let (_, brain) = self.arena.get_mut(id)?.split_mut();
        Ok(brain.remove_behavior(handle))
    }

    /// Swaps an entity's whole behavior set, returning the old one. During
    /// a status effect this swaps the set restored when it ends.
    pub fn replace_behaviors(&mut self, id: EntityId, units: Vec<ConditionalBehavior>) -> SimulationResult<SavedBehaviors> {
        let snapshot = RegistrySnapshot::capture(&self.arena);
        let (agent, brain) = self.arena.get_mut(id)?.split_mut();
        Ok(brain.replace_behaviors(units, agent, &snapshot))
    }

    /// Reinstates a saved behavior set on an entity.
    pub fn restore_behaviors(&mut self, id: EntityId, saved: SavedBehaviors) -> SimulationResult<Vec<ConditionalBehavior>> {
        let snapshot = RegistrySnapshot::capture(&self.arena);
        let (agent, brain) = self.arena.get_mut(id)?.split_mut();
        Ok(brain.restore_behaviors(saved, agent, &snapshot))
    }

    /// Advances the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f32) -> TickSummary {
        let dt = if dt.is_finite() && dt >= 0.0 {
            dt
        } else {
            warn!(dt, "invalid step length, using 0");
            0.0
        };
        self.tick += 1;

        let snapshot = RegistrySnapshot::capture(&self.arena);
        let mut commands = CommandBuffer::new();
        let mut outbox = Vec::new();

        for entity in self.arena.iter_mut().filter(|entity| entity.is_alive()) {
            let agent = entity.agent_mut();
            agent.health_mut().regenerate(dt);
            agent.mana_mut().regenerate(dt);
        }

        // Decision phase
        {
            let mut ctx = TickContext::new(&snapshot, &mut commands, self.tick, self.time, dt);
            for entity in self.arena.iter_mut() {
                entity.tick(&mut ctx);
            }
        }
        outbox.extend(commands.take_notices());

        let mut requests_applied = 0;
        for request in commands.take_requests() {
            match self.arena.get_mut(request.target) {
                Ok(target) if target.is_alive() => {
                    target.agent_mut().health_mut().enqueue_delta(request.amount);
                    requests_applied += 1;
                }
                _ => trace!(source = %request.source, target = %request.target, "request target gone"),
            }
        }

        // Drain phase
        let mut deaths = Vec::new();
        for entity in self.arena.iter_mut() {
            let id = entity.id();
            let ledger = entity.agent_mut().health_mut();
            ledger.drain_queue();
            for event in ledger.take_events() {
                match event {
                    HealthEvent::Changed { old, new } => {
                        outbox.push(GameEvent::HealthChanged {
                            entity_id: id,
                            old,
                            new,
                        });
                    }
                    HealthEvent::Died => {
                        outbox.push(GameEvent::Died { entity_id: id });
                        deaths.push(id);
                    }
                }
            }
            if entity.agent().is_dead() && entity.mark_dead() {
                debug!(entity = %id, "died");
                if !deaths.contains(&id) {
                    deaths.push(id);
                }
            }
        }
        let events_published = outbox.len();
        for event in outbox {
            self.events.publish(event);
        }

        self.pending_removals
            .extend(deaths.iter().map(|id| (*id, DestroyReason::Died)));
        let removed = self.flush_removals();
        let events_published = events_published + removed.len();

        self.time += f64::from(dt);
        self.publish_telemetry();

        TickSummary {
            tick: self.tick,
            time: self.time,
            requests_applied,
            deaths,
            removed,
            events_published,
        }
    }

    /// Runs `ticks` steps and returns their summaries.
    pub fn run(&mut self, ticks: u64, dt: f32) -> Vec<TickSummary> {
        (0..ticks).map(|_| self.step(dt)).collect()
    }

    fn flush_removals(&mut self) -> Vec<EntityId> {
        let pending = std::mem::take(&mut self.pending_removals);
        pending
            .into_iter()
            .filter(|(id, reason)| self.remove_entity(*id, *reason))
            .map(|(id, _)| id)
            .collect()
    }

    fn remove_entity(&mut self, id: EntityId, reason: DestroyReason) -> bool {
        let Ok(mut entity) = self.arena.remove(id) else {
            trace!(entity = %id, "already removed");
            return false;
        };
        entity.mark_dead();

        let snapshot = RegistrySnapshot::capture(&self.arena);
        let mut commands = CommandBuffer::new();
        {
            let mut ctx = TickContext::new(&snapshot, &mut commands, self.tick, self.time, 0.0);
            entity.teardown(&mut ctx);
        }
        info!(entity = %id, ?reason, "removed");
        self.events.publish(GameEvent::EntityDestroyed {
            entity_id: id,
            reason,
        });
        true
    }

    fn publish_telemetry(&self) {
        self.telemetry.publish(TelemetryFrame {
            tick: self.tick,
            time: self.time,
            entities: self.arena.iter().map(EntityTelemetry::capture).collect(),
        });
    }
}
