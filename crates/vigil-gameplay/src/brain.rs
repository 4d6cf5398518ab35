//! Decision-making side of an entity.

use tracing::{debug, trace};
use vigil_common::ConfigResult;

use crate::behavior::executor::{BehaviorExecutor, SavedBehaviors, UnitHandle};
use crate::behavior::unit::ConditionalBehavior;
use crate::catalog::CapabilityCatalog;
use crate::context::TickContext;
use crate::entity::Agent;
use crate::events::GameEvent;
use crate::fsm::{StateKind, UtilityStateMachine};
use crate::registry::EntityRegistry;
use crate::status::{StatusEffects, StatusKind, StatusOutcome};

/// An entity's state machine, behavior units and status effect slot.
///
/// Per tick: the status timer counts down, then the state machine runs
/// (suspended while a status effect is active), then the behavior units.
#[derive(Debug, Default)]
pub struct Brain {
    fsm: Option<UtilityStateMachine>,
    executor: BehaviorExecutor,
    status: StatusEffects,
}

impl Brain {
    /// Creates a brain. Either half may be empty.
    #[must_use]
    pub fn new(fsm: Option<UtilityStateMachine>, executor: BehaviorExecutor) -> Self {
        Self {
            fsm,
            executor,
            status: StatusEffects::new(),
        }
    }

    /// The state machine, if the archetype has one.
    #[must_use]
    pub const fn fsm(&self) -> Option<&UtilityStateMachine> {
        self.fsm.as_ref()
    }

    /// The state machine, mutably.
    pub fn fsm_mut(&mut self) -> Option<&mut UtilityStateMachine> {
        self.fsm.as_mut()
    }

    /// The behavior executor.
    #[must_use]
    pub const fn executor(&self) -> &BehaviorExecutor {
        &self.executor
    }

    /// The status effect slot.
    #[must_use]
    pub const fn status(&self) -> &StatusEffects {
        &self.status
    }

    /// Active state of the state machine.
    #[must_use]
    pub fn current_state(&self) -> Option<StateKind> {
        self.fsm.as_ref().and_then(UtilityStateMachine::current_state)
    }

    /// Fires setup hooks and enters the default state.
    pub fn initialize(&mut self, agent: &Agent, ctx: &mut TickContext<'_>) {
        self.executor.initialize(agent, ctx.registry);
        if let Some(fsm) = &mut self.fsm {
            fsm.initialize(agent, ctx);
        }
    }

    /// Runs one decision step.
    pub fn tick(&mut self, agent: &mut Agent, ctx: &mut TickContext<'_>) {
        if agent.is_dead() {
            return;
        }
        if let Some(kind) = self.status.tick(ctx.dt, &mut self.executor, agent, ctx.registry) {
            ctx.commands.notify(GameEvent::StatusExpired {
                entity_id: agent.id(),
                kind,
            });
        }
        if !self.status.is_active() {
            if let Some(fsm) = &mut self.fsm {
                fsm.tick(agent, ctx);
            }
        }
        let executed = self.executor.tick(agent, ctx);
        trace!(entity = %agent.id(), executed = executed.len(), "behaviors ran");
    }

    /// Exits the active state and cleans up every unit.
    pub fn teardown(&mut self, agent: &Agent, ctx: &TickContext<'_>) {
        if let Some(fsm) = &mut self.fsm {
            fsm.shutdown(agent, ctx);
        }
        self.status.discard();
        self.executor.cleanup_all();
    }

    /// Starts, refreshes or replaces a status effect.
    pub fn apply_status(
        &mut self,
        kind: StatusKind,
        duration: f32,
        catalog: &CapabilityCatalog,
        agent: &Agent,
        ctx: &mut TickContext<'_>,
    ) -> ConfigResult<StatusOutcome> {
        let units = kind.build_units(catalog)?;
        let outcome = self
            .status
            .apply(kind, duration, units, &mut self.executor, agent, ctx.registry);
        if outcome != StatusOutcome::Ignored {
            ctx.commands.notify(GameEvent::StatusApplied {
                entity_id: agent.id(),
                kind,
                duration,
            });
        }
        Ok(outcome)
    }

    /// Ends the active status effect early.
    pub fn clear_status(&mut self, agent: &Agent, ctx: &mut TickContext<'_>) -> Option<StatusKind> {
        let kind = self.status.clear(&mut self.executor, agent, ctx.registry)?;
        ctx.commands.notify(GameEvent::StatusExpired {
            entity_id: agent.id(),
            kind,
        });
        Some(kind)
    }

    /// Attaches a behavior unit. While a status effect is active the unit
    /// joins the saved set and starts running once the effect ends.
    pub fn add_behavior(
        &mut self,
        unit: ConditionalBehavior,
        agent: &Agent,
        registry: &dyn EntityRegistry,
    ) -> UnitHandle {
        match self.status.saved_mut() {
            Some(saved) => {
                debug!(entity = %agent.id(), unit = unit.name(), "behavior queued behind status");
                self.executor.add_to_saved(saved, unit)
            }
            None => self.executor.add(unit, agent, registry),
        }
    }

    /// Detaches a behavior unit, looking in the saved set first while a
    /// status effect is active.
    pub fn remove_behavior(&mut self, handle: UnitHandle) -> Option<ConditionalBehavior> {
        self.status
            .saved_mut()
            .and_then(|saved| saved.remove(handle))
            .or_else(|| self.executor.remove(handle))
    }

    /// Swaps the whole behavior set. While a status effect is active the
    /// saved set is swapped instead, so the effect keeps running.
    pub fn replace_behaviors(
        &mut self,
        units: Vec<ConditionalBehavior>,
        agent: &Agent,
        registry: &dyn EntityRegistry,
    ) -> SavedBehaviors {
        match self.status.saved_mut() {
            Some(saved) => self.executor.replace_saved(saved, units),
            None => self.executor.replace_all(units, agent, registry),
        }
    }

    /// Reinstates a saved behavior set. While a status effect is active it
    /// becomes the set restored when the effect ends.
    pub fn restore_behaviors(
        &mut self,
        saved: SavedBehaviors,
        agent: &Agent,
        registry: &dyn EntityRegistry,
    ) -> Vec<ConditionalBehavior> {
        match self.status.saved_mut() {
            Some(pending) => std::mem::replace(pending, saved).into_units(),
            None => self.executor.restore(saved, agent, registry),
        }
    }
}
