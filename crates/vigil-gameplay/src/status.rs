//! Timed status effects that take over an entity's behavior set.
//!
//! Applying an effect swaps the executor's units for the effect's own units
//! and keeps the previous set aside. When the effect expires or is cleared
//! the saved set is put back. Only one effect is active at a time: applying
//! a different effect swaps in its units but keeps the set saved by the
//! first one, and re-applying the active effect only refreshes its timer.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use vigil_common::ConfigResult;

use crate::behavior::action::{ActionConfig, ChaseConfig, MeleeConfig};
use crate::behavior::executor::{BehaviorExecutor, SavedBehaviors};
use crate::behavior::unit::{ActionSpec, ConditionalBehavior, UnitTemplate};
use crate::catalog::CapabilityCatalog;
use crate::entity::Agent;
use crate::registry::EntityRegistry;
use crate::targeting::TargetFilter;

/// Priority of status effect units.
pub const STATUS_PRIORITY: i32 = 1_000;

/// Kinds of status effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    /// Attacks its own allies
    Charm,
    /// Runs from whatever it was hunting
    Confuse,
    /// Does nothing
    Stun,
}

impl StatusKind {
    /// Display name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Charm => "charm",
            Self::Confuse => "confuse",
            Self::Stun => "stun",
        }
    }

    /// Unit templates installed while the effect is active.
    #[must_use]
    pub fn templates(self) -> Vec<UnitTemplate> {
        let unit = |name: &str, action: ActionSpec, priority: i32, exclusive: bool| UnitTemplate {
            name: format!("{}:{name}", self.name()),
            action: Some(action),
            conditions: Vec::new(),
            priority,
            exclusive,
        };
        match self {
            Self::Stun => vec![unit("hold", ActionSpec::Kind("idle".to_string()), STATUS_PRIORITY, true)],
            Self::Confuse => vec![unit("scatter", ActionSpec::Kind("flee".to_string()), STATUS_PRIORITY, true)],
            Self::Charm => vec![
                unit(
                    "strike",
                    ActionSpec::Config(ActionConfig::Melee(MeleeConfig {
                        target: TargetFilter::Allies,
                        ..MeleeConfig::default()
                    })),
                    STATUS_PRIORITY,
                    false,
                ),
                unit(
                    "pursue",
                    ActionSpec::Config(ActionConfig::Chase(ChaseConfig {
                        target: TargetFilter::Allies,
                        stop_distance: 1.0,
                        ..ChaseConfig::default()
                    })),
                    STATUS_PRIORITY - 1,
                    false,
                ),
            ],
        }
    }

    /// Builds cold units for the effect.
    pub fn build_units(self, catalog: &CapabilityCatalog) -> ConfigResult<Vec<ConditionalBehavior>> {
        self.templates()
            .iter()
            .map(|template| ConditionalBehavior::from_template(template, catalog))
            .collect()
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What [`StatusEffects::apply`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// No effect was active; the behavior set was saved and replaced
    Applied,
    /// The same effect was active; only its timer was reset
    Refreshed,
    /// A different effect was active and has been replaced
    Replaced(StatusKind),
    /// Non-positive or non-finite duration; nothing happened
    Ignored,
}

#[derive(Debug)]
struct ActiveStatus {
    kind: StatusKind,
    remaining: f32,
    saved: SavedBehaviors,
}

/// The status effect slot of one entity.
#[derive(Debug, Default)]
pub struct StatusEffects {
    active: Option<ActiveStatus>,
}

impl StatusEffects {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Active effect kind.
    #[must_use]
    pub fn active(&self) -> Option<StatusKind> {
        self.active.as_ref().map(|status| status.kind)
    }

    /// Seconds left on the active effect.
    #[must_use]
    pub fn remaining(&self) -> Option<f32> {
        self.active.as_ref().map(|status| status.remaining)
    }

    /// Whether an effect is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The behavior set that comes back when the active effect ends.
    pub fn saved_mut(&mut self) -> Option<&mut SavedBehaviors> {
        self.active.as_mut().map(|status| &mut status.saved)
    }

    /// Starts, refreshes or replaces an effect.
    pub fn apply(
        &mut self,
        kind: StatusKind,
        duration: f32,
        units: Vec<ConditionalBehavior>,
        executor: &mut BehaviorExecutor,
        agent: &Agent,
        registry: &dyn EntityRegistry,
    ) -> StatusOutcome {
        if !(duration.is_finite() && duration > 0.0) {
            return StatusOutcome::Ignored;
        }
        match &mut self.active {
            Some(active) if active.kind == kind => {
                active.remaining = duration;
                debug!(entity = %agent.id(), status = %kind, "status refreshed");
                StatusOutcome::Refreshed
            }
            Some(active) => {
                let previous = active.kind;
                // The displaced units are the previous effect's own; drop them
                drop(executor.replace_all(units, agent, registry));
                active.kind = kind;
                active.remaining = duration;
                debug!(entity = %agent.id(), from = %previous, to = %kind, "status replaced");
                StatusOutcome::Replaced(previous)
            }
            None => {
                let saved = executor.replace_all(units, agent, registry);
                self.active = Some(ActiveStatus {
                    kind,
                    remaining: duration,
                    saved,
                });
                debug!(entity = %agent.id(), status = %kind, duration, "status applied");
                StatusOutcome::Applied
            }
        }
    }

    /// Counts down the active effect. Returns the kind that expired, after
    /// restoring the saved behavior set.
    pub fn tick(
        &mut self,
        dt: f32,
        executor: &mut BehaviorExecutor,
        agent: &Agent,
        registry: &dyn EntityRegistry,
    ) -> Option<StatusKind> {
        let active = self.active.as_mut()?;
        active.remaining -= dt.max(0.0);
        if active.remaining > 0.0 {
            return None;
        }
        self.clear(executor, agent, registry)
    }

    /// Ends the active effect now and restores the saved behavior set.
    pub fn clear(
        &mut self,
        executor: &mut BehaviorExecutor,
        agent: &Agent,
        registry: &dyn EntityRegistry,
    ) -> Option<StatusKind> {
        let active = self.active.take()?;
        executor.restore(active.saved, agent, registry);
        debug!(entity = %agent.id(), status = %active.kind, "status ended");
        Some(active.kind)
    }

    /// Forgets the active effect without restoring anything. Used at
    /// teardown, where the saved units were already cleaned up.
    pub fn discard(&mut self) -> Option<StatusKind> {
        self.active.take().map(|active| active.kind)
    }
}
