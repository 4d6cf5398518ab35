//! Per-tick telemetry shared with readers on other threads.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vigil_common::{EntityId, Vec2, VigilError, VigilResult};

use crate::entity::{Entity, EntityCategory};
use crate::fsm::StateKind;
use crate::status::StatusKind;

/// One entity's state at the end of a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTelemetry {
    /// Entity ID
    pub id: EntityId,
    /// Archetype name
    pub archetype: String,
    /// Category
    pub category: EntityCategory,
    /// Active state machine state
    pub state: Option<StateKind>,
    /// Active status effect
    pub status: Option<StatusKind>,
    /// Current health
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Current mana
    pub mana: f32,
    /// World position
    pub position: Vec2,
}

impl EntityTelemetry {
    /// Captures an entity.
    #[must_use]
    pub fn capture(entity: &Entity) -> Self {
        let agent = entity.agent();
        Self {
            id: agent.id(),
            archetype: agent.archetype().to_string(),
            category: agent.category(),
            state: entity.brain().current_state(),
            status: entity.brain().status().active(),
            health: agent.health().current(),
            max_health: agent.health().max(),
            mana: agent.mana().current(),
            position: agent.position(),
        }
    }
}

/// Everything published after one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    /// Tick number
    pub tick: u64,
    /// Simulation time in seconds
    pub time: f64,
    /// Surviving entities
    pub entities: Vec<EntityTelemetry>,
}

impl TelemetryFrame {
    /// Finds an entity in the frame.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&EntityTelemetry> {
        self.entities.iter().find(|e| e.id == id)
    }
}

/// Cloneable handle to the latest frame.
#[derive(Debug, Clone, Default)]
pub struct TelemetryHandle {
    frame: Arc<RwLock<TelemetryFrame>>,
}

impl TelemetryHandle {
    /// Creates a handle holding an empty frame.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the published frame.
    pub fn publish(&self, frame: TelemetryFrame) {
        *self.frame.write() = frame;
    }

    /// Copy of the latest frame.
    #[must_use]
    pub fn snapshot(&self) -> TelemetryFrame {
        self.frame.read().clone()
    }

    /// Tick number of the latest frame.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.frame.read().tick
    }

    /// Latest frame as JSON.
    pub fn to_json(&self) -> VigilResult<String> {
        serde_json::to_string(&*self.frame.read()).map_err(|e| VigilError::Serialization(e.to_string()))
    }
}
