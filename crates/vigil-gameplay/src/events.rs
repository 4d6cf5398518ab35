//! Event bus for inter-system communication.
//!
//! Animation, audio and UI layers subscribe here instead of reaching into
//! the simulation. Events are published after each phase of a tick.
//!
//! Lifecycle events are never dropped. The capacity only caps the
//! high-volume `HealthChanged` and `StateChanged` traffic.

use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entity::EntityCategory;
use crate::fsm::StateKind;
use crate::status::StatusKind;
use vigil_common::EntityId;

/// Why an entity left the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DestroyReason {
    /// Health reached zero during a drain phase
    Died,
    /// Explicitly removed by a collaborator
    Despawned,
}

/// Event types that can be sent through the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Entity spawned
    EntitySpawned {
        /// Entity ID
        entity_id: EntityId,
        /// Entity category
        category: EntityCategory,
        /// Archetype it was built from
        archetype: String,
    },
    /// Entity destroyed
    EntityDestroyed {
        /// Entity ID
        entity_id: EntityId,
        /// Why it was removed
        reason: DestroyReason,
    },
    /// Health moved during a drain (or an immediate apply)
    HealthChanged {
        /// Entity ID
        entity_id: EntityId,
        /// Health before
        old: f32,
        /// Health after
        new: f32,
    },
    /// Health reached zero
    Died {
        /// Entity ID
        entity_id: EntityId,
    },
    /// The utility state machine switched states
    StateChanged {
        /// Entity ID
        entity_id: EntityId,
        /// Previous state (None on the very first entry)
        from: Option<StateKind>,
        /// New state
        to: StateKind,
    },
    /// A status effect took over an entity's behavior set
    StatusApplied {
        /// Entity ID
        entity_id: EntityId,
        /// Effect kind
        kind: StatusKind,
        /// Duration in seconds
        duration: f32,
    },
    /// A status effect ended and the prior behavior set was restored
    StatusExpired {
        /// Entity ID
        entity_id: EntityId,
        /// Effect kind
        kind: StatusKind,
    },
}

impl GameEvent {
    /// Returns the entity this event is about.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::EntitySpawned { entity_id, .. }
            | Self::EntityDestroyed { entity_id, .. }
            | Self::HealthChanged { entity_id, .. }
            | Self::Died { entity_id }
            | Self::StateChanged { entity_id, .. }
            | Self::StatusApplied { entity_id, .. }
            | Self::StatusExpired { entity_id, .. } => *entity_id,
        }
    }

    /// True for spawn, death, removal and status transitions.
    #[must_use]
    pub const fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::EntitySpawned { .. }
                | Self::EntityDestroyed { .. }
                | Self::Died { .. }
                | Self::StatusApplied { .. }
                | Self::StatusExpired { .. }
        )
    }
}

/// Event bus for broadcasting events to subscribers.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<GameEvent>,
    /// Receiver for collecting events
    receiver: Receiver<GameEvent>,
    /// Pending count above which non-lifecycle events are dropped
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    ///
    /// Lifecycle events are always queued. Other events are dropped once
    /// `capacity` events are pending.
    pub fn publish(&self, event: GameEvent) {
        if !event.is_lifecycle() && self.receiver.len() >= self.capacity {
            warn!(
                entity = %event.entity_id(),
                pending = self.receiver.len(),
                "event bus full, dropping {event:?}"
            );
            return;
        }
        // Both ends live in self, so the channel cannot be disconnected
        let _ = self.sender.send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<GameEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the soft cap on pending events.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<GameEvent> {
        self.sender.clone()
    }

    /// Creates a receiver handle for a consumer on another thread.
    ///
    /// Receivers compete: each event is delivered to exactly one of them.
    #[must_use]
    pub fn receiver(&self) -> Receiver<GameEvent> {
        self.receiver.clone()
    }
}
