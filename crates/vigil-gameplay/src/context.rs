//! Per-tick context handed to states and behaviors.

use vigil_common::EntityId;

use crate::events::GameEvent;
use crate::registry::EntityRegistry;

/// A queued health mutation aimed at another entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthRequest {
    /// Entity that issued the request
    pub source: EntityId,
    /// Entity whose ledger receives the delta
    pub target: EntityId,
    /// Signed delta (negative = damage)
    pub amount: f32,
}

/// Writes collected during the decision phase and applied afterwards.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    requests: Vec<HealthRequest>,
    notices: Vec<GameEvent>,
}

impl CommandBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues damage against `target`.
    pub fn damage(&mut self, source: EntityId, target: EntityId, amount: f32) {
        self.requests.push(HealthRequest {
            source,
            target,
            amount: -amount.abs(),
        });
    }

    /// Queues healing for `target`.
    pub fn heal(&mut self, source: EntityId, target: EntityId, amount: f32) {
        self.requests.push(HealthRequest {
            source,
            target,
            amount: amount.abs(),
        });
    }

    /// Records an event to publish once the tick completes.
    pub fn notify(&mut self, event: GameEvent) {
        self.notices.push(event);
    }

    /// Pending health requests in issue order.
    #[must_use]
    pub fn requests(&self) -> &[HealthRequest] {
        &self.requests
    }

    /// Pending notices in issue order.
    #[must_use]
    pub fn notices(&self) -> &[GameEvent] {
        &self.notices
    }

    /// Takes the health requests, leaving the buffer empty of them.
    pub fn take_requests(&mut self) -> Vec<HealthRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Takes the notices, leaving the buffer empty of them.
    pub fn take_notices(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.notices)
    }
}

/// Everything a state or behavior may read or write during its turn.
pub struct TickContext<'a> {
    /// Start-of-tick entity lookup
    pub registry: &'a dyn EntityRegistry,
    /// Deferred writes
    pub commands: &'a mut CommandBuffer,
    /// Tick counter
    pub tick: u64,
    /// Simulation time in seconds at the start of this tick
    pub time: f64,
    /// Step length in seconds
    pub dt: f32,
}

impl<'a> TickContext<'a> {
    /// Creates a context.
    pub fn new(
        registry: &'a dyn EntityRegistry,
        commands: &'a mut CommandBuffer,
        tick: u64,
        time: f64,
        dt: f32,
    ) -> Self {
        Self {
            registry,
            commands,
            tick,
            time,
            dt,
        }
    }
}

impl std::fmt::Debug for TickContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickContext")
            .field("tick", &self.tick)
            .field("time", &self.time)
            .field("dt", &self.dt)
            .finish_non_exhaustive()
    }
}
