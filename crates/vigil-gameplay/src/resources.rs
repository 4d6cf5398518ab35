//! Vital resources: the health ledger and the mana pool.
//!
//! Health is never written directly during a tick. Every writer enqueues a
//! signed delta and the simulation drains each ledger exactly once at the
//! end of the tick. Draining applies deltas in FIFO order, clamps the result
//! into `[0, max]`, and stops at the first delta that brings health to zero:
//! the entity is dead and whatever is still queued is dropped. A dead ledger
//! ignores every mutation until [`ResourceLedger::reset`].

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// Smallest maximum health a ledger will accept.
pub const MIN_MAX_HEALTH: f32 = 1.0;

/// Notification emitted by a ledger when its health moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HealthEvent {
    /// Current health moved from `old` to `new`.
    Changed {
        /// Health before the change
        old: f32,
        /// Health after the change
        new: f32,
    },
    /// Health reached zero. Emitted at most once per life.
    Died,
}

/// Per-entity health with a deferred, FIFO mutation queue.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    current: f32,
    max: f32,
    regen_rate: f32,
    queue: VecDeque<f32>,
    dead: bool,
    events: Vec<HealthEvent>,
}

impl ResourceLedger {
    /// Creates a full ledger with the given maximum and regeneration rate
    /// (health per second).
    #[must_use]
    pub fn new(max_health: f32, regen_rate: f32) -> Self {
        let mut ledger = Self {
            current: 0.0,
            max: MIN_MAX_HEALTH,
            regen_rate: sanitize_rate(regen_rate),
            queue: VecDeque::new(),
            dead: false,
            events: Vec::new(),
        };
        ledger.initialize(max_health);
        ledger
    }

    /// Sets current and maximum health to `max_health` and clears the queue.
    pub fn initialize(&mut self, max_health: f32) {
        self.max = sanitize_max(max_health);
        self.current = self.max;
        self.queue.clear();
        self.events.clear();
        self.dead = false;
    }

    /// Queues a signed delta: positive heals, negative damages.
    ///
    /// Never touches current health. Deltas queued against a dead ledger
    /// are discarded at the next drain.
    pub fn enqueue_delta(&mut self, amount: f32) {
        self.queue.push_back(amount);
    }

    /// Applies every queued delta in FIFO order.
    ///
    /// Call exactly once per tick, after all of that tick's enqueues.
    pub fn drain_queue(&mut self) {
        if self.dead {
            if !self.queue.is_empty() {
                trace!(dropped = self.queue.len(), "ledger is dead, discarding queued deltas");
                self.queue.clear();
            }
            return;
        }

        while let Some(delta) = self.queue.pop_front() {
            if !delta.is_finite() {
                warn!(delta, "ignoring non-finite health delta");
                continue;
            }
            if self.apply(delta) {
                if !self.queue.is_empty() {
                    debug!(dropped = self.queue.len(), "health reached zero, dropping remaining deltas");
                    self.queue.clear();
                }
                break;
            }
        }

        debug_assert!(self.current >= 0.0 && self.current <= self.max);
    }

    /// Applies a delta immediately, bypassing the queue.
    ///
    /// Emits the same events as a drained delta. This breaks the
    /// end-of-tick ordering guarantee, so reserve it for effects that need
    /// instant feedback.
    pub fn apply_immediate(&mut self, amount: f32) {
        if self.dead {
            trace!(amount, "ledger is dead, ignoring immediate delta");
            return;
        }
        if !amount.is_finite() {
            warn!(amount, "ignoring non-finite health delta");
            return;
        }
        self.apply(amount);
    }

    /// Changes maximum health, floored at [`MIN_MAX_HEALTH`].
    ///
    /// Current health never exceeds the maximum. With `adjust_current` a
    /// clamp that moves the value is announced through a
    /// [`HealthEvent::Changed`]. A dead ledger ignores this until
    /// [`reset`](Self::reset).
    pub fn set_max_health(&mut self, new_max: f32, adjust_current: bool) {
        if self.dead {
            trace!(new_max, "ledger is dead, ignoring max health change");
            return;
        }
        self.max = sanitize_max(new_max);
        let old = self.current;
        self.current = self.current.min(self.max);
        if adjust_current && old != self.current {
            self.events.push(HealthEvent::Changed {
                old,
                new: self.current,
            });
        }
    }

    /// Restores full health, revives a dead ledger and clears the queue.
    ///
    /// Emits [`HealthEvent::Changed`] when the value actually moves; never
    /// emits [`HealthEvent::Died`].
    pub fn reset(&mut self) {
        let old = self.current;
        self.current = self.max;
        self.queue.clear();
        self.dead = false;
        if old != self.current {
            self.events.push(HealthEvent::Changed {
                old,
                new: self.current,
            });
        }
    }

    /// Queues this tick's regeneration, if any is due.
    pub fn regenerate(&mut self, dt: f32) {
        if self.dead || self.regen_rate <= 0.0 || dt <= 0.0 || self.current >= self.max {
            return;
        }
        self.enqueue_delta(self.regen_rate * dt);
    }

    /// Returns current health.
    #[must_use]
    pub const fn current(&self) -> f32 {
        self.current
    }

    /// Returns maximum health.
    #[must_use]
    pub const fn max(&self) -> f32 {
        self.max
    }

    /// Returns current health as a fraction of maximum.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        self.current / self.max
    }

    /// Returns the regeneration rate in health per second.
    #[must_use]
    pub const fn regen_rate(&self) -> f32 {
        self.regen_rate
    }

    /// Returns whether the ledger has died and not been reset.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.dead
    }

    /// Returns the number of deltas waiting for the next drain.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Returns events emitted since the last [`Self::take_events`].
    #[must_use]
    pub fn events(&self) -> &[HealthEvent] {
        &self.events
    }

    /// Removes and returns all pending events.
    pub fn take_events(&mut self) -> Vec<HealthEvent> {
        std::mem::take(&mut self.events)
    }

    /// Applies one delta. Returns `true` if it killed the ledger.
    fn apply(&mut self, delta: f32) -> bool {
        let old = self.current;
        let next = (old + delta).clamp(0.0, self.max);
        if next != old {
            self.events.push(HealthEvent::Changed { old, new: next });
            self.current = next;
        }
        if next <= 0.0 {
            self.dead = true;
            self.events.push(HealthEvent::Died);
            return true;
        }
        false
    }
}

/// Mana: a directly-spent resource owned by its entity.
///
/// Only the owner ever spends its own mana, during its own decision step,
/// so it needs no deferred queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManaPool {
    current: f32,
    max: f32,
    regen_rate: f32,
}

impl ManaPool {
    /// Creates a full pool.
    #[must_use]
    pub fn new(max: f32, regen_rate: f32) -> Self {
        let max = if max.is_finite() { max.max(0.0) } else { 0.0 };
        Self {
            current: max,
            max,
            regen_rate: sanitize_rate(regen_rate),
        }
    }

    /// Spends `cost` if enough mana is available.
    pub fn try_spend(&mut self, cost: f32) -> bool {
        let cost = cost.max(0.0);
        if self.current + f32::EPSILON < cost {
            return false;
        }
        self.current = (self.current - cost).max(0.0);
        true
    }

    /// Regenerates mana for `dt` seconds.
    pub fn regenerate(&mut self, dt: f32) {
        if dt > 0.0 {
            self.current = (self.current + self.regen_rate * dt).min(self.max);
        }
    }

    /// Refills the pool.
    pub fn refill(&mut self) {
        self.current = self.max;
    }

    /// Returns current mana.
    #[must_use]
    pub const fn current(&self) -> f32 {
        self.current
    }

    /// Returns maximum mana.
    #[must_use]
    pub const fn max(&self) -> f32 {
        self.max
    }
}

fn sanitize_max(max: f32) -> f32 {
    if max.is_finite() {
        max.max(MIN_MAX_HEALTH)
    } else {
        MIN_MAX_HEALTH
    }
}

fn sanitize_rate(rate: f32) -> f32 {
    if rate.is_finite() {
        rate.max(0.0)
    } else {
        0.0
    }
}
