//! Priority-ordered execution of an entity's behavior units.
//!
//! Units are kept sorted by descending priority; equal priorities keep their
//! insertion order. Each tick the executor walks that order and runs every
//! unit whose conditions hold, except that once an exclusive unit has
//! executed, no unit with a strictly lower priority runs for the rest of
//! the tick.

use tracing::{debug, warn};

use super::unit::ConditionalBehavior;
use crate::context::TickContext;
use crate::entity::Agent;
use crate::registry::EntityRegistry;

/// Stable reference to a unit attached to one executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitHandle(u64);

impl UnitHandle {
    /// Raw handle value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct Slot {
    handle: UnitHandle,
    unit: ConditionalBehavior,
}

/// A detached behavior set returned by [`BehaviorExecutor::replace_all`].
///
/// The units have already been cleaned up; restoring them initializes them
/// again.
#[derive(Debug, Default)]
pub struct SavedBehaviors {
    slots: Vec<Slot>,
}

impl SavedBehaviors {
    /// Number of saved units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if nothing was saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Names of the saved units in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.unit.name())
    }

    /// Handles in execution order.
    #[must_use]
    pub fn handles(&self) -> Vec<UnitHandle> {
        self.slots.iter().map(|slot| slot.handle).collect()
    }

    /// Takes a unit out of the set. It is already cleaned up.
    pub fn remove(&mut self, handle: UnitHandle) -> Option<ConditionalBehavior> {
        let index = self.slots.iter().position(|slot| slot.handle == handle)?;
        Some(self.slots.remove(index).unit)
    }

    /// Consumes the set, returning the units.
    #[must_use]
    pub fn into_units(self) -> Vec<ConditionalBehavior> {
        self.slots.into_iter().map(|slot| slot.unit).collect()
    }
}

/// Owns one entity's behavior units.
#[derive(Debug, Default)]
pub struct BehaviorExecutor {
    slots: Vec<Slot>,
    next_handle: u64,
    initialized: bool,
}

impl BehaviorExecutor {
    /// Creates an empty executor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor holding `units`. Nothing is initialized yet.
    #[must_use]
    pub fn with_units(units: Vec<ConditionalBehavior>) -> Self {
        let mut executor = Self::new();
        for unit in units {
            let handle = executor.allocate_handle();
            executor.slots.push(Slot { handle, unit });
        }
        executor.sort();
        executor
    }

    /// Number of attached units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no units are attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether [`initialize`](Self::initialize) has run.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Handles in execution order.
    #[must_use]
    pub fn handles(&self) -> Vec<UnitHandle> {
        self.slots.iter().map(|slot| slot.handle).collect()
    }

    /// Unit names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.unit.name())
    }

    /// Looks up an attached unit.
    #[must_use]
    pub fn get(&self, handle: UnitHandle) -> Option<&ConditionalBehavior> {
        self.slots
            .iter()
            .find(|slot| slot.handle == handle)
            .map(|slot| &slot.unit)
    }

    /// Fires setup hooks on every attached unit. Runs once.
    pub fn initialize(&mut self, agent: &Agent, registry: &dyn EntityRegistry) {
        if self.initialized {
            return;
        }
        for slot in &mut self.slots {
            slot.unit.initialize(agent, registry);
        }
        self.initialized = true;
    }

    /// Attaches a unit, initializing it if the executor already is.
    pub fn add(
        &mut self,
        mut unit: ConditionalBehavior,
        agent: &Agent,
        registry: &dyn EntityRegistry,
    ) -> UnitHandle {
        if self.initialized {
            unit.initialize(agent, registry);
        }
        let handle = self.allocate_handle();
        debug!(entity = %agent.id(), unit = unit.name(), "behavior added");
        self.slots.push(Slot { handle, unit });
        self.sort();
        handle
    }

    /// Detaches a unit after firing its cleanup hooks.
    pub fn remove(&mut self, handle: UnitHandle) -> Option<ConditionalBehavior> {
        let index = self.slots.iter().position(|slot| slot.handle == handle)?;
        let mut slot = self.slots.remove(index);
        slot.unit.cleanup();
        Some(slot.unit)
    }

    /// Swaps the whole set: cleans up the current units, initializes the
    /// new ones, and hands back the old set for [`restore`](Self::restore).
    pub fn replace_all(
        &mut self,
        units: Vec<ConditionalBehavior>,
        agent: &Agent,
        registry: &dyn EntityRegistry,
    ) -> SavedBehaviors {
        let mut old = std::mem::take(&mut self.slots);
        for slot in &mut old {
            slot.unit.cleanup();
        }
        for mut unit in units {
            unit.initialize(agent, registry);
            let handle = self.allocate_handle();
            self.slots.push(Slot { handle, unit });
        }
        self.sort();
        self.initialized = true;
        SavedBehaviors { slots: old }
    }

    /// Attaches a cold unit to a detached set. The handle comes from this
    /// executor and stays valid once the set is restored here.
    pub fn add_to_saved(&mut self, saved: &mut SavedBehaviors, unit: ConditionalBehavior) -> UnitHandle {
        let handle = self.allocate_handle();
        saved.slots.push(Slot { handle, unit });
        sort_slots(&mut saved.slots);
        handle
    }

    /// Swaps the contents of a detached set for cold `units`, returning the
    /// previous contents.
    pub fn replace_saved(
        &mut self,
        saved: &mut SavedBehaviors,
        units: Vec<ConditionalBehavior>,
    ) -> SavedBehaviors {
        let mut slots = Vec::with_capacity(units.len());
        for unit in units {
            let handle = self.allocate_handle();
            slots.push(Slot { handle, unit });
        }
        sort_slots(&mut slots);
        SavedBehaviors {
            slots: std::mem::replace(&mut saved.slots, slots),
        }
    }

    /// Reinstates a saved set. The units replaced by it are cleaned up and
    /// returned.
    pub fn restore(
        &mut self,
        saved: SavedBehaviors,
        agent: &Agent,
        registry: &dyn EntityRegistry,
    ) -> Vec<ConditionalBehavior> {
        let mut current = std::mem::replace(&mut self.slots, saved.slots);
        for slot in &mut current {
            slot.unit.cleanup();
        }
        for slot in &mut self.slots {
            slot.unit.initialize(agent, registry);
        }
        self.initialized = true;
        current.into_iter().map(|slot| slot.unit).collect()
    }

    /// Fires cleanup hooks on every unit and detaches them all.
    pub fn cleanup_all(&mut self) -> Vec<ConditionalBehavior> {
        let mut slots = std::mem::take(&mut self.slots);
        for slot in &mut slots {
            slot.unit.cleanup();
        }
        self.initialized = false;
        slots.into_iter().map(|slot| slot.unit).collect()
    }

    /// Runs one tick. Returns the handles of the units that executed, in
    /// execution order.
    pub fn tick(&mut self, agent: &mut Agent, ctx: &mut TickContext<'_>) -> Vec<UnitHandle> {
        let mut executed = Vec::new();
        let mut blocked_below: Option<i32> = None;

        for slot in &mut self.slots {
            let priority = slot.unit.priority();
            if blocked_below.map_or(false, |floor| priority < floor) {
                break;
            }
            match slot.unit.execute(agent, ctx) {
                Ok(true) => {
                    executed.push(slot.handle);
                    if slot.unit.is_exclusive() {
                        blocked_below = Some(priority);
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(entity = %agent.id(), unit = slot.unit.name(), "behavior failed: {}", e);
                }
            }
        }
        executed
    }

    fn allocate_handle(&mut self) -> UnitHandle {
        self.next_handle += 1;
        UnitHandle(self.next_handle)
    }

    fn sort(&mut self) {
        sort_slots(&mut self.slots);
    }
}

fn sort_slots(slots: &mut [Slot]) {
    slots.sort_by_key(|slot| std::cmp::Reverse(slot.unit.priority()));
}
