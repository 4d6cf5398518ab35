//! Shared fixtures for unit tests.

use vigil_common::{EntityId, Vec2};

use crate::entity::{Agent, AgentStats, EntityCategory};
use crate::registry::EntityView;
use crate::resources::{ManaPool, ResourceLedger};

pub(crate) fn agent(category: EntityCategory, position: Vec2, targets: &[EntityCategory]) -> Agent {
    Agent::new(
        category,
        "fixture",
        position,
        ResourceLedger::new(100.0, 0.0),
        ManaPool::new(50.0, 0.0),
        AgentStats {
            speed: 2.0,
            damage: 10.0,
            sensor_range: 15.0,
            attack_cooldown: 1.0,
            target_categories: targets.to_vec(),
        },
    )
}

pub(crate) fn view(category: EntityCategory, position: Vec2, health: f32) -> EntityView {
    EntityView {
        id: EntityId::new(),
        category,
        position,
        health,
        max_health: 100.0,
        alive: true,
    }
}
