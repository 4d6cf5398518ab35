//! Utility functions for the built-in states.
//!
//! An inactive learnable parameter switches off the term it feeds: with
//! aggro distance inactive, chase and fight score zero; with the flee
//! threshold inactive, flee scores zero.

use super::params::BehaviorParameters;
use crate::entity::Agent;
use crate::registry::EntityRegistry;
use crate::targeting::{nearest_target, select_target};

/// Utility floor for a dead owner.
pub const DEAD_UTILITY: f32 = f32::NEG_INFINITY;

/// Idle utility while something is in sensor range.
pub const IDLE_BASELINE: f32 = 0.1;

/// Idle utility with nothing in sensor range.
pub const IDLE_UNOCCUPIED: f32 = 0.4;

/// Low baseline that rises when no target is sensed.
#[must_use]
pub fn idle_utility(agent: &Agent, registry: &dyn EntityRegistry) -> f32 {
    if nearest_target(agent, registry, agent.stats().sensor_range).is_some() {
        IDLE_BASELINE
    } else {
        IDLE_UNOCCUPIED
    }
}

/// `1 - distance / aggro` for the best target inside aggro distance but
/// still outside attack range; zero otherwise.
#[must_use]
pub fn chase_utility(agent: &Agent, params: &BehaviorParameters, registry: &dyn EntityRegistry) -> f32 {
    let Some(aggro) = params.aggro_distance.effective().filter(|a| *a > 0.0) else {
        return 0.0;
    };
    let Some(target) = select_target(agent, registry, aggro, params) else {
        return 0.0;
    };
    let distance = target.distance_to(agent.position());
    if params.attack_range().map_or(false, |range| distance <= range) {
        return 0.0;
    }
    (1.0 - distance / aggro).clamp(0.0, 1.0)
}

/// The owner's health fraction when a target is within attack range; zero
/// otherwise.
#[must_use]
pub fn fight_utility(agent: &Agent, params: &BehaviorParameters, registry: &dyn EntityRegistry) -> f32 {
    let Some(range) = params.attack_range() else {
        return 0.0;
    };
    if select_target(agent, registry, range, params).is_none() {
        return 0.0;
    }
    agent.health().fraction()
}

/// `1 - health_fraction` below the flee threshold; zero otherwise.
#[must_use]
pub fn flee_utility(health_fraction: f32, params: &BehaviorParameters) -> f32 {
    match params.flee_health_threshold.effective() {
        Some(threshold) if health_fraction < threshold => (1.0 - health_fraction).clamp(0.0, 1.0),
        _ => 0.0,
    }
}
