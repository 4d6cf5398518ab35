//! Target selection over the entity registry.

use serde::{Deserialize, Serialize};
use tracing::trace;
use vigil_common::EntityId;

use crate::entity::{Agent, EntityCategory};
use crate::fsm::params::BehaviorParameters;
use crate::registry::{EntityRegistry, EntityView};

/// Which entities an action or condition aims at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetFilter {
    /// The agent's own target categories
    #[default]
    Hostile,
    /// Entities sharing the agent's category
    Allies,
    /// One explicit category
    Category(EntityCategory),
}

impl TargetFilter {
    /// Whether an entity of `category` passes the filter for `agent`.
    #[must_use]
    pub fn accepts(self, agent: &Agent, category: EntityCategory) -> bool {
        match self {
            Self::Hostile => agent.stats().target_categories.contains(&category),
            Self::Allies => agent.category() == category,
            Self::Category(wanted) => wanted == category,
        }
    }

    /// Nearest entity passing the filter, never the agent itself.
    #[must_use]
    pub fn nearest(
        self,
        agent: &Agent,
        registry: &dyn EntityRegistry,
        radius: f32,
    ) -> Option<EntityView> {
        match self {
            Self::Hostile => nearest_target(agent, registry, radius),
            Self::Allies => nearest_of(agent, agent.category(), registry, radius),
            Self::Category(category) => nearest_of(agent, category, registry, radius),
        }
    }
}

/// Cached target reference. Runtime state only: it never survives a
/// cold clone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetCache {
    target: Option<EntityId>,
}

impl TargetCache {
    /// Currently cached target.
    #[must_use]
    pub const fn target(&self) -> Option<EntityId> {
        self.target
    }

    /// Forgets the cached target.
    pub fn clear(&mut self) {
        self.target = None;
    }

    /// Returns the cached target while it is still live, in range and
    /// accepted by the filter; otherwise searches again.
    pub fn acquire(
        &mut self,
        agent: &Agent,
        filter: TargetFilter,
        registry: &dyn EntityRegistry,
        radius: f32,
    ) -> Option<EntityView> {
        if let Some(view) = self.target.and_then(|id| registry.get(id)) {
            if view.alive
                && view.id != agent.id()
                && view.distance_to(agent.position()) <= radius
                && filter.accepts(agent, view.category)
            {
                return Some(view);
            }
        }
        let found = filter.nearest(agent, registry, radius);
        self.target = found.map(|view| view.id);
        found
    }
}

/// Nearest live target of any of the agent's target categories.
#[must_use]
pub fn nearest_target(
    agent: &Agent,
    registry: &dyn EntityRegistry,
    radius: f32,
) -> Option<EntityView> {
    registry.nearest_excluding(
        &agent.stats().target_categories,
        agent.position(),
        radius,
        agent.id(),
    )
}

/// Nearest live entity of a single category, never the agent itself.
#[must_use]
pub fn nearest_of(
    agent: &Agent,
    category: EntityCategory,
    registry: &dyn EntityRegistry,
    radius: f32,
) -> Option<EntityView> {
    registry.nearest_excluding(&[category], agent.position(), radius, agent.id())
}

/// Utility of one candidate under the agent's target weights.
#[must_use]
pub fn target_score(
    agent: &Agent,
    candidate: &EntityView,
    radius: f32,
    params: &BehaviorParameters,
) -> f32 {
    let weights = params.weights_for(candidate.category);
    let closeness = if radius > 0.0 {
        (1.0 - candidate.distance_to(agent.position()) / radius).clamp(0.0, 1.0)
    } else {
        0.0
    };
    weights.threat * candidate.health_fraction() + weights.distance * closeness + weights.priority
}

/// Best-scoring target within `radius` across the agent's target categories.
///
/// Candidates are scanned category by category in the agent's declared
/// order; a later candidate only wins with a strictly greater score.
#[must_use]
pub fn select_target(
    agent: &Agent,
    registry: &dyn EntityRegistry,
    radius: f32,
    params: &BehaviorParameters,
) -> Option<EntityView> {
    let mut best: Option<EntityView> = None;
    let mut best_score = f32::NEG_INFINITY;

    for category in &agent.stats().target_categories {
        for candidate in registry.entities_in_radius(agent.position(), radius, *category) {
            if candidate.id == agent.id() || !candidate.alive {
                continue;
            }
            let score = target_score(agent, &candidate, radius, params);
            if score > best_score {
                best_score = score;
                best = Some(candidate);
            }
        }
    }

    if let Some(target) = &best {
        trace!(agent = %agent.id(), target = %target.id, score = best_score, "selected target");
    }
    best
}
