//! Read-only spatial and typed entity lookup.
//!
//! During the decision phase every entity sees the same [`RegistrySnapshot`]
//! captured at the start of the tick. Health values in it are the values
//! from before any of this tick's damage was applied.

use ahash::AHashMap;
use vigil_common::{EntityId, Vec2};

use crate::entity::{EntityArena, EntityCategory};

/// Immutable view of one entity as seen by other entities' decisions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityView {
    /// Entity ID
    pub id: EntityId,
    /// Category
    pub category: EntityCategory,
    /// World position at the start of the tick
    pub position: Vec2,
    /// Current health at the start of the tick
    pub health: f32,
    /// Maximum health
    pub max_health: f32,
    /// Liveness flag
    pub alive: bool,
}

impl EntityView {
    /// Current health divided by maximum health.
    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        if self.max_health > 0.0 {
            (self.health / self.max_health).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Distance to a point.
    #[must_use]
    pub fn distance_to(&self, point: Vec2) -> f32 {
        self.position.distance(point)
    }
}

/// Entity lookup consumed by utility scoring and behaviors.
///
/// Implementations only ever expose live entities.
pub trait EntityRegistry {
    /// Looks up a single entity.
    fn get(&self, id: EntityId) -> Option<EntityView>;

    /// All entities of a category, in registration order.
    fn entities_of_category(&self, category: EntityCategory) -> Vec<EntityView>;

    /// All entities of a category within `radius` of `position`, in
    /// registration order.
    fn entities_in_radius(
        &self,
        position: Vec2,
        radius: f32,
        category: EntityCategory,
    ) -> Vec<EntityView>;

    /// Nearest entity of a category within `radius`. Equal distances resolve
    /// to the earlier registered entity.
    fn nearest(&self, category: EntityCategory, position: Vec2, radius: f32)
        -> Option<EntityView>;

    /// Nearest entity of any of `categories` within `radius`, skipping
    /// `exclude`.
    fn nearest_excluding(
        &self,
        categories: &[EntityCategory],
        position: Vec2,
        radius: f32,
        exclude: EntityId,
    ) -> Option<EntityView> {
        let mut best: Option<(f32, EntityView)> = None;
        for category in categories {
            for view in self.entities_in_radius(position, radius, *category) {
                if view.id == exclude {
                    continue;
                }
                let dist = view.distance_to(position);
                if best.map_or(true, |(d, _)| dist < d) {
                    best = Some((dist, view));
                }
            }
        }
        best.map(|(_, view)| view)
    }
}

/// Start-of-tick copy of every live entity.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    views: Vec<EntityView>,
    by_id: AHashMap<EntityId, usize>,
    by_category: AHashMap<EntityCategory, Vec<usize>>,
}

impl RegistrySnapshot {
    /// Captures the live entities of an arena, grouped by category in
    /// registration order.
    #[must_use]
    pub fn capture(arena: &EntityArena) -> Self {
        let views = EntityCategory::all()
            .into_iter()
            .flat_map(|category| arena.ids_by_category(category))
            .filter_map(|id| arena.get(*id).ok())
            .filter(|entity| entity.is_alive() && !entity.agent().is_dead())
            .map(|entity| {
                let agent = entity.agent();
                EntityView {
                    id: agent.id(),
                    category: agent.category(),
                    position: agent.position(),
                    health: agent.health().current(),
                    max_health: agent.health().max(),
                    alive: true,
                }
            })
            .collect();
        Self::from_views(views)
    }

    /// Builds a snapshot from prepared views. Dead views are dropped.
    #[must_use]
    pub fn from_views(views: Vec<EntityView>) -> Self {
        let views: Vec<EntityView> = views.into_iter().filter(|v| v.alive).collect();
        let mut by_id = AHashMap::with_capacity(views.len());
        let mut by_category: AHashMap<EntityCategory, Vec<usize>> = AHashMap::new();
        for (index, view) in views.iter().enumerate() {
            by_id.insert(view.id, index);
            by_category.entry(view.category).or_default().push(index);
        }
        Self {
            views,
            by_id,
            by_category,
        }
    }

    /// Number of entities in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns true if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    fn category_views(&self, category: EntityCategory) -> impl Iterator<Item = &EntityView> {
        self.by_category
            .get(&category)
            .into_iter()
            .flatten()
            .map(|&index| &self.views[index])
    }
}

impl EntityRegistry for RegistrySnapshot {
    fn get(&self, id: EntityId) -> Option<EntityView> {
        self.by_id.get(&id).map(|&index| self.views[index])
    }

    fn entities_of_category(&self, category: EntityCategory) -> Vec<EntityView> {
        self.category_views(category).copied().collect()
    }

    fn entities_in_radius(
        &self,
        position: Vec2,
        radius: f32,
        category: EntityCategory,
    ) -> Vec<EntityView> {
        self.category_views(category)
            .filter(|view| view.distance_to(position) <= radius)
            .copied()
            .collect()
    }

    fn nearest(
        &self,
        category: EntityCategory,
        position: Vec2,
        radius: f32,
    ) -> Option<EntityView> {
        let mut best: Option<(f32, EntityView)> = None;
        for view in self.category_views(category) {
            let dist = view.distance_to(position);
            if dist > radius {
                continue;
            }
            if best.map_or(true, |(d, _)| dist < d) {
                best = Some((dist, *view));
            }
        }
        best.map(|(_, view)| view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::Brain;
    use crate::entity::Entity;
    use crate::test_support::agent;

    fn view(category: EntityCategory, x: f32, alive: bool) -> EntityView {
        EntityView {
            id: EntityId::new(),
            category,
            position: Vec2::new(x, 0.0),
            health: 50.0,
            max_health: 100.0,
            alive,
        }
    }

    #[test]
    fn test_nearest_respects_radius() {
        let near = view(EntityCategory::Player, 5.0, true);
        let far = view(EntityCategory::Player, 20.0, true);
        let snapshot = RegistrySnapshot::from_views(vec![far, near]);

        let found = snapshot
            .nearest(EntityCategory::Player, Vec2::ZERO, 10.0)
            .expect("should find player");
        assert_eq!(found.id, near.id);
        assert!(snapshot
            .nearest(EntityCategory::Player, Vec2::ZERO, 1.0)
            .is_none());
    }

    #[test]
    fn test_nearest_tie_prefers_registration_order() {
        let a = view(EntityCategory::Enemy, 3.0, true);
        let b = view(EntityCategory::Enemy, -3.0, true);
        let snapshot = RegistrySnapshot::from_views(vec![a, b]);

        let found = snapshot
            .nearest(EntityCategory::Enemy, Vec2::ZERO, 10.0)
            .expect("should find enemy");
        assert_eq!(found.id, a.id);
    }

    #[test]
    fn test_dead_views_are_excluded() {
        let dead = view(EntityCategory::Player, 1.0, false);
        let snapshot = RegistrySnapshot::from_views(vec![dead]);
        assert!(snapshot.is_empty());
        assert!(snapshot.get(dead.id).is_none());
        assert!(snapshot.entities_of_category(EntityCategory::Player).is_empty());
    }

    #[test]
    fn test_entities_in_radius_filters_category() {
        let player = view(EntityCategory::Player, 2.0, true);
        let enemy = view(EntityCategory::Enemy, 2.0, true);
        let snapshot = RegistrySnapshot::from_views(vec![player, enemy]);

        let found = snapshot.entities_in_radius(Vec2::ZERO, 5.0, EntityCategory::Enemy);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, enemy.id);
    }

    #[test]
    fn test_nearest_excluding_skips_self() {
        let me = view(EntityCategory::Enemy, 0.0, true);
        let other = view(EntityCategory::Enemy, 4.0, true);
        let snapshot = RegistrySnapshot::from_views(vec![me, other]);

        let found = snapshot
            .nearest_excluding(&[EntityCategory::Enemy], Vec2::ZERO, 10.0, me.id)
            .expect("should find other");
        assert_eq!(found.id, other.id);
    }

    #[test]
    fn test_health_fraction() {
        let v = view(EntityCategory::Neutral, 0.0, true);
        assert!((v.health_fraction() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_capture_follows_registration_order() {
        let mut arena = EntityArena::new();
        let spawn = |arena: &mut EntityArena| {
            arena
                .insert(Entity::new(
                    agent(EntityCategory::Enemy, Vec2::ZERO, &[]),
                    Brain::default(),
                ))
                .expect("insert should succeed")
        };
        let first = spawn(&mut arena);
        let second = spawn(&mut arena);
        arena.remove(first).expect("remove should succeed");
        // Reuses the first slot but registers last
        let third = spawn(&mut arena);

        let snapshot = RegistrySnapshot::capture(&arena);
        let ids: Vec<EntityId> = snapshot
            .entities_of_category(EntityCategory::Enemy)
            .iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec![second, third]);
        assert!(snapshot.get(first).is_none());
    }

    #[test]
    fn test_capture_skips_dead_entities() {
        let mut arena = EntityArena::new();
        let mut fallen = agent(EntityCategory::Player, Vec2::ZERO, &[]);
        fallen.health_mut().apply_immediate(-500.0);
        let fallen = arena
            .insert(Entity::new(fallen, Brain::default()))
            .expect("insert should succeed");
        let standing = arena
            .insert(Entity::new(
                agent(EntityCategory::Player, Vec2::ONE, &[]),
                Brain::default(),
            ))
            .expect("insert should succeed");

        let snapshot = RegistrySnapshot::capture(&arena);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.get(fallen).is_none());
        assert!(snapshot.get(standing).is_some());
    }
}
