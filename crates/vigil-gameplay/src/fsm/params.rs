//! Learnable parameters consumed by utility scoring.
//!
//! A parameter set is cloned from its archetype at spawn, so tuning one
//! entity's values never touches the shared template.

use serde::{Deserialize, Serialize};

use crate::entity::EntityCategory;

/// A bounded value that an external tuning process may adjust.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearnableParameter {
    value: f32,
    min: f32,
    max: f32,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

impl LearnableParameter {
    /// Creates an active parameter. Bounds are reordered if reversed and the
    /// value is clamped into them.
    #[must_use]
    pub fn new(value: f32, min: f32, max: f32) -> Self {
        let mut param = Self {
            value,
            min,
            max,
            active: true,
        };
        param.normalize();
        param
    }

    /// Reorders reversed bounds, replaces non-finite numbers and clamps the
    /// value.
    pub fn normalize(&mut self) {
        if !self.min.is_finite() {
            self.min = 0.0;
        }
        if !self.max.is_finite() {
            self.max = self.min;
        }
        if self.min > self.max {
            std::mem::swap(&mut self.min, &mut self.max);
        }
        if !self.value.is_finite() {
            self.value = self.min;
        }
        self.value = self.value.clamp(self.min, self.max);
    }

    /// Current value, regardless of the active flag.
    #[must_use]
    pub const fn value(&self) -> f32 {
        self.value
    }

    /// Lower bound.
    #[must_use]
    pub const fn min(&self) -> f32 {
        self.min
    }

    /// Upper bound.
    #[must_use]
    pub const fn max(&self) -> f32 {
        self.max
    }

    /// Whether the parameter participates in scoring.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// The value if the parameter is active.
    #[must_use]
    pub fn effective(&self) -> Option<f32> {
        self.active.then_some(self.value)
    }

    /// Sets the value, clamped into bounds. Non-finite input is ignored.
    pub fn set(&mut self, value: f32) {
        if value.is_finite() {
            self.value = value.clamp(self.min, self.max);
        }
    }

    /// Enables or disables the parameter.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Whether the authored bounds and value are already consistent.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.value.is_finite()
            && self.min <= self.max
            && (self.min..=self.max).contains(&self.value)
    }
}

/// Names the scalar parameters so a tuner can address them without knowing
/// the struct layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterId {
    /// Distance at which targets start to attract chase utility
    AggroDistance,
    /// Health fraction below which fleeing scores
    FleeHealthThreshold,
    /// Longest continuous chase in seconds
    ChaseDurationCap,
    /// Seconds between melee attacks
    AttackCooldown,
}

impl ParameterId {
    /// All parameter IDs.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [
            Self::AggroDistance,
            Self::FleeHealthThreshold,
            Self::ChaseDurationCap,
            Self::AttackCooldown,
        ]
    }
}

/// Weight triple used to rank candidate targets of one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetWeights {
    /// Weight on the target's health fraction
    pub threat: f32,
    /// Weight on closeness (1 at zero distance, 0 at the search radius)
    pub distance: f32,
    /// Flat bonus for the category
    pub priority: f32,
}

impl Default for TargetWeights {
    fn default() -> Self {
        Self {
            threat: 0.5,
            distance: 1.0,
            priority: 0.0,
        }
    }
}

/// Target weights for one category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    /// Category the weights apply to
    pub category: EntityCategory,
    /// The weights
    pub weights: TargetWeights,
}

/// The full learnable parameter set of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorParameters {
    /// Distance at which targets start to attract chase utility
    pub aggro_distance: LearnableParameter,
    /// Health fraction below which fleeing scores
    pub flee_health_threshold: LearnableParameter,
    /// Longest continuous chase in seconds
    pub chase_duration_cap: LearnableParameter,
    /// Seconds between melee attacks
    pub attack_cooldown: LearnableParameter,
    /// Per-category target ranking weights
    pub target_weights: Vec<CategoryWeights>,
}

impl Default for BehaviorParameters {
    fn default() -> Self {
        Self {
            aggro_distance: LearnableParameter::new(10.0, 1.0, 50.0),
            flee_health_threshold: LearnableParameter::new(0.3, 0.0, 1.0),
            chase_duration_cap: LearnableParameter::new(8.0, 0.5, 60.0),
            attack_cooldown: LearnableParameter::new(1.0, 0.1, 10.0),
            target_weights: Vec::new(),
        }
    }
}

impl BehaviorParameters {
    /// Fraction of aggro distance inside which an attack is possible.
    pub const ATTACK_RANGE_FRACTION: f32 = 0.25;

    /// Looks up a parameter.
    #[must_use]
    pub const fn get(&self, id: ParameterId) -> &LearnableParameter {
        match id {
            ParameterId::AggroDistance => &self.aggro_distance,
            ParameterId::FleeHealthThreshold => &self.flee_health_threshold,
            ParameterId::ChaseDurationCap => &self.chase_duration_cap,
            ParameterId::AttackCooldown => &self.attack_cooldown,
        }
    }

    /// Looks up a parameter mutably.
    pub fn get_mut(&mut self, id: ParameterId) -> &mut LearnableParameter {
        match id {
            ParameterId::AggroDistance => &mut self.aggro_distance,
            ParameterId::FleeHealthThreshold => &mut self.flee_health_threshold,
            ParameterId::ChaseDurationCap => &mut self.chase_duration_cap,
            ParameterId::AttackCooldown => &mut self.attack_cooldown,
        }
    }

    /// Attack range derived from aggro distance, if aggro is active.
    #[must_use]
    pub fn attack_range(&self) -> Option<f32> {
        self.aggro_distance
            .effective()
            .map(|aggro| aggro * Self::ATTACK_RANGE_FRACTION)
    }

    /// Weights for a category, or the defaults when none are authored.
    #[must_use]
    pub fn weights_for(&self, category: EntityCategory) -> TargetWeights {
        self.target_weights
            .iter()
            .find(|w| w.category == category)
            .map(|w| w.weights)
            .unwrap_or_default()
    }

    /// Normalizes every parameter.
    pub fn normalize(&mut self) {
        for id in ParameterId::all() {
            self.get_mut(id).normalize();
        }
    }

    /// First malformed parameter, if any.
    #[must_use]
    pub fn first_malformed(&self) -> Option<ParameterId> {
        ParameterId::all()
            .into_iter()
            .find(|id| !self.get(*id).is_well_formed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_clamps() {
        let mut p = LearnableParameter::new(5.0, 0.0, 2.0);
        assert_eq!(p.value(), 2.0);
        p.set(-1.0);
        assert_eq!(p.value(), 0.0);
        p.set(f32::NAN);
        assert_eq!(p.value(), 0.0);
    }

    #[test]
    fn test_parameter_reversed_bounds() {
        let p = LearnableParameter::new(1.0, 3.0, 0.0);
        assert_eq!(p.min(), 0.0);
        assert_eq!(p.max(), 3.0);
        assert_eq!(p.value(), 1.0);
    }

    #[test]
    fn test_inactive_parameter_has_no_effective_value() {
        let mut p = LearnableParameter::new(1.0, 0.0, 2.0);
        assert_eq!(p.effective(), Some(1.0));
        p.set_active(false);
        assert_eq!(p.effective(), None);
        assert_eq!(p.value(), 1.0);
    }

    #[test]
    fn test_cloned_parameters_are_independent() {
        let template = BehaviorParameters::default();
        let mut mine = template.clone();
        mine.get_mut(ParameterId::AggroDistance).set(20.0);
        assert_eq!(template.aggro_distance.value(), 10.0);
        assert_eq!(mine.aggro_distance.value(), 20.0);
    }

    #[test]
    fn test_attack_range_follows_aggro() {
        let mut params = BehaviorParameters::default();
        assert_eq!(params.attack_range(), Some(2.5));
        params.aggro_distance.set_active(false);
        assert_eq!(params.attack_range(), None);
    }

    #[test]
    fn test_weights_for_falls_back_to_default() {
        let mut params = BehaviorParameters::default();
        params.target_weights.push(CategoryWeights {
            category: EntityCategory::Player,
            weights: TargetWeights {
                threat: 0.0,
                distance: 2.0,
                priority: 1.0,
            },
        });
        assert_eq!(params.weights_for(EntityCategory::Player).priority, 1.0);
        assert_eq!(
            params.weights_for(EntityCategory::Enemy),
            TargetWeights::default()
        );
    }

    #[test]
    fn test_deserialize_missing_active_defaults_true() {
        let p: LearnableParameter =
            ron::from_str("(value: 1.0, min: 0.0, max: 2.0)").expect("should parse");
        assert!(p.is_active());
    }
}
