//! Conditional behavior composition.
//!
//! A [`ConditionalBehavior`] pairs one action with a list of conditions, a
//! priority and an exclusivity flag. A [`BehaviorExecutor`] owns an entity's
//! units and runs them in priority order each tick.

pub mod action;
pub mod condition;
pub mod executor;
pub mod unit;

use thiserror::Error;

pub use action::{Action, ActionConfig, CastConfig, ChaseConfig, FleeConfig, HealConfig, MeleeConfig};
pub use condition::{Condition, ConditionConfig, CooldownConfig, DistanceConfig, HealthRangeConfig};
pub use executor::{BehaviorExecutor, SavedBehaviors, UnitHandle};
pub use unit::{ActionSpec, ConditionSpec, ConditionalBehavior, UnitTemplate};

/// Failures raised while a unit runs. The executor logs these and moves on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BehaviorError {
    /// The action or condition was configured with unusable values
    #[error("invalid {kind} configuration: {reason}")]
    InvalidConfig {
        /// Capability kind tag
        kind: &'static str,
        /// What is wrong
        reason: String,
    },
}

/// Result type for behavior operations.
pub type BehaviorResult<T> = Result<T, BehaviorError>;

pub(crate) fn require_non_negative(
    kind: &'static str,
    field: &str,
    value: f32,
) -> BehaviorResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(BehaviorError::InvalidConfig {
            kind,
            reason: format!("{field} must be a non-negative number, got {value}"),
        })
    }
}

pub(crate) fn require_range(kind: &'static str, min: f32, max: f32) -> BehaviorResult<()> {
    require_non_negative(kind, "min", min)?;
    require_non_negative(kind, "max", max)?;
    if min > max {
        return Err(BehaviorError::InvalidConfig {
            kind,
            reason: format!("min {min} exceeds max {max}"),
        });
    }
    Ok(())
}
