//! Utility-scored state machine.
//!
//! Every tick each candidate state is scored, the machine switches to the
//! highest scorer (ties go to the earlier state), and the active state runs
//! its per-tick logic. Scoring reads learnable parameters that are cloned
//! per entity from the archetype.

pub mod machine;
pub mod params;
pub mod scoring;
pub mod state;
pub mod states;

pub use machine::UtilityStateMachine;
pub use params::{BehaviorParameters, CategoryWeights, LearnableParameter, ParameterId, TargetWeights};
pub use state::{StateKind, UtilityState};
pub use states::build_state;
