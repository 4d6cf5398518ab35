//! # Vigil Gameplay
//!
//! Decision-making core for Project Vigil.
//!
//! This crate provides the per-entity AI layer and the simulation that
//! drives it:
//! - Resource ledgers with deferred, FIFO health mutation
//! - Conditional behavior units and a priority executor
//! - Utility-scored state machines with learnable parameters
//! - Capability catalog and data-driven archetypes
//! - Status effects that temporarily swap an entity's behaviors
//! - Two-phase simulation stepping with an event bus and telemetry

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod archetype;
pub mod behavior;
pub mod brain;
pub mod capability;
pub mod catalog;
pub mod context;
pub mod entity;
pub mod events;
pub mod fsm;
pub mod registry;
pub mod resources;
pub mod simulation;
pub mod status;
pub mod targeting;
pub mod telemetry;

#[cfg(test)]
mod test_support;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::archetype::*;
    pub use crate::behavior::*;
    pub use crate::brain::*;
    pub use crate::capability::*;
    pub use crate::catalog::*;
    pub use crate::context::*;
    pub use crate::entity::*;
    pub use crate::events::*;
    pub use crate::fsm::*;
    pub use crate::registry::*;
    pub use crate::resources::*;
    pub use crate::simulation::*;
    pub use crate::status::*;
    pub use crate::targeting::*;
    pub use crate::telemetry::*;
}

pub use prelude::*;
