//! # Vigil Common
//!
//! Common types shared by every Vigil crate.
//!
//! - Entity identity (`EntityId`)
//! - World positions and the small vector helpers the AI layers need
//! - The configuration error taxonomy
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod coords;
pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::coords::*;
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;
