//! Error types for Project Vigil.

use thiserror::Error;

/// Top-level error type for Vigil operations.
#[derive(Debug, Error)]
pub enum VigilError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while turning authored data into live entities.
///
/// These are fatal to the setup of the entity or archetype concerned and
/// must never halt the rest of the simulation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A capability tag that nothing was registered under
    #[error("unknown {family} kind: {tag}")]
    UnknownKind {
        /// Capability family ("action" or "condition")
        family: &'static str,
        /// The unregistered tag
        tag: String,
    },

    /// No archetype with the requested name
    #[error("archetype not found: {0}")]
    MissingArchetype(String),

    /// An archetype record failed validation
    #[error("invalid archetype {name}: {reason}")]
    InvalidArchetype {
        /// Archetype name
        name: String,
        /// What was wrong with it
        reason: String,
    },

    /// A behavior unit template carries unusable values
    #[error("invalid behavior unit {unit}: {reason}")]
    InvalidUnit {
        /// Unit name
        unit: String,
        /// What was wrong with it
        reason: String,
    },

    /// Template source could not be parsed
    #[error("failed to parse templates: {0}")]
    Parse(String),

    /// Template source could not be read
    #[error("failed to read templates: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Vigil operations.
pub type VigilResult<T> = Result<T, VigilError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
