//! Startup error taxonomy
//!
//! Only configuration and capacity problems surface as errors. Once the world
//! is initialized the frame loop recovers locally and never fails.

use thiserror::Error;

/// Invalid or inconsistent settings, detected before the simulation starts
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A numeric setting is out of its valid range
    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    /// Supplied per-hazard velocity table does not match the hazard count
    #[error("velocity table has {actual} entries but the field holds {expected} hazards")]
    VelocityTableMismatch { expected: usize, actual: usize },
    /// Settings file could not be read
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),
    /// Settings file is not valid JSON for the settings schema
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fatal errors raised while registering bodies or initializing the world
#[derive(Debug, Error)]
pub enum PhysicsError {
    /// More bodies registered than the world was sized for
    #[error("body registry is full ({capacity} bodies)")]
    CapacityExceeded { capacity: usize },
    /// Initialization was forced before every expected body registered
    #[error("only {registered} of {expected} bodies registered")]
    RegistrationIncomplete { registered: usize, expected: usize },
    /// The registry must contain exactly one actor
    #[error("expected exactly one actor, found {found}")]
    ActorCount { found: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
