//! # ECS Error Types
//!
//! All errors that can occur while mutating or querying a [`World`](crate::World).
//!
//! Contract violations on the raw pool API are assertions. Everything the
//! world exposes reports the same violations as [`EcsError`] values so a
//! driver loop can fail fast with `?`.

use thiserror::Error;

use crate::ecs::{ComponentId, EntityId};

/// Error returned by a system function.
///
/// Carried unchanged inside [`EcsError::SystemFailed`].
pub type SystemError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in the ECS core.
#[derive(Error, Debug)]
pub enum EcsError {
    /// A component with this name is already registered in the world.
    #[error("component already registered: {0}")]
    DuplicateComponent(String),

    /// The world already holds the maximum number of component kinds.
    #[error("component limit reached: a world holds at most {limit} component kinds")]
    ComponentLimitReached {
        /// Maximum number of kinds per world.
        limit: usize,
    },

    /// No component with this name is registered.
    #[error("unknown component: {0}")]
    UnknownComponent(String),

    /// The component id was not issued by this world.
    #[error("invalid component id: {0}")]
    InvalidComponentId(ComponentId),

    /// Every entity id below the configured limit is live.
    #[error("entity ids exhausted: limit {limit}")]
    EntityIdsExhausted {
        /// The configured entity limit.
        limit: u32,
    },

    /// The entity does not exist (never created or already destroyed).
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The entity already carries the component.
    #[error("entity {entity} already has component {component}")]
    ComponentAlreadyPresent {
        /// The entity.
        entity: EntityId,
        /// The component kind.
        component: ComponentId,
    },

    /// The entity does not carry the component.
    #[error("entity {entity} has no component {component}")]
    ComponentMissing {
        /// The entity.
        entity: EntityId,
        /// The component kind.
        component: ComponentId,
    },

    /// A typed access used a Rust type whose layout differs from the registered one.
    #[error("layout mismatch for component {component}: registered {expected} bytes (align {expected_align}), got {actual} bytes (align {actual_align})")]
    LayoutMismatch {
        /// The component kind.
        component: ComponentId,
        /// Registered size in bytes.
        expected: usize,
        /// Registered alignment.
        expected_align: usize,
        /// Size of the requested Rust type.
        actual: usize,
        /// Alignment of the requested Rust type.
        actual_align: usize,
    },

    /// Typed or byte access to a kind whose values carry a destructor.
    #[error("component {0} is not plain data")]
    NotPlainData(ComponentId),

    /// A system with this name is already registered.
    #[error("system already registered: {0}")]
    DuplicateSystem(String),

    /// No system with this name is registered.
    #[error("unknown system: {0}")]
    UnknownSystem(String),

    /// A system tried to invoke itself while it was running.
    #[error("system invoked while already running: {0}")]
    SystemReentered(String),

    /// A system function returned an error.
    #[error("system {system} failed")]
    SystemFailed {
        /// Name of the failing system.
        system: String,
        /// The error returned by the system function.
        #[source]
        source: SystemError,
    },

    /// Invalid world configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
