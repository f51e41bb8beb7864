//! # Systems
//!
//! Named update functions kept in ascending name order, so listing and
//! "invoke everything" are deterministic.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tracing::debug;

use super::world::World;
use crate::error::{EcsError, EcsResult, SystemError};

/// Boxed system function: receives the world and the frame delta time.
pub type SystemFn = Box<dyn FnMut(&mut World, f32) -> Result<(), SystemError>>;

/// A registered system.
pub struct System {
    name: String,
    /// `None` while the function is running.
    function: Option<SystemFn>,
    last_duration: Duration,
    enabled: bool,
}

impl System {
    fn new(name: String, function: SystemFn) -> Self {
        Self {
            name,
            function: Some(function),
            last_duration: Duration::ZERO,
            enabled: true,
        }
    }

    /// The system's unique name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wall-clock time of the last invocation that actually ran.
    #[inline]
    #[must_use]
    pub const fn last_duration(&self) -> Duration {
        self.last_duration
    }

    /// Whether invoking the system runs its function.
    #[inline]
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables the system.
    #[inline]
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the system's function is currently executing.
    #[inline]
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.function.is_none()
    }

    /// Detaches the function for a call.
    pub(crate) fn take_function(&mut self) -> EcsResult<SystemFn> {
        self.function
            .take()
            .ok_or_else(|| EcsError::SystemReentered(self.name.clone()))
    }

    /// Reattaches the function after a call and records its duration.
    pub(crate) fn finish(&mut self, function: SystemFn, elapsed: Duration) {
        self.function = Some(function);
        self.last_duration = elapsed;
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("name", &self.name)
            .field("last_duration", &self.last_duration)
            .field("enabled", &self.enabled)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Systems keyed and ordered by name.
#[derive(Debug, Default)]
pub struct SystemRegistry {
    systems: BTreeMap<String, System>,
}

impl SystemRegistry {
    /// An empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            systems: BTreeMap::new(),
        }
    }

    /// Registers a system, enabled, with zero recorded duration.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateSystem`] if the name is taken.
    pub fn register(&mut self, name: impl Into<String>, function: SystemFn) -> EcsResult<()> {
        let name = name.into();
        if self.systems.contains_key(&name) {
            return Err(EcsError::DuplicateSystem(name));
        }
        debug!(system = %name, "registered system");
        self.systems.insert(name.clone(), System::new(name, function));
        Ok(())
    }

    /// Number of registered systems.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether no system is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Looks up a system by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&System> {
        self.systems.get(name)
    }

    /// Looks up a system by name, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut System> {
        self.systems.get_mut(name)
    }

    /// Systems in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = &System> + '_ {
        self.systems.values()
    }

    /// Systems in ascending name order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut System> + '_ {
        self.systems.values_mut()
    }

    /// Names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.systems.keys().map(String::as_str)
    }
}
