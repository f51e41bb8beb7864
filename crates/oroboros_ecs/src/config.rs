//! # World Configuration
//!
//! Tunables for a [`World`](crate::World), loaded once at startup.
//!
//! ```toml
//! default_page_size = 512
//! entity_limit = 100000
//! ```

use serde::{Deserialize, Serialize};

use crate::ecs::EntityId;
use crate::error::{EcsError, EcsResult};

/// Default number of slots per component pool page.
pub const DEFAULT_PAGE_SIZE: usize = 1024;

/// Configuration for a [`World`](crate::World).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Slots per page for pools registered without an explicit page size.
    pub default_page_size: usize,
    /// Number of entity ids the world may hand out (ids `0..entity_limit`).
    pub entity_limit: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            entity_limit: EntityId::ID_LIMIT,
        }
    }
}

impl WorldConfig {
    /// Parses a configuration from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the TOML is malformed or a
    /// value is out of range.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] for a zero page size or a zero
    /// entity limit.
    pub fn validate(&self) -> EcsResult<()> {
        if self.default_page_size == 0 {
            return Err(EcsError::InvalidConfig(
                "default_page_size must be greater than zero".to_owned(),
            ));
        }
        if self.entity_limit == 0 {
            return Err(EcsError::InvalidConfig(
                "entity_limit must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}
