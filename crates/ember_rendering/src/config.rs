//! # Instancing Configuration
//!
//! Initial capacities for the per-LOD storage, loaded once at startup from
//! TOML. Capacities only size the initial reservations; the arrays still
//! grow if a scene exceeds them.

use crate::error::{InstancingError, InstancingResult};
use serde::Deserialize;
use std::path::Path;

/// Configuration for a model's instance storage.
///
/// # Example
///
/// ```rust,ignore
/// let config = InstancingConfig::from_toml_str(r#"
///     instance_capacity = 1024
///     visible_capacity = 256
/// "#)?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct InstancingConfig {
    /// Initial reservation for the full per-LOD instance array.
    pub instance_capacity: usize,
    /// Initial reservation for the dense visible arrays.
    pub visible_capacity: usize,
}

impl Default for InstancingConfig {
    fn default() -> Self {
        Self {
            instance_capacity: 256,
            visible_capacity: 64,
        }
    }
}

impl InstancingConfig {
    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`InstancingError::Parse`] on malformed TOML and
    /// [`InstancingError::InvalidCapacity`] on zero capacities.
    pub fn from_toml_str(input: &str) -> InstancingResult<Self> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`InstancingError::Io`] if the file cannot be read, plus the
    /// errors of [`InstancingConfig::from_toml_str`].
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> InstancingResult<Self> {
        let input = std::fs::read_to_string(path)?;
        Self::from_toml_str(&input)
    }

    /// Checks that every capacity is non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`InstancingError::InvalidCapacity`] naming the offending
    /// field.
    pub fn validate(&self) -> InstancingResult<()> {
        if self.instance_capacity == 0 {
            return Err(InstancingError::InvalidCapacity {
                field: "instance_capacity",
            });
        }
        if self.visible_capacity == 0 {
            return Err(InstancingError::InvalidCapacity {
                field: "visible_capacity",
            });
        }
        Ok(())
    }
}
