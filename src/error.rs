//! Error types.
//!
//! Per the error model: almost every precondition violation in this crate
//! (duplicate component insert, double-destroy, registering a process
//! through a shared `&World`, dispatcher arena exhaustion) is a
//! programming error signaled with `debug_assert!`/`panic!`, matching the
//! teacher crate's own `debug_assert!`-heavy style (see e.g.
//! `Generation::die`). The one genuinely data-driven, recoverable failure
//! is running out of component type slots at registration time, which
//! this module models as a real `Error` type rather than a panic, since a
//! caller can reasonably decide at runtime how many distinct component
//! types to register.

use std::error::Error as StdError;
use std::fmt;

use crate::bitmask::MAX_COMPONENT_TYPES;

/// Errors `World::register_component` can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldError {
    /// Registering one more distinct component type would exceed
    /// [`MAX_COMPONENT_TYPES`].
    TooManyComponentTypes,
}

impl fmt::Display for WorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldError::TooManyComponentTypes => write!(
                f,
                "cannot register another component type: the {}-type limit is already in use",
                MAX_COMPONENT_TYPES
            ),
        }
    }
}

impl StdError for WorldError {}
