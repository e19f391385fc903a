#![forbid(unsafe_code)]

use crate::location::Location;

/// Knobs for one checking session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckerConfig {
    /// Whether the `Any` type may be named in annotations.
    pub any_type_enabled: bool,
    /// Location of the checked program; part of every declared type's ID.
    pub location: Location,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            any_type_enabled: false,
            location: Location::default(),
        }
    }
}

impl CheckerConfig {
    pub fn with_any_type(mut self, enabled: bool) -> Self {
        self.any_type_enabled = enabled;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }
}
