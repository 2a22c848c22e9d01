//! Shared types for mountfs.
//!
//! A pure leaf crate: file identifiers, the path-or-identifier [`Location`]
//! and [`Visibility`]. Every other mountfs crate builds on these.

mod ids;

pub use ids::{FileId, Location};

use serde::{Deserialize, Serialize};

/// Whether a file is publicly readable.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_visibility_strings() {
        assert_eq!(Visibility::Public.to_string(), "public");
        assert_eq!(Visibility::from_str("private").unwrap(), Visibility::Private);
        assert!(Visibility::from_str("hidden").is_err());
    }
}
