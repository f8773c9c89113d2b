//! Machine role value object module
//!
//! This module defines the MachineRole value object: the canonical snake_case
//! slug identifying a machine's functional class, together with the bundled
//! registry of acceptable slugs and the default operating-cost table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical machine role slugs bundled with the crate.
///
/// Scenario files may spell roles freely ("Feller-Buncher", "roadside
/// processor"); canonicalisation maps them onto this registry.
pub const REGISTERED_ROLES: &[&str] = &[
    "feller_buncher",
    "grapple_skidder",
    "skyline_yarder",
    "processor",
    "loader",
    "harvester",
    "forwarder",
];

/// Aliases applied after normalisation: alternate spellings seen in field
/// data map onto the registered slug.
const ROLE_ALIASES: &[(&str, &str)] = &[
    ("roadside_processor", "processor"),
    ("danglehead_processor", "processor"),
    ("skidder", "grapple_skidder"),
    ("yarder", "skyline_yarder"),
    ("buncher", "feller_buncher"),
    ("log_loader", "loader"),
];

/// Default operating cost per scheduled hour by role, used when a machine
/// row supplies no cost of its own.
const DEFAULT_OPERATING_COSTS: &[(&str, f64)] = &[
    ("feller_buncher", 185.0),
    ("grapple_skidder", 140.0),
    ("skyline_yarder", 225.0),
    ("processor", 165.0),
    ("loader", 120.0),
    ("harvester", 195.0),
    ("forwarder", 150.0),
];

/// Represents a machine's functional class as a canonical snake_case slug
///
/// A MachineRole is always stored in canonical form: lowercased, with runs of
/// non-alphanumeric characters collapsed to a single underscore and known
/// aliases resolved. Canonical form is what eligibility, sequencing, and
/// costing all key on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MachineRole(String);

impl MachineRole {
    /// Canonicalises a raw role string and wraps it
    ///
    /// # Arguments
    ///
    /// * `raw` - Free-form role string from a scenario table
    ///
    /// # Returns
    ///
    /// `None` when the string is blank after normalisation, otherwise the
    /// canonical role (which may or may not be in the bundled registry;
    /// see [`MachineRole::is_registered`]).
    pub fn parse(raw: &str) -> Option<Self> {
        let slug = canonicalise(raw);
        if slug.is_empty() {
            None
        } else {
            Some(Self(slug))
        }
    }

    /// Wraps an already-canonical slug without re-normalising
    ///
    /// Intended for the bundled registries; scenario input goes through
    /// [`MachineRole::parse`].
    pub fn from_canonical(slug: &str) -> Self {
        Self(slug.to_string())
    }

    /// Returns the canonical slug
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Checks whether the slug is in the bundled registry
    pub fn is_registered(&self) -> bool {
        REGISTERED_ROLES.contains(&self.0.as_str())
    }
}

impl fmt::Display for MachineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Applies the fixed role normalisation: lowercase, non-alphanumeric runs
/// collapsed to `_`, leading/trailing underscores trimmed, aliases applied.
pub fn canonicalise(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_was_sep = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }

    for (alias, canonical) in ROLE_ALIASES {
        if slug == *alias {
            return (*canonical).to_string();
        }
    }
    slug
}

/// Provides operating-cost fallbacks for machines that declare a role but no
/// cost. The core never reads a global costing table; a provider is injected
/// at scenario-build time.
pub trait CostingProvider {
    /// Returns the default operating cost per hour for a role, if known
    fn operating_cost(&self, role: &MachineRole) -> Option<f64>;
}

/// Bundled costing provider backed by the default role-rate table
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCosting;

impl CostingProvider for DefaultCosting {
    fn operating_cost(&self, role: &MachineRole) -> Option<f64> {
        DEFAULT_OPERATING_COSTS
            .iter()
            .find(|(slug, _)| *slug == role.as_str())
            .map(|(_, rate)| *rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalise_basic() {
        assert_eq!(canonicalise("Feller-Buncher"), "feller_buncher");
        assert_eq!(canonicalise("  grapple   skidder "), "grapple_skidder");
        assert_eq!(canonicalise("PROCESSOR"), "processor");
    }

    #[test]
    fn test_canonicalise_aliases() {
        assert_eq!(canonicalise("roadside processor"), "processor");
        assert_eq!(canonicalise("Skidder"), "grapple_skidder");
        assert_eq!(canonicalise("log loader"), "loader");
    }

    #[test]
    fn test_parse_blank_is_unset() {
        assert!(MachineRole::parse("").is_none());
        assert!(MachineRole::parse("  --  ").is_none());
    }

    #[test]
    fn test_registry_membership() {
        let role = MachineRole::parse("feller buncher").unwrap();
        assert!(role.is_registered());
        let odd = MachineRole::parse("tree nibbler").unwrap();
        assert!(!odd.is_registered());
    }

    #[test]
    fn test_default_costing_covers_registry() {
        for slug in REGISTERED_ROLES {
            let role = MachineRole::from_canonical(slug);
            assert!(
                DefaultCosting.operating_cost(&role).is_some(),
                "no default cost for {}",
                slug
            );
        }
    }
}
