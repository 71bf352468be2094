//! # Innate Primitives
//!
//! Hardcoded constants for the Axiom CORE.
//!
//! The coordinate space, the eight major categories and the genesis hash
//! are compiled into the binary and are immutable at runtime.

/// Upper bound of the `major` coordinate field.
pub const MAJOR_MAX: u8 = 8;

/// Upper bound of the `type` coordinate field.
pub const TYPE_MAX: u8 = 99;

/// Upper bound of the `subtype` coordinate field.
pub const SUBTYPE_MAX: u8 = 99;

/// Upper bound of the `instance` coordinate field.
pub const INSTANCE_MAX: u16 = 9999;

/// Number of fields in a coordinate. Distance is `COORDINATE_DEPTH - common_prefix`.
pub const COORDINATE_DEPTH: u8 = 4;

/// Rendered width of a coordinate: `MM-TT-SS-IIII`.
pub const COORDINATE_WIDTH: usize = 13;

/// The eight axioms. Every coordinate lives under one of them.
pub const MAJOR_CATEGORIES: [(u8, &str); 8] = [
    (1, "Entity"),
    (2, "Action"),
    (3, "Property"),
    (4, "Relation"),
    (5, "Location"),
    (6, "Time"),
    (7, "Quantity"),
    (8, "Abstract"),
];

/// `prev_hash` of the first ledger entry.
pub const GENESIS_HASH: [u8; 32] = [0u8; 32];

/// Context assigned to entities that carry no `context` metadata.
pub const DEFAULT_CONTEXT: &str = "general";

// =============================================================================
// METADATA KEYS
// =============================================================================

/// Metadata key holding the domain an entity was created under.
pub const META_CONTEXT: &str = "context";

/// Metadata key on fork branches holding the origin coordinate.
pub const META_FORKED_FROM: &str = "forked_from";

/// Metadata key on fork branches holding the label of the fork family.
pub const META_ORIGIN_LABEL: &str = "origin_label";

// =============================================================================
// POLICY DEFAULTS
// =============================================================================

/// Tension of an entity with no fork history, in milli-units.
pub const TENSION_BASE_MILLI: u64 = 1000;

/// Default tension added per fork branch, in milli-units.
pub const DEFAULT_BRANCH_WEIGHT: u64 = 500;

/// Default tension added per distinct branch context, in milli-units.
pub const DEFAULT_CONTEXT_WEIGHT: u64 = 250;

/// Default placement for entities created by the strategy selector (Abstract).
pub const DEFAULT_PLACEMENT: (u8, u8, u8) = (8, 1, 1);

/// Maximum label length accepted by the strategy selector.
pub const MAX_LABEL_LENGTH: usize = 256;

/// Human-readable name of a major category.
#[must_use]
pub fn category_name(major: u8) -> &'static str {
    MAJOR_CATEGORIES
        .iter()
        .find(|(m, _)| *m == major)
        .map_or("Unknown", |(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_cover_every_major() {
        assert_eq!(MAJOR_CATEGORIES.len(), MAJOR_MAX as usize);
        for major in 1..=MAJOR_MAX {
            assert_ne!(category_name(major), "Unknown");
        }
        assert_eq!(category_name(0), "Unknown");
        assert_eq!(category_name(9), "Unknown");
    }

    #[test]
    fn genesis_is_all_zero() {
        assert!(GENESIS_HASH.iter().all(|b| *b == 0));
    }
}
