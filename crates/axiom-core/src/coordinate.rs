//! # Coordinate
//!
//! A position in the four-level semantic space: `major-type-subtype-instance`.
//!
//! A coordinate is not a database key. Relationships between two concepts
//! are DERIVED from their coordinates:
//! - same `major` = same ontological category
//! - same `major-type` = siblings
//! - same `major-type-subtype` = cousins
//!
//! Distance is computed from the common prefix of the four fields, never stored.

use crate::AxiomError;
use crate::primitives::{
    COORDINATE_DEPTH, COORDINATE_WIDTH, INSTANCE_MAX, MAJOR_MAX, SUBTYPE_MAX, TYPE_MAX,
    category_name,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An immutable, validated coordinate.
///
/// Field order is the ordering order: `Ord` is lexicographic over
/// (major, type, subtype, instance), which gives every `BTreeMap` keyed by
/// coordinates a deterministic iteration order.
///
/// Serialized as its rendered string (`"01-02-03-0004"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Coordinate {
    major: u8,
    type_: u8,
    subtype: u8,
    instance: u16,
}

impl Coordinate {
    /// Create a coordinate, validating every field against its range.
    pub fn create(major: u8, type_: u8, subtype: u8, instance: u16) -> Result<Self, AxiomError> {
        check_field("major", u32::from(major), u32::from(MAJOR_MAX))?;
        check_field("type", u32::from(type_), u32::from(TYPE_MAX))?;
        check_field("subtype", u32::from(subtype), u32::from(SUBTYPE_MAX))?;
        check_field("instance", u32::from(instance), u32::from(INSTANCE_MAX))?;
        Ok(Self {
            major,
            type_,
            subtype,
            instance,
        })
    }

    /// Parse the fixed-width `MM-TT-SS-IIII` form.
    pub fn parse(code: &str) -> Result<Self, AxiomError> {
        let malformed = || AxiomError::MalformedCoordinate(code.to_string());

        if code.len() != COORDINATE_WIDTH || !code.is_ascii() {
            return Err(malformed());
        }

        let parts: Vec<&str> = code.split('-').collect();
        let [major, type_, subtype, instance] = parts.as_slice() else {
            return Err(malformed());
        };
        if major.len() != 2 || type_.len() != 2 || subtype.len() != 2 || instance.len() != 4 {
            return Err(malformed());
        }

        let major = parse_digits(major).ok_or_else(malformed)?;
        let type_ = parse_digits(type_).ok_or_else(malformed)?;
        let subtype = parse_digits(subtype).ok_or_else(malformed)?;
        let instance = parse_digits(instance).ok_or_else(malformed)?;

        // Two-digit fields always fit in u8; four-digit fields always fit in u16.
        Self::create(major as u8, type_ as u8, subtype as u8, instance as u16)
            .map_err(|_| malformed())
    }

    /// Render the canonical string. Exact inverse of [`Coordinate::parse`].
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{:02}-{:02}-{:02}-{:04}",
            self.major, self.type_, self.subtype, self.instance
        )
    }

    #[must_use]
    pub const fn major(&self) -> u8 {
        self.major
    }

    #[must_use]
    pub const fn type_(&self) -> u8 {
        self.type_
    }

    #[must_use]
    pub const fn subtype(&self) -> u8 {
        self.subtype
    }

    #[must_use]
    pub const fn instance(&self) -> u16 {
        self.instance
    }

    /// Name of the major category (`Entity`, `Action`, ...).
    #[must_use]
    pub fn category_name(&self) -> &'static str {
        category_name(self.major)
    }

    // -------------------------------------------------------------------------
    // DERIVATION: computed from the fields, never stored
    // -------------------------------------------------------------------------

    /// Number of leading fields that are pairwise equal (0..=4).
    #[must_use]
    pub fn common_prefix_len(&self, other: &Self) -> u8 {
        let lhs = [
            u16::from(self.major),
            u16::from(self.type_),
            u16::from(self.subtype),
            self.instance,
        ];
        let rhs = [
            u16::from(other.major),
            u16::from(other.type_),
            u16::from(other.subtype),
            other.instance,
        ];
        lhs.iter().zip(rhs.iter()).take_while(|(a, b)| a == b).count() as u8
    }

    /// Tree-prefix distance: `4 - common_prefix_len`.
    ///
    /// - 0 = identical
    /// - 1 = cousins (same subtype)
    /// - 2 = siblings (same type)
    /// - 3 = same category
    /// - 4 = different categories
    #[must_use]
    pub fn distance(&self, other: &Self) -> u8 {
        COORDINATE_DEPTH.saturating_sub(self.common_prefix_len(other))
    }

    /// Same major category.
    #[must_use]
    pub fn shares_category(&self, other: &Self) -> bool {
        self.major == other.major
    }

    /// Same major and type: siblings in the taxonomy.
    #[must_use]
    pub fn shares_type(&self, other: &Self) -> bool {
        self.major == other.major && self.type_ == other.type_
    }

    /// Same major, type and subtype: close cousins.
    #[must_use]
    pub fn shares_subtype(&self, other: &Self) -> bool {
        self.shares_type(other) && self.subtype == other.subtype
    }

    /// The coordinate that follows this one inside the same major+type,
    /// rolling the instance over into the next subtype.
    ///
    /// Returns `None` when the major+type is full.
    #[must_use]
    pub fn next_in_type(&self) -> Option<Self> {
        if self.instance < INSTANCE_MAX {
            Some(Self {
                instance: self.instance.saturating_add(1),
                ..*self
            })
        } else if self.subtype < SUBTYPE_MAX {
            Some(Self {
                subtype: self.subtype.saturating_add(1),
                instance: 1,
                ..*self
            })
        } else {
            None
        }
    }

    /// First coordinate of a major+type (`MM-TT-01-0001`).
    pub(crate) fn first_in_type(major: u8, type_: u8) -> Result<Self, AxiomError> {
        Self::create(major, type_, 1, 1)
    }

    /// Last coordinate of a major+type (`MM-TT-99-9999`).
    pub(crate) fn last_in_type(major: u8, type_: u8) -> Result<Self, AxiomError> {
        Self::create(major, type_, SUBTYPE_MAX, INSTANCE_MAX)
    }
}

fn check_field(field: &'static str, value: u32, max: u32) -> Result<(), AxiomError> {
    if value == 0 || value > max {
        return Err(AxiomError::InvalidCoordinate { field, value, max });
    }
    Ok(())
}

fn parse_digits(s: &str) -> Option<u32> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for Coordinate {
    type Err = AxiomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Coordinate {
    type Error = AxiomError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Coordinate> for String {
    fn from(value: Coordinate) -> Self {
        value.render()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(major: u8, type_: u8, subtype: u8, instance: u16) -> Coordinate {
        Coordinate::create(major, type_, subtype, instance).expect("valid coordinate")
    }

    #[test]
    fn create_and_render() {
        let c = coord(1, 2, 3, 4);
        assert_eq!(c.major(), 1);
        assert_eq!(c.type_(), 2);
        assert_eq!(c.subtype(), 3);
        assert_eq!(c.instance(), 4);
        assert_eq!(c.render(), "01-02-03-0004");
        assert_eq!(c.to_string(), "01-02-03-0004");
    }

    #[test]
    fn create_rejects_out_of_range_fields() {
        assert!(matches!(
            Coordinate::create(0, 1, 1, 1),
            Err(AxiomError::InvalidCoordinate { field: "major", .. })
        ));
        assert!(matches!(
            Coordinate::create(9, 1, 1, 1),
            Err(AxiomError::InvalidCoordinate { field: "major", .. })
        ));
        assert!(matches!(
            Coordinate::create(1, 100, 1, 1),
            Err(AxiomError::InvalidCoordinate { field: "type", .. })
        ));
        assert!(matches!(
            Coordinate::create(1, 1, 0, 1),
            Err(AxiomError::InvalidCoordinate {
                field: "subtype",
                ..
            })
        ));
        assert!(matches!(
            Coordinate::create(1, 1, 1, 10000),
            Err(AxiomError::InvalidCoordinate {
                field: "instance",
                ..
            })
        ));
    }

    #[test]
    fn parse_valid() {
        let c = Coordinate::parse("05-10-15-0999").expect("parse");
        assert_eq!(c, coord(5, 10, 15, 999));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        for bad in [
            "invalid",
            "",
            "1-1-1-1",
            "01-01-01-001",
            "01-01-01-00001",
            "01_01_01_0001",
            "0a-01-01-0001",
            "+1-01-01-0001",
            "01-01-01-+001",
            "09-01-01-0001",
            "00-01-01-0001",
            "01-00-01-0001",
            "01-01-01-0000",
            "01-01-01-0001-",
            "é1-01-01-0001",
        ] {
            assert!(
                matches!(
                    Coordinate::parse(bad),
                    Err(AxiomError::MalformedCoordinate(_))
                ),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn distance_follows_common_prefix() {
        let base = coord(1, 2, 3, 1);
        assert_eq!(base.distance(&coord(1, 2, 3, 1)), 0);
        assert_eq!(base.distance(&coord(1, 2, 3, 2)), 1);
        assert_eq!(base.distance(&coord(1, 2, 4, 1)), 2);
        assert_eq!(base.distance(&coord(1, 3, 1, 1)), 3);
        assert_eq!(base.distance(&coord(2, 1, 1, 1)), 4);
    }

    #[test]
    fn distance_counts_prefix_not_matching_fields() {
        // Same subtype and instance but different type: only major is shared.
        let a = coord(1, 1, 2, 1);
        let b = coord(1, 2, 2, 1);
        assert_eq!(a.common_prefix_len(&b), 1);
        assert_eq!(a.distance(&b), 3);
    }

    #[test]
    fn shares_predicates() {
        let a = coord(1, 2, 1, 1);
        let b = coord(1, 2, 3, 4);
        let c = coord(1, 3, 1, 1);
        let d = coord(2, 2, 1, 1);

        assert!(a.shares_type(&b));
        assert!(!a.shares_type(&c));
        assert!(a.shares_category(&c));
        assert!(!a.shares_category(&d));
        assert!(!a.shares_subtype(&b));
        assert!(a.shares_subtype(&coord(1, 2, 1, 7)));
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut coords = vec![coord(1, 2, 1, 1), coord(1, 1, 2, 1), coord(1, 1, 1, 9)];
        coords.sort();
        assert_eq!(
            coords,
            vec![coord(1, 1, 1, 9), coord(1, 1, 2, 1), coord(1, 2, 1, 1)]
        );
    }

    #[test]
    fn next_in_type_rolls_over_subtype() {
        assert_eq!(coord(1, 1, 2, 2).next_in_type(), Some(coord(1, 1, 2, 3)));
        assert_eq!(
            coord(1, 1, 2, INSTANCE_MAX).next_in_type(),
            Some(coord(1, 1, 3, 1))
        );
        assert_eq!(coord(1, 1, SUBTYPE_MAX, INSTANCE_MAX).next_in_type(), None);
    }

    #[test]
    fn category_names() {
        assert_eq!(coord(1, 1, 1, 1).category_name(), "Entity");
        assert_eq!(coord(8, 1, 1, 1).category_name(), "Abstract");
    }

    #[test]
    fn postcard_encodes_rendered_form() {
        let c = coord(1, 1, 2, 1);
        let bytes = postcard::to_allocvec(&c).expect("serialize");
        let back: Coordinate = postcard::from_bytes(&bytes).expect("deserialize");
        assert_eq!(back, c);
        // length prefix + 13 ASCII bytes
        assert_eq!(bytes.len(), 1 + COORDINATE_WIDTH);
    }
}
