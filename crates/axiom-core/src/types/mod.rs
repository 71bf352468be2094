//! # Core Type Definitions
//!
//! This module contains the records the store owns:
//! - Entity metadata (`MetaValue`, `Metadata`)
//! - Stored concepts (`Entity`)
//! - Explicit relationships (`RelationType`, `Edge`)
//! - Error types (`AxiomError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer values only (no floating-point)
//! - Implement `Ord` where they key a `BTreeMap`/`BTreeSet`
//! - Serialize with a stable field order, so the ledger can hash them

use crate::Coordinate;
use crate::primitives::{DEFAULT_CONTEXT, META_CONTEXT, META_FORKED_FROM, META_ORIGIN_LABEL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// METADATA
// =============================================================================

/// A metadata value attached to an entity or captured in an audit snapshot.
///
/// Tagged union so the canonical encoding is well-defined: postcard writes
/// the variant index followed by the payload. Floats are deliberately absent.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<MetaValue>),
    Map(BTreeMap<String, MetaValue>),
}

/// Key-sorted metadata mapping.
pub type Metadata = BTreeMap<String, MetaValue>;

impl MetaValue {
    /// The text payload, if this is a `Text` value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The integer payload, if this is an `Int` value.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetaValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for MetaValue {
    fn from(value: u64) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for MetaValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Coordinate> for MetaValue {
    fn from(value: Coordinate) -> Self {
        Self::Text(value.render())
    }
}

impl From<Option<Coordinate>> for MetaValue {
    fn from(value: Option<Coordinate>) -> Self {
        value.map_or(Self::Null, Self::from)
    }
}

impl<T: Into<MetaValue>> From<Vec<T>> for MetaValue {
    fn from(value: Vec<T>) -> Self {
        Self::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<Metadata> for MetaValue {
    fn from(value: Metadata) -> Self {
        Self::Map(value)
    }
}

// =============================================================================
// ENTITY
// =============================================================================

/// A concept positioned in semantic space.
///
/// Stores only the coordinate, a label, metadata, and the entity it was
/// forked from. Everything else is derived from position and edges.
/// The id is immutable; metadata changes only through store merges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    id: Coordinate,
    label: String,
    metadata: Metadata,
    fork_parent: Option<Coordinate>,
}

impl Entity {
    /// Create an entity with empty metadata.
    #[must_use]
    pub fn new(id: Coordinate, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            metadata: Metadata::new(),
            fork_parent: None,
        }
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replace the whole metadata mapping.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Record the domain this entity was created under.
    #[must_use]
    pub fn with_context(self, context: impl Into<String>) -> Self {
        self.with_meta(META_CONTEXT, context.into())
    }

    /// Build a fork branch of `origin`.
    pub(crate) fn branch_of(origin: &Entity, id: Coordinate, label: &str) -> Self {
        let mut branch = Self::new(id, label)
            .with_meta(META_FORKED_FROM, origin.id)
            .with_meta(META_ORIGIN_LABEL, origin.subject_label());
        branch.fork_parent = Some(origin.id);
        branch
    }

    #[must_use]
    pub fn id(&self) -> Coordinate {
        self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    #[must_use]
    pub fn fork_parent(&self) -> Option<Coordinate> {
        self.fork_parent
    }

    /// True if this entity was produced by a fork.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.fork_parent.is_some()
    }

    /// The label the entity's fork family is known by.
    ///
    /// Branches answer with their `origin_label`; everything else with its label.
    #[must_use]
    pub fn subject_label(&self) -> &str {
        if self.is_branch()
            && let Some(origin) = self.metadata.get(META_ORIGIN_LABEL).and_then(MetaValue::as_text)
        {
            return origin;
        }
        &self.label
    }

    /// The domain this entity belongs to.
    ///
    /// A branch's context is its own label (the sense it disambiguates to).
    /// The value is trimmed; blank or missing falls back to `general`.
    #[must_use]
    pub fn context(&self) -> &str {
        let raw = if self.is_branch() {
            Some(self.label.as_str())
        } else {
            self.metadata.get(META_CONTEXT).and_then(MetaValue::as_text)
        };
        match raw.map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_CONTEXT,
        }
    }

    /// Overwrite keys from `patch`. Only the store calls this.
    pub(crate) fn merge_metadata(&mut self, patch: Metadata) {
        self.metadata.extend(patch);
    }

    /// Canonical audit snapshot of this entity.
    pub(crate) fn snapshot(&self) -> Metadata {
        let mut args = Metadata::new();
        args.insert("id".to_string(), self.id.into());
        args.insert("label".to_string(), self.label.clone().into());
        args.insert("metadata".to_string(), self.metadata.clone().into());
        args.insert("fork_parent".to_string(), self.fork_parent.into());
        args
    }
}

// =============================================================================
// RELATIONS
// =============================================================================

/// Kind of an explicit edge.
///
/// The seed set is fixed; `Custom` relations extend it once registered on
/// the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationType {
    /// taxonomic
    IsA,
    /// mereological
    PartOf,
    /// attributive
    HasProperty,
    /// causal
    Causes,
    /// spatial
    LocatedIn,
    /// temporal
    OccursAt,
    /// analogical
    SimilarTo,
    /// oppositional
    Contradicts,
    /// ambiguity lineage
    ForkedFrom,
    /// derivation lineage
    DerivedFrom,
    /// Registered extension.
    Custom(String),
}

impl RelationType {
    /// All built-in relations, in declaration order.
    pub const BUILTIN: [RelationType; 10] = [
        Self::IsA,
        Self::PartOf,
        Self::HasProperty,
        Self::Causes,
        Self::LocatedIn,
        Self::OccursAt,
        Self::SimilarTo,
        Self::Contradicts,
        Self::ForkedFrom,
        Self::DerivedFrom,
    ];

    /// Canonical upper snake case name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::IsA => "IS_A",
            Self::PartOf => "PART_OF",
            Self::HasProperty => "HAS_PROPERTY",
            Self::Causes => "CAUSES",
            Self::LocatedIn => "LOCATED_IN",
            Self::OccursAt => "OCCURS_AT",
            Self::SimilarTo => "SIMILAR_TO",
            Self::Contradicts => "CONTRADICTS",
            Self::ForkedFrom => "FORKED_FROM",
            Self::DerivedFrom => "DERIVED_FROM",
            Self::Custom(name) => name,
        }
    }

    #[must_use]
    pub fn is_builtin(&self) -> bool {
        !matches!(self, Self::Custom(_))
    }

    /// Custom relation names are non-empty upper snake case.
    pub(crate) fn is_valid_custom_name(name: &str) -> bool {
        !name.is_empty()
            && name.len() <= 64
            && name
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
            && name.bytes().next().is_some_and(|b| b.is_ascii_uppercase())
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RelationType {
    type Err = AxiomError;

    /// Built-in names map to their variant; any other valid name becomes `Custom`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(builtin) = Self::BUILTIN.iter().find(|r| r.name() == s) {
            return Ok(builtin.clone());
        }
        if Self::is_valid_custom_name(s) {
            return Ok(Self::Custom(s.to_string()));
        }
        Err(AxiomError::UnknownRelation(s.to_string()))
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// A typed, directed relationship between two stored entities.
///
/// Ordered by (source, target, relation); the triple is unique in a store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: Coordinate,
    pub target: Coordinate,
    pub relation: RelationType,
}

impl Edge {
    #[must_use]
    pub fn new(source: Coordinate, target: Coordinate, relation: RelationType) -> Self {
        Self {
            source,
            target,
            relation,
        }
    }

    pub(crate) fn snapshot(&self) -> Metadata {
        let mut args = Metadata::new();
        args.insert("source".to_string(), self.source.into());
        args.insert("target".to_string(), self.target.into());
        args.insert("relation".to_string(), self.relation.name().into());
        args
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Axiom system.
///
/// - No silent failures
/// - Use `Result<T, AxiomError>` for fallible operations
/// - A failed operation leaves the store and the ledger untouched
#[derive(Debug, Error)]
pub enum AxiomError {
    /// A coordinate field is outside its declared range.
    #[error("Invalid coordinate: {field} must be 1-{max}, got {value}")]
    InvalidCoordinate {
        field: &'static str,
        value: u32,
        max: u32,
    },

    /// A coordinate string could not be parsed.
    #[error("Malformed coordinate: {0:?} (expected MM-TT-SS-IIII)")]
    MalformedCoordinate(String),

    /// An entity with this coordinate already exists.
    #[error("Duplicate entity id: {0}")]
    DuplicateId(Coordinate),

    /// An identical (source, target, relation) edge already exists.
    #[error("Duplicate edge: {from} -[{relation}]-> {to}")]
    DuplicateEdge {
        from: Coordinate,
        to: Coordinate,
        relation: RelationType,
    },

    /// The referenced entity is not in the store.
    #[error("Unknown entity: {0}")]
    UnknownEntity(Coordinate),

    /// The fork request is not acceptable.
    #[error("Invalid fork request: {0}")]
    InvalidForkRequest(String),

    /// The relation is not built in and has not been registered.
    #[error("Unknown relation: {0}")]
    UnknownRelation(String),

    /// The custom relation is already registered.
    #[error("Duplicate relation: {0}")]
    DuplicateRelation(String),

    /// The label is blank or too long.
    #[error("Invalid label: {0:?}")]
    InvalidLabel(String),

    /// No free coordinate is left under the given major+type (or subtype).
    #[error("Coordinate space exhausted under {major:02}-{type_:02}")]
    CoordinateSpaceExhausted { major: u8, type_: u8 },

    /// Canonical serialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A thread panicked while holding the store lock.
    #[error("Store lock poisoned")]
    LockPoisoned,
}

// =============================================================================
// TESTS
// =============================================================================
