//! # axiom-core
//!
//! The deterministic semantic coordinate graph for Axiom - THE LOGIC.
//!
//! Knowledge is modelled as points in a fixed four-level coordinate space.
//! Similarity, grouping, ambiguity and connectivity are DERIVED from the
//! coordinates and a small set of explicit edges instead of being stored.
//!
//! ## Components
//!
//! - `coordinate`: the 4-field identifier and its prefix arithmetic
//! - `types`: entities, edges, metadata, relations and `AxiomError`
//! - `graph`: in-memory indexes and the derivation algorithms
//! - `store`: the audited owner of one graph + ledger pair
//! - `fork`: splitting an ambiguous entity into branches
//! - `ledger`: the append-only BLAKE3 hash chain
//! - `strategy`: deterministic reuse / create / fork selection
//! - `shared`: the lock boundary for multi-threaded callers
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Has NO async, NO network dependencies, NO file I/O (pure Rust)
//! - Uses `BTreeMap`/`BTreeSet` only, so every result is ordered
//! - Audits every mutation before it becomes visible
//! - Knows nothing about external formats; adapters call the public API

// =============================================================================
// MODULES
// =============================================================================

pub mod coordinate;
pub mod fork;
pub mod graph;
pub mod ledger;
pub mod primitives;
pub mod shared;
pub mod store;
pub mod strategy;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use coordinate::Coordinate;
pub use types::{AxiomError, Edge, Entity, MetaValue, Metadata, RelationType};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use fork::{ForkEngine, ForkRecord};
pub use graph::{Graph, Tension, TensionPolicy};
pub use ledger::{AuditEntry, AuditLedger, ChainVerification, Clock, Digest, FixedClock, SystemClock};
pub use shared::SharedStore;
pub use store::{GraphStore, StoreSummary};
pub use strategy::{Context, Decision, SelectorPolicy, StrategyAction, StrategySelector};
