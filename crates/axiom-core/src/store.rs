//! # Graph Store
//!
//! Owns one `Graph` and one `AuditLedger` as a pair.
//!
//! Every mutation follows the same order:
//! 1. run every check (nothing changes if one fails)
//! 2. append the audit entry
//! 3. apply the change to the graph
//!
//! Derivation queries read the graph and never touch the ledger.

use crate::fork::ForkRecord;
use crate::graph::{Graph, Tension, TensionPolicy};
use crate::ledger::{AuditEntry, AuditLedger, ChainVerification, Clock, actions};
use crate::{AxiomError, Coordinate, Edge, Entity, MetaValue, Metadata, RelationType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Summary statistics of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSummary {
    pub entities: usize,
    pub edges: usize,
    pub forks: usize,
    pub audit_entries: usize,
    pub chain_intact: bool,
    /// Pairwise derivable relationships per stored fact: `n² / (n + edges)`.
    pub derivation_ratio: u64,
}

/// The audited entity store.
///
/// One value per session or tenant; there is no process-wide instance.
#[derive(Debug, Clone)]
pub struct GraphStore {
    graph: Graph,
    ledger: AuditLedger,
    forks: Vec<ForkRecord>,
    tension: TensionPolicy,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    /// Create an empty store with the wall clock and default tension weights.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ledger(AuditLedger::new())
    }

    /// Create an empty store whose ledger is stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_ledger(AuditLedger::with_clock(clock))
    }

    fn with_ledger(ledger: AuditLedger) -> Self {
        Self {
            graph: Graph::new(),
            ledger,
            forks: Vec::new(),
            tension: TensionPolicy::default(),
        }
    }

    /// Replace the tension weights.
    #[must_use]
    pub fn with_tension_policy(mut self, policy: TensionPolicy) -> Self {
        self.tension = policy;
        self
    }

    #[must_use]
    pub fn tension_policy(&self) -> &TensionPolicy {
        &self.tension
    }

    /// Read-only view of the indexes.
    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[must_use]
    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Store a new entity.
    pub fn insert(&mut self, entity: Entity) -> Result<Entity, AxiomError> {
        if self.graph.contains(&entity.id()) {
            return Err(AxiomError::DuplicateId(entity.id()));
        }
        if let Some(parent) = entity.fork_parent()
            && !self.graph.contains(&parent)
        {
            return Err(AxiomError::UnknownEntity(parent));
        }

        self.ledger.append(actions::INSERT, entity.snapshot())?;
        tracing::debug!(id = %entity.id(), label = entity.label(), "insert");
        self.graph.insert_entity(entity.clone());
        Ok(entity)
    }

    /// Store a directed edge between two existing entities.
    pub fn connect(
        &mut self,
        source: Coordinate,
        target: Coordinate,
        relation: RelationType,
    ) -> Result<Edge, AxiomError> {
        for endpoint in [source, target] {
            if !self.graph.contains(&endpoint) {
                return Err(AxiomError::UnknownEntity(endpoint));
            }
        }
        if !self.graph.is_relation_known(&relation) {
            return Err(AxiomError::UnknownRelation(relation.name().to_string()));
        }

        let edge = Edge::new(source, target, relation);
        if self.graph.contains_edge(&edge) {
            return Err(AxiomError::DuplicateEdge {
                from: source,
                to: target,
                relation: edge.relation,
            });
        }

        self.ledger.append(actions::CONNECT, edge.snapshot())?;
        tracing::debug!(%source, %target, relation = edge.relation.name(), "connect");
        self.graph.insert_edge(edge.clone());
        Ok(edge)
    }

    /// Add a custom relation to the registry.
    pub fn register_relation(&mut self, name: &str) -> Result<RelationType, AxiomError> {
        let relation: RelationType = name.parse()?;
        // Built-ins are always known, so they are rejected here too.
        if self.graph.is_relation_known(&relation) {
            return Err(AxiomError::DuplicateRelation(name.to_string()));
        }

        let mut args = Metadata::new();
        args.insert("name".to_string(), name.into());
        self.ledger.append(actions::REGISTER_RELATION, args)?;
        tracing::debug!(relation = name, "register relation");
        self.graph.register_relation(name.to_string());
        Ok(relation)
    }

    /// Overwrite metadata keys on an existing entity.
    pub fn merge_metadata(
        &mut self,
        id: Coordinate,
        patch: Metadata,
    ) -> Result<Entity, AxiomError> {
        if !self.graph.contains(&id) {
            return Err(AxiomError::UnknownEntity(id));
        }

        let mut args = Metadata::new();
        args.insert("id".to_string(), id.into());
        args.insert("metadata".to_string(), patch.clone().into());
        self.ledger.append(actions::MERGE_METADATA, args)?;
        tracing::debug!(%id, keys = patch.len(), "merge metadata");

        self.graph
            .merge_metadata(&id, patch)
            .cloned()
            .ok_or(AxiomError::UnknownEntity(id))
    }

    /// Insert prepared fork branches and record the fork.
    ///
    /// The fork engine has already validated the origin, labels and space.
    pub(crate) fn commit_fork(
        &mut self,
        origin: Coordinate,
        branches: Vec<Entity>,
    ) -> Result<ForkRecord, AxiomError> {
        let ids: Vec<Coordinate> = branches.iter().map(Entity::id).collect();
        for branch in branches {
            self.insert(branch)?;
        }

        let mut args = Metadata::new();
        args.insert("origin".to_string(), origin.into());
        args.insert("branches".to_string(), ids.clone().into());
        let entry = self.ledger.append(actions::FORK, args)?;
        tracing::debug!(%origin, branches = ids.len(), "fork");

        let record = ForkRecord::new(origin, ids, entry.sequence);
        self.forks.push(record.clone());
        Ok(record)
    }

    /// Mark fork `index` as resolved to `chosen`.
    pub(crate) fn commit_resolution(
        &mut self,
        index: usize,
        chosen: Coordinate,
    ) -> Result<ForkRecord, AxiomError> {
        let mut record = self
            .forks
            .get(index)
            .cloned()
            .ok_or_else(|| AxiomError::InvalidForkRequest(format!("no fork #{}", index)))?;

        let mut args = Metadata::new();
        args.insert("origin".to_string(), record.origin.into());
        args.insert("chosen".to_string(), chosen.into());
        args.insert("fork_sequence".to_string(), MetaValue::from(record.sequence));
        self.ledger.append(actions::RESOLVE_FORK, args)?;
        tracing::debug!(origin = %record.origin, %chosen, "resolve fork");

        record.resolved_to = Some(chosen);
        if let Some(slot) = self.forks.get_mut(index) {
            *slot = record.clone();
        }
        Ok(record)
    }

    /// Log a selector decision.
    pub(crate) fn record_decision(&mut self, args: Metadata) -> Result<AuditEntry, AxiomError> {
        self.ledger.append(actions::DECISION, args)
    }

    // =========================================================================
    // READS
    // =========================================================================

    #[must_use]
    pub fn get(&self, id: &Coordinate) -> Option<&Entity> {
        self.graph.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &Coordinate) -> bool {
        self.graph.contains(id)
    }

    /// All entities in Coordinate order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.graph.entities()
    }

    /// All edges in (source, target, relation) order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.graph.edges()
    }

    #[must_use]
    pub fn edges_from(&self, id: &Coordinate) -> Vec<Edge> {
        self.graph.edges_from(id).collect()
    }

    #[must_use]
    pub fn edges_into(&self, id: &Coordinate) -> Vec<Edge> {
        self.graph.edges_into(id).collect()
    }

    #[must_use]
    pub fn find_by_label(&self, label: &str, case_sensitive: bool) -> Vec<Entity> {
        owned(self.graph.find_by_label(label, case_sensitive))
    }

    /// Every fork, in creation order.
    #[must_use]
    pub fn forks(&self) -> &[ForkRecord] {
        &self.forks
    }

    /// Forks created from `origin`, in creation order.
    #[must_use]
    pub fn forks_of(&self, origin: &Coordinate) -> Vec<&ForkRecord> {
        self.forks.iter().filter(|f| f.origin == *origin).collect()
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.graph.entity_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    // =========================================================================
    // DERIVATION
    // =========================================================================

    pub fn derive_siblings(&self, id: &Coordinate) -> Result<Vec<Entity>, AxiomError> {
        self.graph.derive_siblings(id).map(owned)
    }

    pub fn derive_cousins(&self, id: &Coordinate) -> Result<Vec<Entity>, AxiomError> {
        self.graph.derive_cousins(id).map(owned)
    }

    pub fn derive_category(&self, major: u8) -> Result<Vec<Entity>, AxiomError> {
        self.graph.derive_category(major).map(owned)
    }

    pub fn derive_path(
        &self,
        from: &Coordinate,
        to: &Coordinate,
    ) -> Result<Vec<Entity>, AxiomError> {
        self.graph.derive_path(from, to).map(owned)
    }

    pub fn derive_neighbors(
        &self,
        id: &Coordinate,
        max_distance: u8,
    ) -> Result<Vec<(Entity, u8)>, AxiomError> {
        Ok(self
            .graph
            .derive_neighbors(id, max_distance)?
            .into_iter()
            .map(|(e, d)| (e.clone(), d))
            .collect())
    }

    pub fn derive_descendants(&self, id: &Coordinate) -> Result<BTreeSet<Coordinate>, AxiomError> {
        self.graph.derive_descendants(id)
    }

    /// Tension of `id` under this store's policy.
    pub fn derive_tension(&self, id: &Coordinate) -> Result<Tension, AxiomError> {
        self.graph.derive_tension(id, &self.tension)
    }

    // =========================================================================
    // AUDIT
    // =========================================================================

    #[must_use]
    pub fn verify(&self) -> ChainVerification {
        self.ledger.verify()
    }

    #[must_use]
    pub fn summary(&self) -> StoreSummary {
        let entities = self.graph.entity_count();
        let edges = self.graph.edge_count();
        let stored = entities.saturating_add(edges) as u64;
        let derivable = (entities as u64).saturating_mul(entities as u64);

        StoreSummary {
            entities,
            edges,
            forks: self.forks.len(),
            audit_entries: self.ledger.len(),
            chain_intact: self.ledger.verify().intact,
            derivation_ratio: derivable.checked_div(stored).unwrap_or(0),
        }
    }
}

fn owned(entities: Vec<&Entity>) -> Vec<Entity> {
    entities.into_iter().cloned().collect()
}

// =============================================================================
// TESTS
// =============================================================================
