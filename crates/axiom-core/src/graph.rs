//! # Graph Engine
//!
//! The deterministic in-memory indexes of Axiom CORE and the pure
//! derivation algorithms that run over them.
//!
//! All data structures use `BTreeMap`/`BTreeSet`, so every iteration (and
//! therefore every derivation result) follows Coordinate order.
//!
//! `Graph` never checks or audits anything on its own. Mutations are
//! `pub(crate)` and reached only through `GraphStore`, which validates first
//! and appends to the ledger.

use crate::primitives::{
    DEFAULT_BRANCH_WEIGHT, DEFAULT_CONTEXT_WEIGHT, INSTANCE_MAX, SUBTYPE_MAX,
    TENSION_BASE_MILLI, TYPE_MAX,
};
use crate::{AxiomError, Coordinate, Edge, Entity, Metadata, RelationType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

// =============================================================================
// TENSION
// =============================================================================

/// Weights of the tension formula, in milli-units.
///
/// ```text
/// tension = 1000 + branch_weight * branches + context_weight * contexts
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TensionPolicy {
    /// Added per fork branch in the entity's family.
    pub branch_weight: u64,
    /// Added per distinct context among those branches.
    pub context_weight: u64,
}

impl Default for TensionPolicy {
    fn default() -> Self {
        Self {
            branch_weight: DEFAULT_BRANCH_WEIGHT,
            context_weight: DEFAULT_CONTEXT_WEIGHT,
        }
    }
}

impl TensionPolicy {
    /// Score in milli-units. Saturates instead of overflowing.
    #[must_use]
    pub fn score(&self, branches: usize, contexts: usize) -> u64 {
        TENSION_BASE_MILLI
            .saturating_add(self.branch_weight.saturating_mul(branches as u64))
            .saturating_add(self.context_weight.saturating_mul(contexts as u64))
    }
}

/// Derived ambiguity score of an entity.
///
/// Stored as integer milli-units so it reproduces bit-for-bit from the
/// same store state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tension {
    milli: u64,
    branches: usize,
    contexts: usize,
}

impl Tension {
    #[must_use]
    pub fn milli(&self) -> u64 {
        self.milli
    }

    /// Fork branches counted.
    #[must_use]
    pub fn branches(&self) -> usize {
        self.branches
    }

    /// Distinct branch contexts counted.
    #[must_use]
    pub fn contexts(&self) -> usize {
        self.contexts
    }

    /// The score as a real number (1.0 for an un-forked entity).
    #[must_use]
    #[allow(clippy::float_arithmetic)]
    pub fn value(&self) -> f64 {
        self.milli as f64 / 1000.0
    }
}

impl fmt::Display for Tension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.milli / 1000, self.milli % 1000)
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// The main Graph structure.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Entity storage: Coordinate -> Entity
    entities: BTreeMap<Coordinate, Entity>,

    /// Every explicit edge, ordered by (source, target, relation)
    edges: BTreeSet<Edge>,

    /// Adjacency: source -> {(target, relation)}
    outgoing: BTreeMap<Coordinate, BTreeSet<(Coordinate, RelationType)>>,

    /// Reverse adjacency: target -> {(source, relation)}
    incoming: BTreeMap<Coordinate, BTreeSet<(Coordinate, RelationType)>>,

    /// Fork lineage: parent -> direct branches
    children: BTreeMap<Coordinate, BTreeSet<Coordinate>>,

    /// Registered custom relation names
    relations: BTreeSet<String>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // READS
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn get(&self, id: &Coordinate) -> Option<&Entity> {
        self.entities.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &Coordinate) -> bool {
        self.entities.contains_key(id)
    }

    /// Get all entities in Coordinate order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Get all edges in (source, target, relation) order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Outgoing edges of `id`, ordered by target.
    pub fn edges_from(&self, id: &Coordinate) -> impl Iterator<Item = Edge> + '_ {
        let source = *id;
        self.outgoing
            .get(id)
            .into_iter()
            .flat_map(move |targets| {
                targets
                    .iter()
                    .map(move |(target, relation)| Edge::new(source, *target, relation.clone()))
            })
    }

    /// Incoming edges of `id`, ordered by source.
    pub fn edges_into(&self, id: &Coordinate) -> impl Iterator<Item = Edge> + '_ {
        let target = *id;
        self.incoming
            .get(id)
            .into_iter()
            .flat_map(move |sources| {
                sources
                    .iter()
                    .map(move |(source, relation)| Edge::new(*source, target, relation.clone()))
            })
    }

    #[must_use]
    pub fn contains_edge(&self, edge: &Edge) -> bool {
        self.edges.contains(edge)
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Built-in relations are always known; custom ones once registered.
    #[must_use]
    pub fn is_relation_known(&self, relation: &RelationType) -> bool {
        match relation {
            RelationType::Custom(name) => self.relations.contains(name),
            _ => true,
        }
    }

    /// Registered custom relation names, sorted.
    pub fn custom_relations(&self) -> impl Iterator<Item = &str> {
        self.relations.iter().map(String::as_str)
    }

    /// Entities whose label matches `label`.
    #[must_use]
    pub fn find_by_label(&self, label: &str, case_sensitive: bool) -> Vec<&Entity> {
        if case_sensitive {
            return self.entities().filter(|e| e.label() == label).collect();
        }
        let needle = label.to_lowercase();
        self.entities()
            .filter(|e| e.label().to_lowercase() == needle)
            .collect()
    }

    /// Entities whose fork family is known by `label`.
    #[must_use]
    pub fn find_by_subject(&self, label: &str) -> Vec<&Entity> {
        self.entities()
            .filter(|e| e.subject_label() == label)
            .collect()
    }

    // -------------------------------------------------------------------------
    // MUTATIONS: callers validate and audit first
    // -------------------------------------------------------------------------

    pub(crate) fn insert_entity(&mut self, entity: Entity) {
        if let Some(parent) = entity.fork_parent() {
            self.children.entry(parent).or_default().insert(entity.id());
        }
        self.entities.insert(entity.id(), entity);
    }

    pub(crate) fn insert_edge(&mut self, edge: Edge) {
        self.outgoing
            .entry(edge.source)
            .or_default()
            .insert((edge.target, edge.relation.clone()));
        self.incoming
            .entry(edge.target)
            .or_default()
            .insert((edge.source, edge.relation.clone()));
        self.edges.insert(edge);
    }

    pub(crate) fn register_relation(&mut self, name: String) {
        self.relations.insert(name);
    }

    pub(crate) fn merge_metadata(&mut self, id: &Coordinate, patch: Metadata) -> Option<&Entity> {
        let entity = self.entities.get_mut(id)?;
        entity.merge_metadata(patch);
        Some(entity)
    }

    // -------------------------------------------------------------------------
    // ALLOCATION
    // -------------------------------------------------------------------------

    /// The next `count` free coordinates after the greatest existing
    /// coordinate under `major-type`.
    ///
    /// Fails as a whole when the major+type cannot hold all of them.
    pub fn allocate_in_type(
        &self,
        major: u8,
        type_: u8,
        count: usize,
    ) -> Result<Vec<Coordinate>, AxiomError> {
        let first = Coordinate::first_in_type(major, type_)?;
        let last = Coordinate::last_in_type(major, type_)?;
        let exhausted = || AxiomError::CoordinateSpaceExhausted { major, type_ };

        let mut cursor = match self.entities.range(first..=last).next_back() {
            Some((greatest, _)) => greatest.next_in_type().ok_or_else(exhausted)?,
            None => first,
        };

        let mut allocated = Vec::with_capacity(count);
        for i in 0..count {
            allocated.push(cursor);
            if i.saturating_add(1) < count {
                cursor = cursor.next_in_type().ok_or_else(exhausted)?;
            }
        }
        Ok(allocated)
    }

    /// The next free instance under `major-type-subtype`.
    pub fn next_instance(
        &self,
        major: u8,
        type_: u8,
        subtype: u8,
    ) -> Result<Coordinate, AxiomError> {
        let first = Coordinate::create(major, type_, subtype, 1)?;
        let last = Coordinate::create(major, type_, subtype, INSTANCE_MAX)?;

        match self.entities.range(first..=last).next_back() {
            None => Ok(first),
            Some((greatest, _)) if greatest.instance() < INSTANCE_MAX => {
                Coordinate::create(major, type_, subtype, greatest.instance().saturating_add(1))
            }
            Some(_) => Err(AxiomError::CoordinateSpaceExhausted { major, type_ }),
        }
    }

    // -------------------------------------------------------------------------
    // DERIVATION: computed from position, edges and lineage, never stored
    // -------------------------------------------------------------------------

    fn require(&self, id: &Coordinate) -> Result<&Entity, AxiomError> {
        self.entities
            .get(id)
            .ok_or(AxiomError::UnknownEntity(*id))
    }

    /// Transitive fork branches of `id` (not including `id`).
    pub fn derive_descendants(&self, id: &Coordinate) -> Result<BTreeSet<Coordinate>, AxiomError> {
        self.require(id)?;
        Ok(self.descendants_of(id))
    }

    fn descendants_of(&self, id: &Coordinate) -> BTreeSet<Coordinate> {
        let mut found = BTreeSet::new();
        let mut queue = VecDeque::from([*id]);

        while let Some(current) = queue.pop_front() {
            for child in self.children.get(&current).into_iter().flatten() {
                if found.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }
        found
    }

    /// Direct fork branches of `id`.
    pub fn branches_of(&self, id: &Coordinate) -> impl Iterator<Item = &Entity> {
        self.children
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|child| self.entities.get(child))
    }

    /// Entities sharing major+type with `id`, excluding `id` and its fork
    /// descendants.
    pub fn derive_siblings(&self, id: &Coordinate) -> Result<Vec<&Entity>, AxiomError> {
        self.require(id)?;
        let first = Coordinate::first_in_type(id.major(), id.type_())?;
        let last = Coordinate::last_in_type(id.major(), id.type_())?;
        Ok(self.related_in_range(id, first, last))
    }

    /// Entities sharing major+type+subtype with `id`, excluding `id` and its
    /// fork descendants.
    pub fn derive_cousins(&self, id: &Coordinate) -> Result<Vec<&Entity>, AxiomError> {
        self.require(id)?;
        let first = Coordinate::create(id.major(), id.type_(), id.subtype(), 1)?;
        let last = Coordinate::create(id.major(), id.type_(), id.subtype(), INSTANCE_MAX)?;
        Ok(self.related_in_range(id, first, last))
    }

    fn related_in_range(&self, id: &Coordinate, first: Coordinate, last: Coordinate) -> Vec<&Entity> {
        let lineage = self.descendants_of(id);
        self.entities
            .range(first..=last)
            .filter(|(other, _)| *other != id && !lineage.contains(*other))
            .map(|(_, entity)| entity)
            .collect()
    }

    /// Entities under one major category.
    pub fn derive_category(&self, major: u8) -> Result<Vec<&Entity>, AxiomError> {
        let first = Coordinate::create(major, 1, 1, 1)?;
        let last = Coordinate::create(major, TYPE_MAX, SUBTYPE_MAX, INSTANCE_MAX)?;
        Ok(self.entities.range(first..=last).map(|(_, e)| e).collect())
    }

    /// Shortest directed path by breadth-first search.
    ///
    /// Neighbors are expanded in Coordinate order, so ties resolve to the
    /// smallest coordinate. Empty when `to` is unreachable.
    pub fn derive_path(
        &self,
        from: &Coordinate,
        to: &Coordinate,
    ) -> Result<Vec<&Entity>, AxiomError> {
        let start = self.require(from)?;
        self.require(to)?;

        if from == to {
            return Ok(vec![start]);
        }

        let mut parent: BTreeMap<Coordinate, Coordinate> = BTreeMap::new();
        let mut visited = BTreeSet::from([*from]);
        let mut queue = VecDeque::from([*from]);

        while let Some(current) = queue.pop_front() {
            let next: BTreeSet<Coordinate> = self
                .outgoing
                .get(&current)
                .into_iter()
                .flatten()
                .map(|(target, _)| *target)
                .collect();

            for neighbor in next {
                if !visited.insert(neighbor) {
                    continue;
                }
                parent.insert(neighbor, current);
                if neighbor == *to {
                    return Ok(self.unwind(&parent, *from, *to));
                }
                queue.push_back(neighbor);
            }
        }

        Ok(Vec::new())
    }

    fn unwind(
        &self,
        parent: &BTreeMap<Coordinate, Coordinate>,
        from: Coordinate,
        to: Coordinate,
    ) -> Vec<&Entity> {
        let mut path = vec![to];
        let mut current = to;
        while current != from {
            match parent.get(&current) {
                Some(prev) => {
                    path.push(*prev);
                    current = *prev;
                }
                None => break,
            }
        }
        path.reverse();
        path.iter().filter_map(|id| self.entities.get(id)).collect()
    }

    /// Entities within `max_distance` of `id`, nearest first, ties by Coordinate.
    pub fn derive_neighbors(
        &self,
        id: &Coordinate,
        max_distance: u8,
    ) -> Result<Vec<(&Entity, u8)>, AxiomError> {
        self.require(id)?;
        let mut found: Vec<(&Entity, u8)> = self
            .entities
            .iter()
            .filter(|(other, _)| *other != id)
            .map(|(other, entity)| (entity, id.distance(other)))
            .filter(|(_, distance)| *distance <= max_distance)
            .collect();
        found.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.id().cmp(&b.0.id())));
        Ok(found)
    }

    /// Ambiguity score from the fork history of `id`'s label family.
    ///
    /// Roots are `id` plus every non-branch entity with the same subject
    /// label; branches are all their transitive fork descendants.
    pub fn derive_tension(
        &self,
        id: &Coordinate,
        policy: &TensionPolicy,
    ) -> Result<Tension, AxiomError> {
        let entity = self.require(id)?;
        let subject = entity.subject_label();

        let mut roots: BTreeSet<Coordinate> = self
            .entities()
            .filter(|e| !e.is_branch() && e.label() == subject)
            .map(Entity::id)
            .collect();
        roots.insert(*id);

        let branches: BTreeSet<Coordinate> = roots
            .iter()
            .flat_map(|root| self.descendants_of(root))
            .collect();
        let contexts: BTreeSet<&str> = branches
            .iter()
            .filter_map(|b| self.entities.get(b))
            .map(Entity::label)
            .collect();

        Ok(Tension {
            milli: policy.score(branches.len(), contexts.len()),
            branches: branches.len(),
            contexts: contexts.len(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
