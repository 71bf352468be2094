//! # Fork Engine
//!
//! Splits one ambiguous entity into disambiguated branches.
//!
//! - Branches are allocated after the greatest coordinate under the
//!   origin's major+type, so they stay siblings of the origin.
//! - Each branch is inserted through the store (one `INSERT` entry each),
//!   then one `FORK` entry names the origin and every branch.
//! - The origin is retained unmodified. Edges are not copied; callers
//!   re-point new edges at the branches.

use crate::store::GraphStore;
use crate::{AxiomError, Coordinate, Entity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One `create_fork` call, as remembered by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkRecord {
    pub origin: Coordinate,
    /// Branch ids in label order.
    pub branches: Vec<Coordinate>,
    /// Sequence of the `FORK` audit entry.
    pub sequence: u64,
    pub resolved_to: Option<Coordinate>,
}

impl ForkRecord {
    pub(crate) fn new(origin: Coordinate, branches: Vec<Coordinate>, sequence: u64) -> Self {
        Self {
            origin,
            branches,
            sequence,
            resolved_to: None,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved_to.is_some()
    }
}

/// The ForkEngine owns the fork rules. It holds no state of its own.
pub struct ForkEngine;

impl ForkEngine {
    /// Fork `id` into one branch per label.
    ///
    /// Returns the (unchanged) origin and the branches in label order.
    pub fn create_fork(
        store: &mut GraphStore,
        id: Coordinate,
        labels: &[impl AsRef<str>],
    ) -> Result<(Entity, Vec<Entity>), AxiomError> {
        let origin = store
            .get(&id)
            .cloned()
            .ok_or(AxiomError::UnknownEntity(id))?;
        let labels = Self::validate_labels(labels)?;

        let ids = store
            .graph()
            .allocate_in_type(id.major(), id.type_(), labels.len())?;
        let branches: Vec<Entity> = ids
            .into_iter()
            .zip(&labels)
            .map(|(branch_id, label)| Entity::branch_of(&origin, branch_id, label))
            .collect();

        store.commit_fork(id, branches.clone())?;
        tracing::debug!(origin = %id, branches = branches.len(), "fork created");
        Ok((origin, branches))
    }

    /// Mark the most recent fork of `origin` containing `chosen` as resolved.
    pub fn resolve_fork(
        store: &mut GraphStore,
        origin: Coordinate,
        chosen: Coordinate,
    ) -> Result<ForkRecord, AxiomError> {
        for id in [origin, chosen] {
            if !store.contains(&id) {
                return Err(AxiomError::UnknownEntity(id));
            }
        }

        let index = store
            .forks()
            .iter()
            .rposition(|f| f.origin == origin && f.branches.contains(&chosen))
            .ok_or_else(|| {
                AxiomError::InvalidForkRequest(format!(
                    "{} is not a branch of any fork of {}",
                    chosen, origin
                ))
            })?;

        store.commit_resolution(index, chosen)
    }

    /// At least two labels, none blank, no repeats. Returns them trimmed.
    fn validate_labels(labels: &[impl AsRef<str>]) -> Result<Vec<String>, AxiomError> {
        if labels.len() < 2 {
            return Err(AxiomError::InvalidForkRequest(format!(
                "at least 2 labels required, got {}",
                labels.len()
            )));
        }

        let mut seen = BTreeSet::new();
        let mut trimmed = Vec::with_capacity(labels.len());
        for label in labels {
            let label = label.as_ref().trim();
            if label.is_empty() {
                return Err(AxiomError::InvalidForkRequest("blank label".to_string()));
            }
            if !seen.insert(label) {
                return Err(AxiomError::InvalidForkRequest(format!(
                    "duplicate label {:?}",
                    label
                )));
            }
            trimmed.push(label.to_string());
        }
        Ok(trimmed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
