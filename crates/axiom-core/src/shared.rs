//! # Shared Store
//!
//! The single mutual-exclusion boundary around one `GraphStore`.
//!
//! Mutations hold the write lock for the whole check-audit-apply sequence,
//! so no reader ever sees an entity without its audit entry. Derivations
//! and `verify` share the read lock.

use crate::fork::ForkEngine;
use crate::graph::Tension;
use crate::ledger::{AuditEntry, ChainVerification};
use crate::store::{GraphStore, StoreSummary};
use crate::strategy::{Context, Decision, StrategySelector};
use crate::{AxiomError, Coordinate, Edge, Entity, RelationType};
use std::sync::{Arc, RwLock};

/// Cloneable handle to one store shared across threads.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<GraphStore>>,
}

impl SharedStore {
    #[must_use]
    pub fn new(store: GraphStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Run `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&GraphStore) -> R) -> Result<R, AxiomError> {
        let guard = self.inner.read().map_err(|_| AxiomError::LockPoisoned)?;
        Ok(f(&guard))
    }

    /// Run `f` under the write lock.
    pub fn write<R>(
        &self,
        f: impl FnOnce(&mut GraphStore) -> Result<R, AxiomError>,
    ) -> Result<R, AxiomError> {
        let mut guard = self.inner.write().map_err(|_| AxiomError::LockPoisoned)?;
        f(&mut guard)
    }

    pub fn insert(&self, entity: Entity) -> Result<Entity, AxiomError> {
        self.write(|store| store.insert(entity))
    }

    pub fn connect(
        &self,
        source: Coordinate,
        target: Coordinate,
        relation: RelationType,
    ) -> Result<Edge, AxiomError> {
        self.write(|store| store.connect(source, target, relation))
    }

    pub fn create_fork(
        &self,
        id: Coordinate,
        labels: &[impl AsRef<str>],
    ) -> Result<(Entity, Vec<Entity>), AxiomError> {
        self.write(|store| ForkEngine::create_fork(store, id, labels))
    }

    pub fn handle(
        &self,
        selector: &StrategySelector,
        label: &str,
        context: &Context,
    ) -> Result<Decision, AxiomError> {
        self.write(|store| selector.handle(store, label, context))
    }

    pub fn derive_siblings(&self, id: &Coordinate) -> Result<Vec<Entity>, AxiomError> {
        self.read(|store| store.derive_siblings(id))?
    }

    pub fn derive_category(&self, major: u8) -> Result<Vec<Entity>, AxiomError> {
        self.read(|store| store.derive_category(major))?
    }

    pub fn derive_path(
        &self,
        from: &Coordinate,
        to: &Coordinate,
    ) -> Result<Vec<Entity>, AxiomError> {
        self.read(|store| store.derive_path(from, to))?
    }

    pub fn derive_tension(&self, id: &Coordinate) -> Result<Tension, AxiomError> {
        self.read(|store| store.derive_tension(id))?
    }

    pub fn verify(&self) -> Result<ChainVerification, AxiomError> {
        self.read(GraphStore::verify)
    }

    /// Copy of the most recent `n` entries, oldest first.
    pub fn last_entries(&self, n: usize) -> Result<Vec<AuditEntry>, AxiomError> {
        self.read(|store| store.ledger().last(n).to_vec())
    }

    pub fn summary(&self) -> Result<StoreSummary, AxiomError> {
        self.read(GraphStore::summary)
    }

    /// Take the store back once every other handle is gone.
    ///
    /// Returns `self` unchanged while other handles are alive.
    pub fn try_unwrap(self) -> Result<GraphStore, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(lock) => lock.into_inner().map_err(|e| Self::new(e.into_inner())),
            Err(inner) => Err(Self { inner }),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn coord(code: &str) -> Coordinate {
        Coordinate::parse(code).expect("coordinate")
    }

    #[test]
    fn concurrent_inserts_get_gapless_sequences() {
        let shared = SharedStore::default();
        let workers: Vec<_> = (1..=4u16)
            .map(|worker| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 1..=25u16 {
                        let id = Coordinate::create(1, 1, worker as u8, i).expect("coordinate");
                        shared
                            .insert(Entity::new(id, format!("w{}-{}", worker, i)))
                            .expect("insert");
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }

        let store = shared.try_unwrap().expect("sole owner");
        assert_eq!(store.entity_count(), 100);
        let sequences: Vec<u64> = store.ledger().entries().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (0..100).collect::<Vec<_>>());
        assert!(store.verify().intact);

        // Every INSERT entry matches a stored entity.
        for entry in store.ledger().entries() {
            let id = entry
                .args
                .get("id")
                .and_then(crate::MetaValue::as_text)
                .expect("id");
            assert!(store.contains(&coord(id)));
        }
    }

    #[test]
    fn reads_see_committed_state() {
        let shared = SharedStore::default();
        shared
            .insert(Entity::new(coord("01-01-01-0001"), "animal"))
            .expect("insert");
        shared
            .insert(Entity::new(coord("01-01-02-0001"), "feline"))
            .expect("insert");
        shared
            .connect(coord("01-01-02-0001"), coord("01-01-01-0001"), RelationType::IsA)
            .expect("connect");

        let path = shared
            .derive_path(&coord("01-01-02-0001"), &coord("01-01-01-0001"))
            .expect("path");
        assert_eq!(path.len(), 2);
        assert_eq!(shared.derive_siblings(&coord("01-01-01-0001")).expect("siblings").len(), 1);
        assert_eq!(shared.derive_category(1).expect("category").len(), 2);
        assert_eq!(shared.last_entries(10).expect("entries").len(), 3);
        assert_eq!(shared.summary().expect("summary").edges, 1);
        assert!(shared.verify().expect("verify").intact);
    }

    #[test]
    fn fork_and_handle_through_handle() {
        let shared = SharedStore::default();
        let jaguar = coord("01-01-02-0001");
        shared.insert(Entity::new(jaguar, "jaguar")).expect("insert");
        let (_, branches) = shared.create_fork(jaguar, &["animal", "car"]).expect("fork");
        assert_eq!(branches.len(), 2);
        assert_eq!(shared.derive_tension(&jaguar).expect("tension").milli(), 2500);

        let selector = StrategySelector::default();
        let decision = shared
            .handle(&selector, "jaguar", &Context::new("car"))
            .expect("handle");
        assert_eq!(decision.entity, branches[1].id());
    }

    #[test]
    fn try_unwrap_fails_while_shared() {
        let shared = SharedStore::default();
        let other = shared.clone();
        let shared = shared.try_unwrap().expect_err("still shared");
        drop(other);
        assert!(shared.try_unwrap().is_ok());
    }
}
