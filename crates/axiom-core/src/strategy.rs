//! # Strategy Selector
//!
//! Picks one of a finite set of actions for a (label, context) request and
//! executes it through the store.
//!
//! The choice is a pure function of the store's contents:
//!
//! | Store holds                                   | Action           |
//! |-----------------------------------------------|------------------|
//! | an entity with this label in this context     | `REUSE_EXISTING` |
//! | entities with this label in 2+ other contexts | `CREATE_FORK`    |
//! | anything else                                 | `CREATE_NEW`     |
//!
//! Every call ends with a `DECISION` audit entry, so the selector's effect
//! is visible in the ledger even when nothing was created.

use crate::fork::ForkEngine;
use crate::ledger::Digest;
use crate::primitives::{DEFAULT_CONTEXT, DEFAULT_PLACEMENT, MAX_LABEL_LENGTH, META_CONTEXT};
use crate::store::GraphStore;
use crate::{AxiomError, Coordinate, Entity, MetaValue, Metadata};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// ACTIONS
// =============================================================================

/// The finite set of selector outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyAction {
    ReuseExisting,
    CreateNew,
    CreateFork,
}

impl StrategyAction {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ReuseExisting => "REUSE_EXISTING",
            Self::CreateNew => "CREATE_NEW",
            Self::CreateFork => "CREATE_FORK",
        }
    }
}

impl fmt::Display for StrategyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// CONTEXT & POLICY
// =============================================================================

/// The domain a label is requested under.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Context {
    /// Domain name, e.g. `animal` or `vehicle`.
    pub name: String,
    /// Major, type and subtype for entities created in this context.
    pub placement: Option<(u8, u8, u8)>,
    /// Extra metadata for entities created in this context.
    pub metadata: Metadata,
}

impl Context {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_placement(mut self, major: u8, type_: u8, subtype: u8) -> Self {
        self.placement = Some((major, type_, subtype));
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Tunables of the selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorPolicy {
    /// Placement used when neither the context nor `placements` names one.
    pub default_placement: (u8, u8, u8),
    /// Context name used when the request's context is blank.
    pub default_context: String,
    /// Per-context placements.
    pub placements: BTreeMap<String, (u8, u8, u8)>,
}

impl Default for SelectorPolicy {
    fn default() -> Self {
        Self {
            default_placement: DEFAULT_PLACEMENT,
            default_context: DEFAULT_CONTEXT.to_string(),
            placements: BTreeMap::new(),
        }
    }
}

// =============================================================================
// DECISION
// =============================================================================

/// What the selector did, and where it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: StrategyAction,
    pub label: String,
    pub context: String,
    /// The entity that now stands for (label, context).
    pub entity: Coordinate,
    /// Every coordinate the action touched or produced.
    pub coordinates: Vec<Coordinate>,
    /// Sequence of the `DECISION` audit entry.
    pub sequence: u64,
    /// Hash of the `DECISION` audit entry.
    pub hash: Digest,
}

// =============================================================================
// SELECTOR
// =============================================================================

/// Deterministic reuse / create / fork chooser.
#[derive(Debug, Clone, Default)]
pub struct StrategySelector {
    policy: SelectorPolicy,
}

/// Chosen action before it is executed.
enum Plan {
    Reuse(Coordinate),
    Create(Coordinate),
    Fork {
        origin: Coordinate,
        labels: Vec<String>,
    },
}

impl StrategySelector {
    #[must_use]
    pub fn new(policy: SelectorPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &SelectorPolicy {
        &self.policy
    }

    /// Resolve `label` under `context`, executing the chosen action.
    pub fn handle(
        &self,
        store: &mut GraphStore,
        label: &str,
        context: &Context,
    ) -> Result<Decision, AxiomError> {
        let label = label.trim();
        if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
            return Err(AxiomError::InvalidLabel(label.to_string()));
        }
        let context_name = match (context.name.trim(), self.policy.default_context.trim()) {
            ("", "") => DEFAULT_CONTEXT,
            ("", fallback) => fallback,
            (name, _) => name,
        };

        let plan = self.plan(store, label, context_name, context)?;
        let (action, entity, coordinates) = match plan {
            Plan::Reuse(id) => (StrategyAction::ReuseExisting, id, vec![id]),
            Plan::Create(id) => {
                let mut metadata = context.metadata.clone();
                metadata.insert(META_CONTEXT.to_string(), context_name.into());
                store.insert(Entity::new(id, label).with_metadata(metadata))?;
                (StrategyAction::CreateNew, id, vec![id])
            }
            Plan::Fork { origin, labels } => {
                let (_, branches) = ForkEngine::create_fork(store, origin, labels.as_slice())?;
                let ids: Vec<Coordinate> = branches.iter().map(Entity::id).collect();
                let entity = branches
                    .iter()
                    .find(|b| b.label() == context_name)
                    .map_or(origin, Entity::id);
                (StrategyAction::CreateFork, entity, ids)
            }
        };

        let mut args = Metadata::new();
        args.insert("action".to_string(), action.name().into());
        args.insert("label".to_string(), label.into());
        args.insert("context".to_string(), context_name.into());
        args.insert("placement".to_string(), placement_value(context.placement));
        args.insert("metadata".to_string(), context.metadata.clone().into());
        args.insert("entity".to_string(), entity.into());
        args.insert("coordinates".to_string(), coordinates.clone().into());
        let entry = store.record_decision(args)?;

        tracing::debug!(%action, label, context = context_name, %entity, "decision");
        Ok(Decision {
            action,
            label: label.to_string(),
            context: context_name.to_string(),
            entity,
            coordinates,
            sequence: entry.sequence,
            hash: entry.hash,
        })
    }

    fn plan(
        &self,
        store: &GraphStore,
        label: &str,
        context_name: &str,
        context: &Context,
    ) -> Result<Plan, AxiomError> {
        let candidates = store.graph().find_by_subject(label);

        let exact: Vec<&Entity> = candidates
            .iter()
            .copied()
            .filter(|e| e.context() == context_name)
            .collect();
        if !exact.is_empty() {
            let chosen = exact
                .iter()
                .filter(|e| e.is_branch())
                .map(|e| e.id())
                .max()
                .or_else(|| exact.first().map(|e| e.id()));
            if let Some(id) = chosen {
                return Ok(Plan::Reuse(id));
            }
        }

        let contexts: BTreeSet<&str> = candidates.iter().map(|e| e.context()).collect();
        if contexts.len() > 1 {
            let origin = candidates
                .iter()
                .find(|e| !e.is_branch())
                .or_else(|| candidates.first())
                .map(|e| e.id());
            if let Some(origin) = origin {
                let mut labels: Vec<String> = Vec::new();
                for candidate in &candidates {
                    let name = candidate.context();
                    // An un-contexted origin does not become a branch of itself.
                    if candidate.id() == origin && name == DEFAULT_CONTEXT {
                        continue;
                    }
                    if !labels.iter().any(|l| l == name) {
                        labels.push(name.to_string());
                    }
                }
                labels.push(context_name.to_string());
                return Ok(Plan::Fork { origin, labels });
            }
        }

        let (major, type_, subtype) = context
            .placement
            .or_else(|| self.policy.placements.get(context_name).copied())
            .unwrap_or(self.policy.default_placement);
        let id = store.graph().next_instance(major, type_, subtype)?;
        Ok(Plan::Create(id))
    }
}

/// Audit form of a context placement: `[major, type, subtype]` or null.
fn placement_value(placement: Option<(u8, u8, u8)>) -> MetaValue {
    placement.map_or(MetaValue::Null, |(major, type_, subtype)| {
        MetaValue::List(vec![
            i64::from(major).into(),
            i64::from(type_).into(),
            i64::from(subtype).into(),
        ])
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{FixedClock, actions};
    use std::sync::Arc;

    fn store() -> GraphStore {
        GraphStore::with_clock(Arc::new(FixedClock(1)))
    }

    fn animal() -> Context {
        Context::new("animal").with_placement(1, 1, 2)
    }

    fn vehicle() -> Context {
        Context::new("vehicle").with_placement(1, 2, 1)
    }

    #[test]
    fn first_request_creates() {
        let mut store = store();
        let selector = StrategySelector::default();

        let decision = selector.handle(&mut store, "jaguar", &animal()).expect("handle");
        assert_eq!(decision.action, StrategyAction::CreateNew);
        assert_eq!(decision.entity.to_string(), "01-01-02-0001");

        let created = store.get(&decision.entity).expect("created");
        assert_eq!(created.label(), "jaguar");
        assert_eq!(created.context(), "animal");
        assert_eq!(store.ledger().last(1)[0].action, actions::DECISION);
        assert_eq!(store.ledger().last(1)[0].sequence, decision.sequence);
        assert_eq!(store.ledger().last(1)[0].hash, decision.hash);
    }

    #[test]
    fn repeated_request_reuses_and_still_audits() {
        let mut store = store();
        let selector = StrategySelector::default();
        let first = selector.handle(&mut store, "jaguar", &animal()).expect("create");
        let entities = store.entity_count();
        let ledger = store.ledger().len();

        let second = selector
            .handle(&mut store, "  jaguar ", &animal())
            .expect("reuse");
        assert_eq!(second.action, StrategyAction::ReuseExisting);
        assert_eq!(second.entity, first.entity);
        assert_eq!(store.entity_count(), entities);
        assert_eq!(store.ledger().len(), ledger + 1);
    }

    #[test]
    fn create_create_fork_reuse() {
        let mut store = store();
        let selector = StrategySelector::default();

        selector.handle(&mut store, "jaguar", &animal()).expect("animal");
        let car = selector.handle(&mut store, "jaguar", &vehicle()).expect("vehicle");
        assert_eq!(car.action, StrategyAction::CreateNew);
        assert_eq!(car.entity.to_string(), "01-02-01-0001");

        let fork = selector
            .handle(&mut store, "jaguar", &Context::new("sports"))
            .expect("fork");
        assert_eq!(fork.action, StrategyAction::CreateFork);
        assert_eq!(fork.coordinates.len(), 3);
        let labels: Vec<_> = fork
            .coordinates
            .iter()
            .filter_map(|c| store.get(c))
            .map(|e| e.label().to_string())
            .collect();
        assert_eq!(labels, vec!["animal", "vehicle", "sports"]);
        assert_eq!(store.get(&fork.entity).map(Entity::label), Some("sports"));
        assert_eq!(store.forks().len(), 1);

        // A branch wins over an un-forked entity on an exact match.
        let again = selector.handle(&mut store, "jaguar", &vehicle()).expect("reuse");
        assert_eq!(again.action, StrategyAction::ReuseExisting);
        assert!(store.get(&again.entity).is_some_and(Entity::is_branch));
    }

    #[test]
    fn blank_context_uses_policy_default() {
        let mut store = store();
        let selector = StrategySelector::default();
        let decision = selector
            .handle(&mut store, "idea", &Context::new(" "))
            .expect("handle");
        assert_eq!(decision.context, "general");
        assert_eq!(decision.entity.to_string(), "08-01-01-0001");
    }

    #[test]
    fn policy_placements_apply() {
        let mut policy = SelectorPolicy::default();
        policy.placements.insert("city".to_string(), (5, 1, 1));
        let selector = StrategySelector::new(policy);
        let mut store = store();

        let paris = selector
            .handle(&mut store, "paris", &Context::new("city"))
            .expect("handle");
        assert_eq!(paris.entity.to_string(), "05-01-01-0001");
        assert_eq!(selector.policy().placements.len(), 1);
    }

    #[test]
    fn invalid_label_leaves_no_trace() {
        let mut store = store();
        let selector = StrategySelector::default();
        assert!(matches!(
            selector.handle(&mut store, "   ", &animal()),
            Err(AxiomError::InvalidLabel(_))
        ));
        let long = "x".repeat(MAX_LABEL_LENGTH + 1);
        assert!(matches!(
            selector.handle(&mut store, &long, &animal()),
            Err(AxiomError::InvalidLabel(_))
        ));
        assert!(store.ledger().is_empty());
    }

    #[test]
    fn bad_placement_fails_before_mutation() {
        let mut store = store();
        let selector = StrategySelector::default();
        let bad = Context::new("nowhere").with_placement(9, 1, 1);
        assert!(matches!(
            selector.handle(&mut store, "ghost", &bad),
            Err(AxiomError::InvalidCoordinate { .. })
        ));
        assert!(store.ledger().is_empty());
        assert_eq!(store.entity_count(), 0);
    }

    fn coord(code: &str) -> Coordinate {
        Coordinate::parse(code).expect("coordinate")
    }

    fn fork_labels(store: &GraphStore, decision: &Decision) -> Vec<String> {
        decision
            .coordinates
            .iter()
            .filter_map(|c| store.get(c))
            .map(|e| e.label().to_string())
            .collect()
    }

    #[test]
    fn blank_stored_context_still_forks() {
        let mut store = store();
        store
            .insert(Entity::new(coord("01-01-01-0001"), "bank").with_context(""))
            .expect("insert");
        store
            .insert(Entity::new(coord("01-01-01-0002"), "bank").with_context("finance"))
            .expect("insert");

        let decision = StrategySelector::default()
            .handle(&mut store, "bank", &Context::new("river"))
            .expect("handle");
        assert_eq!(decision.action, StrategyAction::CreateFork);
        assert_eq!(fork_labels(&store, &decision), vec!["finance", "river"]);
        assert_eq!(store.forks()[0].origin, coord("01-01-01-0001"));
        assert_eq!(store.ledger().last(1)[0].action, actions::DECISION);
    }

    #[test]
    fn padded_contexts_collapse() {
        let mut store = store();
        for (code, context) in [
            ("01-01-01-0001", "finance"),
            ("01-01-01-0002", "finance "),
            ("01-01-01-0003", "sport"),
        ] {
            store
                .insert(Entity::new(coord(code), "bank").with_context(context))
                .expect("insert");
        }
        let selector = StrategySelector::default();

        let reuse = selector
            .handle(&mut store, "bank", &Context::new(" finance"))
            .expect("reuse");
        assert_eq!(reuse.action, StrategyAction::ReuseExisting);
        assert_eq!(reuse.entity, coord("01-01-01-0001"));

        let fork = selector
            .handle(&mut store, "bank", &Context::new("river"))
            .expect("fork");
        assert_eq!(fork.action, StrategyAction::CreateFork);
        assert_eq!(fork_labels(&store, &fork), vec!["finance", "sport", "river"]);
    }

    #[test]
    fn refork_skips_uncontexted_origin() {
        let mut store = store();
        let jaguar = coord("01-01-02-0001");
        store.insert(Entity::new(jaguar, "jaguar")).expect("insert");
        ForkEngine::create_fork(&mut store, jaguar, &["animal", "car"]).expect("fork");

        let decision = StrategySelector::default()
            .handle(&mut store, "jaguar", &Context::new("os"))
            .expect("handle");
        assert_eq!(decision.action, StrategyAction::CreateFork);
        assert_eq!(fork_labels(&store, &decision), vec!["animal", "car", "os"]);
        assert_eq!(store.forks()[1].origin, jaguar);
        assert_eq!(store.entity_count(), 6);
    }

    #[test]
    fn decision_entry_records_context_inputs() {
        let mut store = store();
        let context = animal().with_meta("legs", 4i64);
        StrategySelector::default()
            .handle(&mut store, "jaguar", &context)
            .expect("handle");

        let args = &store.ledger().last(1)[0].args;
        assert_eq!(
            args.get("placement"),
            Some(&MetaValue::List(vec![
                MetaValue::Int(1),
                MetaValue::Int(1),
                MetaValue::Int(2)
            ]))
        );
        assert_eq!(args.get("metadata"), Some(&MetaValue::from(context.metadata)));

        StrategySelector::default()
            .handle(&mut store, "idea", &Context::new("general"))
            .expect("handle");
        assert_eq!(store.ledger().last(1)[0].args.get("placement"), Some(&MetaValue::Null));
    }

    #[test]
    fn action_names() {
        assert_eq!(StrategyAction::ReuseExisting.to_string(), "REUSE_EXISTING");
        assert_eq!(StrategyAction::CreateNew.name(), "CREATE_NEW");
        assert_eq!(StrategyAction::CreateFork.name(), "CREATE_FORK");
    }
}
