//! # Operation Scripts
//!
//! A script is a JSON array of operations replayed in order against one
//! store:
//!
//! ```json
//! [
//!   {"op": "insert", "id": "01-01-01-0001", "label": "animal"},
//!   {"op": "insert", "id": "01-01-02-0001", "label": "feline"},
//!   {"op": "connect", "source": "01-01-02-0001", "target": "01-01-01-0001", "relation": "IS_A"},
//!   {"op": "siblings", "id": "01-01-02-0001"}
//! ]
//! ```
//!
//! Each step is atomic in the core. A failing step is reported and the
//! replay moves on, so one script shows both effects and rejections.

use crate::error::AppError;
use axiom_core::{
    AxiomError, Context, Coordinate, Entity, ForkEngine, GraphStore, MetaValue, Metadata,
    RelationType, StrategySelector,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Maximum number of operations in one script.
pub const MAX_SCRIPT_OPS: usize = 100_000;

/// One scripted call into the core.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Op {
    Insert {
        id: Coordinate,
        label: String,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Connect {
        source: Coordinate,
        target: Coordinate,
        relation: String,
    },
    RegisterRelation {
        name: String,
    },
    MergeMetadata {
        id: Coordinate,
        metadata: Map<String, Value>,
    },
    Fork {
        id: Coordinate,
        labels: Vec<String>,
    },
    ResolveFork {
        origin: Coordinate,
        chosen: Coordinate,
    },
    Handle {
        label: String,
        #[serde(default)]
        context: String,
        #[serde(default)]
        placement: Option<(u8, u8, u8)>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Siblings {
        id: Coordinate,
    },
    Category {
        major: u8,
    },
    Path {
        from: Coordinate,
        to: Coordinate,
    },
    Tension {
        id: Coordinate,
    },
    Neighbors {
        id: Coordinate,
        #[serde(default = "default_max_distance")]
        max_distance: u8,
    },
}

fn default_max_distance() -> u8 {
    2
}

impl Op {
    /// The script name of this operation.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Connect { .. } => "connect",
            Self::RegisterRelation { .. } => "register_relation",
            Self::MergeMetadata { .. } => "merge_metadata",
            Self::Fork { .. } => "fork",
            Self::ResolveFork { .. } => "resolve_fork",
            Self::Handle { .. } => "handle",
            Self::Siblings { .. } => "siblings",
            Self::Category { .. } => "category",
            Self::Path { .. } => "path",
            Self::Tension { .. } => "tension",
            Self::Neighbors { .. } => "neighbors",
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step: usize,
    pub op: &'static str,
    pub ok: bool,
    pub output: Value,
}

/// Parse a JSON array of operations.
pub fn parse_script(content: &str) -> Result<Vec<Op>, AppError> {
    let ops: Vec<Op> =
        serde_json::from_str(content).map_err(|e| AppError::ScriptError(e.to_string()))?;
    if ops.len() > MAX_SCRIPT_OPS {
        return Err(AppError::ScriptError(format!(
            "{} operations exceed maximum allowed {}",
            ops.len(),
            MAX_SCRIPT_OPS
        )));
    }
    Ok(ops)
}

/// Replay `ops` in order. Failing steps are reported, not fatal.
pub fn run_script(
    store: &mut GraphStore,
    selector: &StrategySelector,
    ops: &[Op],
) -> Vec<StepResult> {
    ops.iter()
        .enumerate()
        .map(|(step, op)| {
            let (ok, output) = match apply(store, selector, op) {
                Ok(output) => (true, output),
                Err(e) => {
                    tracing::warn!(step, op = op.name(), "step rejected: {}", e);
                    (false, json!({ "error": e.to_string() }))
                }
            };
            StepResult {
                step,
                op: op.name(),
                ok,
                output,
            }
        })
        .collect()
}

/// Apply one operation and describe its result.
pub fn apply(
    store: &mut GraphStore,
    selector: &StrategySelector,
    op: &Op,
) -> Result<Value, AppError> {
    let output = match op {
        Op::Insert {
            id,
            label,
            metadata,
        } => {
            let entity = Entity::new(*id, label.as_str()).with_metadata(json_to_metadata(metadata)?);
            entity_json(&store.insert(entity)?)
        }
        Op::Connect {
            source,
            target,
            relation,
        } => {
            let relation: RelationType = relation.parse()?;
            let edge = store.connect(*source, *target, relation)?;
            json!({
                "source": edge.source,
                "target": edge.target,
                "relation": edge.relation.name(),
            })
        }
        Op::RegisterRelation { name } => {
            json!({ "relation": store.register_relation(name)?.name() })
        }
        Op::MergeMetadata { id, metadata } => {
            entity_json(&store.merge_metadata(*id, json_to_metadata(metadata)?)?)
        }
        Op::Fork { id, labels } => {
            let (origin, branches) = ForkEngine::create_fork(store, *id, labels.as_slice())?;
            json!({
                "origin": entity_json(&origin),
                "branches": branches.iter().map(entity_json).collect::<Vec<_>>(),
            })
        }
        Op::ResolveFork { origin, chosen } => {
            serde_json::to_value(ForkEngine::resolve_fork(store, *origin, *chosen)?)
                .map_err(|e| AxiomError::SerializationError(e.to_string()))?
        }
        Op::Handle {
            label,
            context,
            placement,
            metadata,
        } => {
            let mut ctx = Context::new(context.as_str());
            ctx.placement = *placement;
            ctx.metadata = json_to_metadata(metadata)?;
            let decision = selector.handle(store, label, &ctx)?;
            json!({
                "action": decision.action.name(),
                "label": decision.label,
                "context": decision.context,
                "entity": decision.entity,
                "coordinates": decision.coordinates,
                "sequence": decision.sequence,
                "hash": decision.hash,
            })
        }
        Op::Siblings { id } => entities_json(&store.derive_siblings(id)?),
        Op::Category { major } => entities_json(&store.derive_category(*major)?),
        Op::Path { from, to } => entities_json(&store.derive_path(from, to)?),
        Op::Tension { id } => {
            let tension = store.derive_tension(id)?;
            json!({
                "id": id,
                "tension": tension.to_string(),
                "milli": tension.milli(),
                "branches": tension.branches(),
                "contexts": tension.contexts(),
            })
        }
        Op::Neighbors { id, max_distance } => {
            let found = store.derive_neighbors(id, *max_distance)?;
            Value::Array(
                found
                    .iter()
                    .map(|(entity, distance)| {
                        json!({ "id": entity.id(), "label": entity.label(), "distance": distance })
                    })
                    .collect(),
            )
        }
    };
    Ok(output)
}

// =============================================================================
// JSON <-> METAVALUE
// =============================================================================

/// Convert a JSON value. Fractional numbers are rejected; encode them as text.
pub fn json_to_meta(value: &Value) -> Result<MetaValue, AppError> {
    Ok(match value {
        Value::Null => MetaValue::Null,
        Value::Bool(b) => MetaValue::Bool(*b),
        Value::Number(n) => n.as_i64().map(MetaValue::Int).ok_or_else(|| {
            AppError::ScriptError(format!("{} is not an integer; encode it as text", n))
        })?,
        Value::String(s) => MetaValue::Text(s.clone()),
        Value::Array(items) => MetaValue::List(
            items
                .iter()
                .map(json_to_meta)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Object(map) => MetaValue::Map(json_to_metadata(map)?),
    })
}

pub fn json_to_metadata(map: &Map<String, Value>) -> Result<Metadata, AppError> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), json_to_meta(v)?)))
        .collect()
}

#[must_use]
pub fn meta_to_json(value: &MetaValue) -> Value {
    match value {
        MetaValue::Null => Value::Null,
        MetaValue::Bool(b) => Value::Bool(*b),
        MetaValue::Int(i) => json!(i),
        MetaValue::Text(s) => Value::String(s.clone()),
        MetaValue::List(items) => Value::Array(items.iter().map(meta_to_json).collect()),
        MetaValue::Map(map) => metadata_to_json(map),
    }
}

#[must_use]
pub fn metadata_to_json(map: &Metadata) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), meta_to_json(v)))
            .collect(),
    )
}

#[must_use]
pub fn entity_json(entity: &Entity) -> Value {
    json!({
        "id": entity.id(),
        "label": entity.label(),
        "context": entity.context(),
        "fork_parent": entity.fork_parent(),
        "metadata": metadata_to_json(entity.metadata()),
    })
}

#[must_use]
pub fn entities_json(entities: &[Entity]) -> Value {
    Value::Array(entities.iter().map(entity_json).collect())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"[
        {"op": "insert", "id": "01-01-01-0001", "label": "animal"},
        {"op": "insert", "id": "01-01-02-0001", "label": "feline"},
        {"op": "insert", "id": "01-01-02-0002", "label": "jaguar", "metadata": {"legs": 4}},
        {"op": "connect", "source": "01-01-02-0001", "target": "01-01-01-0001", "relation": "IS_A"},
        {"op": "siblings", "id": "01-01-02-0001"},
        {"op": "path", "from": "01-01-02-0001", "to": "01-01-01-0001"},
        {"op": "path", "from": "01-01-01-0001", "to": "01-01-02-0002"}
    ]"#;

    fn run(content: &str) -> (GraphStore, Vec<StepResult>) {
        let mut store = GraphStore::new();
        let ops = parse_script(content).expect("parse");
        let results = run_script(&mut store, &StrategySelector::default(), &ops);
        (store, results)
    }

    fn labels(value: &Value) -> Vec<String> {
        value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|e| e["label"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn scenario_script() {
        let (store, results) = run(SCENARIO);
        assert!(results.iter().all(|r| r.ok));
        assert_eq!(labels(&results[4].output), vec!["animal", "jaguar"]);
        assert_eq!(labels(&results[5].output), vec!["feline", "animal"]);
        assert!(labels(&results[6].output).is_empty());
        assert_eq!(store.ledger().len(), 4);
        assert_eq!(results[2].output["metadata"]["legs"], json!(4));
    }

    #[test]
    fn rejected_step_does_not_stop_replay() {
        let (store, results) = run(
            r#"[
                {"op": "insert", "id": "01-01-01-0001", "label": "a"},
                {"op": "insert", "id": "01-01-01-0001", "label": "b"},
                {"op": "insert", "id": "01-01-01-0002", "label": "c"}
            ]"#,
        );
        assert!(results[0].ok);
        assert!(!results[1].ok);
        assert!(
            results[1].output["error"]
                .as_str()
                .is_some_and(|e| e.contains("Duplicate"))
        );
        assert!(results[2].ok);
        assert_eq!(store.entity_count(), 2);
    }

    #[test]
    fn fork_handle_and_tension() {
        let (_, results) = run(
            r#"[
                {"op": "insert", "id": "01-01-02-0002", "label": "jaguar"},
                {"op": "fork", "id": "01-01-02-0002", "labels": ["animal", "car"]},
                {"op": "tension", "id": "01-01-02-0002"},
                {"op": "handle", "label": "jaguar", "context": "car"},
                {"op": "resolve_fork", "origin": "01-01-02-0002", "chosen": "01-01-02-0004"}
            ]"#,
        );
        assert!(results.iter().all(|r| r.ok), "{:?}", results);
        assert_eq!(results[2].output["tension"], json!("2.500"));
        assert_eq!(results[3].output["action"], json!("REUSE_EXISTING"));
        assert_eq!(results[3].output["entity"], json!("01-01-02-0004"));
        assert_eq!(results[4].output["resolved_to"], json!("01-01-02-0004"));
    }

    #[test]
    fn custom_relations_via_script() {
        let (_, results) = run(
            r#"[
                {"op": "insert", "id": "01-01-01-0001", "label": "acme"},
                {"op": "insert", "id": "01-02-01-0001", "label": "alice"},
                {"op": "connect", "source": "01-01-01-0001", "target": "01-02-01-0001", "relation": "EMPLOYS"},
                {"op": "register_relation", "name": "EMPLOYS"},
                {"op": "connect", "source": "01-01-01-0001", "target": "01-02-01-0001", "relation": "EMPLOYS"}
            ]"#,
        );
        let oks: Vec<bool> = results.iter().map(|r| r.ok).collect();
        assert_eq!(oks, vec![true, true, false, true, true]);
    }

    #[test]
    fn malformed_scripts_rejected() {
        for bad in [
            "{}",
            r#"[{"op": "teleport"}]"#,
            r#"[{"op": "insert", "id": "1-1-1-1", "label": "x"}]"#,
            r#"[{"op": "insert", "id": "01-01-01-0001"}]"#,
        ] {
            assert!(
                matches!(parse_script(bad), Err(AppError::ScriptError(_))),
                "expected {bad} to be rejected"
            );
        }
    }

    #[test]
    fn floats_rejected_in_metadata() {
        assert!(json_to_meta(&json!(1.5)).is_err());
        let nested = json!({"list": [1, "two", null, {"deep": true}]});
        let meta = json_to_meta(&nested).expect("convert");
        assert_eq!(meta_to_json(&meta), nested);
    }
}
