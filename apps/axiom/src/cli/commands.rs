//! # CLI Command Implementations
//!
//! Each command builds a fresh store from the config, drives it, and
//! prints either a human summary or JSON (`--json-mode`).

use crate::config::AxiomConfig;
use crate::error::AppError;
use crate::script::{StepResult, metadata_to_json, parse_script, run_script};
use axiom_core::{AuditEntry, Coordinate, GraphStore};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

/// Bundled walkthrough replayed by `axiom demo`.
pub const DEMO_SCRIPT: &str = include_str!("../../scripts/demo.json");

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum script size (10 MB).
const MAX_SCRIPT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), AppError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| AppError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(AppError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `path` to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, AppError> {
    // Canonicalize resolves "..", symlinks, and validates existence
    let canonical = path.canonicalize().map_err(|e| {
        AppError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(AppError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Read and replay a script file against a fresh store.
pub fn replay_file(
    config: &AxiomConfig,
    path: &Path,
) -> Result<(GraphStore, Vec<StepResult>), AppError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, MAX_SCRIPT_FILE_SIZE)?;
    let content = std::fs::read_to_string(&path)
        .map_err(|e| AppError::IoError(format!("Cannot read {}: {}", path.display(), e)))?;
    replay_str(config, &content)
}

/// Replay script text against a fresh store.
pub fn replay_str(
    config: &AxiomConfig,
    content: &str,
) -> Result<(GraphStore, Vec<StepResult>), AppError> {
    let ops = parse_script(content)?;
    let mut store = config.build_store();
    let results = run_script(&mut store, &config.selector(), &ops);
    tracing::info!(
        steps = results.len(),
        rejected = results.iter().filter(|r| !r.ok).count(),
        "script replayed"
    );
    Ok((store, results))
}

fn print_json(output: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(output).unwrap_or_default()
    );
}

fn print_steps(results: &[StepResult]) {
    for result in results {
        let status = if result.ok { "ok " } else { "ERR" };
        println!(
            "[{:>3}] {} {:<17} {}",
            result.step,
            status,
            result.op,
            serde_json::to_string(&result.output).unwrap_or_default()
        );
    }
}

fn entry_json(entry: &AuditEntry) -> Value {
    json!({
        "sequence": entry.sequence,
        "timestamp": entry.timestamp,
        "action": entry.action,
        "args": metadata_to_json(&entry.args),
        "prev_hash": entry.prev_hash,
        "hash": entry.hash,
    })
}

fn print_entries(entries: &[AuditEntry]) {
    for entry in entries {
        println!(
            "#{:<5} {:<18} {}",
            entry.sequence,
            entry.action,
            entry.hash.to_hex()
        );
        println!(
            "       {}",
            serde_json::to_string(&metadata_to_json(&entry.args)).unwrap_or_default()
        );
    }
}

fn print_summary(store: &GraphStore) {
    let summary = store.summary();
    println!("Entities:         {}", summary.entities);
    println!("Edges:            {}", summary.edges);
    println!("Forks:            {}", summary.forks);
    println!("Audit entries:    {}", summary.audit_entries);
    println!("Derivation ratio: {}", summary.derivation_ratio);
    println!(
        "Chain:            {}",
        if summary.chain_intact {
            "intact"
        } else {
            "BROKEN"
        }
    );
}

// =============================================================================
// DEMO COMMAND
// =============================================================================

/// Replay the bundled scenario and show what the core derived.
pub fn cmd_demo(config: &AxiomConfig, json_mode: bool) -> Result<(), AppError> {
    let (store, results) = replay_str(config, DEMO_SCRIPT)?;
    let tail = store.ledger().last(5);

    if json_mode {
        print_json(&json!({
            "steps": results,
            "ledger_tail": tail.iter().map(entry_json).collect::<Vec<_>>(),
            "summary": store.summary(),
        }));
        return Ok(());
    }

    println!("Axiom Demo");
    println!("==========");
    print_steps(&results);
    println!();
    println!("Ledger tail");
    println!("-----------");
    print_entries(tail);
    println!();
    print_summary(&store);

    Ok(())
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Replay a script file and print every step.
pub fn cmd_run(config: &AxiomConfig, json_mode: bool, file: &Path) -> Result<(), AppError> {
    let (store, results) = replay_file(config, file)?;

    if json_mode {
        print_json(&json!({
            "steps": results,
            "summary": store.summary(),
        }));
        return Ok(());
    }

    print_steps(&results);
    println!();
    print_summary(&store);

    Ok(())
}

// =============================================================================
// COORD COMMAND
// =============================================================================

/// Describe one coordinate and optionally its relation to another.
pub fn cmd_coord(json_mode: bool, code: &str, other: Option<&str>) -> Result<(), AppError> {
    let coord = Coordinate::parse(code)?;
    let other = other.map(Coordinate::parse).transpose()?;

    let comparison = other.map(|o| {
        json!({
            "other": o,
            "distance": coord.distance(&o),
            "common_prefix": coord.common_prefix_len(&o),
            "shares_category": coord.shares_category(&o),
            "shares_type": coord.shares_type(&o),
            "shares_subtype": coord.shares_subtype(&o),
        })
    });

    if json_mode {
        print_json(&json!({
            "coordinate": coord,
            "major": coord.major(),
            "type": coord.type_(),
            "subtype": coord.subtype(),
            "instance": coord.instance(),
            "category": coord.category_name(),
            "comparison": comparison,
        }));
        return Ok(());
    }

    println!("Coordinate: {}", coord);
    println!("  Major:    {} ({})", coord.major(), coord.category_name());
    println!("  Type:     {}", coord.type_());
    println!("  Subtype:  {}", coord.subtype());
    println!("  Instance: {}", coord.instance());

    if let Some(o) = other {
        println!();
        println!("Compared with {}:", o);
        println!("  Distance:        {}", coord.distance(&o));
        println!("  Common prefix:   {}", coord.common_prefix_len(&o));
        println!("  Shares category: {}", coord.shares_category(&o));
        println!("  Shares type:     {}", coord.shares_type(&o));
        println!("  Shares subtype:  {}", coord.shares_subtype(&o));
    }

    Ok(())
}

// =============================================================================
// LEDGER COMMAND
// =============================================================================

/// Replay a script and print the last `last` audit entries.
pub fn cmd_ledger(
    config: &AxiomConfig,
    json_mode: bool,
    file: &Path,
    last: usize,
) -> Result<(), AppError> {
    let (store, _) = replay_file(config, file)?;
    let verification = store.verify();
    let tail = store.ledger().last(last);

    if json_mode {
        print_json(&json!({
            "entries": tail.iter().map(entry_json).collect::<Vec<_>>(),
            "total": store.ledger().len(),
            "head_hash": store.ledger().head_hash(),
            "verification": verification,
        }));
        return Ok(());
    }

    println!(
        "Audit Ledger ({} of {} entries)",
        tail.len(),
        store.ledger().len()
    );
    println!("==========================");
    print_entries(tail);
    println!();
    println!("Head:  {}", store.ledger().head_hash());
    match verification.first_bad_index {
        None => println!("Chain: intact"),
        Some(index) => println!("Chain: BROKEN at entry {}", index),
    }

    Ok(())
}
