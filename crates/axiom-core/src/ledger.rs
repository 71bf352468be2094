//! # Audit Ledger
//!
//! Append-only, hash-chained record of every mutating call.
//!
//! Every entry records what happened, when, and a canonical snapshot of the
//! arguments, chained to its predecessor:
//!
//! ```text
//! hash = BLAKE3( prev_hash[32] ∥ postcard(sequence, timestamp, action, args) )
//! ```
//!
//! - `sequence` and `timestamp` are postcard varints
//! - `action` is a length-prefixed UTF-8 string
//! - `args` is a key-sorted map of `MetaValue` (variant index + payload)
//! - the first entry chains to [`GENESIS_HASH`]
//!
//! The ledger stores only serialized snapshots, never live references into
//! the store, so entries stay valid whatever happens to the store later.

use crate::primitives::GENESIS_HASH;
use crate::{AxiomError, Metadata};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Action names written by the store, fork engine and selector.
pub mod actions {
    pub const INSERT: &str = "INSERT";
    pub const CONNECT: &str = "CONNECT";
    pub const MERGE_METADATA: &str = "MERGE_METADATA";
    pub const REGISTER_RELATION: &str = "REGISTER_RELATION";
    pub const FORK: &str = "FORK";
    pub const RESOLVE_FORK: &str = "RESOLVE_FORK";
    pub const DECISION: &str = "DECISION";
}

// =============================================================================
// DIGEST
// =============================================================================

/// A 32-byte BLAKE3 digest, serialized as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// The empty-chain sentinel.
    pub const GENESIS: Digest = Digest(GENESIS_HASH);

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl TryFrom<String> for Digest {
    type Error = AxiomError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        blake3::Hash::from_hex(value.as_bytes())
            .map(|h| Digest(*h.as_bytes()))
            .map_err(|e| AxiomError::SerializationError(format!("Digest: {}", e)))
    }
}

impl From<Digest> for String {
    fn from(value: Digest) -> Self {
        value.to_hex()
    }
}

// =============================================================================
// CLOCK
// =============================================================================

/// Source of entry timestamps (Unix milliseconds).
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

/// A clock frozen at one instant. Makes whole chains reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        self.0
    }
}

// =============================================================================
// AUDIT ENTRY
// =============================================================================

/// A single entry in the audit chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the chain, starting at 0.
    pub sequence: u64,
    /// Unix milliseconds at append time.
    pub timestamp: u64,
    /// Name of the mutating operation.
    pub action: String,
    /// Canonical snapshot of the operation's inputs.
    pub args: Metadata,
    /// Hash of the previous entry (genesis for the first).
    pub prev_hash: Digest,
    /// Hash over `prev_hash` and the canonical payload.
    pub hash: Digest,
}

impl AuditEntry {
    /// Recompute this entry's hash from its stored fields.
    pub fn recompute_hash(&self) -> Result<Digest, AxiomError> {
        compute_hash(
            &self.prev_hash,
            self.sequence,
            self.timestamp,
            &self.action,
            &self.args,
        )
    }
}

/// Field order of the hashed payload. Changing it forks every chain.
#[derive(Serialize)]
struct CanonicalPayload<'a> {
    sequence: u64,
    timestamp: u64,
    action: &'a str,
    args: &'a Metadata,
}

fn compute_hash(
    prev_hash: &Digest,
    sequence: u64,
    timestamp: u64,
    action: &str,
    args: &Metadata,
) -> Result<Digest, AxiomError> {
    let payload = CanonicalPayload {
        sequence,
        timestamp,
        action,
        args,
    };
    let bytes = postcard::to_allocvec(&payload)
        .map_err(|e| AxiomError::SerializationError(format!("Audit payload: {}", e)))?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(&bytes);
    Ok(Digest(*hasher.finalize().as_bytes()))
}

// =============================================================================
// VERIFICATION RESULT
// =============================================================================

/// Outcome of [`AuditLedger::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainVerification {
    /// True if every entry recomputes and links identically.
    pub intact: bool,
    /// Lowest index at which recomputation diverges.
    pub first_bad_index: Option<usize>,
}

impl ChainVerification {
    const fn ok() -> Self {
        Self {
            intact: true,
            first_bad_index: None,
        }
    }

    const fn broken_at(index: usize) -> Self {
        Self {
            intact: false,
            first_bad_index: Some(index),
        }
    }

    /// `(intact, first_bad_index)`.
    #[must_use]
    pub fn as_tuple(&self) -> (bool, Option<usize>) {
        (self.intact, self.first_bad_index)
    }
}

// =============================================================================
// LEDGER
// =============================================================================

/// The append-only audit chain.
///
/// No entry is ever edited or removed through this type.
#[derive(Debug, Clone)]
pub struct AuditLedger {
    entries: Vec<AuditEntry>,
    clock: Arc<dyn Clock>,
}

impl Default for AuditLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditLedger {
    /// Create an empty ledger stamped by the wall clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty ledger stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            clock,
        }
    }

    /// Rebuild a ledger from previously exported entries.
    ///
    /// The entries are taken as-is; call [`AuditLedger::verify`] to check them.
    #[must_use]
    pub fn from_entries(entries: Vec<AuditEntry>, clock: Arc<dyn Clock>) -> Self {
        Self { entries, clock }
    }

    /// Hash that the next entry will chain to.
    #[must_use]
    pub fn head_hash(&self) -> Digest {
        self.entries.last().map_or(Digest::GENESIS, |e| e.hash)
    }

    /// Log an action with its canonical argument snapshot.
    ///
    /// Nothing is stored if hashing fails.
    pub fn append(&mut self, action: &str, args: Metadata) -> Result<AuditEntry, AxiomError> {
        let sequence = self.entries.len() as u64;
        let timestamp = self.clock.now_millis();
        let prev_hash = self.head_hash();
        let hash = compute_hash(&prev_hash, sequence, timestamp, action, &args)?;

        let entry = AuditEntry {
            sequence,
            timestamp,
            action: action.to_string(),
            args,
            prev_hash,
            hash,
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// The most recent `n` entries, oldest first.
    #[must_use]
    pub fn last(&self, n: usize) -> &[AuditEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// Recompute the whole chain.
    ///
    /// Tampering is reported as data, never as an error.
    #[must_use]
    pub fn verify(&self) -> ChainVerification {
        let mut expected_prev = Digest::GENESIS;

        for (index, entry) in self.entries.iter().enumerate() {
            if entry.prev_hash != expected_prev {
                tracing::warn!(index, "audit chain link broken");
                return ChainVerification::broken_at(index);
            }
            match entry.recompute_hash() {
                Ok(hash) if hash == entry.hash => {}
                _ => {
                    tracing::warn!(index, "audit entry hash mismatch");
                    return ChainVerification::broken_at(index);
                }
            }
            expected_prev = entry.hash;
        }

        ChainVerification::ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in chain order.
    #[must_use]
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Entry by sequence number.
    #[must_use]
    pub fn get(&self, sequence: u64) -> Option<&AuditEntry> {
        usize::try_from(sequence)
            .ok()
            .and_then(|i| self.entries.get(i))
    }

    /// Hand the chain over, e.g. to a persistence collaborator.
    #[must_use]
    pub fn into_entries(self) -> Vec<AuditEntry> {
        self.entries
    }

    /// The clock stamping new entries.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }
}

// =============================================================================
// TESTS
// =============================================================================
