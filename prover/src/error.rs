//! Error kinds of the prover pipeline and the revert-message classification
//! that keeps concurrent provers from tripping over each other.

use thiserror::Error;

pub type ProverResult<T> = Result<T, ProverError>;

/// Failures surfaced by the prover core.
///
/// Only `Fatal` terminates the process; everything else aborts at most the
/// current dispute, and the driver loop retries it on the next poll since the
/// scan cursor never advances on a non-success exit.
#[derive(Debug, Error)]
pub enum ProverError {
    /// RPC failure against either chain endpoint.
    #[error("transport failure: {0}")]
    Transport(String),

    /// A queried index lies beyond the last appended batch. The scanner
    /// treats this as end-of-scan rather than an error.
    #[error("index {0} is beyond the last appended batch")]
    NotFound(u64),

    /// The rollup node lacks a required RPC extension.
    #[error("rollup node does not support {0}")]
    Unsupported(&'static str),

    /// The assembled witness is internally inconsistent or fails to open
    /// against the roots it claims to commit to.
    #[error("corrupt witness: {0}")]
    CorruptWitness(String),

    /// The state-diff witness fails to cover an account or slot the on-chain
    /// transitioner reports as changed.
    #[error("witness does not cover on-chain change: {0}")]
    Inconsistent(String),

    /// An on-chain submission reverted with a message outside every race
    /// class, or the transaction wait failed.
    #[error("submission failed: {0}")]
    Submission(String),

    /// Misconfiguration or unrecoverable boot failure.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<alloy::transports::TransportError> for ProverError {
    fn from(e: alloy::transports::TransportError) -> Self {
        ProverError::Transport(e.to_string())
    }
}

impl From<alloy::contract::Error> for ProverError {
    fn from(e: alloy::contract::Error) -> Self {
        ProverError::Transport(e.to_string())
    }
}

impl From<proof_trie::TrieError> for ProverError {
    fn from(e: proof_trie::TrieError) -> Self {
        ProverError::CorruptWitness(e.to_string())
    }
}

/// The transitioner's cross-phase guard message.
pub const PHASE_GUARD_REVERT: &str = "Function must be called during the correct phase";

/// A peer already proved this account or storage slot.
pub const ALREADY_PROVEN_REVERT: &str = "has already been proven";

/// A peer's commit landed between our event read and our write, invalidating
/// the root our inclusion proof was generated against (or committing the very
/// item we picked).
pub const COMMIT_INVALIDATION_REVERTS: [&str; 3] = [
    "invalid opcode",
    "Invalid root hash",
    "wasn't changed or has already been committed",
];

/// A peer finalized the dispute first.
pub const FINALIZE_RACE_REVERTS: [&str; 2] = ["Invalid batch header.", "Index out of bounds."];

/// What an on-chain revert means for a prover racing against its peers.
///
/// The verifier contracts signal "a peer already did this" only through
/// revert strings, so the classes below are matched as literal substrings of
/// the transport-surfaced error text. Everything unmatched is a genuine
/// submission failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RevertClass {
    /// The transitioner moved past the phase this write targets.
    PhaseGuard,
    /// The account/slot was proven by a peer; the write is redundant.
    AlreadyProven,
    /// A peer's commit obsoleted our inclusion proof; re-sync and retry.
    CommitInvalidated,
    /// A peer finalized the dispute; nothing left to do.
    FinalizeRaced,
    /// Not a recognized race: a real failure.
    Other,
}

pub fn classify_revert(message: &str) -> RevertClass {
    if message.contains(PHASE_GUARD_REVERT) {
        return RevertClass::PhaseGuard;
    }
    if message.contains(ALREADY_PROVEN_REVERT) {
        return RevertClass::AlreadyProven;
    }
    if COMMIT_INVALIDATION_REVERTS.iter().any(|m| message.contains(m)) {
        return RevertClass::CommitInvalidated;
    }
    if FINALIZE_RACE_REVERTS.iter().any(|m| message.contains(m)) {
        return RevertClass::FinalizeRaced;
    }
    RevertClass::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn race_classes_match_as_substrings() {
        assert_eq!(
            classify_revert(
                "server returned an error response: error code 3: execution reverted: \
                 Function must be called during the correct phase."
            ),
            RevertClass::PhaseGuard
        );
        assert_eq!(
            classify_revert("execution reverted: Account state has already been proven"),
            RevertClass::AlreadyProven
        );
        assert_eq!(
            classify_revert("execution reverted: Invalid root hash"),
            RevertClass::CommitInvalidated
        );
        assert_eq!(
            classify_revert(
                "execution reverted: Account state wasn't changed or has already been committed."
            ),
            RevertClass::CommitInvalidated
        );
        assert_eq!(
            classify_revert(
                "execution reverted: Storage slot value wasn't changed or has already been \
                 committed."
            ),
            RevertClass::CommitInvalidated
        );
        assert_eq!(classify_revert("VM error: invalid opcode"), RevertClass::CommitInvalidated);
        assert_eq!(
            classify_revert("execution reverted: Invalid batch header."),
            RevertClass::FinalizeRaced
        );
        assert_eq!(
            classify_revert("execution reverted: Index out of bounds."),
            RevertClass::FinalizeRaced
        );
    }

    #[test]
    fn unrecognized_reverts_are_real_failures() {
        assert_eq!(classify_revert("execution reverted: paused"), RevertClass::Other);
        assert_eq!(classify_revert("connection refused"), RevertClass::Other);
    }
}
