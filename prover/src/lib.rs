//! Core of the fraud-proof driver: scans a rollup's committed state roots for
//! disagreements with what its execution node actually computed, assembles a
//! self-contained cryptographic witness for the disputed transaction, and
//! drives the settlement-chain verifier through its interactive protocol
//! until the fraudulent root is invalidated.

pub mod batch_tree;
pub mod codec;
pub mod compat;
pub mod contracts;
pub mod deployer;
pub mod dispute;
pub mod driver;
pub mod error;
pub mod rollup;
pub mod scanner;
pub mod settlement;
pub mod tracing;
pub mod types;
pub mod witness;

/// How many times boot-time connectivity checks retry each endpoint before
/// the process gives up.
pub const BOOT_ATTEMPTS: usize = 10;

/// Spacing between boot-time connectivity attempts.
pub const BOOT_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(1);
