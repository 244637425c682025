use alloy::primitives::Address;
use alloy::transports::http::reqwest::Url;
use clap::{Parser, ValueHint};

/// Fraud-proof driver configuration.
#[derive(Parser)]
#[command(version, about)]
pub(crate) struct Cli {
    /// The settlement-chain (L1) RPC endpoint.
    #[arg(long, env = "FRAUD_PROVER_L1_RPC_URL", value_hint = ValueHint::Url)]
    pub(crate) l1_rpc_url: Url,

    /// The rollup-node (L2) RPC endpoint. Must expose the state-diff proof
    /// extension.
    #[arg(long, env = "FRAUD_PROVER_L2_RPC_URL", value_hint = ValueHint::Url)]
    pub(crate) l2_rpc_url: Url,

    /// Signing key for the settlement-chain submitter identity.
    #[arg(long, env = "FRAUD_PROVER_L1_WALLET_KEY", hide_env_values = true)]
    pub(crate) l1_wallet_key: String,

    /// The on-chain address manager that resolves the verifier system
    /// contracts.
    #[arg(long, env = "FRAUD_PROVER_ADDRESS_MANAGER")]
    pub(crate) address_manager: Address,

    /// Gas limit for carrier deployments and commit submissions.
    #[arg(long, env = "FRAUD_PROVER_DEPLOY_GAS_LIMIT", default_value_t = 4_000_000)]
    pub(crate) deploy_gas_limit: u64,

    /// Gas limit for the on-chain re-execution of a disputed transaction.
    #[arg(long, env = "FRAUD_PROVER_RUN_GAS_LIMIT", default_value_t = 95_000_000)]
    pub(crate) run_gas_limit: u64,

    /// Poll spacing in milliseconds.
    #[arg(long, env = "FRAUD_PROVER_POLLING_INTERVAL", default_value_t = 5_000)]
    pub(crate) polling_interval: u64,

    /// Offset between global transaction indices and rollup block numbers.
    #[arg(long, env = "FRAUD_PROVER_BLOCK_OFFSET", default_value_t = 1)]
    pub(crate) block_offset: u64,

    /// Initial scan cursor.
    #[arg(long, env = "FRAUD_PROVER_FROM_INDEX", default_value_t = 0)]
    pub(crate) from_index: u64,
}
