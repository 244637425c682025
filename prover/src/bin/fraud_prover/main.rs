use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::Transport;
use anyhow::{bail, Context, Result};
use clap::Parser;
use fraud_prover::contracts::AddressManager;
use fraud_prover::dispute::PhaseDriver;
use fraud_prover::driver::{self, Driver, DriverConfig};
use fraud_prover::rollup::RollupNode;
use fraud_prover::settlement::SettlementChain;
use tracing::{info, warn};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Wallet keys and endpoints usually live in a local `.env`; pull it in
    // before flag parsing so the clap env fallbacks see its values. A missing
    // file is fine, but a malformed one is worth a warning, held until the
    // subscriber is up.
    let dotenv = dotenvy::dotenv();
    fraud_prover::tracing::init();
    if let Err(e) = &dotenv {
        if !e.not_found() {
            warn!("found a local `.env` file but could not parse it (err: {e})");
        }
    }

    let args = cli::Cli::parse();

    let l2_provider = ProviderBuilder::new().on_http(args.l2_rpc_url.clone());

    let signer =
        PrivateKeySigner::from_str(&args.l1_wallet_key).context("invalid l1 wallet key")?;
    info!(submitter = %signer.address(), "initialized submitter identity");
    let l1_provider = ProviderBuilder::new()
        .with_recommended_fillers()
        .wallet(EthereumWallet::from(signer))
        .on_http(args.l1_rpc_url.clone());

    driver::wait_for_endpoint(&l1_provider, "settlement chain").await?;
    driver::wait_for_endpoint(&l2_provider, "rollup node").await?;

    let address_manager = AddressManager::new(args.address_manager, l1_provider.clone());
    let state_commitment_chain = resolve(&address_manager, "StateCommitmentChain").await?;
    let canonical_transaction_chain =
        resolve(&address_manager, "CanonicalTransactionChain").await?;
    let fraud_verifier = resolve(&address_manager, "FraudVerifier").await?;

    let settlement = SettlementChain::new(
        l1_provider.clone(),
        state_commitment_chain,
        canonical_transaction_chain,
    );
    let rollup = RollupNode::new(l2_provider);
    let phase_driver = PhaseDriver::new(
        l1_provider,
        fraud_verifier,
        args.deploy_gas_limit,
        args.run_gas_limit,
        args.block_offset,
    );

    let driver = Driver::new(
        settlement,
        rollup,
        phase_driver,
        DriverConfig {
            polling_interval: Duration::from_millis(args.polling_interval),
            block_offset: args.block_offset,
            from_index: args.from_index,
        },
    );

    let stop = driver.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested; finishing current poll");
            stop.store(false, Ordering::SeqCst);
        }
    });

    driver.run().await;
    Ok(())
}

/// Resolves a verifier-system contract through the address manager, refusing
/// to start against an incomplete deployment.
async fn resolve<T, P>(
    address_manager: &AddressManager::AddressManagerInstance<T, P>,
    name: &str,
) -> Result<Address>
where
    T: Transport + Clone,
    P: Provider<T>,
{
    let address = address_manager
        .getAddress(name.to_string())
        .call()
        .await
        .with_context(|| format!("resolving {name}"))?
        ._0;
    if address.is_zero() {
        bail!("address manager does not know {name}");
    }
    info!(name, %address, "resolved contract");
    Ok(address)
}
