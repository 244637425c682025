//! The periodic supervisor loop tying scanner, witness assembly and phase
//! driver together.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use alloy::providers::Provider;
use alloy::transports::Transport;
use tracing::{error, info, warn};

use crate::{
    dispute::PhaseDriver,
    error::ProverResult,
    rollup::RollupView,
    scanner,
    settlement::SettlementView,
    witness,
    BOOT_ATTEMPTS, BOOT_RETRY_DELAY,
};

/// Tunables of the driver loop.
#[derive(Clone, Debug)]
pub struct DriverConfig {
    pub polling_interval: Duration,
    pub block_offset: u64,
    pub from_index: u64,
}

/// The top-level agent: polls the scanner and, on a hit, assembles a witness
/// and drives the dispute.
///
/// The scan cursor is the only state that survives across polls. It moves
/// exclusively on dispute success, and then only to the rewound value the
/// phase driver hands back; every failure leaves it where it was so the same
/// dispute is retried on the next tick.
pub struct Driver<S, R, ProviderT, TransportT> {
    settlement: S,
    rollup: R,
    phase_driver: PhaseDriver<ProviderT, TransportT>,
    config: DriverConfig,
    cursor: u64,
    running: Arc<AtomicBool>,
}

impl<S, R, ProviderT, TransportT> Driver<S, R, ProviderT, TransportT>
where
    S: SettlementView + Sync,
    R: RollupView + Sync,
    ProviderT: Provider<TransportT> + Clone,
    TransportT: Transport + Clone,
{
    pub fn new(
        settlement: S,
        rollup: R,
        phase_driver: PhaseDriver<ProviderT, TransportT>,
        config: DriverConfig,
    ) -> Self {
        let cursor = config.from_index;
        Driver {
            settlement,
            rollup,
            phase_driver,
            config,
            cursor,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A handle the supervisor can flip to stop the loop; checked only
    /// between polls, so an in-flight dispute runs to completion.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub async fn run(mut self) {
        info!(
            cursor = self.cursor,
            interval_ms = self.config.polling_interval.as_millis() as u64,
            "fraud prover running"
        );

        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(self.config.polling_interval).await;

            match self.tick().await {
                Ok(Some(rewound)) => {
                    info!(from = self.cursor, to = rewound, "moving scan cursor");
                    self.cursor = rewound;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "dispute aborted; cursor unchanged"),
            }
        }

        info!("fraud prover stopped");
    }

    /// One poll: scan for a mismatch and, if found, dispute it. Returns the
    /// rewound cursor on a completed dispute.
    async fn tick(&self) -> ProverResult<Option<u64>> {
        let Some(index) = scanner::find_next_mismatch(
            &self.settlement,
            &self.rollup,
            self.cursor,
            self.config.block_offset,
        )
        .await?
        else {
            return Ok(None);
        };

        warn!(index, "fraudulent state root detected");
        let data = witness::assemble_fraud_proof(
            &self.settlement,
            &self.rollup,
            index,
            self.config.block_offset,
        )
        .await?;

        let rewound = self.phase_driver.prove_fraud(&self.rollup, index, data).await?;
        Ok(Some(rewound))
    }
}

/// Verifies an RPC endpoint is reachable, retrying before giving up.
///
/// Escalates to `Fatal` after [`BOOT_ATTEMPTS`] failures so misconfigured
/// endpoints kill the process instead of spinning forever.
pub async fn wait_for_endpoint<ProviderT, TransportT>(
    provider: &ProviderT,
    name: &str,
) -> ProverResult<()>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    for attempt in 1..=BOOT_ATTEMPTS {
        match provider.get_chain_id().await {
            Ok(chain_id) => {
                info!(name, chain_id, "endpoint connected");
                return Ok(());
            }
            Err(e) => {
                error!(name, attempt, error = %e, "endpoint unreachable");
                tokio::time::sleep(BOOT_RETRY_DELAY).await;
            }
        }
    }
    Err(crate::error::ProverError::Fatal(format!(
        "could not reach {name} after {BOOT_ATTEMPTS} attempts"
    )))
}
