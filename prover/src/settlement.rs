//! Read-only view of the settlement chain: batch headers, state-root
//! inclusion proofs and transaction inclusion proofs, all addressed by
//! global index.

use std::future::Future;

use alloy::{
    primitives::{B256, U256},
    providers::Provider,
    rpc::types::eth::Filter,
    sol_types::{SolCall, SolEvent, SolValue},
    transports::Transport,
};

use crate::{
    batch_tree,
    contracts::{
        hash_transaction_chain_element, CanonicalTransactionChain, ChainBatchHeader,
        ChainInclusionProof, StateCommitmentChain, Transaction,
    },
    error::{ProverError, ProverResult},
    types::{StateRootBatchProof, TransactionBatchProof},
};

/// The settlement-chain reads the prover pipeline depends on.
///
/// Everything here is a pure read; implementations never submit transactions.
pub trait SettlementView {
    /// The header of the batch enclosing global index `index`, or `None` when
    /// the index lies beyond the last appended batch.
    fn get_state_root_batch_header(
        &self,
        index: u64,
    ) -> impl Future<Output = ProverResult<Option<ChainBatchHeader>>> + Send;

    /// The committed state root at `index`.
    fn get_state_root(&self, index: u64) -> impl Future<Output = ProverResult<B256>> + Send;

    /// The committed state root at `index` together with its batch inclusion
    /// proof.
    fn get_state_root_batch_proof(
        &self,
        index: u64,
    ) -> impl Future<Output = ProverResult<StateRootBatchProof>> + Send;

    /// The transaction at `index` together with its batch inclusion proof.
    fn get_transaction_batch_proof(
        &self,
        index: u64,
    ) -> impl Future<Output = ProverResult<TransactionBatchProof>> + Send;
}

/// One batch-append event, uniformly shaped for both chain contracts.
#[derive(Clone, Debug)]
struct BatchEvent {
    batch_index: U256,
    batch_root: B256,
    batch_size: U256,
    prev_total_elements: U256,
    extra_data: alloy::primitives::Bytes,
    append_tx: B256,
}

impl BatchEvent {
    fn encloses(&self, index: u64) -> bool {
        let prev = self.prev_total_elements.to::<u64>();
        let size = self.batch_size.to::<u64>();
        prev <= index && index < prev + size
    }

    fn offset_of(&self, index: u64) -> usize {
        (index - self.prev_total_elements.to::<u64>()) as usize
    }

    fn header(&self) -> ChainBatchHeader {
        ChainBatchHeader {
            batchIndex: self.batch_index,
            batchRoot: self.batch_root,
            batchSize: self.batch_size,
            prevTotalElements: self.prev_total_elements,
            extraData: self.extra_data.clone(),
        }
    }
}

/// Concrete [`SettlementView`] backed by an RPC provider and the deployed
/// chain contracts.
///
/// Batches are located by scanning append events in ascending order until one
/// encloses the requested index; the batch's leaves are recovered from the
/// append transaction's calldata. Scans are linear per call, which the low
/// dispute rate makes acceptable.
#[derive(Debug)]
pub struct SettlementChain<ProviderT, TransportT> {
    provider: ProviderT,
    scc: StateCommitmentChain::StateCommitmentChainInstance<TransportT, ProviderT>,
    ctc: CanonicalTransactionChain::CanonicalTransactionChainInstance<TransportT, ProviderT>,
}

impl<ProviderT, TransportT> SettlementChain<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT> + Clone,
    TransportT: Transport + Clone,
{
    pub fn new(
        provider: ProviderT,
        state_commitment_chain: alloy::primitives::Address,
        canonical_transaction_chain: alloy::primitives::Address,
    ) -> Self {
        SettlementChain {
            scc: StateCommitmentChain::new(state_commitment_chain, provider.clone()),
            ctc: CanonicalTransactionChain::new(canonical_transaction_chain, provider.clone()),
            provider,
        }
    }

    async fn state_batch_events(&self) -> ProverResult<Vec<BatchEvent>> {
        let filter = Filter::new()
            .address(*self.scc.address())
            .event_signature(StateCommitmentChain::StateBatchAppended::SIGNATURE_HASH)
            .from_block(0u64);

        let logs = self.provider.get_logs(&filter).await?;
        logs.iter()
            .map(|log| {
                let decoded = log
                    .log_decode::<StateCommitmentChain::StateBatchAppended>()
                    .map_err(|e| ProverError::CorruptWitness(e.to_string()))?;
                let data = decoded.inner.data;
                Ok(BatchEvent {
                    batch_index: data.batchIndex,
                    batch_root: data.batchRoot,
                    batch_size: data.batchSize,
                    prev_total_elements: data.prevTotalElements,
                    extra_data: data.extraData,
                    append_tx: log.transaction_hash.ok_or_else(|| {
                        ProverError::Transport("append event log carries no transaction hash".into())
                    })?,
                })
            })
            .collect()
    }

    async fn transaction_batch_events(&self) -> ProverResult<Vec<BatchEvent>> {
        let filter = Filter::new()
            .address(*self.ctc.address())
            .event_signature(CanonicalTransactionChain::TransactionBatchAppended::SIGNATURE_HASH)
            .from_block(0u64);

        let logs = self.provider.get_logs(&filter).await?;
        logs.iter()
            .map(|log| {
                let decoded = log
                    .log_decode::<CanonicalTransactionChain::TransactionBatchAppended>()
                    .map_err(|e| ProverError::CorruptWitness(e.to_string()))?;
                let data = decoded.inner.data;
                Ok(BatchEvent {
                    batch_index: data.batchIndex,
                    batch_root: data.batchRoot,
                    batch_size: data.batchSize,
                    prev_total_elements: data.prevTotalElements,
                    extra_data: data.extraData,
                    append_tx: log.transaction_hash.ok_or_else(|| {
                        ProverError::Transport("append event log carries no transaction hash".into())
                    })?,
                })
            })
            .collect()
    }

    async fn append_calldata(&self, event: &BatchEvent) -> ProverResult<alloy::primitives::Bytes> {
        let tx = self
            .provider
            .get_transaction_by_hash(event.append_tx)
            .await?
            .ok_or_else(|| {
                ProverError::Transport(format!(
                    "batch append transaction {} not found",
                    event.append_tx
                ))
            })?;
        Ok(tx.input)
    }

    /// The state roots of the batch, recovered from `appendStateBatch`
    /// calldata. These are the batch-tree leaves directly.
    async fn state_batch_leaves(&self, event: &BatchEvent) -> ProverResult<Vec<B256>> {
        let input = self.append_calldata(event).await?;
        let call = StateCommitmentChain::appendStateBatchCall::abi_decode(&input, true)
            .map_err(|e| {
                ProverError::CorruptWitness(format!("undecodable state batch calldata: {e}"))
            })?;
        Ok(call._batch)
    }

    async fn transaction_batch_elements(
        &self,
        event: &BatchEvent,
    ) -> ProverResult<Vec<crate::contracts::TransactionChainElement>> {
        let input = self.append_calldata(event).await?;
        let call = CanonicalTransactionChain::appendTransactionBatchCall::abi_decode(&input, true)
            .map_err(|e| {
                ProverError::CorruptWitness(format!("undecodable transaction batch calldata: {e}"))
            })?;
        Ok(call._elements)
    }
}

impl<ProviderT, TransportT> SettlementView for SettlementChain<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT> + Clone,
    TransportT: Transport + Clone,
{
    async fn get_state_root_batch_header(
        &self,
        index: u64,
    ) -> ProverResult<Option<ChainBatchHeader>> {
        let events = self.state_batch_events().await?;
        Ok(events.iter().find(|e| e.encloses(index)).map(BatchEvent::header))
    }

    async fn get_state_root(&self, index: u64) -> ProverResult<B256> {
        let events = self.state_batch_events().await?;
        let event = events
            .iter()
            .find(|e| e.encloses(index))
            .ok_or(ProverError::NotFound(index))?;
        let leaves = self.state_batch_leaves(event).await?;
        leaves.get(event.offset_of(index)).copied().ok_or_else(|| {
            ProverError::CorruptWitness(format!(
                "batch {} calldata does not cover index {index}",
                event.batch_index
            ))
        })
    }

    async fn get_state_root_batch_proof(&self, index: u64) -> ProverResult<StateRootBatchProof> {
        let events = self.state_batch_events().await?;
        let event = events
            .iter()
            .find(|e| e.encloses(index))
            .ok_or(ProverError::NotFound(index))?;
        let leaves = self.state_batch_leaves(event).await?;
        if leaves.len() != event.batch_size.to::<u64>() as usize {
            return Err(ProverError::CorruptWitness(format!(
                "batch {} advertises {} elements but its calldata carries {}",
                event.batch_index,
                event.batch_size,
                leaves.len()
            )));
        }

        let offset = event.offset_of(index);
        Ok(StateRootBatchProof {
            state_root: leaves[offset],
            header: event.header(),
            proof: ChainInclusionProof {
                index: U256::from(offset),
                siblings: batch_tree::siblings(&leaves, offset),
            },
        })
    }

    async fn get_transaction_batch_proof(&self, index: u64) -> ProverResult<TransactionBatchProof> {
        let events = self.transaction_batch_events().await?;
        let event = events
            .iter()
            .find(|e| e.encloses(index))
            .ok_or(ProverError::NotFound(index))?;
        let elements = self.transaction_batch_elements(event).await?;
        if elements.len() != event.batch_size.to::<u64>() as usize {
            return Err(ProverError::CorruptWitness(format!(
                "batch {} advertises {} elements but its calldata carries {}",
                event.batch_index,
                event.batch_size,
                elements.len()
            )));
        }

        let offset = event.offset_of(index);
        let element = elements[offset].clone();
        let transaction = Transaction::abi_decode(&element.txData, true).map_err(|e| {
            ProverError::CorruptWitness(format!("undecodable transaction at index {index}: {e}"))
        })?;

        let leaves: Vec<B256> = elements.iter().map(hash_transaction_chain_element).collect();
        Ok(TransactionBatchProof {
            transaction,
            element,
            header: event.header(),
            proof: ChainInclusionProof {
                index: U256::from(offset),
                siblings: batch_tree::siblings(&leaves, offset),
            },
        })
    }
}
