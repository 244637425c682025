//! Read-only view of the rollup execution node: computed state roots, the
//! state-diff witness extension, and contract code lookups.

use std::future::Future;
use std::marker::PhantomData;

use alloy::{
    primitives::{Address, Bytes, B256},
    providers::Provider,
    rpc::types::eth::{BlockNumberOrTag, BlockTransactionsKind},
    transports::{RpcError, Transport},
};

use crate::{
    error::{ProverError, ProverResult},
    types::StateDiffProof,
};

/// The non-standard RPC endpoint returning the minimal account/storage
/// witness for one block's transaction.
const STATE_DIFF_PROOF_METHOD: &str = "eth_getStateDiffProof";

/// The rollup-node reads the prover pipeline depends on. All pure reads.
pub trait RollupView {
    /// The state root the node computed at `block`.
    fn get_state_root(&self, block: u64) -> impl Future<Output = ProverResult<B256>> + Send;

    /// The pre-execution witness for every account and storage slot touched
    /// by `block`'s single transaction.
    fn get_state_diff_proof(
        &self,
        block: u64,
    ) -> impl Future<Output = ProverResult<StateDiffProof>> + Send;

    /// The contract code at `address` as of `block`.
    fn get_code(
        &self,
        address: Address,
        block: u64,
    ) -> impl Future<Output = ProverResult<Bytes>> + Send;
}

/// Concrete [`RollupView`] over the rollup node's JSON-RPC endpoint.
#[derive(Debug)]
pub struct RollupNode<ProviderT, TransportT> {
    provider: ProviderT,
    _phantom: PhantomData<TransportT>,
}

impl<ProviderT, TransportT> RollupNode<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    pub fn new(provider: ProviderT) -> Self {
        RollupNode {
            provider,
            _phantom: PhantomData,
        }
    }
}

impl<ProviderT, TransportT> RollupView for RollupNode<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    async fn get_state_root(&self, block: u64) -> ProverResult<B256> {
        let block = self
            .provider
            .get_block(block.into(), BlockTransactionsKind::Hashes)
            .await?
            .ok_or(ProverError::NotFound(block))?;
        Ok(block.header.state_root)
    }

    async fn get_state_diff_proof(&self, block: u64) -> ProverResult<StateDiffProof> {
        self.provider
            .raw_request(
                STATE_DIFF_PROOF_METHOD.into(),
                (BlockNumberOrTag::Number(block),),
            )
            .await
            .map_err(|e| match &e {
                RpcError::ErrorResp(payload)
                    if payload.code == -32601 || payload.message.contains("not supported") =>
                {
                    ProverError::Unsupported(STATE_DIFF_PROOF_METHOD)
                }
                _ => e.into(),
            })
    }

    async fn get_code(&self, address: Address, block: u64) -> ProverResult<Bytes> {
        Ok(self
            .provider
            .get_code_at(address)
            .block_id(block.into())
            .await?)
    }
}
