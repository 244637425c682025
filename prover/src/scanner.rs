//! Linear scan for the next committed state root the rollup node disagrees
//! with.

use tracing::debug;

use crate::{
    error::{ProverError, ProverResult},
    rollup::RollupView,
    settlement::SettlementView,
};

/// Walks global indices from `cursor` while batches exist, comparing the
/// committed root against the root the rollup node computed for the
/// corresponding block. Returns the first disagreeing index, or `None` when
/// the settlement chain is caught up without a mismatch.
///
/// Pure reads only; cheap enough to run on every poll.
pub async fn find_next_mismatch<S, R>(
    settlement: &S,
    rollup: &R,
    cursor: u64,
    block_offset: u64,
) -> ProverResult<Option<u64>>
where
    S: SettlementView + Sync,
    R: RollupView + Sync,
{
    let mut index = cursor;
    loop {
        if settlement.get_state_root_batch_header(index).await?.is_none() {
            return Ok(None);
        }

        let committed = match settlement.get_state_root(index).await {
            Err(ProverError::NotFound(_)) => return Ok(None),
            other => other?,
        };
        let computed = match rollup.get_state_root(index + block_offset).await {
            Err(ProverError::NotFound(_)) => return Ok(None),
            other => other?,
        };

        if committed != computed {
            debug!(index, %committed, %computed, "state root mismatch");
            return Ok(Some(index));
        }
        index += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use alloy::primitives::{Address, Bytes, B256, U256};

    use super::*;
    use crate::{
        contracts::ChainBatchHeader,
        types::{StateDiffProof, StateRootBatchProof, TransactionBatchProof},
    };

    struct FakeSettlement {
        roots: Vec<B256>,
    }

    impl SettlementView for FakeSettlement {
        async fn get_state_root_batch_header(
            &self,
            index: u64,
        ) -> ProverResult<Option<ChainBatchHeader>> {
            Ok(((index as usize) < self.roots.len()).then(|| ChainBatchHeader {
                batchIndex: U256::ZERO,
                batchRoot: B256::ZERO,
                batchSize: U256::from(self.roots.len() as u64),
                prevTotalElements: U256::ZERO,
                extraData: Bytes::new(),
            }))
        }

        async fn get_state_root(&self, index: u64) -> ProverResult<B256> {
            self.roots
                .get(index as usize)
                .copied()
                .ok_or(ProverError::NotFound(index))
        }

        async fn get_state_root_batch_proof(
            &self,
            _index: u64,
        ) -> ProverResult<StateRootBatchProof> {
            unimplemented!("the scanner never requests batch proofs")
        }

        async fn get_transaction_batch_proof(
            &self,
            _index: u64,
        ) -> ProverResult<TransactionBatchProof> {
            unimplemented!("the scanner never requests batch proofs")
        }
    }

    struct FakeRollup {
        roots: HashMap<u64, B256>,
    }

    impl RollupView for FakeRollup {
        async fn get_state_root(&self, block: u64) -> ProverResult<B256> {
            self.roots
                .get(&block)
                .copied()
                .ok_or(ProverError::NotFound(block))
        }

        async fn get_state_diff_proof(&self, _block: u64) -> ProverResult<StateDiffProof> {
            unimplemented!("the scanner never requests state diffs")
        }

        async fn get_code(&self, _address: Address, _block: u64) -> ProverResult<Bytes> {
            unimplemented!("the scanner never requests code")
        }
    }

    fn agreeing_chain(n: u64, block_offset: u64) -> (FakeSettlement, FakeRollup) {
        let roots: Vec<B256> = (0..n).map(|i| B256::repeat_byte(i as u8 + 1)).collect();
        let rollup_roots = roots
            .iter()
            .enumerate()
            .map(|(i, r)| (i as u64 + block_offset, *r))
            .collect();
        (
            FakeSettlement { roots },
            FakeRollup {
                roots: rollup_roots,
            },
        )
    }

    #[tokio::test]
    async fn equal_roots_are_never_selected() {
        let (settlement, rollup) = agreeing_chain(8, 1);
        let hit = find_next_mismatch(&settlement, &rollup, 0, 1).await.unwrap();
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn first_disagreement_wins() {
        let (settlement, mut rollup) = agreeing_chain(8, 1);
        rollup.roots.insert(5 + 1, B256::repeat_byte(0xee));
        rollup.roots.insert(6 + 1, B256::repeat_byte(0xef));

        let hit = find_next_mismatch(&settlement, &rollup, 0, 1).await.unwrap();
        assert_eq!(hit, Some(5));
    }

    #[tokio::test]
    async fn scan_starts_at_the_cursor() {
        let (settlement, mut rollup) = agreeing_chain(8, 1);
        rollup.roots.insert(2 + 1, B256::repeat_byte(0xee));

        let hit = find_next_mismatch(&settlement, &rollup, 3, 1).await.unwrap();
        assert_eq!(hit, None, "mismatches behind the cursor are not rescanned");
    }

    #[tokio::test]
    async fn rollup_lag_ends_the_scan() {
        let (settlement, mut rollup) = agreeing_chain(8, 1);
        // The rollup node has only produced blocks up to 4.
        rollup.roots.retain(|block, _| *block <= 4);

        let hit = find_next_mismatch(&settlement, &rollup, 0, 1).await.unwrap();
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn respects_block_offset() {
        let (settlement, mut rollup) = agreeing_chain(4, 3);
        rollup.roots.insert(1 + 3, B256::repeat_byte(0xee));

        let hit = find_next_mismatch(&settlement, &rollup, 0, 3).await.unwrap();
        assert_eq!(hit, Some(1));
    }
}
