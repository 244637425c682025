//! Materialization of the witness bundle a dispute runs on.

use std::collections::HashMap;

use alloy::primitives::keccak256;
use proof_trie::{verify_proof, Nibbles, TrieBuilder};
use tracing::debug;

use crate::{
    batch_tree, codec,
    compat::Compat,
    error::{ProverError, ProverResult},
    rollup::RollupView,
    settlement::SettlementView,
    types::{AccountStateProof, FraudProofData, StateRootBatchProof},
};

/// Assembles the full [`FraudProofData`] bundle for the suspect index.
///
/// All four remote reads must succeed; partial results are discarded. The
/// batch proofs and every account witness are verified locally before the
/// bundle is accepted, so a dispute never starts from data the verifier
/// contract would reject.
pub async fn assemble_fraud_proof<S, R>(
    settlement: &S,
    rollup: &R,
    index: u64,
    block_offset: u64,
) -> ProverResult<FraudProofData>
where
    S: SettlementView + Sync,
    R: RollupView + Sync,
{
    if index == 0 {
        return Err(ProverError::CorruptWitness(
            "the genesis state root has no pre-state to dispute against".into(),
        ));
    }

    let (pre, post, txp, sdp) = futures::try_join!(
        settlement.get_state_root_batch_proof(index - 1),
        settlement.get_state_root_batch_proof(index),
        settlement.get_transaction_batch_proof(index),
        rollup.get_state_diff_proof(index + block_offset - 1),
    )?;

    check_batch_inclusion(&pre)?;
    check_batch_inclusion(&post)?;

    let mut state_builder = TrieBuilder::new();
    for account in &sdp.account_state_proofs {
        check_account_witness(pre.state_root, account)?;
        state_builder.insert_proof(&account.account_proof)?;
    }
    let state_trie = state_builder.build(pre.state_root.compat())?;

    let mut storage_tries = HashMap::new();
    for account in &sdp.account_state_proofs {
        let mut builder = TrieBuilder::new();
        for slot in &account.storage_proof {
            builder.insert_proof(&slot.proof)?;
        }
        storage_tries.insert(account.address, builder.build(account.storage_root.compat())?);
    }

    debug!(
        index,
        accounts = sdp.account_state_proofs.len(),
        "assembled fraud proof witness"
    );

    Ok(FraudProofData {
        pre_state_root_proof: pre,
        post_state_root_proof: post,
        transaction_proof: txp,
        state_diff_proof: sdp,
        state_trie,
        storage_tries,
    })
}

/// Checks that a state-root batch proof opens against its own batch root.
fn check_batch_inclusion(proof: &StateRootBatchProof) -> ProverResult<()> {
    let ok = batch_tree::verify(
        proof.header.batchRoot,
        proof.state_root,
        proof.proof.index.to::<u64>() as usize,
        &proof.proof.siblings,
    );
    match ok {
        true => Ok(()),
        false => Err(ProverError::CorruptWitness(format!(
            "state root {} fails inclusion against batch {}",
            proof.state_root, proof.header.batchIndex
        ))),
    }
}

/// Checks that an account witness opens to the account it claims under the
/// pre-state root. Accounts absent from the pre-state (created by the
/// disputed transaction) legitimately open to nothing.
fn check_account_witness(
    pre_state_root: alloy::primitives::B256,
    account: &AccountStateProof,
) -> ProverResult<()> {
    let key = Nibbles::from(keccak256(account.address).compat());
    let opened = verify_proof(pre_state_root.compat(), &key, &account.account_proof)?;

    let expected = codec::encode_account(
        account.nonce,
        account.balance,
        account.storage_root,
        account.code_hash,
    );

    match opened {
        Some(encoded) if encoded == expected => Ok(()),
        Some(_) => Err(ProverError::CorruptWitness(format!(
            "witness for account {} does not open to its claimed state",
            account.address
        ))),
        None if account.nonce == 0 && account.balance.is_zero() => Ok(()),
        None => Err(ProverError::CorruptWitness(format!(
            "account {} is absent from the pre-state but claims a non-empty state",
            account.address
        ))),
    }
}
