//! The phase driver: walks one dispute through the verifier's interactive
//! protocol while keeping the local trie views in lock-step with on-chain
//! commitments, and while tolerating other provers racing on the same
//! dispute.

use std::collections::HashSet;

use alloy::{
    contract::{CallBuilder, CallDecoder},
    primitives::{keccak256, Address, B256, U256},
    providers::Provider,
    rpc::types::eth::Filter,
    sol_types::SolEvent,
    transports::Transport,
};
use proof_trie::{create_proof, Nibbles, Trie, TrieResult};
use tracing::{debug, info, warn};

use crate::{
    codec,
    compat::Compat,
    contracts::{
        hash_transaction, FraudVerifier, StateManager, StateTransitioner,
    },
    deployer::{CodeDeployer, SENTINEL_CODE_ADDRESS},
    error::{classify_revert, ProverError, ProverResult, RevertClass},
    rollup::RollupView,
    types::FraudProofData,
};

type TransitionerInstance<T, P> = StateTransitioner::StateTransitionerInstance<T, P>;
type ManagerInstance<T, P> = StateManager::StateManagerInstance<T, P>;

/// Where a dispute stands. The on-chain transitioner reports the last three
/// variants; `Init` is the local state before one exists. The protocol only
/// ever moves forward through this ordering.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Phase {
    Init,
    PreExecution,
    PostExecution,
    Complete,
}

impl Phase {
    pub fn from_u8(raw: u8) -> ProverResult<Phase> {
        match raw {
            0 => Ok(Phase::PreExecution),
            1 => Ok(Phase::PostExecution),
            2 => Ok(Phase::Complete),
            other => Err(ProverError::Submission(format!(
                "transitioner reported unknown phase {other}"
            ))),
        }
    }
}

/// Result of a guarded submission.
enum SubmitOutcome {
    /// Our transaction landed.
    Landed,
    /// A peer got there first; the revert class says how.
    Obsolete(RevertClass),
}

/// Sends a contract call, waits for its receipt, and absorbs reverts whose
/// class appears in `absorb` as cooperative progress by a peer.
async fn submit_call<T, P, D>(
    call: CallBuilder<T, P, D>,
    absorb: &[RevertClass],
) -> ProverResult<SubmitOutcome>
where
    T: Transport + Clone,
    P: Provider<T>,
    D: CallDecoder,
{
    match call.send().await {
        Ok(pending) => {
            let receipt = pending
                .get_receipt()
                .await
                .map_err(|e| ProverError::Submission(e.to_string()))?;
            match receipt.status() {
                true => Ok(SubmitOutcome::Landed),
                false => Err(ProverError::Submission(format!(
                    "transaction {} reverted on chain",
                    receipt.transaction_hash
                ))),
            }
        }
        Err(e) => {
            let message = e.to_string();
            let class = classify_revert(&message);
            match absorb.contains(&class) {
                true => Ok(SubmitOutcome::Obsolete(class)),
                false => Err(ProverError::Submission(message)),
            }
        }
    }
}

/// Absorbs a peer-committed (or self-committed) account's post-execution
/// state into the local state trie. Absorptions commute: the resulting root
/// does not depend on the order accounts are picked up.
pub(crate) fn absorb_account_state(
    trie: &mut Trie,
    address: Address,
    nonce: u64,
    balance: U256,
    storage_root: B256,
    code_hash: B256,
) -> TrieResult<()> {
    trie.insert(
        Nibbles::from(keccak256(address).compat()),
        codec::encode_account(nonce, balance, storage_root, code_hash),
    )
}

/// Absorbs a committed storage slot value into an account's local storage
/// trie view.
pub(crate) fn absorb_storage_value(trie: &mut Trie, key: B256, value: B256) -> TrieResult<()> {
    trie.insert(
        Nibbles::from(keccak256(key).compat()),
        codec::encode_storage_value(value),
    )
}

/// Drives disputes against the fraud verifier.
#[derive(Debug)]
pub struct PhaseDriver<ProviderT, TransportT> {
    provider: ProviderT,
    verifier: FraudVerifier::FraudVerifierInstance<TransportT, ProviderT>,
    deployer: CodeDeployer<ProviderT, TransportT>,
    deploy_gas_limit: u64,
    run_gas_limit: u64,
    block_offset: u64,
}

impl<ProviderT, TransportT> PhaseDriver<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT> + Clone,
    TransportT: Transport + Clone,
{
    pub fn new(
        provider: ProviderT,
        fraud_verifier: Address,
        deploy_gas_limit: u64,
        run_gas_limit: u64,
        block_offset: u64,
    ) -> Self {
        PhaseDriver {
            verifier: FraudVerifier::new(fraud_verifier, provider.clone()),
            deployer: CodeDeployer::new(provider.clone(), deploy_gas_limit),
            provider,
            deploy_gas_limit,
            run_gas_limit,
            block_offset,
        }
    }

    /// Runs the dispute for suspect index `index` to completion and returns
    /// the value the scan cursor must rewind to: the start of the batch
    /// containing the disputed root, so later roots of that batch are
    /// re-examined under the corrected post-state.
    pub async fn prove_fraud<R: RollupView + Sync>(
        &self,
        rollup: &R,
        index: u64,
        mut data: FraudProofData,
    ) -> ProverResult<u64> {
        let pre_root = data.pre_state_root_proof.state_root;
        let tx_hash = hash_transaction(&data.transaction_proof.transaction);
        info!(index, %pre_root, %tx_hash, "disputing state root");

        self.ensure_initialized(&data, pre_root, tx_hash).await?;

        let transitioner_address = self.transitioner_address(pre_root, tx_hash).await?;
        if transitioner_address.is_zero() {
            return Err(ProverError::Submission(
                "initialization did not register a state transitioner".into(),
            ));
        }
        let transitioner = StateTransitioner::new(transitioner_address, self.provider.clone());
        let manager_address = transitioner.stateManager().call().await?._0;
        let manager = StateManager::new(manager_address, self.provider.clone());

        let mut phase = self.read_phase(&transitioner).await?;
        info!(?phase, %transitioner_address, "loaded dispute handles");

        if phase == Phase::PreExecution {
            self.prove_pre_state(rollup, index, &data, &transitioner, &manager)
                .await?;
            phase = self.advance_phase(&transitioner, phase).await?;
        }

        if phase == Phase::PostExecution {
            self.commit_post_state(&mut data, &transitioner, &manager)
                .await?;
            phase = self.advance_phase(&transitioner, phase).await?;
        }

        if phase == Phase::Complete {
            self.finalize(&data, pre_root, tx_hash).await?;
        }

        let rewound = data
            .pre_state_root_proof
            .header
            .prevTotalElements
            .to::<u64>();
        info!(index, rewound, "dispute complete");
        Ok(rewound)
    }

    async fn transitioner_address(&self, pre_root: B256, tx_hash: B256) -> ProverResult<Address> {
        Ok(self
            .verifier
            .getStateTransitioner(pre_root, tx_hash)
            .call()
            .await?
            ._0)
    }

    async fn read_phase(
        &self,
        transitioner: &TransitionerInstance<TransportT, ProviderT>,
    ) -> ProverResult<Phase> {
        Phase::from_u8(transitioner.phase().call().await?._0)
    }

    /// Re-reads the phase after finishing a step, enforcing that the machine
    /// only ever moves forward.
    async fn advance_phase(
        &self,
        transitioner: &TransitionerInstance<TransportT, ProviderT>,
        previous: Phase,
    ) -> ProverResult<Phase> {
        let next = self.read_phase(transitioner).await?;
        if next < previous {
            return Err(ProverError::Submission(format!(
                "transitioner phase regressed from {previous:?} to {next:?}"
            )));
        }
        Ok(next)
    }

    /// Creates the transitioner for `(preStateRoot, txHash)` unless a
    /// peer already did.
    async fn ensure_initialized(
        &self,
        data: &FraudProofData,
        pre_root: B256,
        tx_hash: B256,
    ) -> ProverResult<()> {
        if !self.transitioner_address(pre_root, tx_hash).await?.is_zero() {
            info!("dispute already initialized by a peer");
            return Ok(());
        }

        let pre = &data.pre_state_root_proof;
        let txp = &data.transaction_proof;
        let call = self.verifier.initializeFraudVerification(
            pre_root,
            pre.header.clone(),
            pre.proof.clone(),
            txp.transaction.clone(),
            txp.element.clone(),
            txp.header.clone(),
            txp.proof.clone(),
        );

        match submit_call(call, &[]).await {
            Ok(_) => {
                info!("initialized fraud verification");
                Ok(())
            }
            Err(e) => {
                // A peer may have initialized between our read and our write;
                // the registered transitioner, not the revert, is the truth.
                match self.transitioner_address(pre_root, tx_hash).await?.is_zero() {
                    true => Err(e),
                    false => {
                        info!("lost initialization race to a peer");
                        Ok(())
                    }
                }
            }
        }
    }

    /// Proves every witnessed account and storage slot into the state
    /// manager, then applies the disputed transaction.
    async fn prove_pre_state<R: RollupView + Sync>(
        &self,
        rollup: &R,
        index: u64,
        data: &FraudProofData,
        transitioner: &TransitionerInstance<TransportT, ProviderT>,
        manager: &ManagerInstance<TransportT, ProviderT>,
    ) -> ProverResult<()> {
        for account in &data.state_diff_proof.account_state_proofs {
            if manager.hasAccount(account.address).call().await?._0 {
                debug!(address = %account.address, "account already proven");
                continue;
            }

            let code = rollup
                .get_code(account.address, index + self.block_offset)
                .await?;
            let carrier = match code.is_empty() {
                true => SENTINEL_CODE_ADDRESS,
                false => self.deployer.deploy_code(&code).await?,
            };

            let witness = codec::encode_trie_witness(&account.account_proof);
            let call =
                transitioner.proveContractState(account.address, carrier, witness.into());
            match submit_call(call, &[RevertClass::AlreadyProven, RevertClass::PhaseGuard]).await? {
                SubmitOutcome::Obsolete(RevertClass::PhaseGuard) => return Ok(()),
                SubmitOutcome::Obsolete(_) => {
                    debug!(address = %account.address, "account proven by a peer")
                }
                SubmitOutcome::Landed => debug!(address = %account.address, "proved account state"),
            }
        }

        for account in &data.state_diff_proof.account_state_proofs {
            for slot in &account.storage_proof {
                let witness = codec::encode_trie_witness(&slot.proof);
                let call =
                    transitioner.proveStorageSlot(account.address, slot.key, witness.into());
                match submit_call(call, &[RevertClass::AlreadyProven, RevertClass::PhaseGuard])
                    .await?
                {
                    SubmitOutcome::Obsolete(RevertClass::PhaseGuard) => return Ok(()),
                    SubmitOutcome::Obsolete(_) => {
                        debug!(address = %account.address, key = %slot.key, "slot proven by a peer")
                    }
                    SubmitOutcome::Landed => {
                        debug!(address = %account.address, key = %slot.key, "proved storage slot")
                    }
                }
            }
        }

        let call = transitioner
            .applyTransaction(data.transaction_proof.transaction.clone())
            .gas(self.run_gas_limit as u128);
        match submit_call(call, &[RevertClass::PhaseGuard]).await? {
            SubmitOutcome::Landed => info!("applied disputed transaction"),
            SubmitOutcome::Obsolete(_) => info!("disputed transaction applied by a peer"),
        }
        Ok(())
    }

    /// Commits every changed account and storage slot back through the
    /// transitioner. Each sub-loop re-reads the commit event log on every
    /// iteration so the local tries absorb peer commits before the next
    /// inclusion proof is generated.
    async fn commit_post_state(
        &self,
        data: &mut FraudProofData,
        transitioner: &TransitionerInstance<TransportT, ProviderT>,
        manager: &ManagerInstance<TransportT, ProviderT>,
    ) -> ProverResult<()> {
        loop {
            let uncommitted = manager.getTotalUncommittedAccounts().call().await?._0;
            if uncommitted.is_zero() {
                break;
            }

            self.sync_committed_accounts(data, transitioner, manager)
                .await?;

            let Some(address) = self.next_uncommitted_account(data, manager).await? else {
                return Err(ProverError::Inconsistent(format!(
                    "{uncommitted} accounts uncommitted on-chain but none left in the witness"
                )));
            };

            let key = Nibbles::from(keccak256(address).compat());
            let proof = create_proof(&data.state_trie, &key)?;
            let call = transitioner
                .commitContractState(address, codec::encode_trie_witness(&proof).into())
                .gas(self.deploy_gas_limit as u128);
            match submit_call(
                call,
                &[RevertClass::CommitInvalidated, RevertClass::PhaseGuard],
            )
            .await?
            {
                SubmitOutcome::Landed => debug!(%address, "committed account state"),
                SubmitOutcome::Obsolete(RevertClass::PhaseGuard) => break,
                SubmitOutcome::Obsolete(_) => {
                    debug!(%address, "account commit obsoleted by a peer; re-syncing")
                }
            }
        }

        loop {
            let uncommitted = manager.getTotalUncommittedContractStorage().call().await?._0;
            if uncommitted.is_zero() {
                break;
            }

            self.sync_committed_storage(data, transitioner, manager)
                .await?;

            let Some((address, slot_key)) = self.next_uncommitted_slot(data, manager).await? else {
                return Err(ProverError::Inconsistent(format!(
                    "{uncommitted} storage slots uncommitted on-chain but none left in the witness"
                )));
            };

            let trie = data.storage_tries.get(&address).ok_or_else(|| {
                ProverError::Inconsistent(format!("no storage trie view for account {address}"))
            })?;
            let proof = create_proof(trie, &Nibbles::from(keccak256(slot_key).compat()))?;
            let call = transitioner
                .commitStorageSlot(address, slot_key, codec::encode_trie_witness(&proof).into())
                .gas(self.deploy_gas_limit as u128);
            match submit_call(
                call,
                &[RevertClass::CommitInvalidated, RevertClass::PhaseGuard],
            )
            .await?
            {
                SubmitOutcome::Landed => debug!(%address, key = %slot_key, "committed storage slot"),
                SubmitOutcome::Obsolete(RevertClass::PhaseGuard) => break,
                SubmitOutcome::Obsolete(_) => {
                    debug!(%address, key = %slot_key, "slot commit obsoleted by a peer; re-syncing")
                }
            }
        }

        match submit_call(
            transitioner.completeTransition(),
            &[RevertClass::PhaseGuard],
        )
        .await?
        {
            SubmitOutcome::Landed => info!("completed state transition"),
            SubmitOutcome::Obsolete(_) => info!("state transition completed by a peer"),
        }
        Ok(())
    }

    /// Replays the transitioner's `AccountCommitted` log into the local state
    /// trie for every witnessed account, whoever committed it.
    async fn sync_committed_accounts(
        &self,
        data: &mut FraudProofData,
        transitioner: &TransitionerInstance<TransportT, ProviderT>,
        manager: &ManagerInstance<TransportT, ProviderT>,
    ) -> ProverResult<()> {
        let witnessed: HashSet<Address> = data
            .state_diff_proof
            .account_state_proofs
            .iter()
            .map(|a| a.address)
            .collect();

        let filter = Filter::new()
            .address(*transitioner.address())
            .event_signature(StateTransitioner::AccountCommitted::SIGNATURE_HASH)
            .from_block(0u64);
        let logs = self.provider.get_logs(&filter).await?;

        for log in &logs {
            let decoded = log
                .log_decode::<StateTransitioner::AccountCommitted>()
                .map_err(|e| ProverError::Transport(e.to_string()))?;
            let account = decoded.inner.data.account;
            if !witnessed.contains(&account) {
                continue;
            }

            let state = manager.getAccount(account).call().await?;
            absorb_account_state(
                &mut data.state_trie,
                account,
                state.nonce.to::<u64>(),
                state.balance,
                state.storageRoot,
                state.codeHash,
            )
            .map_err(|e| {
                ProverError::Inconsistent(format!("cannot absorb commit for {account}: {e}"))
            })?;
        }
        Ok(())
    }

    /// Replays the transitioner's `ContractStorageCommitted` log into the
    /// per-account storage trie views.
    async fn sync_committed_storage(
        &self,
        data: &mut FraudProofData,
        transitioner: &TransitionerInstance<TransportT, ProviderT>,
        manager: &ManagerInstance<TransportT, ProviderT>,
    ) -> ProverResult<()> {
        let witnessed: HashSet<(Address, B256)> = data
            .state_diff_proof
            .account_state_proofs
            .iter()
            .flat_map(|a| a.storage_proof.iter().map(|s| (a.address, s.key)))
            .collect();

        let filter = Filter::new()
            .address(*transitioner.address())
            .event_signature(StateTransitioner::ContractStorageCommitted::SIGNATURE_HASH)
            .from_block(0u64);
        let logs = self.provider.get_logs(&filter).await?;

        for log in &logs {
            let decoded = log
                .log_decode::<StateTransitioner::ContractStorageCommitted>()
                .map_err(|e| ProverError::Transport(e.to_string()))?;
            let account = decoded.inner.data.account;
            let key = decoded.inner.data.key;
            if !witnessed.contains(&(account, key)) {
                continue;
            }

            let value = manager.getContractStorage(account, key).call().await?._0;
            let trie = data.storage_tries.get_mut(&account).ok_or_else(|| {
                ProverError::Inconsistent(format!("no storage trie view for account {account}"))
            })?;
            absorb_storage_value(trie, key, value).map_err(|e| {
                ProverError::Inconsistent(format!(
                    "cannot absorb slot commit for {account}/{key}: {e}"
                ))
            })?;
        }
        Ok(())
    }

    /// The first witnessed account the state manager reports as changed but
    /// not yet committed.
    async fn next_uncommitted_account(
        &self,
        data: &FraudProofData,
        manager: &ManagerInstance<TransportT, ProviderT>,
    ) -> ProverResult<Option<Address>> {
        for account in &data.state_diff_proof.account_state_proofs {
            if !manager.wasAccountChanged(account.address).call().await?._0 {
                continue;
            }
            if !manager.wasAccountCommitted(account.address).call().await?._0 {
                return Ok(Some(account.address));
            }
        }
        Ok(None)
    }

    /// The first witnessed storage slot reported as changed but not yet
    /// committed.
    async fn next_uncommitted_slot(
        &self,
        data: &FraudProofData,
        manager: &ManagerInstance<TransportT, ProviderT>,
    ) -> ProverResult<Option<(Address, B256)>> {
        for account in &data.state_diff_proof.account_state_proofs {
            for slot in &account.storage_proof {
                if !manager
                    .wasContractStorageChanged(account.address, slot.key)
                    .call()
                    .await?
                    ._0
                {
                    continue;
                }
                if !manager
                    .wasContractStorageCommitted(account.address, slot.key)
                    .call()
                    .await?
                    ._0
                {
                    return Ok(Some((account.address, slot.key)));
                }
            }
        }
        Ok(None)
    }

    /// Has the verifier invalidate the fraudulent post-state root.
    async fn finalize(
        &self,
        data: &FraudProofData,
        pre_root: B256,
        tx_hash: B256,
    ) -> ProverResult<()> {
        let pre = &data.pre_state_root_proof;
        let post = &data.post_state_root_proof;
        let call = self.verifier.finalizeFraudVerification(
            pre_root,
            pre.header.clone(),
            pre.proof.clone(),
            tx_hash,
            post.state_root,
            post.header.clone(),
            post.proof.clone(),
        );

        match submit_call(call, &[RevertClass::FinalizeRaced]).await? {
            SubmitOutcome::Landed => {
                warn!(post_root = %post.state_root, "invalidated fraudulent state root")
            }
            SubmitOutcome::Obsolete(_) => info!("dispute finalized by a peer"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_strictly_ordered() {
        assert!(Phase::Init < Phase::PreExecution);
        assert!(Phase::PreExecution < Phase::PostExecution);
        assert!(Phase::PostExecution < Phase::Complete);
    }

    #[test]
    fn phase_decoding() {
        assert_eq!(Phase::from_u8(0).unwrap(), Phase::PreExecution);
        assert_eq!(Phase::from_u8(1).unwrap(), Phase::PostExecution);
        assert_eq!(Phase::from_u8(2).unwrap(), Phase::Complete);
        assert!(Phase::from_u8(3).is_err());
    }

    #[test]
    fn account_absorption_commutes() {
        let accounts: Vec<(Address, u64)> = (1u8..=6)
            .map(|i| (Address::repeat_byte(i), i as u64))
            .collect();

        let mut forward = Trie::default();
        for (address, n) in &accounts {
            absorb_account_state(
                &mut forward,
                *address,
                *n,
                U256::from(*n * 10),
                B256::ZERO,
                B256::ZERO,
            )
            .unwrap();
        }

        let mut backward = Trie::default();
        for (address, n) in accounts.iter().rev() {
            absorb_account_state(
                &mut backward,
                *address,
                *n,
                U256::from(*n * 10),
                B256::ZERO,
                B256::ZERO,
            )
            .unwrap();
        }

        assert_eq!(forward.hash(), backward.hash());
    }

    #[test]
    fn account_absorption_is_idempotent() {
        let mut once = Trie::default();
        let mut twice = Trie::default();
        let address = Address::repeat_byte(0x42);

        absorb_account_state(&mut once, address, 7, U256::from(70u64), B256::ZERO, B256::ZERO)
            .unwrap();
        for _ in 0..2 {
            absorb_account_state(
                &mut twice,
                address,
                7,
                U256::from(70u64),
                B256::ZERO,
                B256::ZERO,
            )
            .unwrap();
        }

        assert_eq!(once.hash(), twice.hash());
    }

    #[test]
    fn storage_absorption_strips_value_encoding() {
        let mut trie = Trie::default();
        let key = B256::repeat_byte(0x01);
        let mut word = [0u8; 32];
        word[31] = 0x2a;
        absorb_storage_value(&mut trie, key, B256::from(word)).unwrap();

        let stored = trie
            .get(&Nibbles::from(keccak256(key).compat()))
            .unwrap()
            .unwrap()
            .to_vec();
        assert_eq!(stored, vec![0x2a]);
    }
}
