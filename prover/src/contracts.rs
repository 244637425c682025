//! Bindings for the settlement-chain contracts the prover consumes.
//!
//! The ABI is fixed by the deployed verifier system; only the calls and
//! events the pipeline actually uses are declared.

use alloy::{
    primitives::{keccak256, B256},
    sol,
    sol_types::SolValue,
};

sol! {
    /// Header of a batch appended to one of the chain contracts. Immutable
    /// once posted.
    #[derive(Debug, PartialEq, Eq)]
    struct ChainBatchHeader {
        uint256 batchIndex;
        bytes32 batchRoot;
        uint256 batchSize;
        uint256 prevTotalElements;
        bytes extraData;
    }

    /// Merkle inclusion proof of one leaf within a batch: the within-batch
    /// offset and the sibling path up to the batch root.
    #[derive(Debug, PartialEq, Eq)]
    struct ChainInclusionProof {
        uint256 index;
        bytes32[] siblings;
    }

    /// A rollup transaction as the execution sandbox consumes it.
    #[derive(Debug, PartialEq, Eq)]
    struct Transaction {
        uint256 timestamp;
        uint256 blockNumber;
        uint8 l1QueueOrigin;
        address l1TxOrigin;
        address entrypoint;
        uint256 gasLimit;
        bytes data;
    }

    /// The metadata element actually hashed into the transaction batch tree.
    /// `txData` carries the ABI encoding of the [`Transaction`] itself.
    #[derive(Debug, PartialEq, Eq)]
    struct TransactionChainElement {
        bool isSequenced;
        uint256 queueIndex;
        uint256 timestamp;
        uint256 blockNumber;
        bytes txData;
    }

    #[sol(rpc)]
    interface AddressManager {
        function getAddress(string memory _name) external view returns (address);
    }

    #[sol(rpc)]
    interface StateCommitmentChain {
        event StateBatchAppended(
            uint256 indexed batchIndex,
            bytes32 batchRoot,
            uint256 batchSize,
            uint256 prevTotalElements,
            bytes extraData
        );

        function appendStateBatch(bytes32[] calldata _batch, uint256 _shouldStartAtElement) external;
    }

    #[sol(rpc)]
    interface CanonicalTransactionChain {
        event TransactionBatchAppended(
            uint256 indexed batchIndex,
            bytes32 batchRoot,
            uint256 batchSize,
            uint256 prevTotalElements,
            bytes extraData
        );

        function appendTransactionBatch(
            TransactionChainElement[] calldata _elements,
            uint256 _shouldStartAtElement
        ) external;
    }

    #[sol(rpc)]
    interface FraudVerifier {
        function getStateTransitioner(bytes32 _preStateRoot, bytes32 _txHash)
            external
            view
            returns (address);

        function initializeFraudVerification(
            bytes32 _preStateRoot,
            ChainBatchHeader calldata _preStateRootBatchHeader,
            ChainInclusionProof calldata _preStateRootProof,
            Transaction calldata _transaction,
            TransactionChainElement calldata _txChainElement,
            ChainBatchHeader calldata _transactionBatchHeader,
            ChainInclusionProof calldata _transactionProof
        ) external;

        function finalizeFraudVerification(
            bytes32 _preStateRoot,
            ChainBatchHeader calldata _preStateRootBatchHeader,
            ChainInclusionProof calldata _preStateRootProof,
            bytes32 _txHash,
            bytes32 _postStateRoot,
            ChainBatchHeader calldata _postStateRootBatchHeader,
            ChainInclusionProof calldata _postStateRootProof
        ) external;
    }

    #[sol(rpc)]
    interface StateTransitioner {
        event AccountCommitted(address account);
        event ContractStorageCommitted(address account, bytes32 key);

        function phase() external view returns (uint8);
        function stateManager() external view returns (address);

        function proveContractState(
            address _ovmContractAddress,
            address _ethContractAddress,
            bytes calldata _stateTrieWitness
        ) external;

        function proveStorageSlot(
            address _ovmContractAddress,
            bytes32 _key,
            bytes calldata _storageTrieWitness
        ) external;

        function applyTransaction(Transaction calldata _transaction) external;

        function commitContractState(
            address _ovmContractAddress,
            bytes calldata _stateTrieWitness
        ) external;

        function commitStorageSlot(
            address _ovmContractAddress,
            bytes32 _key,
            bytes calldata _storageTrieWitness
        ) external;

        function completeTransition() external;
    }

    #[sol(rpc)]
    interface StateManager {
        function hasAccount(address _address) external view returns (bool);
        function wasAccountChanged(address _address) external view returns (bool);
        function wasAccountCommitted(address _address) external view returns (bool);
        function wasContractStorageChanged(address _address, bytes32 _key)
            external
            view
            returns (bool);
        function wasContractStorageCommitted(address _address, bytes32 _key)
            external
            view
            returns (bool);
        function getTotalUncommittedAccounts() external view returns (uint256);
        function getTotalUncommittedContractStorage() external view returns (uint256);
        function getAccount(address _address)
            external
            view
            returns (uint256 nonce, uint256 balance, bytes32 storageRoot, bytes32 codeHash);
        function getContractStorage(address _address, bytes32 _key)
            external
            view
            returns (bytes32);
    }
}

/// The hash keying a dispute on the verifier: the disputed transaction's
/// canonical ABI encoding, keccak'd.
pub fn hash_transaction(tx: &Transaction) -> B256 {
    keccak256(tx.abi_encode())
}

/// The batch-tree leaf for a transaction chain element.
pub fn hash_transaction_chain_element(element: &TransactionChainElement) -> B256 {
    keccak256(element.abi_encode())
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, Bytes, U256};

    use super::*;

    fn sample_tx() -> Transaction {
        Transaction {
            timestamp: U256::from(1_700_000_000u64),
            blockNumber: U256::from(8u64),
            l1QueueOrigin: 0,
            l1TxOrigin: Address::ZERO,
            entrypoint: Address::repeat_byte(0x11),
            gasLimit: U256::from(30_000_000u64),
            data: Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
        }
    }

    #[test]
    fn transaction_hash_is_stable() {
        let a = hash_transaction(&sample_tx());
        let b = hash_transaction(&sample_tx());
        assert_eq!(a, b);
    }

    #[test]
    fn transaction_hash_depends_on_contents() {
        let mut other = sample_tx();
        other.blockNumber = U256::from(9u64);
        assert_ne!(hash_transaction(&sample_tx()), hash_transaction(&other));
    }

    #[test]
    fn element_round_trips_through_tx_data() {
        let tx = sample_tx();
        let element = TransactionChainElement {
            isSequenced: true,
            queueIndex: U256::ZERO,
            timestamp: tx.timestamp,
            blockNumber: tx.blockNumber,
            txData: tx.abi_encode().into(),
        };
        let decoded = Transaction::abi_decode(&element.txData, true).unwrap();
        assert_eq!(decoded, tx);
    }
}
