//! Publication of code carriers: settlement-chain contracts whose runtime
//! bytecode is exactly a supplied byte string.

use std::marker::PhantomData;

use alloy::{
    network::TransactionBuilder,
    primitives::{address, Address, Bytes},
    providers::Provider,
    rpc::types::eth::TransactionRequest,
    transports::Transport,
};
use tracing::debug;

use crate::error::{ProverError, ProverResult};

/// Init-code shim prepended to the runtime bytes: a position-independent
/// CODECOPY/RETURN sequence that returns everything after itself as the
/// deployed code, executing none of it.
///
/// ```text
/// 600d    PUSH1 0x0d   (length of this shim)
/// 38      CODESIZE
/// 03      SUB          (length of the runtime code)
/// 80      DUP1
/// 600d    PUSH1 0x0d   (offset of the runtime code)
/// 6000    PUSH1 0x00
/// 39      CODECOPY
/// 6000    PUSH1 0x00
/// f3      RETURN
/// ```
pub const CODE_CARRIER_PREFIX: [u8; 13] = [
    0x60, 0x0d, 0x38, 0x03, 0x80, 0x60, 0x0d, 0x60, 0x00, 0x39, 0x60, 0x00, 0xf3,
];

/// Carrier address used for accounts with no code; nothing is deployed.
pub const SENTINEL_CODE_ADDRESS: Address = address!("0000c0De0000C0DE0000c0de0000C0DE0000c0De");

/// The init code deploying `code` as-is.
pub fn carrier_init_code(code: &[u8]) -> Vec<u8> {
    let mut init = Vec::with_capacity(CODE_CARRIER_PREFIX.len() + code.len());
    init.extend_from_slice(&CODE_CARRIER_PREFIX);
    init.extend_from_slice(code);
    init
}

/// Submits carrier deployments against the settlement chain.
#[derive(Debug)]
pub struct CodeDeployer<ProviderT, TransportT> {
    provider: ProviderT,
    gas_limit: u64,
    _phantom: PhantomData<TransportT>,
}

impl<ProviderT, TransportT> CodeDeployer<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    pub fn new(provider: ProviderT, gas_limit: u64) -> Self {
        CodeDeployer {
            provider,
            gas_limit,
            _phantom: PhantomData,
        }
    }

    /// Deploys a contract whose runtime bytecode equals `code` byte-for-byte
    /// and returns its address.
    pub async fn deploy_code(&self, code: &[u8]) -> ProverResult<Address> {
        let request = TransactionRequest::default()
            .with_deploy_code(Bytes::from(carrier_init_code(code)))
            .with_gas_limit(self.gas_limit as u128);

        let receipt = self
            .provider
            .send_transaction(request)
            .await
            .map_err(|e| ProverError::Submission(e.to_string()))?
            .get_receipt()
            .await
            .map_err(|e| ProverError::Submission(e.to_string()))?;

        if !receipt.status() {
            return Err(ProverError::Submission(format!(
                "code carrier deployment reverted in {:?}",
                receipt.transaction_hash
            )));
        }

        let carrier = receipt.contract_address.ok_or_else(|| {
            ProverError::Submission("deployment receipt carries no contract address".into())
        })?;
        debug!(%carrier, code_len = code.len(), "deployed code carrier");
        Ok(carrier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shim_bytes_are_exact() {
        assert_eq!(
            hex::encode(CODE_CARRIER_PREFIX),
            "600d380380600d6000396000f3"
        );
    }

    #[test]
    fn init_code_is_shim_plus_runtime() {
        let runtime = [0xfe, 0x60, 0x01];
        let init = carrier_init_code(&runtime);
        assert_eq!(&init[..13], &CODE_CARRIER_PREFIX);
        assert_eq!(&init[13..], &runtime);
    }

    #[test]
    fn empty_runtime_is_just_the_shim() {
        assert_eq!(carrier_init_code(&[]), CODE_CARRIER_PREFIX.to_vec());
    }

    #[test]
    fn sentinel_address_is_the_protocol_constant() {
        assert_eq!(
            format!("{SENTINEL_CODE_ADDRESS:?}").to_lowercase(),
            "0x0000c0de0000c0de0000c0de0000c0de0000c0de"
        );
    }
}
