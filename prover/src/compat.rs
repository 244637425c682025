//! Conversions between alloy primitives (the RPC/contract boundary) and the
//! `ethereum-types` primitives the trie crate is built on.

pub trait Compat<Out> {
    fn compat(self) -> Out;
}

impl Compat<ethereum_types::H256> for alloy::primitives::B256 {
    fn compat(self) -> ethereum_types::H256 {
        let alloy::primitives::FixedBytes(arr) = self;
        ethereum_types::H256(arr)
    }
}

impl Compat<alloy::primitives::B256> for ethereum_types::H256 {
    fn compat(self) -> alloy::primitives::B256 {
        let ethereum_types::H256(arr) = self;
        alloy::primitives::FixedBytes(arr)
    }
}

impl Compat<ethereum_types::H160> for alloy::primitives::Address {
    fn compat(self) -> ethereum_types::H160 {
        let alloy::primitives::Address(alloy::primitives::FixedBytes(arr)) = self;
        ethereum_types::H160(arr)
    }
}

impl Compat<ethereum_types::U256> for alloy::primitives::U256 {
    fn compat(self) -> ethereum_types::U256 {
        ethereum_types::U256(self.into_limbs())
    }
}

impl Compat<Vec<Vec<u8>>> for Vec<alloy::primitives::Bytes> {
    fn compat(self) -> Vec<Vec<u8>> {
        self.into_iter().map(|x| x.to_vec()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trip() {
        let h = alloy::primitives::B256::repeat_byte(0xab);
        assert_eq!(h.compat().compat(), h);
    }

    #[test]
    fn u256_limbs_agree() {
        let v = alloy::primitives::U256::from(123456789u64);
        assert_eq!(v.compat(), ethereum_types::U256::from(123456789u64));
    }
}
