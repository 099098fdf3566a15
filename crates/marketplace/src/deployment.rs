//! Per-ledger deployment parameters.

use {hex_literal::hex, model::codec::ItemSchema, primitive_types::H160};

/// Caller-owned parameters of one marketplace deployment. There is no global
/// registry; construct one and pass it to [`crate::Client`].
#[derive(Clone, Debug)]
pub struct Deployment {
    /// Chain id orders are bound to.
    pub network: u64,
    /// Settlement contract that verifies signatures and moves assets.
    pub market: H160,
    /// Delegate moving ERC-721 assets on behalf of the settlement contract.
    pub erc721_delegate: H160,
    /// Delegate moving ERC-1155 assets.
    pub erc1155_delegate: H160,
    /// Wrapped native token offers are denominated in by default.
    pub wrapped_native: H160,
    /// Token-reference schema this deployment's delegates expect. Must stay
    /// in lock-step with the settlement contract or signed digests become
    /// unverifiable.
    pub item_schema: ItemSchema,
}

impl Deployment {
    pub fn mainnet() -> Self {
        Self {
            network: 1,
            market: H160(hex!("74312363e45DCaBA76c59ec49a7Aa8A65a67EeD3")),
            erc721_delegate: H160(hex!("f849de01b080adc3a814fabe1e2087475cf2e354")),
            erc1155_delegate: H160(hex!("024ac22acdb367a3ae52a3d94ac6649fdc1f0779")),
            wrapped_native: H160(hex!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2")),
            item_schema: ItemSchema::Minimal,
        }
    }
}
