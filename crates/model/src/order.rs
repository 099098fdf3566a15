//! Order model as signed and verified by the settlement contract.

use {
    crate::{codec, signature::EcdsaSignature, u256_decimal},
    primitive_types::{H160, H256, U256},
    rand::Rng as _,
    serde::{Deserialize, Serialize},
    strum::{AsRefStr, EnumString},
    web3::signing,
};

/// Signing-procedure version stamped into every order this crate signs.
pub const SIGN_VERSION: u8 = 1;

/// What the order owner intends to do with the listed items.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Intent {
    Sell = 1,
    Auction = 2,
    Buy = 3,
}

impl Intent {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Sell),
            2 => Some(Self::Auction),
            3 => Some(Self::Buy),
            _ => None,
        }
    }
}

/// Asset-transfer adapter the settlement contract invokes for the items.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum DelegateType {
    Invalid = 0,
    Erc721 = 1,
    Erc1155 = 2,
}

impl DelegateType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Invalid),
            1 => Some(Self::Erc721),
            2 => Some(Self::Erc1155),
            _ => None,
        }
    }
}

/// Token standard of a listed asset.
#[derive(
    AsRefStr, Clone, Copy, Debug, Deserialize, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TokenStandard {
    Erc721,
    Erc1155,
}

impl TokenStandard {
    /// Delegate the settlement contract must use to move assets of this
    /// standard.
    pub fn delegate_type(self) -> DelegateType {
        match self {
            Self::Erc721 => DelegateType::Erc721,
            Self::Erc1155 => DelegateType::Erc1155,
        }
    }
}

/// One asset reference inside item `data` and `data_mask` byte strings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TokenRef {
    pub token: H160,
    pub token_id: U256,
    /// Units transferred; only on the wire in the extended schema.
    pub amount: U256,
    /// Only on the wire in the extended schema. The minimal schema implies
    /// the ERC-721 delegate.
    pub standard: TokenStandard,
}

/// One priced line of an order.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(with = "u256_decimal")]
    pub price: U256,
    /// ABI-encoded token references, see [`crate::codec::encode_token_refs`].
    #[serde(with = "crate::bytes_hex")]
    pub data: Vec<u8>,
}

/// The exact fields that get hashed, signed, and verified by the settlement
/// contract. Signature fields live on [`Order`] and never enter the digest.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    pub salt: U256,
    pub user: H160,
    /// Chain id the order is bound to; the same fields signed for another
    /// chain produce an unrelated digest.
    pub network: u64,
    pub intent: Intent,
    pub delegate_type: DelegateType,
    /// Unix timestamp after which the order is unusable.
    pub deadline: u64,
    /// Payment token, or the zero address for the chain's native currency.
    pub currency: H160,
    /// Bitmask over item `data` enabling collection-wide matching; empty for
    /// orders targeting specific token ids.
    #[serde(with = "crate::bytes_hex")]
    pub data_mask: Vec<u8>,
    pub items: Vec<OrderItem>,
}

impl OrderData {
    /// The canonical signing digest: keccak-256 over the ABI encoding of the
    /// order fields followed by the item count and items.
    pub fn signing_digest(&self) -> H256 {
        H256(signing::keccak256(&codec::signing_preimage(self)))
    }
}

/// A signed order. Constructed through [`crate::signature::sign_order`] or
/// decoded from the wire; treated as immutable either way. Changing any field
/// requires re-deriving the order with a fresh salt and signature.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(flatten)]
    pub data: OrderData,
    #[serde(flatten)]
    pub signature: EcdsaSignature,
    pub sign_version: u8,
}

/// A fresh 256-bit salt. Uniqueness is probabilistic, not enforced.
pub fn random_salt() -> U256 {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes[..]);
    U256::from_big_endian(&bytes)
}
