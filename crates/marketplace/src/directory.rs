//! Boundary to the remote matching service.
//!
//! Transport is out of scope here; implementations wrap whatever HTTP stack
//! they like. The trait is mockable so the order flows can be exercised
//! without a network.

use {
    model::{
        order::TokenStandard,
        settlement::{CancelInput, Op, RunInput},
        signature::EcdsaSignature,
        u256_decimal,
    },
    primitive_types::{H160, H256, U256},
    serde::{Deserialize, Serialize},
};

/// Payload registering a signed order with the directory service, for new
/// listings, buy offers, and price changes alike.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    /// ABI-encoded signed order, see [`model::codec::encode_order`].
    #[serde(with = "model::bytes_hex")]
    pub order: Vec<u8>,
    /// Whether the order is a collection-wide offer.
    pub is_collection: bool,
    /// Whether the order replaces an existing listing at a lower price.
    pub change_price: bool,
    /// The listing being re-priced when `change_price` is set.
    pub replaces_order_id: Option<u64>,
    /// Royalty in basis points passed through to the venue.
    pub royalty: Option<u32>,
}

/// A signed request for a cancellation instruction.
#[derive(Clone, Debug)]
pub struct CancelRequest {
    pub caller: H160,
    pub op: Op,
    pub order_id: u64,
    /// Digest the caller signed, see
    /// [`model::signature::cancellation_digest`].
    pub sign_message: H256,
    pub sign: EcdsaSignature,
}

/// A request for a settlement instruction accepting an order.
#[derive(Clone, Debug)]
pub struct AcceptRequest {
    pub caller: H160,
    pub op: Op,
    pub order_id: u64,
    pub currency: H160,
    pub price: U256,
    /// Token the caller settles with, for offers not pinned to one token id.
    pub token_id: Option<U256>,
}

/// Server-side record of a live listing.
#[derive(Clone, Debug, Deserialize)]
pub struct Listing {
    pub id: u64,
    pub item_hash: H256,
    pub maker: H160,
    pub currency: H160,
    #[serde(with = "u256_decimal")]
    pub price: U256,
    pub end_at: u64,
    pub token: ListedToken,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ListedToken {
    pub contract: H160,
    pub token_id: U256,
    pub erc_type: TokenStandard,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The service answered with an application error code.
    #[error("directory rejected the request: {0}")]
    Rejected(String),
    #[error("directory rate limit hit")]
    RateLimited,
    #[error("directory unreachable: {0}")]
    Unavailable(anyhow::Error),
}

/// Remote matching service. Provides a mockable implementation.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Registers a signed order.
    async fn submit_order(&self, submission: OrderSubmission) -> Result<(), DirectoryError>;

    /// The open sell listing for one token, optionally restricted to a
    /// maker, if any exists.
    async fn sell_listing(
        &self,
        maker: Option<H160>,
        token: H160,
        token_id: U256,
    ) -> Result<Option<Listing>, DirectoryError>;

    /// Exchanges a signed cancellation request for the instruction the
    /// settlement contract accepts.
    async fn cancel_instruction(
        &self,
        request: CancelRequest,
    ) -> Result<CancelInput, DirectoryError>;

    /// The settlement instruction matched to the requested order, or `None`
    /// when the order can no longer be matched.
    async fn settlement_instruction(
        &self,
        request: AcceptRequest,
    ) -> Result<Option<RunInput>, DirectoryError>;
}
