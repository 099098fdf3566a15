//! Construction of unsigned orders from user intent.

use {
    crate::{
        codec::{self, ItemSchema},
        order::{random_salt, Intent, OrderData, OrderItem, TokenRef, TokenStandard},
    },
    chrono::offset::Utc,
    primitive_types::{H160, U256},
    thiserror::Error,
};

/// Shortest allowed window between order creation and its deadline, in
/// seconds. Enforced here, not by the settlement contract.
pub const MIN_DEADLINE_WINDOW: u64 = 900;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("deadline must be at least {MIN_DEADLINE_WINDOW} seconds away")]
    ExpirationTooSoon,
    #[error("replacement price {new} must be strictly below {old}")]
    PriceNotLower { old: U256, new: U256 },
}

/// A sell listing for one token.
#[derive(Clone, Debug)]
pub struct ListingTerms {
    pub maker: H160,
    pub network: u64,
    pub token: H160,
    pub token_id: U256,
    pub standard: TokenStandard,
    /// In the smallest unit of the native currency.
    pub price: U256,
    pub deadline: u64,
}

/// A buy offer for one token or for any token of a collection.
#[derive(Clone, Debug)]
pub struct OfferTerms {
    pub maker: H160,
    pub network: u64,
    pub token: H160,
    /// Ignored for collection-wide offers; those encode a zero token id no
    /// matter what the caller supplies.
    pub token_id: Option<U256>,
    pub standard: TokenStandard,
    /// Payment token the offer is denominated in.
    pub currency: H160,
    pub price: U256,
    pub deadline: u64,
    pub collection_wide: bool,
}

/// Builds an unsigned sell order. Listings always settle in the native
/// currency.
pub fn sell_order(terms: &ListingTerms, schema: ItemSchema) -> Result<OrderData, BuildError> {
    check_deadline(terms.deadline)?;
    let data = codec::encode_token_refs(
        &[TokenRef {
            token: terms.token,
            token_id: terms.token_id,
            amount: U256::one(),
            standard: terms.standard,
        }],
        schema,
    );
    Ok(OrderData {
        salt: random_salt(),
        user: terms.maker,
        network: terms.network,
        intent: Intent::Sell,
        delegate_type: terms.standard.delegate_type(),
        deadline: terms.deadline,
        currency: H160::zero(),
        data_mask: Vec::new(),
        items: vec![OrderItem {
            price: terms.price,
            data,
        }],
    })
}

/// Builds the replacement order for re-listing at a lower price. The new
/// price must be strictly below the current one; an equal price is rejected,
/// not treated as a no-op.
pub fn lower_price(
    terms: &ListingTerms,
    old_price: U256,
    schema: ItemSchema,
) -> Result<OrderData, BuildError> {
    if terms.price >= old_price {
        return Err(BuildError::PriceNotLower {
            old: old_price,
            new: terms.price,
        });
    }
    sell_order(terms, schema)
}

/// Builds an unsigned buy offer. Collection-wide offers encode an all-bits
/// token-id mask and force the item's token id to zero so the settlement
/// contract matches any token of the collection.
pub fn buy_offer(terms: &OfferTerms, schema: ItemSchema) -> Result<OrderData, BuildError> {
    check_deadline(terms.deadline)?;
    let token_id = if terms.collection_wide {
        U256::zero()
    } else {
        terms.token_id.unwrap_or_default()
    };
    let data = codec::encode_token_refs(
        &[TokenRef {
            token: terms.token,
            token_id,
            amount: U256::one(),
            standard: terms.standard,
        }],
        schema,
    );
    let data_mask = if terms.collection_wide {
        codec::encode_token_refs(
            &[TokenRef {
                token: H160::zero(),
                token_id: U256::max_value(),
                amount: U256::zero(),
                standard: terms.standard,
            }],
            schema,
        )
    } else {
        Vec::new()
    };
    Ok(OrderData {
        salt: random_salt(),
        user: terms.maker,
        network: terms.network,
        intent: Intent::Buy,
        delegate_type: terms.standard.delegate_type(),
        deadline: terms.deadline,
        currency: terms.currency,
        data_mask,
        items: vec![OrderItem {
            price: terms.price,
            data,
        }],
    })
}

fn check_deadline(deadline: u64) -> Result<(), BuildError> {
    let now = Utc::now().timestamp().max(0) as u64;
    if deadline < now + MIN_DEADLINE_WINDOW {
        return Err(BuildError::ExpirationTooSoon);
    }
    Ok(())
}
