//! Settlement instructions issued by the directory service and the client-side
//! validation that gates them from the settlement contract.

use {
    crate::{order::Order, signature::EcdsaSignature, u256_decimal},
    primitive_types::{H160, H256, U256},
    serde::{Deserialize, Serialize},
    thiserror::Error,
};

/// Settlement contract operation codes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u8)]
pub enum Op {
    CompleteSellOffer = 1,
    CompleteBuyOffer = 2,
    CancelOffer = 3,
    Bid = 4,
    CompleteAuction = 5,
    RefundAuction = 6,
    RefundAuctionStuckItem = 7,
}

impl Op {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::CompleteSellOffer),
            2 => Some(Self::CompleteBuyOffer),
            3 => Some(Self::CancelOffer),
            4 => Some(Self::Bid),
            5 => Some(Self::CompleteAuction),
            6 => Some(Self::RefundAuction),
            7 => Some(Self::RefundAuctionStuckItem),
            _ => None,
        }
    }
}

// Operation codes travel as numbers everywhere the directory service is
// involved, so the JSON form follows the wire form.
impl Serialize for Op {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for Op {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = u8::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown operation code {code}")))
    }
}

/// Fee taken out of a settlement, as a percentage of the detail's price.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fee {
    #[serde(with = "u256_decimal")]
    pub percentage: U256,
    pub to: H160,
}

/// One atomic settlement step inside a [`RunInput`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleDetail {
    pub op: Op,
    pub order_idx: U256,
    pub item_idx: U256,
    #[serde(with = "u256_decimal")]
    pub price: U256,
    pub item_hash: H256,
    pub execution_delegate: H160,
    #[serde(with = "crate::bytes_hex")]
    pub data_replacement: Vec<u8>,
    pub bid_incentive_pct: U256,
    pub auc_min_increment_pct: U256,
    pub auc_inc_duration_secs: U256,
    pub fees: Vec<Fee>,
}

/// Parameters shared by every detail of a [`RunInput`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleShared {
    pub salt: U256,
    pub deadline: U256,
    #[serde(with = "u256_decimal")]
    pub amount_to_eth: U256,
    #[serde(with = "u256_decimal")]
    pub amount_to_weth: U256,
    pub user: H160,
    pub can_fail: bool,
}

/// Full settlement instruction as returned by the directory service in answer
/// to an accept-order request. Carries the directory's own signature; the
/// client never re-signs it but must run [`validate_run_input`] before
/// submitting it anywhere.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    pub orders: Vec<Order>,
    pub details: Vec<SettleDetail>,
    pub shared: SettleShared,
    #[serde(flatten)]
    pub signature: EcdsaSignature,
}

/// Directory-issued instruction authorizing cancellation of the identified
/// items. Clients only relay it; the one client-side check is that
/// `item_hashes` is non-empty.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelInput {
    pub item_hashes: Vec<H256>,
    pub deadline: U256,
    #[serde(flatten)]
    pub signature: EcdsaSignature,
}

/// Why a settlement instruction was refused. Always terminal: a rejected
/// instruction must not reach the settlement contract.
#[derive(Debug, Error)]
pub enum SettlementRejected {
    #[error("instruction carries no orders or no details")]
    Empty,
    #[error("detail {index} executes op {actual:?}, expected {expected:?}")]
    OpMismatch {
        index: usize,
        expected: Op,
        actual: Op,
    },
    #[error("detail {index} references order {order_idx} of {orders}")]
    OrderIndexOutOfRange {
        index: usize,
        order_idx: U256,
        orders: usize,
    },
    #[error("detail {index} references item {item_idx} of order {order_idx}")]
    ItemIndexOutOfRange {
        index: usize,
        order_idx: usize,
        item_idx: U256,
    },
    #[error("native value overflows")]
    ValueOverflow,
}

/// Checks that a settlement instruction matches what the client asked for and
/// computes the native-currency value that must accompany the contract call.
///
/// Every detail must execute `expected_op` and reference an existing order
/// item; a single bad detail rejects the whole instruction. Details paying in
/// the native currency (zero-address sentinel) count toward the returned
/// value only when completing sell offers; buy-offer completions settle
/// through the payment token instead.
pub fn validate_run_input(
    input: &RunInput,
    expected_op: Op,
) -> Result<U256, SettlementRejected> {
    if input.orders.is_empty() || input.details.is_empty() {
        return Err(SettlementRejected::Empty);
    }

    let mut native_value = U256::zero();
    for (index, detail) in input.details.iter().enumerate() {
        if detail.op != expected_op {
            return Err(SettlementRejected::OpMismatch {
                index,
                expected: expected_op,
                actual: detail.op,
            });
        }
        if detail.order_idx >= U256::from(input.orders.len()) {
            return Err(SettlementRejected::OrderIndexOutOfRange {
                index,
                order_idx: detail.order_idx,
                orders: input.orders.len(),
            });
        }
        let order_idx = detail.order_idx.low_u64() as usize;
        let order = &input.orders[order_idx];
        if detail.item_idx >= U256::from(order.data.items.len()) {
            return Err(SettlementRejected::ItemIndexOutOfRange {
                index,
                order_idx,
                item_idx: detail.item_idx,
            });
        }
        if expected_op == Op::CompleteSellOffer && order.data.currency.is_zero() {
            native_value = native_value
                .checked_add(detail.price)
                .ok_or(SettlementRejected::ValueOverflow)?;
        }
    }
    Ok(native_value)
}
