//! Canonical byte-level codec for orders and settlement instructions.
//!
//! The tuple layouts below are the wire contract shared with the directory
//! service and the settlement contract. Field order and widths are
//! version-pinned; changing either breaks signature verification on chain.

use {
    crate::{
        order::{DelegateType, Intent, Order, OrderData, OrderItem, TokenRef, TokenStandard},
        settlement::{CancelInput, Fee, Op, RunInput, SettleDetail, SettleShared},
        signature::EcdsaSignature,
    },
    primitive_types::{H256, U256},
    thiserror::Error,
    web3::ethabi::{self, ParamType, Token},
};

/// Wire variant of the token-reference tuples inside item `data` and
/// `data_mask`. One variant per deployment; the settlement contract's
/// delegates must expect the same one or the signed digest is unverifiable.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ItemSchema {
    /// `(address token, uint256 tokenId)[]`; implies the ERC-721 delegate
    /// and unit amounts.
    #[default]
    Minimal,
    /// `(address token, uint256 tokenId, uint256 amount, uint8 standard)[]`
    /// for delegates that move amounts of semi-fungible tokens.
    Extended,
}

/// Input does not match the declared schema. Always fatal to the decode
/// call; nothing is ever partially parsed.
#[derive(Debug, Error)]
pub enum MalformedEncoding {
    #[error("abi decoding failed: {0}")]
    Abi(#[from] ethabi::Error),
    #[error("unexpected shape for {0}")]
    Shape(&'static str),
    #[error("value out of range for {0}")]
    Range(&'static str),
}

pub fn encode_item(item: &OrderItem) -> Vec<u8> {
    ethabi::encode(&[item_token(item)])
}

pub fn decode_item(bytes: &[u8]) -> Result<OrderItem, MalformedEncoding> {
    item_from(decode_root(item_kind(), bytes, "item")?)
}

pub fn encode_order(order: &Order) -> Vec<u8> {
    ethabi::encode(&[order_token(order)])
}

pub fn decode_order(bytes: &[u8]) -> Result<Order, MalformedEncoding> {
    order_from(decode_root(order_kind(), bytes, "order")?)
}

pub fn encode_cancel_input(input: &CancelInput) -> Vec<u8> {
    let token = Token::Tuple(vec![
        Token::Array(
            input
                .item_hashes
                .iter()
                .map(|hash| Token::FixedBytes(hash.as_bytes().to_vec()))
                .collect(),
        ),
        Token::Uint(input.deadline),
        Token::Uint(input.signature.v.into()),
        Token::FixedBytes(input.signature.r.as_bytes().to_vec()),
        Token::FixedBytes(input.signature.s.as_bytes().to_vec()),
    ]);
    ethabi::encode(&[token])
}

pub fn decode_cancel_input(bytes: &[u8]) -> Result<CancelInput, MalformedEncoding> {
    let [hashes, deadline, v, r, s] =
        tuple_of(decode_root(cancel_input_kind(), bytes, "cancel")?, "cancel")?;
    Ok(CancelInput {
        item_hashes: array(hashes, "cancel.itemHashes")?
            .into_iter()
            .map(|hash| word(hash, "cancel.itemHashes"))
            .collect::<Result<_, _>>()?,
        deadline: uint(deadline, "cancel.deadline")?,
        signature: EcdsaSignature {
            r: word(r, "cancel.r")?,
            s: word(s, "cancel.s")?,
            v: small_uint(v, "cancel.v")?,
        },
    })
}

pub fn encode_run_input(input: &RunInput) -> Vec<u8> {
    let token = Token::Tuple(vec![
        Token::Array(input.orders.iter().map(order_token).collect()),
        Token::Array(input.details.iter().map(detail_token).collect()),
        shared_token(&input.shared),
        Token::FixedBytes(input.signature.r.as_bytes().to_vec()),
        Token::FixedBytes(input.signature.s.as_bytes().to_vec()),
        Token::Uint(input.signature.v.into()),
    ]);
    ethabi::encode(&[token])
}

pub fn decode_run_input(bytes: &[u8]) -> Result<RunInput, MalformedEncoding> {
    let [orders, details, shared, r, s, v] =
        tuple_of(decode_root(run_input_kind(), bytes, "run")?, "run")?;
    Ok(RunInput {
        orders: array(orders, "run.orders")?
            .into_iter()
            .map(order_from)
            .collect::<Result<_, _>>()?,
        details: array(details, "run.details")?
            .into_iter()
            .map(detail_from)
            .collect::<Result<_, _>>()?,
        shared: shared_from(shared)?,
        signature: EcdsaSignature {
            r: word(r, "run.r")?,
            s: word(s, "run.s")?,
            v: small_uint(v, "run.v")?,
        },
    })
}

pub fn encode_token_refs(refs: &[TokenRef], schema: ItemSchema) -> Vec<u8> {
    let tokens = refs
        .iter()
        .map(|token_ref| match schema {
            ItemSchema::Minimal => Token::Tuple(vec![
                Token::Address(token_ref.token),
                Token::Uint(token_ref.token_id),
            ]),
            ItemSchema::Extended => Token::Tuple(vec![
                Token::Address(token_ref.token),
                Token::Uint(token_ref.token_id),
                Token::Uint(token_ref.amount),
                Token::Uint(U256::from(token_ref.standard.delegate_type() as u8)),
            ]),
        })
        .collect();
    ethabi::encode(&[Token::Array(tokens)])
}

pub fn decode_token_refs(
    bytes: &[u8],
    schema: ItemSchema,
) -> Result<Vec<TokenRef>, MalformedEncoding> {
    let refs = array(
        decode_root(token_refs_kind(schema), bytes, "tokenRefs")?,
        "tokenRefs",
    )?;
    refs.into_iter()
        .map(|token_ref| match schema {
            ItemSchema::Minimal => {
                let [token, token_id] = tuple_of(token_ref, "tokenRef")?;
                Ok(TokenRef {
                    token: address(token, "tokenRef.token")?,
                    token_id: uint(token_id, "tokenRef.tokenId")?,
                    amount: U256::one(),
                    standard: TokenStandard::Erc721,
                })
            }
            ItemSchema::Extended => {
                let [token, token_id, amount, standard] = tuple_of(token_ref, "tokenRef")?;
                Ok(TokenRef {
                    token: address(token, "tokenRef.token")?,
                    token_id: uint(token_id, "tokenRef.tokenId")?,
                    amount: uint(amount, "tokenRef.amount")?,
                    standard: token_standard(small_uint(standard, "tokenRef.standard")?)?,
                })
            }
        })
        .collect()
}

/// The exact byte string an order owner signs: the order's fields in wire
/// order, followed by the item count and the items. Signature fields are not
/// part of [`OrderData`] and therefore cannot leak into the preimage.
pub fn signing_preimage(data: &OrderData) -> Vec<u8> {
    ethabi::encode(&[
        Token::Uint(data.salt),
        Token::Address(data.user),
        Token::Uint(data.network.into()),
        Token::Uint(U256::from(data.intent as u8)),
        Token::Uint(U256::from(data.delegate_type as u8)),
        Token::Uint(data.deadline.into()),
        Token::Address(data.currency),
        Token::Bytes(data.data_mask.clone()),
        Token::Uint(U256::from(data.items.len())),
        Token::Array(data.items.iter().map(item_token).collect()),
    ])
}

fn item_kind() -> ParamType {
    ParamType::Tuple(vec![ParamType::Uint(256), ParamType::Bytes])
}

fn order_kind() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Uint(256),                       // salt
        ParamType::Address,                         // user
        ParamType::Uint(256),                       // network
        ParamType::Uint(256),                       // intent
        ParamType::Uint(256),                       // delegateType
        ParamType::Uint(256),                       // deadline
        ParamType::Address,                         // currency
        ParamType::Bytes,                           // dataMask
        ParamType::Array(Box::new(item_kind())),    // items
        ParamType::FixedBytes(32),                  // r
        ParamType::FixedBytes(32),                  // s
        ParamType::Uint(8),                         // v
        ParamType::Uint(8),                         // signVersion
    ])
}

fn fee_kind() -> ParamType {
    ParamType::Tuple(vec![ParamType::Uint(256), ParamType::Address])
}

fn detail_kind() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Uint(8),                      // op
        ParamType::Uint(256),                    // orderIdx
        ParamType::Uint(256),                    // itemIdx
        ParamType::Uint(256),                    // price
        ParamType::FixedBytes(32),               // itemHash
        ParamType::Address,                      // executionDelegate
        ParamType::Bytes,                        // dataReplacement
        ParamType::Uint(256),                    // bidIncentivePct
        ParamType::Uint(256),                    // aucMinIncrementPct
        ParamType::Uint(256),                    // aucIncDurationSecs
        ParamType::Array(Box::new(fee_kind())),  // fees
    ])
}

fn shared_kind() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Uint(256), // salt
        ParamType::Uint(256), // deadline
        ParamType::Uint(256), // amountToEth
        ParamType::Uint(256), // amountToWeth
        ParamType::Address,   // user
        ParamType::Bool,      // canFail
    ])
}

fn run_input_kind() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Array(Box::new(order_kind())),
        ParamType::Array(Box::new(detail_kind())),
        shared_kind(),
        ParamType::FixedBytes(32), // r
        ParamType::FixedBytes(32), // s
        ParamType::Uint(8),        // v
    ])
}

fn cancel_input_kind() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Array(Box::new(ParamType::FixedBytes(32))),
        ParamType::Uint(256),      // deadline
        ParamType::Uint(8),        // v
        ParamType::FixedBytes(32), // r
        ParamType::FixedBytes(32), // s
    ])
}

fn token_refs_kind(schema: ItemSchema) -> ParamType {
    let tuple = match schema {
        ItemSchema::Minimal => vec![ParamType::Address, ParamType::Uint(256)],
        ItemSchema::Extended => vec![
            ParamType::Address,
            ParamType::Uint(256),
            ParamType::Uint(256),
            ParamType::Uint(8),
        ],
    };
    ParamType::Array(Box::new(ParamType::Tuple(tuple)))
}

fn item_token(item: &OrderItem) -> Token {
    Token::Tuple(vec![
        Token::Uint(item.price),
        Token::Bytes(item.data.clone()),
    ])
}

fn item_from(token: Token) -> Result<OrderItem, MalformedEncoding> {
    let [price, data] = tuple_of(token, "item")?;
    Ok(OrderItem {
        price: uint(price, "item.price")?,
        data: dyn_bytes(data, "item.data")?,
    })
}

fn order_token(order: &Order) -> Token {
    let data = &order.data;
    Token::Tuple(vec![
        Token::Uint(data.salt),
        Token::Address(data.user),
        Token::Uint(data.network.into()),
        Token::Uint(U256::from(data.intent as u8)),
        Token::Uint(U256::from(data.delegate_type as u8)),
        Token::Uint(data.deadline.into()),
        Token::Address(data.currency),
        Token::Bytes(data.data_mask.clone()),
        Token::Array(data.items.iter().map(item_token).collect()),
        Token::FixedBytes(order.signature.r.as_bytes().to_vec()),
        Token::FixedBytes(order.signature.s.as_bytes().to_vec()),
        Token::Uint(order.signature.v.into()),
        Token::Uint(order.sign_version.into()),
    ])
}

fn order_from(token: Token) -> Result<Order, MalformedEncoding> {
    let [salt, user, network, intent, delegate_type, deadline, currency, data_mask, items, r, s, v, sign_version] =
        tuple_of(token, "order")?;
    Ok(Order {
        data: OrderData {
            salt: uint(salt, "order.salt")?,
            user: address(user, "order.user")?,
            network: wide_u64(network, "order.network")?,
            intent: Intent::from_code(small_uint(intent, "order.intent")?)
                .ok_or(MalformedEncoding::Range("order.intent"))?,
            delegate_type: DelegateType::from_code(small_uint(
                delegate_type,
                "order.delegateType",
            )?)
            .ok_or(MalformedEncoding::Range("order.delegateType"))?,
            deadline: wide_u64(deadline, "order.deadline")?,
            currency: address(currency, "order.currency")?,
            data_mask: dyn_bytes(data_mask, "order.dataMask")?,
            items: array(items, "order.items")?
                .into_iter()
                .map(item_from)
                .collect::<Result<_, _>>()?,
        },
        signature: EcdsaSignature {
            r: word(r, "order.r")?,
            s: word(s, "order.s")?,
            v: small_uint(v, "order.v")?,
        },
        sign_version: small_uint(sign_version, "order.signVersion")?,
    })
}

fn detail_token(detail: &SettleDetail) -> Token {
    Token::Tuple(vec![
        Token::Uint(U256::from(detail.op as u8)),
        Token::Uint(detail.order_idx),
        Token::Uint(detail.item_idx),
        Token::Uint(detail.price),
        Token::FixedBytes(detail.item_hash.as_bytes().to_vec()),
        Token::Address(detail.execution_delegate),
        Token::Bytes(detail.data_replacement.clone()),
        Token::Uint(detail.bid_incentive_pct),
        Token::Uint(detail.auc_min_increment_pct),
        Token::Uint(detail.auc_inc_duration_secs),
        Token::Array(
            detail
                .fees
                .iter()
                .map(|fee| Token::Tuple(vec![Token::Uint(fee.percentage), Token::Address(fee.to)]))
                .collect(),
        ),
    ])
}

fn detail_from(token: Token) -> Result<SettleDetail, MalformedEncoding> {
    let [op, order_idx, item_idx, price, item_hash, execution_delegate, data_replacement, bid_incentive_pct, auc_min_increment_pct, auc_inc_duration_secs, fees] =
        tuple_of(token, "detail")?;
    Ok(SettleDetail {
        op: Op::from_code(small_uint(op, "detail.op")?)
            .ok_or(MalformedEncoding::Range("detail.op"))?,
        order_idx: uint(order_idx, "detail.orderIdx")?,
        item_idx: uint(item_idx, "detail.itemIdx")?,
        price: uint(price, "detail.price")?,
        item_hash: word(item_hash, "detail.itemHash")?,
        execution_delegate: address(execution_delegate, "detail.executionDelegate")?,
        data_replacement: dyn_bytes(data_replacement, "detail.dataReplacement")?,
        bid_incentive_pct: uint(bid_incentive_pct, "detail.bidIncentivePct")?,
        auc_min_increment_pct: uint(auc_min_increment_pct, "detail.aucMinIncrementPct")?,
        auc_inc_duration_secs: uint(auc_inc_duration_secs, "detail.aucIncDurationSecs")?,
        fees: array(fees, "detail.fees")?
            .into_iter()
            .map(fee_from)
            .collect::<Result<_, _>>()?,
    })
}

fn fee_from(token: Token) -> Result<Fee, MalformedEncoding> {
    let [percentage, to] = tuple_of(token, "fee")?;
    Ok(Fee {
        percentage: uint(percentage, "fee.percentage")?,
        to: address(to, "fee.to")?,
    })
}

fn shared_token(shared: &SettleShared) -> Token {
    Token::Tuple(vec![
        Token::Uint(shared.salt),
        Token::Uint(shared.deadline),
        Token::Uint(shared.amount_to_eth),
        Token::Uint(shared.amount_to_weth),
        Token::Address(shared.user),
        Token::Bool(shared.can_fail),
    ])
}

fn shared_from(token: Token) -> Result<SettleShared, MalformedEncoding> {
    let [salt, deadline, amount_to_eth, amount_to_weth, user, can_fail] =
        tuple_of(token, "shared")?;
    Ok(SettleShared {
        salt: uint(salt, "shared.salt")?,
        deadline: uint(deadline, "shared.deadline")?,
        amount_to_eth: uint(amount_to_eth, "shared.amountToEth")?,
        amount_to_weth: uint(amount_to_weth, "shared.amountToWeth")?,
        user: address(user, "shared.user")?,
        can_fail: boolean(can_fail, "shared.canFail")?,
    })
}

fn token_standard(code: u8) -> Result<TokenStandard, MalformedEncoding> {
    match DelegateType::from_code(code) {
        Some(DelegateType::Erc721) => Ok(TokenStandard::Erc721),
        Some(DelegateType::Erc1155) => Ok(TokenStandard::Erc1155),
        _ => Err(MalformedEncoding::Range("tokenRef.standard")),
    }
}

fn decode_root(
    kind: ParamType,
    bytes: &[u8],
    ctx: &'static str,
) -> Result<Token, MalformedEncoding> {
    let tokens = ethabi::decode(&[kind], bytes)?;
    tokens
        .into_iter()
        .next()
        .ok_or(MalformedEncoding::Shape(ctx))
}

fn tuple_of<const N: usize>(
    token: Token,
    ctx: &'static str,
) -> Result<[Token; N], MalformedEncoding> {
    match token {
        Token::Tuple(fields) => fields
            .try_into()
            .map_err(|_| MalformedEncoding::Shape(ctx)),
        _ => Err(MalformedEncoding::Shape(ctx)),
    }
}

fn array(token: Token, ctx: &'static str) -> Result<Vec<Token>, MalformedEncoding> {
    match token {
        Token::Array(items) => Ok(items),
        _ => Err(MalformedEncoding::Shape(ctx)),
    }
}

fn uint(token: Token, ctx: &'static str) -> Result<U256, MalformedEncoding> {
    match token {
        Token::Uint(value) => Ok(value),
        _ => Err(MalformedEncoding::Shape(ctx)),
    }
}

fn small_uint(token: Token, ctx: &'static str) -> Result<u8, MalformedEncoding> {
    let value = uint(token, ctx)?;
    if value > U256::from(u8::MAX) {
        return Err(MalformedEncoding::Range(ctx));
    }
    Ok(value.low_u64() as u8)
}

fn wide_u64(token: Token, ctx: &'static str) -> Result<u64, MalformedEncoding> {
    let value = uint(token, ctx)?;
    if value > U256::from(u64::MAX) {
        return Err(MalformedEncoding::Range(ctx));
    }
    Ok(value.low_u64())
}

fn address(
    token: Token,
    ctx: &'static str,
) -> Result<primitive_types::H160, MalformedEncoding> {
    match token {
        Token::Address(value) => Ok(value),
        _ => Err(MalformedEncoding::Shape(ctx)),
    }
}

fn word(token: Token, ctx: &'static str) -> Result<H256, MalformedEncoding> {
    match token {
        Token::FixedBytes(bytes) if bytes.len() == 32 => Ok(H256::from_slice(&bytes)),
        _ => Err(MalformedEncoding::Shape(ctx)),
    }
}

fn dyn_bytes(token: Token, ctx: &'static str) -> Result<Vec<u8>, MalformedEncoding> {
    match token {
        Token::Bytes(bytes) => Ok(bytes),
        _ => Err(MalformedEncoding::Shape(ctx)),
    }
}

fn boolean(token: Token, ctx: &'static str) -> Result<bool, MalformedEncoding> {
    match token {
        Token::Bool(value) => Ok(value),
        _ => Err(MalformedEncoding::Shape(ctx)),
    }
}
