//! Order encoding, signing, and settlement-validation core shared by the
//! marketplace client.
//!
//! Everything here is a pure function over caller-owned values; the single
//! suspension point is the [`signature::Signer`] capability.

pub mod builder;
pub mod bytes_hex;
pub mod codec;
pub mod order;
pub mod settlement;
pub mod signature;
pub mod u256_decimal;
