//! Signing of orders through an external signer capability.

use {
    crate::order::{Order, OrderData, SIGN_VERSION},
    primitive_types::{H160, H256},
    secp256k1::SecretKey,
    serde::{Deserialize, Serialize},
    thiserror::Error,
    web3::signing::{self, Key, SecretKeyRef},
};

/// A recoverable signature, ordered r, s, v on the wire.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct EcdsaSignature {
    pub r: H256,
    pub s: H256,
    pub v: u8,
}

impl EcdsaSignature {
    /// r + s + v
    pub fn to_bytes(self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(self.r.as_bytes());
        bytes[32..64].copy_from_slice(self.s.as_bytes());
        bytes[64] = self.v;
        bytes
    }

    pub fn from_bytes(bytes: &[u8; 65]) -> Self {
        Self {
            r: H256::from_slice(&bytes[..32]),
            s: H256::from_slice(&bytes[32..64]),
            v: bytes[64],
        }
    }

    /// Brings the recovery id into the canonical {27, 28} range. Some signers
    /// return {0, 1}, which the settlement contract would reject.
    pub fn normalized(mut self) -> Self {
        if self.v < 27 {
            self.v += 27;
        }
        self
    }
}

/// The signer capability could not produce a signature. Surfaced verbatim;
/// this crate never retries and never falls back to another signer.
#[derive(Debug, Error)]
#[error("signing failed: {0}")]
pub struct SigningFailed(pub anyhow::Error);

/// Something that can sign 32-byte digests on behalf of an address, e.g. an
/// in-process key, a hardware wallet, or a remote key service. Implementations
/// apply their own personal-message prefix before signing; this crate hands
/// over the raw digest. The call is the core's only suspension point and may
/// involve user interaction.
#[async_trait::async_trait]
pub trait Signer: Send + Sync {
    /// Address the produced signatures recover to.
    fn address(&self) -> H160;

    /// Signs a 32-byte digest, returning the 65 signature bytes ordered
    /// r, s, v.
    async fn sign_message(&self, digest: H256) -> Result<[u8; 65], SigningFailed>;
}

/// Signs the order's canonical digest and returns the signed order. Each call
/// signs whatever the data currently says; changing any field afterwards
/// requires signing again with a fresh salt.
pub async fn sign_order(data: OrderData, signer: &dyn Signer) -> Result<Order, SigningFailed> {
    let digest = data.signing_digest();
    let raw = signer.sign_message(digest).await?;
    Ok(Order {
        data,
        signature: EcdsaSignature::from_bytes(&raw).normalized(),
        sign_version: SIGN_VERSION,
    })
}

/// Buy offers sign exactly like sell listings.
pub async fn sign_offer(data: OrderData, signer: &dyn Signer) -> Result<Order, SigningFailed> {
    sign_order(data, signer).await
}

/// Digest a caller signs to authorize cancelling their own orders: the
/// keccak-256 hash of the empty byte string.
pub fn cancellation_digest() -> H256 {
    H256(signing::keccak256(&[]))
}

/// In-process [`Signer`] backed by a raw secp256k1 key. Applies the Ethereum
/// personal-message prefix before signing.
pub struct PrivateKeySigner {
    key: SecretKey,
}

impl PrivateKeySigner {
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }
}

#[async_trait::async_trait]
impl Signer for PrivateKeySigner {
    fn address(&self) -> H160 {
        SecretKeyRef::new(&self.key).address()
    }

    async fn sign_message(&self, digest: H256) -> Result<[u8; 65], SigningFailed> {
        let message = eth_message(&digest);
        let signature = SecretKeyRef::new(&self.key)
            .sign(&message, None)
            .map_err(|err| SigningFailed(err.into()))?;
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(signature.r.as_bytes());
        bytes[32..64].copy_from_slice(signature.s.as_bytes());
        bytes[64] = signature.v as u8;
        Ok(bytes)
    }
}

/// The value actually signed under EIP-191 personal-message rules for a
/// 32-byte payload.
fn eth_message(digest: &H256) -> [u8; 32] {
    let mut buffer = [0u8; 60];
    buffer[..28].copy_from_slice(b"\x19Ethereum Signed Message:\n32");
    buffer[28..].copy_from_slice(digest.as_bytes());
    signing::keccak256(&buffer)
}
