//! Boundary to the on-chain settlement contract.

use {
    model::settlement::{CancelInput, RunInput},
    primitive_types::{H256, U256},
};

/// The chain refused or never accepted the transaction. Not interpreted any
/// further here; retrying is the orchestrating caller's decision.
#[derive(Debug, thiserror::Error)]
#[error("transaction submission failed: {0}")]
pub struct LedgerError(pub anyhow::Error);

/// Submits validated instructions to the settlement contract. Provides a
/// mockable implementation.
#[mockall::automock]
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    /// Submits a cancellation; returns the pending transaction hash.
    async fn cancel(&self, input: CancelInput) -> Result<H256, LedgerError>;

    /// Submits a settlement with the native value that must accompany the
    /// call.
    async fn run(&self, input: RunInput, native_value: U256) -> Result<H256, LedgerError>;
}
