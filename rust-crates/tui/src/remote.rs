use async_trait::async_trait;
use ethers::types::{
    Address,
    U256,
};

use crate::{
    bet::BetSubmission,
    game_state::GameState,
};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The contract reverted. `reason` is the decoded revert string.
    #[error("{reason}")]
    Rejected { reason: String },
    #[error("network error: {0}")]
    Transport(String),
    #[error("transaction was dropped before it was mined")]
    Dropped,
    #[error("unexpected response from contract: {0}")]
    Malformed(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: Option<String>,
}

/// Payload of the `Roll` event exactly as emitted, before any range checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawRoll {
    pub random_number: U256,
    pub bet_results: Vec<U256>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RollReceipt {
    pub tx_hash: Option<String>,
    pub event: Option<RawRoll>,
}

/// The deployed roulette contract as seen by one account.
///
/// Owner-only functions are exposed to every caller; the contract performs the
/// capability check and reports a rejection.
#[async_trait]
pub trait RouletteContract: Send + Sync {
    async fn game_state(&self) -> Result<GameState, RemoteError>;

    async fn owner(&self) -> Result<Address, RemoteError>;

    async fn deposit(&self, amount: u128) -> Result<TxReceipt, RemoteError>;

    async fn withdraw(&self, amount: u128) -> Result<TxReceipt, RemoteError>;

    async fn deposit_to_bank(&self, amount: u128) -> Result<TxReceipt, RemoteError>;

    async fn withdraw_from_bank(&self, amount: u128) -> Result<TxReceipt, RemoteError>;

    async fn set_max_bet(&self, amount: u128) -> Result<TxReceipt, RemoteError>;

    async fn set_withdrawal_fee(&self, amount: u128) -> Result<TxReceipt, RemoteError>;

    async fn roll(&self, bets: &[BetSubmission]) -> Result<RollReceipt, RemoteError>;
}

pub(crate) fn u256_to_u128(value: U256, field: &str) -> Result<u128, RemoteError> {
    if value > U256::from(u128::MAX) {
        return Err(RemoteError::Malformed(format!(
            "{field} does not fit in 128 bits: {value}"
        )));
    }
    Ok(value.as_u128())
}
