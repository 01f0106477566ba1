use std::sync::{
    Arc,
    Mutex,
};

use ethers::types::Address;
use tracing::{
    info,
    warn,
};

use crate::{
    bank::{
        self,
        BankAction,
        BankError,
        BankOperation,
    },
    bet::{
        self,
        Bet,
        BetType,
        ValidationError,
    },
    commands::CommandError,
    error::ErrorKind,
    game_state::{
        GameState,
        StateCache,
    },
    ledger::BetLedger,
    remote::{
        RemoteError,
        RouletteContract,
    },
    settlement::{
        self,
        RollResult,
        SettlementError,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{operation} is still in progress")]
    Busy { operation: &'static str },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error(transparent)]
    Bank(#[from] BankError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Busy { .. }
            | SessionError::Validation(_)
            | SessionError::Command(_) => ErrorKind::Validation,
            SessionError::Settlement(SettlementError::Remote(remote))
            | SessionError::Bank(BankError::Remote(remote))
            | SessionError::Remote(remote) => remote_kind(remote),
            SessionError::Settlement(SettlementError::StateMismatch(_)) => {
                ErrorKind::StateMismatch
            }
            SessionError::Settlement(_) | SessionError::Bank(_) => ErrorKind::Validation,
        }
    }

    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Remote => format!("Transaction failed: {self}"),
            ErrorKind::StateMismatch => format!("Unexpected contract response: {self}"),
            ErrorKind::Validation => self.to_string(),
        }
    }
}

fn remote_kind(error: &RemoteError) -> ErrorKind {
    match error {
        RemoteError::Malformed(_) => ErrorKind::StateMismatch,
        _ => ErrorKind::Remote,
    }
}

/// Name of the remote operation currently awaiting a response, shared with the
/// front-end so it can show the operation as processing.
#[derive(Clone, Debug, Default)]
pub struct InFlight(Arc<Mutex<Option<&'static str>>>);

impl InFlight {
    pub fn current(&self) -> Option<&'static str> {
        *self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn begin(&self, operation: &'static str) -> Result<InFlightGuard, SessionError> {
        let mut slot = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(current) = *slot {
            return Err(SessionError::Busy { operation: current });
        }
        *slot = Some(operation);
        Ok(InFlightGuard(self.clone()))
    }
}

/// Clears the in-flight marker when the operation ends, including when its
/// future is dropped.
#[derive(Debug)]
pub struct InFlightGuard(InFlight);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut slot = (self.0).0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = None;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BankReceipt {
    pub operation: BankOperation,
    pub tx_hash: Option<String>,
}

/// Everything one connected player works with: the contract handle, their
/// account, the pending bets and the last game-state snapshot.
pub struct Session<C> {
    contract: C,
    account: Address,
    owner: Option<Address>,
    network: String,
    ledger: BetLedger,
    state: StateCache,
    in_flight: InFlight,
}

impl<C: RouletteContract> Session<C> {
    pub async fn open(
        contract: C,
        account: Address,
        network: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let owner = match contract.owner().await {
            Ok(owner) => Some(owner),
            Err(e) => {
                warn!("failed to query contract owner, owner controls stay hidden: {e}");
                None
            }
        };
        let mut session = Self {
            contract,
            account,
            owner,
            network: network.into(),
            ledger: BetLedger::new(),
            state: StateCache::default(),
            in_flight: InFlight::default(),
        };
        session.refresh().await?;
        info!(
            account = ?session.account,
            owner = session.is_owner(),
            network = %session.network,
            "session opened"
        );
        Ok(session)
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn owner(&self) -> Option<Address> {
        self.owner
    }

    pub fn is_owner(&self) -> bool {
        self.owner == Some(self.account)
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn ledger(&self) -> &BetLedger {
        &self.ledger
    }

    pub fn game_state(&self) -> Option<&GameState> {
        self.state.get()
    }

    pub fn state_cache(&self) -> &StateCache {
        &self.state
    }

    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    pub async fn refresh(&mut self) -> Result<GameState, SessionError> {
        let _guard = self.in_flight.begin("refresh")?;
        let state = self.contract.game_state().await?;
        self.state.replace(state);
        Ok(state)
    }

    /// Validates against a freshly fetched snapshot and appends to the ledger.
    pub async fn add_bet(
        &mut self,
        bet_type: BetType,
        selector: i64,
        stake: i128,
    ) -> Result<Bet, SessionError> {
        let _guard = self.in_flight.begin("bet")?;
        let state = self.contract.game_state().await?;
        self.state.replace(state);
        let bet = bet::validate(bet_type, selector, stake, &state)?;
        self.ledger.append(bet.clone());
        Ok(bet)
    }

    pub fn clear_bets(&mut self) {
        self.ledger.clear();
    }

    pub async fn roll(&mut self) -> Result<RollResult, SessionError> {
        let _guard = self.in_flight.begin("roll")?;
        let result = match settlement::submit(&mut self.ledger, &self.contract).await {
            Ok(result) => result,
            // The roll was mined, so balances moved even though the result is unusable.
            Err(e @ SettlementError::StateMismatch(_)) => {
                self.refresh_after("roll").await;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        self.refresh_after("roll").await;
        Ok(result)
    }

    pub async fn bank(
        &mut self,
        action: BankAction,
        amount: i128,
    ) -> Result<BankReceipt, SessionError> {
        let operation = BankOperation::new(action, amount)?;
        let _guard = self.in_flight.begin(action.name())?;
        if action == BankAction::Withdraw {
            let state = match self.state.get() {
                Some(state) if !self.state.is_stale() => *state,
                _ => {
                    let state = self.contract.game_state().await?;
                    self.state.replace(state);
                    state
                }
            };
            bank::check(&operation, &state)?;
        }
        let receipt = bank::execute(&operation, &self.contract).await?;
        info!(operation = action.name(), tx = ?receipt.tx_hash, "bank operation confirmed");
        self.refresh_after(action.name()).await;
        Ok(BankReceipt {
            operation,
            tx_hash: receipt.tx_hash,
        })
    }

    async fn refresh_after(&mut self, operation: &str) {
        match self.contract.game_state().await {
            Ok(state) => self.state.replace(state),
            Err(e) => {
                warn!("refreshing game state after {operation} failed: {e}");
                self.state.mark_stale();
            }
        }
    }
}
