//! In-process stand-in for the deployed contract.
//!
//! Keeps just enough bookkeeping for balances to move the way the real contract
//! moves them, answers owner-only calls with the same custom error, and replays
//! queued `Roll` events in order.

use std::{
    collections::VecDeque,
    sync::Mutex,
};

use async_trait::async_trait;
use ethers::types::{
    Address,
    U256,
};

use crate::{
    bet::BetSubmission,
    game_state::GameState,
    remote::{
        RawRoll,
        RemoteError,
        RollReceipt,
        RouletteContract,
        TxReceipt,
    },
};

pub fn owner_address() -> Address {
    Address::from_low_u64_be(0x0a11ce)
}

pub fn player_address() -> Address {
    Address::from_low_u64_be(0x0b0b)
}

pub fn raw_roll(random_number: u64, bet_results: &[u128]) -> RawRoll {
    RawRoll {
        random_number: U256::from(random_number),
        bet_results: bet_results.iter().map(|r| U256::from(*r)).collect(),
    }
}

pub fn unauthorized(caller: Address) -> RemoteError {
    RemoteError::Rejected {
        reason: format!("OwnableUnauthorizedAccount({caller:?})"),
    }
}

fn rejected(reason: &str) -> RemoteError {
    RemoteError::Rejected {
        reason: reason.to_string(),
    }
}

#[derive(Debug)]
struct Script {
    state: GameState,
    owner: Address,
    caller: Address,
    calls: Vec<String>,
    rolls: VecDeque<Option<RawRoll>>,
    fail_next_transaction: Option<RemoteError>,
    fail_next_query: Option<RemoteError>,
    tx_count: u64,
}

#[derive(Debug)]
pub struct ScriptedRoulette {
    script: Mutex<Script>,
}

impl ScriptedRoulette {
    /// A contract seen by a player who is not the owner.
    pub fn new(state: GameState) -> Self {
        Self {
            script: Mutex::new(Script {
                state,
                owner: owner_address(),
                caller: player_address(),
                calls: Vec::new(),
                rolls: VecDeque::new(),
                fail_next_transaction: None,
                fail_next_query: None,
                tx_count: 0,
            }),
        }
    }

    pub fn as_owner(self) -> Self {
        self.with_script(|script| script.caller = script.owner);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.with_script(|script| script.calls.clone())
    }

    pub fn transactions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|name| name != "getGameState" && name != "owner")
            .collect()
    }

    pub fn state(&self) -> GameState {
        self.with_script(|script| script.state)
    }

    pub fn set_state(&self, state: GameState) {
        self.with_script(|script| script.state = state);
    }

    pub fn queue_roll(&self, roll: RawRoll) {
        self.queue_roll_receipt(Some(roll));
    }

    /// `None` produces a mined receipt without a `Roll` event.
    pub fn queue_roll_receipt(&self, event: Option<RawRoll>) {
        self.with_script(|script| script.rolls.push_back(event));
    }

    /// Fails the next state-changing call.
    pub fn fail_next(&self, error: RemoteError) {
        self.with_script(|script| script.fail_next_transaction = Some(error));
    }

    /// Fails the next `getGameState` or `owner` call.
    pub fn fail_next_query(&self, error: RemoteError) {
        self.with_script(|script| script.fail_next_query = Some(error));
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut guard = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn query<T>(
        &self,
        name: &str,
        f: impl FnOnce(&Script) -> T,
    ) -> Result<T, RemoteError> {
        self.with_script(|script| {
            script.calls.push(name.to_string());
            match script.fail_next_query.take() {
                Some(error) => Err(error),
                None => Ok(f(script)),
            }
        })
    }

    fn transact(
        &self,
        name: &str,
        privileged: bool,
        f: impl FnOnce(&mut Script) -> Result<(), RemoteError>,
    ) -> Result<TxReceipt, RemoteError> {
        self.with_script(|script| {
            script.calls.push(name.to_string());
            if let Some(error) = script.fail_next_transaction.take() {
                return Err(error);
            }
            if privileged && script.caller != script.owner {
                return Err(unauthorized(script.caller));
            }
            f(script)?;
            script.tx_count += 1;
            Ok(TxReceipt {
                tx_hash: Some(format!("{:#066x}", script.tx_count)),
            })
        })
    }
}

#[async_trait]
impl RouletteContract for ScriptedRoulette {
    async fn game_state(&self) -> Result<GameState, RemoteError> {
        self.query("getGameState", |script| script.state)
    }

    async fn owner(&self) -> Result<Address, RemoteError> {
        self.query("owner", |script| script.owner)
    }

    async fn deposit(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact("deposit", false, |script| {
            if amount == 0 {
                return Err(rejected("Amount must be greater than 0"));
            }
            script.state.player_balance += amount;
            script.state.total_player_balances += amount;
            script.state.bank_balance += amount;
            Ok(())
        })
    }

    async fn withdraw(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact("withdraw", false, |script| {
            if amount <= script.state.withdrawal_fee {
                return Err(rejected("Amount must be greater than withdrawal fee"));
            }
            if amount > script.state.player_balance {
                return Err(rejected("Insufficient player balance"));
            }
            script.state.player_balance -= amount;
            script.state.total_player_balances -= amount;
            script.state.bank_balance -= amount - script.state.withdrawal_fee;
            Ok(())
        })
    }

    async fn deposit_to_bank(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact("depositToBank", true, |script| {
            if amount == 0 {
                return Err(rejected("Amount must be greater than 0"));
            }
            script.state.bank_balance += amount;
            Ok(())
        })
    }

    async fn withdraw_from_bank(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact("withdrawFromBank", true, |script| {
            if amount == 0 {
                return Err(rejected("Amount must be greater than 0"));
            }
            let available = script
                .state
                .bank_balance
                .saturating_sub(script.state.total_player_balances);
            if amount > available {
                return Err(rejected("Cannot withdraw more than available funds"));
            }
            script.state.bank_balance -= amount;
            Ok(())
        })
    }

    async fn set_max_bet(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact("setMaxBet", true, |script| {
            if amount == 0 {
                return Err(rejected("Max bet must be greater than 0"));
            }
            script.state.max_bet = amount;
            Ok(())
        })
    }

    async fn set_withdrawal_fee(&self, amount: u128) -> Result<TxReceipt, RemoteError> {
        self.transact("setWithdrawalFee", true, |script| {
            if amount == 0 {
                return Err(rejected("Fee must be greater than 0"));
            }
            script.state.withdrawal_fee = amount;
            Ok(())
        })
    }

    async fn roll(&self, bets: &[BetSubmission]) -> Result<RollReceipt, RemoteError> {
        let mut event = None;
        let receipt = self.transact("roll", false, |script| {
            if bets.is_empty() {
                return Err(rejected("No bets provided"));
            }
            let queued = script
                .rolls
                .pop_front()
                .ok_or_else(|| RemoteError::Transport("no scripted roll queued".to_string()))?;
            if let Some(raw) = &queued {
                let staked: u128 = bets.iter().map(|bet| bet.stake).sum();
                let won: u128 = raw
                    .bet_results
                    .iter()
                    .filter(|payout| **payout <= U256::from(u128::MAX))
                    .map(|payout| payout.as_u128())
                    .sum();
                script.state.player_balance =
                    script.state.player_balance.saturating_sub(staked) + won;
                script.state.total_player_balances =
                    script.state.total_player_balances.saturating_sub(staked) + won;
            }
            event = queued;
            Ok(())
        })?;
        Ok(RollReceipt {
            tx_hash: receipt.tx_hash,
            event,
        })
    }
}
