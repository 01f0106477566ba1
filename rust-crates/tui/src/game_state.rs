use chrono::{
    DateTime,
    Utc,
};
use tracing::warn;

/// Snapshot returned by `getGameState()`. All amounts are wei.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GameState {
    pub bank_balance: u128,
    pub total_player_balances: u128,
    pub max_bet: u128,
    pub withdrawal_fee: u128,
    pub player_balance: u128,
}

impl GameState {
    /// The bank must be able to cover every player's balance.
    pub fn is_consistent(&self) -> bool {
        self.total_player_balances <= self.bank_balance
    }
}

/// Last known snapshot. Replaced wholesale, never patched field by field.
#[derive(Clone, Debug, Default)]
pub struct StateCache {
    snapshot: Option<GameState>,
    refreshed_at: Option<DateTime<Utc>>,
    stale: bool,
}

impl StateCache {
    pub fn get(&self) -> Option<&GameState> {
        self.snapshot.as_ref()
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn replace(&mut self, state: GameState) {
        if !state.is_consistent() {
            warn!(
                bank_balance = state.bank_balance,
                total_player_balances = state.total_player_balances,
                "game state reports player balances above the bank balance"
            );
        }
        self.snapshot = Some(state);
        self.refreshed_at = Some(Utc::now());
        self.stale = false;
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }
}
