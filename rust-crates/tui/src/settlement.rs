use ethers::types::U256;
use tracing::{
    info,
    warn,
};

use crate::{
    ledger::BetLedger,
    remote::{
        RawRoll,
        RemoteError,
        RouletteContract,
    },
    units::gwei,
};

pub const MAX_POCKET: u8 = 36;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("no bets placed")]
    EmptyLedger,
    #[error("these bets were already rolled; add a bet to start a new round")]
    AlreadySettled,
    #[error(
        "insufficient balance: bets total {} Gwei but balance is {} Gwei",
        gwei(.total),
        gwei(.balance)
    )]
    InsufficientBalance { total: u128, balance: u128 },
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("roll result could not be reconciled: {0}")]
    StateMismatch(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RollResult {
    pub random_number: u8,
    /// One payout per submitted bet, in submission order. Zero means lost.
    pub bet_results: Vec<i128>,
}

impl RollResult {
    pub fn total_win(&self) -> u128 {
        self.bet_results
            .iter()
            .filter(|payout| **payout > 0)
            .fold(0u128, |acc, payout| acc.saturating_add(*payout as u128))
    }
}

/// Checks the `Roll` event against the submitted bets.
pub fn interpret(
    event: Option<RawRoll>,
    expected_len: usize,
) -> Result<RollResult, SettlementError> {
    let raw = event.ok_or_else(|| {
        SettlementError::StateMismatch("transaction receipt has no Roll event".to_string())
    })?;
    if raw.random_number > U256::from(MAX_POCKET) {
        return Err(SettlementError::StateMismatch(format!(
            "random number {} is outside 0-{MAX_POCKET}",
            raw.random_number
        )));
    }
    if raw.bet_results.len() != expected_len {
        return Err(SettlementError::StateMismatch(format!(
            "expected {expected_len} bet results, got {}",
            raw.bet_results.len()
        )));
    }
    let bet_results = raw
        .bet_results
        .iter()
        .map(|payout| {
            if *payout > U256::from(i128::MAX as u128) {
                Err(SettlementError::StateMismatch(format!(
                    "payout {payout} is out of range"
                )))
            } else {
                Ok(payout.as_u128() as i128)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RollResult {
        random_number: raw.random_number.as_u32() as u8,
        bet_results,
    })
}

/// Submits every pending bet as one roll and records the outcomes.
///
/// The ledger is only modified once the result has been fully checked.
pub async fn submit<C>(
    ledger: &mut BetLedger,
    contract: &C,
) -> Result<RollResult, SettlementError>
where
    C: RouletteContract + ?Sized,
{
    if ledger.is_empty() {
        return Err(SettlementError::EmptyLedger);
    }
    if ledger.is_settled() {
        return Err(SettlementError::AlreadySettled);
    }

    let state = contract.game_state().await?;
    let total = ledger.total();
    if total > state.player_balance {
        return Err(SettlementError::InsufficientBalance {
            total,
            balance: state.player_balance,
        });
    }

    let bets = ledger.as_submission_list();
    info!(bets = bets.len(), total_wei = total, "submitting roll");
    let receipt = contract.roll(&bets).await?;

    let result = interpret(receipt.event, bets.len()).inspect_err(|e| {
        warn!(tx = ?receipt.tx_hash, "roll mined but result rejected: {e}");
    })?;
    let summary = ledger
        .apply_settlement(result.random_number, &result.bet_results)
        .map_err(|e| SettlementError::StateMismatch(e.to_string()))?;
    info!(
        tx = ?receipt.tx_hash,
        random_number = summary.random_number,
        total_win_wei = summary.total_win,
        "roll settled"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        bet::{
            Bet,
            BetType,
            Outcome,
        },
        game_state::GameState,
        test_helpers::{
            ScriptedRoulette,
            raw_roll,
        },
    };

    fn pending(bet_type: BetType, selector: u8, stake: u128) -> Bet {
        Bet {
            bet_type,
            selector,
            stake,
            outcome: Outcome::Pending,
        }
    }

    fn funded(player_balance: u128) -> GameState {
        GameState {
            bank_balance: 1_000,
            total_player_balances: player_balance,
            max_bet: 100,
            withdrawal_fee: 1,
            player_balance,
        }
    }

    #[tokio::test]
    async fn submit__empty_ledger_makes_no_remote_call() {
        // given
        let contract = ScriptedRoulette::new(funded(10));
        let mut ledger = BetLedger::new();

        // when
        let result = submit(&mut ledger, &contract).await;

        // then
        assert_eq!(result, Err(SettlementError::EmptyLedger));
        assert!(contract.calls().is_empty());
    }

    #[tokio::test]
    async fn submit__even_bet_wins_on_four() {
        // given
        let contract = ScriptedRoulette::new(funded(10));
        contract.queue_roll(raw_roll(4, &[4]));
        let mut ledger = BetLedger::new();
        ledger.append(pending(BetType::EvenOdd, 0, 2));

        // when
        let result = submit(&mut ledger, &contract).await.unwrap();

        // then
        assert_eq!(result.random_number, 4);
        assert_eq!(result.total_win(), 4);
        assert_eq!(ledger.bets()[0].outcome, Outcome::Won { payout: 4 });
        assert_eq!(ledger.summary().map(|s| s.total_win), Some(4));
    }

    #[tokio::test]
    async fn submit__total_above_balance_is_rejected_before_roll() {
        // given
        let contract = ScriptedRoulette::new(funded(3));
        let mut ledger = BetLedger::new();
        ledger.append(pending(BetType::SingleNumber, 1, 2));
        ledger.append(pending(BetType::SingleNumber, 2, 2));

        // when
        let result = submit(&mut ledger, &contract).await;

        // then
        assert_eq!(
            result,
            Err(SettlementError::InsufficientBalance {
                total: 4,
                balance: 3
            })
        );
        assert_eq!(contract.calls(), vec!["getGameState".to_string()]);
    }

    #[tokio::test]
    async fn submit__remote_failure_leaves_bets_pending() {
        // given
        let contract = ScriptedRoulette::new(funded(10));
        contract.fail_next(RemoteError::Rejected {
            reason: "Insufficient bank balance".to_string(),
        });
        let mut ledger = BetLedger::new();
        ledger.append(pending(BetType::RedBlack, 0, 2));

        // when
        let result = submit(&mut ledger, &contract).await;

        // then
        assert!(matches!(result, Err(SettlementError::Remote(_))));
        assert!(ledger.bets().iter().all(Bet::is_pending));
    }

    #[tokio::test]
    async fn submit__missing_event_is_a_state_mismatch() {
        // given
        let contract = ScriptedRoulette::new(funded(10));
        contract.queue_roll_receipt(None);
        let mut ledger = BetLedger::new();
        ledger.append(pending(BetType::Half, 0, 2));

        // when
        let result = submit(&mut ledger, &contract).await;

        // then
        assert!(matches!(result, Err(SettlementError::StateMismatch(_))));
        assert!(ledger.bets().iter().all(Bet::is_pending));
    }

    #[tokio::test]
    async fn submit__settled_ledger_is_not_resubmitted() {
        // given
        let contract = ScriptedRoulette::new(funded(10));
        contract.queue_roll(raw_roll(7, &[0]));
        let mut ledger = BetLedger::new();
        ledger.append(pending(BetType::Column, 0, 1));
        submit(&mut ledger, &contract).await.unwrap();
        let calls_after_first = contract.calls().len();

        // when
        let result = submit(&mut ledger, &contract).await;

        // then
        assert_eq!(result, Err(SettlementError::AlreadySettled));
        assert_eq!(contract.calls().len(), calls_after_first);
    }

    #[test]
    fn interpret__rejects_random_number_outside_wheel() {
        let result = interpret(Some(raw_roll(37, &[0])), 1);
        assert!(matches!(result, Err(SettlementError::StateMismatch(_))));
    }

    #[test]
    fn interpret__rejects_length_mismatch() {
        let result = interpret(Some(raw_roll(3, &[0, 0])), 1);
        assert!(matches!(result, Err(SettlementError::StateMismatch(_))));
    }

    #[test]
    fn interpret__rejects_payout_beyond_signed_range() {
        let raw = RawRoll {
            random_number: U256::from(3u8),
            bet_results: vec![U256::MAX],
        };
        let result = interpret(Some(raw), 1);
        assert!(matches!(result, Err(SettlementError::StateMismatch(_))));
    }
}
