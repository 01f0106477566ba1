use crate::bet::{
    Bet,
    BetSubmission,
    Outcome,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub random_number: u8,
    /// Wei.
    pub total_bet: u128,
    /// Wei. Sum of the positive payouts of the round.
    pub total_win: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected {expected} bet results, got {actual}")]
pub struct ResultLengthMismatch {
    pub expected: usize,
    pub actual: usize,
}

/// Bets accumulated for the next roll, in submission order, plus the summary of
/// the round they were settled in.
#[derive(Clone, Debug, Default)]
pub struct BetLedger {
    bets: Vec<Bet>,
    summary: Option<RoundSummary>,
}

impl BetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pending bet. A settled round is cleared first so the new bet starts
    /// the next one.
    pub fn append(&mut self, bet: Bet) {
        if self.is_settled() {
            self.clear();
        }
        self.bets.push(bet);
    }

    pub fn clear(&mut self) {
        self.bets.clear();
        self.summary = None;
    }

    /// Total stake in wei.
    pub fn total(&self) -> u128 {
        self.bets
            .iter()
            .fold(0u128, |acc, bet| acc.saturating_add(bet.stake))
    }

    pub fn as_submission_list(&self) -> Vec<BetSubmission> {
        self.bets.iter().map(Bet::submission).collect()
    }

    pub fn bets(&self) -> &[Bet] {
        &self.bets
    }

    pub fn summary(&self) -> Option<&RoundSummary> {
        self.summary.as_ref()
    }

    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }

    pub fn is_settled(&self) -> bool {
        self.summary.is_some()
    }

    /// Writes one outcome per bet. Nothing is written unless `payouts` lines up
    /// with the ledger.
    pub fn apply_settlement(
        &mut self,
        random_number: u8,
        payouts: &[i128],
    ) -> Result<RoundSummary, ResultLengthMismatch> {
        if payouts.len() != self.bets.len() {
            return Err(ResultLengthMismatch {
                expected: self.bets.len(),
                actual: payouts.len(),
            });
        }
        let mut total_win = 0u128;
        for (bet, payout) in self.bets.iter_mut().zip(payouts) {
            bet.outcome = if *payout > 0 {
                let payout = *payout as u128;
                total_win = total_win.saturating_add(payout);
                Outcome::Won { payout }
            } else {
                Outcome::Lost
            };
        }
        let summary = RoundSummary {
            random_number,
            total_bet: self.total(),
            total_win,
        };
        self.summary = Some(summary);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::bet::BetType;

    fn bet(bet_type: BetType, selector: u8, stake: u128) -> Bet {
        Bet {
            bet_type,
            selector,
            stake,
            outcome: Outcome::Pending,
        }
    }

    #[test]
    fn clear__empties_ledger_and_total() {
        // given
        let mut ledger = BetLedger::new();
        ledger.append(bet(BetType::SingleNumber, 7, 3));
        ledger.append(bet(BetType::RedBlack, 0, 4));

        // when
        ledger.clear();

        // then
        assert!(ledger.is_empty());
        assert_eq!(ledger.total(), 0);
        assert!(ledger.summary().is_none());
    }

    #[test]
    fn as_submission_list__preserves_insertion_order() {
        // given
        let mut ledger = BetLedger::new();
        ledger.append(bet(BetType::Dozen, 2, 1));
        ledger.append(bet(BetType::SingleNumber, 0, 2));

        // when
        let list = ledger.as_submission_list();

        // then
        assert_eq!(
            list,
            vec![
                BetSubmission {
                    bet_type: 4,
                    selector: 2,
                    stake: 1
                },
                BetSubmission {
                    bet_type: 0,
                    selector: 0,
                    stake: 2
                },
            ]
        );
    }

    #[test]
    fn apply_settlement__marks_every_bet_won_or_lost() {
        // given
        let mut ledger = BetLedger::new();
        ledger.append(bet(BetType::EvenOdd, 0, 2));
        ledger.append(bet(BetType::SingleNumber, 5, 1));

        // when
        let summary = ledger.apply_settlement(4, &[4, 0]).unwrap();

        // then
        assert_eq!(ledger.bets()[0].outcome, Outcome::Won { payout: 4 });
        assert_eq!(ledger.bets()[1].outcome, Outcome::Lost);
        assert_eq!(
            summary,
            RoundSummary {
                random_number: 4,
                total_bet: 3,
                total_win: 4
            }
        );
        assert!(ledger.is_settled());
    }

    #[test]
    fn apply_settlement__leaves_ledger_untouched_on_length_mismatch() {
        // given
        let mut ledger = BetLedger::new();
        ledger.append(bet(BetType::Half, 1, 2));

        // when
        let result = ledger.apply_settlement(20, &[4, 0]);

        // then
        assert_eq!(
            result,
            Err(ResultLengthMismatch {
                expected: 1,
                actual: 2
            })
        );
        assert!(ledger.bets().iter().all(Bet::is_pending));
        assert!(!ledger.is_settled());
    }

    #[test]
    fn append__after_settlement_starts_new_round() {
        // given
        let mut ledger = BetLedger::new();
        ledger.append(bet(BetType::Column, 0, 2));
        ledger.apply_settlement(1, &[0]).unwrap();

        // when
        ledger.append(bet(BetType::Column, 1, 5));

        // then
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total(), 5);
        assert!(!ledger.is_settled());
    }
}
