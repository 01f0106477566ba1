use std::fmt;

use tracing::info;

use crate::{
    game_state::GameState,
    remote::{
        RemoteError,
        RouletteContract,
        TxReceipt,
    },
    units::{
        format_gwei,
        gwei,
    },
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BankAction {
    Deposit,
    Withdraw,
    DepositToBank,
    WithdrawFromBank,
    SetMaxBet,
    SetWithdrawalFee,
}

impl BankAction {
    /// Contract function name.
    pub fn name(self) -> &'static str {
        match self {
            BankAction::Deposit => "deposit",
            BankAction::Withdraw => "withdraw",
            BankAction::DepositToBank => "depositToBank",
            BankAction::WithdrawFromBank => "withdrawFromBank",
            BankAction::SetMaxBet => "setMaxBet",
            BankAction::SetWithdrawalFee => "setWithdrawalFee",
        }
    }

    /// Owner-only on the contract side.
    pub fn is_privileged(self) -> bool {
        !matches!(self, BankAction::Deposit | BankAction::Withdraw)
    }

    pub fn past_tense(self) -> &'static str {
        match self {
            BankAction::Deposit => "Deposited",
            BankAction::Withdraw => "Withdrew",
            BankAction::DepositToBank => "Deposited to bank",
            BankAction::WithdrawFromBank => "Withdrew from bank",
            BankAction::SetMaxBet => "Max bet set to",
            BankAction::SetWithdrawalFee => "Withdrawal fee set to",
        }
    }
}

impl fmt::Display for BankAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An amount-carrying bank or account operation. Amounts are wei and always
/// positive once constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BankOperation {
    action: BankAction,
    amount: u128,
}

impl BankOperation {
    pub fn new(action: BankAction, amount: i128) -> Result<Self, BankError> {
        if amount <= 0 {
            return Err(BankError::NonPositiveAmount { action });
        }
        Ok(Self {
            action,
            amount: amount as u128,
        })
    }

    pub fn action(&self) -> BankAction {
        self.action
    }

    pub fn amount(&self) -> u128 {
        self.amount
    }

    pub fn describe(&self) -> String {
        format!("{} {} Gwei", self.action.past_tense(), format_gwei(self.amount))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BankError {
    #[error("{action} amount must be greater than zero")]
    NonPositiveAmount { action: BankAction },
    #[error("amount must be greater than the withdrawal fee of {} Gwei", gwei(.fee))]
    BelowWithdrawalFee { amount: u128, fee: u128 },
    #[error(
        "insufficient balance: {} Gwei requested, {} Gwei available",
        gwei(.amount),
        gwei(.balance)
    )]
    InsufficientBalance { amount: u128, balance: u128 },
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Local checks that run before any state-changing call. Only player withdrawals
/// are checked against the snapshot; owner operations are left to the contract.
pub fn check(operation: &BankOperation, state: &GameState) -> Result<(), BankError> {
    if operation.action != BankAction::Withdraw {
        return Ok(());
    }
    let amount = operation.amount;
    if amount <= state.withdrawal_fee {
        return Err(BankError::BelowWithdrawalFee {
            amount,
            fee: state.withdrawal_fee,
        });
    }
    if amount > state.player_balance {
        return Err(BankError::InsufficientBalance {
            amount,
            balance: state.player_balance,
        });
    }
    Ok(())
}

pub async fn execute<C>(
    operation: &BankOperation,
    contract: &C,
) -> Result<TxReceipt, BankError>
where
    C: RouletteContract + ?Sized,
{
    let amount = operation.amount;
    info!(
        operation = operation.action.name(),
        amount_wei = amount,
        "submitting bank operation"
    );
    let receipt = match operation.action {
        BankAction::Deposit => contract.deposit(amount).await?,
        BankAction::Withdraw => contract.withdraw(amount).await?,
        BankAction::DepositToBank => contract.deposit_to_bank(amount).await?,
        BankAction::WithdrawFromBank => contract.withdraw_from_bank(amount).await?,
        BankAction::SetMaxBet => contract.set_max_bet(amount).await?,
        BankAction::SetWithdrawalFee => contract.set_withdrawal_fee(amount).await?,
    };
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn state() -> GameState {
        GameState {
            bank_balance: 100,
            total_player_balances: 50,
            max_bet: 10,
            withdrawal_fee: 5,
            player_balance: 50,
        }
    }

    #[test]
    fn new__rejects_non_positive_amounts_for_every_action() {
        for action in [
            BankAction::Deposit,
            BankAction::Withdraw,
            BankAction::DepositToBank,
            BankAction::WithdrawFromBank,
            BankAction::SetMaxBet,
            BankAction::SetWithdrawalFee,
        ] {
            assert_eq!(
                BankOperation::new(action, 0),
                Err(BankError::NonPositiveAmount { action })
            );
            assert!(BankOperation::new(action, -1).is_err());
        }
    }

    #[test]
    fn check__withdraw_at_or_below_fee_is_rejected() {
        // given
        let operation = BankOperation::new(BankAction::Withdraw, 5).unwrap();

        // when
        let result = check(&operation, &state());

        // then
        assert_eq!(
            result,
            Err(BankError::BelowWithdrawalFee { amount: 5, fee: 5 })
        );
    }

    #[test]
    fn check__withdraw_above_balance_is_rejected() {
        let operation = BankOperation::new(BankAction::Withdraw, 51).unwrap();
        assert_eq!(
            check(&operation, &state()),
            Err(BankError::InsufficientBalance {
                amount: 51,
                balance: 50
            })
        );
    }

    #[test]
    fn check__owner_operations_are_not_blocked_locally() {
        let operation = BankOperation::new(BankAction::WithdrawFromBank, 1_000).unwrap();
        assert_eq!(check(&operation, &state()), Ok(()));
    }

    #[test]
    fn is_privileged__only_player_account_operations_are_open() {
        assert!(!BankAction::Deposit.is_privileged());
        assert!(!BankAction::Withdraw.is_privileged());
        assert!(BankAction::SetMaxBet.is_privileged());
        assert!(BankAction::DepositToBank.is_privileged());
    }
}
