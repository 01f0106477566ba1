use std::sync::Arc;

use ethers::{
    contract::abigen,
    providers::Middleware,
    types::Address,
};

pub mod artifact;

pub mod roulette_types {
    use super::*;

    abigen!(
        Roulette,
        r#"[
            struct Bet { uint8 betType; uint8 number; uint256 amount; }
            struct RollResult { uint256 randomNumber; uint256[] betResults; }
            function owner() view returns (address)
            function getGameState() view returns (uint256 bankBalance, uint256 totalPlayerBalances, uint256 maxBet, uint256 withdrawalFee, uint256 playerBalance)
            function deposit() payable
            function withdraw(uint256 amount)
            function depositToBank() payable
            function withdrawFromBank(uint256 amount)
            function setMaxBet(uint256 maxBet)
            function setWithdrawalFee(uint256 withdrawalFee)
            function roll(Bet[] bets)
            event Roll(address indexed player, RollResult result)
        ]"#
    );
}

/// Functions a deployed contract must expose for the client to drive it.
pub const REQUIRED_FUNCTIONS: [&str; 9] = [
    "owner",
    "getGameState",
    "deposit",
    "withdraw",
    "depositToBank",
    "withdrawFromBank",
    "setMaxBet",
    "setWithdrawalFee",
    "roll",
];

pub const ROLL_EVENT: &str = "Roll";

pub fn roulette_instance<M: Middleware>(
    address: Address,
    client: Arc<M>,
) -> roulette_types::Roulette<M> {
    roulette_types::Roulette::new(address, client)
}

/// Four-byte selector of `OwnableUnauthorizedAccount(address)`, the custom error
/// raised when a non-owner calls a privileged function.
pub fn unauthorized_account_selector() -> [u8; 4] {
    ethers::utils::id("OwnableUnauthorizedAccount(address)")
}
