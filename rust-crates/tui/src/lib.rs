pub mod bank;
pub mod bet;
pub mod chain;
pub mod commands;
pub mod connection;
pub mod deployment;
pub mod error;
pub mod game_state;
pub mod ledger;
pub mod network;
pub mod remote;
pub mod session;
pub mod settlement;
pub mod units;
pub mod wallets;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
