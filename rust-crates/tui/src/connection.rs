use async_trait::async_trait;
use ethers::types::Address;
use tracing::{
    info,
    warn,
};

use crate::{
    network::{
        NetworkConfig,
        NetworkTable,
    },
    remote::{
        RemoteError,
        RouletteContract,
    },
};

/// The wallet side of a connection: which accounts it controls, which chain it
/// is on, and what it can see on that chain.
#[async_trait]
pub trait WalletSession: Send + Sync {
    type Contract: RouletteContract;

    async fn accounts(&self) -> Result<Vec<Address>, RemoteError>;

    async fn chain_id(&self) -> Result<u64, RemoteError>;

    async fn switch_network(&mut self, network: &NetworkConfig) -> Result<(), RemoteError>;

    async fn has_contract_code(&self, address: Address) -> Result<bool, RemoteError>;

    fn contract(
        &self,
        network: &NetworkConfig,
        account: Address,
    ) -> Result<Self::Contract, RemoteError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("unknown network `{0}`")]
    UnknownNetwork(String),
    #[error("wallet is on chain {actual} but {expected} was requested")]
    ChainMismatch { expected: u64, actual: u64 },
    #[error("no roulette contract deployed on {network} at {address:?}")]
    NotDeployed { network: String, address: Address },
    #[error("wallet exposes no accounts")]
    NoAccounts,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub struct Connection<C> {
    pub network: NetworkConfig,
    pub account: Address,
    pub contract: C,
}

/// Resolves the target network, moves the wallet onto it if needed, checks the
/// contract is deployed there and picks the first account.
pub async fn establish<W: WalletSession>(
    wallet: &mut W,
    table: &NetworkTable,
    preferred: Option<&str>,
) -> Result<Connection<W::Contract>, ConnectionError> {
    let current_chain = wallet.chain_id().await?;
    let current = table.by_chain_id(current_chain);

    let target = match preferred {
        Some(name) => table
            .by_name(name)
            .ok_or_else(|| ConnectionError::UnknownNetwork(name.to_string()))?,
        None => match current {
            Some(network) => network,
            None => {
                warn!(chain_id = current_chain, "wallet is on an unknown chain, using default network");
                table
                    .default_network()
                    .ok_or_else(|| ConnectionError::UnknownNetwork("default".to_string()))?
            }
        },
    };

    if current_chain != target.chain_id {
        info!(
            from = current_chain,
            to = target.chain_id,
            network = target.name(),
            "requesting network switch"
        );
        wallet.switch_network(target).await?;
        let switched = wallet.chain_id().await?;
        if switched != target.chain_id {
            return Err(ConnectionError::ChainMismatch {
                expected: target.chain_id,
                actual: switched,
            });
        }
    }

    if !target.is_deployed() || !wallet.has_contract_code(target.contract_address).await? {
        return Err(ConnectionError::NotDeployed {
            network: target.display_name().to_string(),
            address: target.contract_address,
        });
    }

    let account = wallet
        .accounts()
        .await?
        .into_iter()
        .next()
        .ok_or(ConnectionError::NoAccounts)?;
    let contract = wallet.contract(target, account)?;
    info!(
        network = target.name(),
        account = ?account,
        contract = ?target.contract_address,
        "connected"
    );
    Ok(Connection {
        network: target.clone(),
        account,
        contract,
    })
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        deployment::DeploymentEnv,
        game_state::GameState,
        test_helpers::{
            ScriptedRoulette,
            player_address,
        },
    };

    struct FakeWallet {
        chain_id: u64,
        accounts: Vec<Address>,
        deployed: bool,
        honour_switch: bool,
        switches: Vec<u64>,
    }

    impl FakeWallet {
        fn on_chain(chain_id: u64) -> Self {
            Self {
                chain_id,
                accounts: vec![player_address()],
                deployed: true,
                honour_switch: true,
                switches: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl WalletSession for FakeWallet {
        type Contract = ScriptedRoulette;

        async fn accounts(&self) -> Result<Vec<Address>, RemoteError> {
            Ok(self.accounts.clone())
        }

        async fn chain_id(&self) -> Result<u64, RemoteError> {
            Ok(self.chain_id)
        }

        async fn switch_network(
            &mut self,
            network: &NetworkConfig,
        ) -> Result<(), RemoteError> {
            self.switches.push(network.chain_id);
            if self.honour_switch {
                self.chain_id = network.chain_id;
            }
            Ok(())
        }

        async fn has_contract_code(&self, _address: Address) -> Result<bool, RemoteError> {
            Ok(self.deployed)
        }

        fn contract(
            &self,
            _network: &NetworkConfig,
            _account: Address,
        ) -> Result<ScriptedRoulette, RemoteError> {
            Ok(ScriptedRoulette::new(GameState::default()))
        }
    }

    #[tokio::test]
    async fn establish__unknown_chain_switches_to_default_network() {
        // given
        let table = NetworkTable::builtin().unwrap();
        let mut wallet = FakeWallet::on_chain(1);

        // when
        let connection = establish(&mut wallet, &table, None).await.unwrap();

        // then
        assert_eq!(wallet.switches, vec![31337]);
        assert_eq!(connection.network.env, DeploymentEnv::Hardhat);
        assert_eq!(connection.account, player_address());
    }

    #[tokio::test]
    async fn establish__matching_chain_does_not_switch() {
        let table = NetworkTable::builtin().unwrap();
        let mut wallet = FakeWallet::on_chain(31337);

        establish(&mut wallet, &table, Some("hardhat")).await.unwrap();

        assert!(wallet.switches.is_empty());
    }

    #[tokio::test]
    async fn establish__refused_switch_is_a_chain_mismatch() {
        // given
        let table = NetworkTable::builtin().unwrap();
        let mut wallet = FakeWallet::on_chain(1);
        wallet.honour_switch = false;

        // when
        let result = establish(&mut wallet, &table, Some("hardhat")).await;

        // then
        assert!(matches!(
            result,
            Err(ConnectionError::ChainMismatch {
                expected: 31337,
                actual: 1
            })
        ));
    }

    #[tokio::test]
    async fn establish__zero_address_is_not_deployed() {
        let table = NetworkTable::builtin().unwrap();
        let mut wallet = FakeWallet::on_chain(137);

        let result = establish(&mut wallet, &table, None).await;

        assert!(matches!(result, Err(ConnectionError::NotDeployed { .. })));
    }

    #[tokio::test]
    async fn establish__missing_code_is_not_deployed() {
        let table = NetworkTable::builtin().unwrap();
        let mut wallet = FakeWallet::on_chain(31337);
        wallet.deployed = false;

        let result = establish(&mut wallet, &table, None).await;

        assert!(matches!(result, Err(ConnectionError::NotDeployed { .. })));
    }

    #[tokio::test]
    async fn establish__wallet_without_accounts_is_rejected() {
        let table = NetworkTable::builtin().unwrap();
        let mut wallet = FakeWallet::on_chain(31337);
        wallet.accounts.clear();

        let result = establish(&mut wallet, &table, None).await;

        assert!(matches!(result, Err(ConnectionError::NoAccounts)));
    }
}
