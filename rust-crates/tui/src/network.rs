use std::str::FromStr;

use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::types::Address;
use tracing::warn;

use crate::deployment::{
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    pub env: DeploymentEnv,
    pub chain_id: u64,
    pub rpc_url: String,
    pub contract_address: Address,
    pub debug: bool,
}

impl NetworkConfig {
    pub fn builtin(env: DeploymentEnv) -> Result<Self> {
        let contract_address = Address::from_str(env.default_contract_address())
            .wrap_err_with(|| format!("Invalid default contract address for {env}"))?;
        Ok(Self {
            env,
            chain_id: env.chain_id(),
            rpc_url: env.default_rpc_url(),
            contract_address,
            debug: env.debug(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.env.dir_name()
    }

    pub fn display_name(&self) -> &'static str {
        self.env.chain_name()
    }

    pub fn currency(&self) -> &'static str {
        self.env.currency_symbol()
    }

    pub fn is_deployed(&self) -> bool {
        !self.contract_address.is_zero()
    }

    fn apply_record(&mut self, record: &DeploymentRecord) -> Result<()> {
        match record.chain_id {
            Some(chain_id) if chain_id != self.chain_id => {
                return Err(eyre!(
                    "Deployment record for {} targets chain {chain_id}, expected {}",
                    self.name(),
                    self.chain_id
                ));
            }
            _ => {}
        }
        self.contract_address = Address::from_str(&record.contract_address)
            .wrap_err_with(|| {
                format!(
                    "Deployment record for {} has an invalid contract address",
                    self.name()
                )
            })?;
        Ok(())
    }
}

/// Known networks, keyed by name and chain id.
#[derive(Clone, Debug)]
pub struct NetworkTable {
    networks: Vec<NetworkConfig>,
}

impl NetworkTable {
    pub fn builtin() -> Result<Self> {
        let networks = DeploymentEnv::ALL
            .into_iter()
            .map(NetworkConfig::builtin)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { networks })
    }

    /// Built-in configuration with contract addresses taken from recorded
    /// deployments where one exists.
    pub fn load() -> Result<Self> {
        let mut table = Self::builtin()?;
        for network in &mut table.networks {
            let store = DeploymentStore::new(network.env).map_err(|e| eyre!(e))?;
            match store.load() {
                Ok(Some(record)) => network.apply_record(&record)?,
                Ok(None) => {}
                Err(e) => warn!("ignoring unreadable deployment record for {}: {e}", network.name()),
            }
        }
        Ok(table)
    }

    pub fn by_name(&self, name: &str) -> Option<&NetworkConfig> {
        let env = DeploymentEnv::from_str(name).ok()?;
        self.networks.iter().find(|n| n.env == env)
    }

    pub fn by_chain_id(&self, chain_id: u64) -> Option<&NetworkConfig> {
        let env = DeploymentEnv::from_chain_id(chain_id)?;
        self.networks.iter().find(|n| n.env == env)
    }

    pub fn default_network(&self) -> Option<&NetworkConfig> {
        self.networks.iter().find(|n| n.env == DeploymentEnv::Hardhat)
    }

    pub fn override_rpc_url(&mut self, env: DeploymentEnv, url: impl Into<String>) {
        if let Some(network) = self.networks.iter_mut().find(|n| n.env == env) {
            network.rpc_url = url.into();
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn builtin__hardhat_is_deployed_and_polygon_is_not() {
        // when
        let table = NetworkTable::builtin().unwrap();

        // then
        let hardhat = table.by_name("hardhat").unwrap();
        assert_eq!(hardhat.chain_id, 31337);
        assert!(hardhat.is_deployed());
        assert!(hardhat.debug);
        let polygon = table.by_chain_id(137).unwrap();
        assert_eq!(polygon.rpc_url, "https://polygon-rpc.com");
        assert!(!polygon.is_deployed());
    }

    #[test]
    fn apply_record__rejects_record_for_other_chain() {
        // given
        let mut network = NetworkConfig::builtin(DeploymentEnv::Polygon).unwrap();
        let record = DeploymentRecord {
            deployed_at: "2024-05-01T00:00:00+00:00".to_string(),
            contract_address: "0x1111111111111111111111111111111111111111".to_string(),
            bytecode_hash: String::new(),
            bytecode_kind: crate::deployment::BytecodeKind::Runtime,
            network_url: String::new(),
            chain_id: Some(1),
            deployer: None,
            block_number: None,
            tx_hash: None,
        };

        // when
        let result = network.apply_record(&record);

        // then
        assert!(result.is_err());
        assert!(!network.is_deployed());
    }

    #[test]
    fn override_rpc_url__replaces_only_the_named_network() {
        let mut table = NetworkTable::builtin().unwrap();
        table.override_rpc_url(DeploymentEnv::Hardhat, "http://10.0.0.2:8545");
        assert_eq!(
            table.by_name("hardhat").unwrap().rpc_url,
            "http://10.0.0.2:8545"
        );
        assert_eq!(
            table.by_name("polygon").unwrap().rpc_url,
            "https://polygon-rpc.com"
        );
    }
}
