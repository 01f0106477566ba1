use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployment.json";

/// Address the Hardhat node assigns to the first contract deployed by its first
/// funded account.
pub const HARDHAT_DEFAULT_CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";
pub const UNDEPLOYED_CONTRACT: &str = "0x0000000000000000000000000000000000000000";
pub const DEFAULT_HARDHAT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_POLYGON_RPC_URL: &str = "https://polygon-rpc.com";
pub const DEFAULT_SEPOLIA_RPC_URL: &str = "https://rpc.sepolia.org";
pub const SEPOLIA_RPC_ENV: &str = "SEPOLIA_RPC_URL";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DeploymentEnv {
    Hardhat,
    Polygon,
    Sepolia,
}

impl DeploymentEnv {
    pub const ALL: [DeploymentEnv; 3] = [
        DeploymentEnv::Hardhat,
        DeploymentEnv::Polygon,
        DeploymentEnv::Sepolia,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Hardhat => "hardhat",
            DeploymentEnv::Polygon => "polygon",
            DeploymentEnv::Sepolia => "sepolia",
        }
    }

    pub fn chain_id(self) -> u64 {
        match self {
            DeploymentEnv::Hardhat => 0x7A69,
            DeploymentEnv::Polygon => 0x89,
            DeploymentEnv::Sepolia => 11_155_111,
        }
    }

    pub fn chain_name(self) -> &'static str {
        match self {
            DeploymentEnv::Hardhat => "Hardhat Local",
            DeploymentEnv::Polygon => "Polygon Mainnet",
            DeploymentEnv::Sepolia => "Sepolia Testnet",
        }
    }

    pub fn currency_symbol(self) -> &'static str {
        match self {
            DeploymentEnv::Polygon => "MATIC",
            DeploymentEnv::Hardhat | DeploymentEnv::Sepolia => "ETH",
        }
    }

    pub fn default_rpc_url(self) -> String {
        match self {
            DeploymentEnv::Hardhat => DEFAULT_HARDHAT_RPC_URL.to_string(),
            DeploymentEnv::Polygon => DEFAULT_POLYGON_RPC_URL.to_string(),
            DeploymentEnv::Sepolia => std::env::var(SEPOLIA_RPC_ENV)
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SEPOLIA_RPC_URL.to_string()),
        }
    }

    /// Contract address used when no deployment has been recorded.
    pub fn default_contract_address(self) -> &'static str {
        match self {
            DeploymentEnv::Hardhat => HARDHAT_DEFAULT_CONTRACT,
            DeploymentEnv::Polygon | DeploymentEnv::Sepolia => UNDEPLOYED_CONTRACT,
        }
    }

    /// Local chains log verbosely.
    pub fn debug(self) -> bool {
        matches!(self, DeploymentEnv::Hardhat)
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|env| env.chain_id() == chain_id)
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chain_name())
    }
}

impl FromStr for DeploymentEnv {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let needle = s.trim().to_ascii_lowercase();
        match needle.as_str() {
            "hardhat" | "localhost" | "local" => Ok(DeploymentEnv::Hardhat),
            "polygon" | "matic" => Ok(DeploymentEnv::Polygon),
            "sepolia" => Ok(DeploymentEnv::Sepolia),
            other => Err(anyhow!(
                "unknown network '{other}'; expected one of hardhat, polygon, sepolia"
            )),
        }
    }
}

/// Which code `bytecode_hash` was taken from. Deployments hash the artifact's
/// creation bytecode; registrations only see the runtime code on chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BytecodeKind {
    #[default]
    Creation,
    Runtime,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub contract_address: String,
    pub bytecode_hash: String,
    #[serde(default)]
    pub bytecode_kind: BytecodeKind,
    pub network_url: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default)]
    pub deployer: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub tx_hash: Option<String>,
}

impl DeploymentRecord {
    /// Compares against a creation bytecode hash. Runtime hashes never match.
    pub fn is_compatible_with_hash(&self, hash: &str) -> bool {
        self.bytecode_kind == BytecodeKind::Creation && self.bytecode_hash == hash
    }

    pub fn is_registered(&self) -> bool {
        self.bytecode_kind == BytecodeKind::Runtime
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::with_root(DEPLOYMENTS_ROOT, env)
    }

    pub fn with_root(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root.as_ref(), env)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        read_record(&self.path)
    }

    pub fn save(&self, record: DeploymentRecord) -> Result<()> {
        write_record(&self.path, &record)
    }
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn ensure_structure() -> Result<()> {
    for env in DeploymentEnv::ALL {
        let _ = ensure_store(Path::new(DEPLOYMENTS_ROOT), env)?;
    }
    Ok(())
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    if !root.exists() {
        fs::create_dir_all(root).with_context(|| {
            format!("Failed to create deployments directory {}", root.display())
        })?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!("Failed to create deployments/{} directory", env.dir_name())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).with_context(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"").with_context(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment record")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<DeploymentRecord>(&data)
        .map(Some)
        .context("Failed to parse deployment record JSON; expected a single deployment object")
}

fn write_record(path: impl AsRef<Path>, record: &DeploymentRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .context("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment record")?;
    Ok(())
}

pub fn record_deployment(
    env: DeploymentEnv,
    contract_address: impl AsRef<str>,
    bytecode_hash: impl AsRef<str>,
    bytecode_kind: BytecodeKind,
    network_url: impl AsRef<str>,
) -> Result<()> {
    let store = DeploymentStore::new(env)?;
    let record = DeploymentRecord {
        deployed_at: Utc::now().to_rfc3339(),
        contract_address: contract_address.as_ref().to_string(),
        bytecode_hash: bytecode_hash.as_ref().to_string(),
        bytecode_kind,
        network_url: network_url.as_ref().to_string(),
        chain_id: Some(env.chain_id()),
        deployer: None,
        block_number: None,
        tx_hash: None,
    };
    store.save(record)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    fn sample_record() -> DeploymentRecord {
        DeploymentRecord {
            deployed_at: "2024-05-01T00:00:00+00:00".to_string(),
            contract_address: HARDHAT_DEFAULT_CONTRACT.to_string(),
            bytecode_hash: hash_bytes(b"roulette"),
            bytecode_kind: BytecodeKind::Creation,
            network_url: DEFAULT_HARDHAT_RPC_URL.to_string(),
            chain_id: Some(31337),
            deployer: None,
            block_number: Some(1),
            tx_hash: None,
        }
    }

    #[test]
    fn load__returns_none_for_fresh_store() {
        // given
        let dir = TempDir::new("deployments").unwrap();

        // when
        let store = DeploymentStore::with_root(dir.path(), DeploymentEnv::Hardhat).unwrap();

        // then
        assert!(store.path().exists());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save__overwrites_previous_record() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::with_root(dir.path(), DeploymentEnv::Sepolia).unwrap();
        store.save(sample_record()).unwrap();
        let mut newer = sample_record();
        newer.contract_address = "0x1111111111111111111111111111111111111111".to_string();

        // when
        store.save(newer.clone()).unwrap();

        // then
        assert_eq!(store.load().unwrap(), Some(newer));
    }

    #[test]
    fn load__rejects_malformed_json() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::with_root(dir.path(), DeploymentEnv::Polygon).unwrap();
        fs::write(store.path(), b"{not json").unwrap();

        // when
        let result = store.load();

        // then
        assert!(result.is_err());
    }

    #[test]
    fn from_chain_id__maps_known_chains() {
        assert_eq!(DeploymentEnv::from_chain_id(31337), Some(DeploymentEnv::Hardhat));
        assert_eq!(DeploymentEnv::from_chain_id(137), Some(DeploymentEnv::Polygon));
        assert_eq!(
            DeploymentEnv::from_chain_id(11_155_111),
            Some(DeploymentEnv::Sepolia)
        );
        assert_eq!(DeploymentEnv::from_chain_id(1), None);
    }

    #[test]
    fn from_str__accepts_aliases_case_insensitively() {
        assert_eq!(
            "LocalHost".parse::<DeploymentEnv>().unwrap(),
            DeploymentEnv::Hardhat
        );
        assert_eq!("matic".parse::<DeploymentEnv>().unwrap(), DeploymentEnv::Polygon);
        assert!("mainnet".parse::<DeploymentEnv>().is_err());
    }

    #[test]
    fn is_compatible_with_hash__compares_bytecode_hashes() {
        let record = sample_record();
        assert!(record.is_compatible_with_hash(&hash_bytes(b"roulette")));
        assert!(!record.is_compatible_with_hash(&hash_bytes(b"other")));
    }

    #[test]
    fn is_compatible_with_hash__never_matches_registered_runtime_hash() {
        // given
        let mut record = sample_record();
        record.bytecode_kind = BytecodeKind::Runtime;

        // when
        let compatible = record.is_compatible_with_hash(&hash_bytes(b"roulette"));

        // then
        assert!(!compatible);
        assert!(record.is_registered());
    }

    #[test]
    fn load__record_without_bytecode_kind_is_a_creation_hash() {
        // given
        let dir = TempDir::new("deployments").unwrap();
        let store = DeploymentStore::with_root(dir.path(), DeploymentEnv::Hardhat).unwrap();
        let json = format!(
            r#"{{"deployed_at":"2024-05-01T00:00:00+00:00","contract_address":"{HARDHAT_DEFAULT_CONTRACT}","bytecode_hash":"{}","network_url":"{DEFAULT_HARDHAT_RPC_URL}"}}"#,
            hash_bytes(b"roulette")
        );
        fs::write(store.path(), json).unwrap();

        // when
        let record = store.load().unwrap().unwrap();

        // then
        assert_eq!(record.bytecode_kind, BytecodeKind::Creation);
        assert!(!record.is_registered());
    }
}
