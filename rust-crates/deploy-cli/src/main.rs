use std::{
    path::PathBuf,
    str::FromStr,
    sync::Arc,
};

use anyhow::{
    Context,
    Result,
    anyhow,
    bail,
};
use chrono::Utc;
use clap::{
    ArgGroup,
    Parser,
};
use deployments::{
    BytecodeKind,
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
};
use ethers::{
    contract::ContractFactory,
    providers::Middleware,
    signers::LocalWallet,
    types::Address,
};
use generated_abi::artifact::RouletteArtifact;
use roulette_client::{
    bank::{
        self,
        BankAction,
        BankOperation,
    },
    chain::{
        self,
        EthersRoulette,
        SignedClient,
    },
    network::NetworkTable,
    remote::RouletteContract,
    units::{
        format_gwei,
        parse_gwei,
    },
    wallets,
};
use tracing::{
    info,
    warn,
};
use tracing_subscriber::EnvFilter;

const DEFAULT_ARTIFACT: &str = "artifacts/contracts/Roulette.sol/Roulette.json";

#[derive(Parser, Debug)]
#[command(
    name = "roulette-admin",
    about = "Deploy the roulette contract or perform owner utilities (bank, limits, state)",
    version,
    group(
        ArgGroup::new("network")
            .args(["hardhat", "polygon", "sepolia"])
            .required(true)
    ),
    group(ArgGroup::new("signer").args(["wallet", "private_key_env"]))
)]
struct Args {
    /// Use a local Hardhat node
    #[arg(long)]
    hardhat: bool,

    /// Use Polygon mainnet
    #[arg(long)]
    polygon: bool,

    /// Use the Sepolia testnet
    #[arg(long)]
    sepolia: bool,

    /// Override RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Keystore name to sign with
    #[arg(long)]
    wallet: Option<String>,

    /// Override keystore directory (defaults to ~/.foundry/keystores)
    #[arg(long)]
    wallet_dir: Option<String>,

    /// Read a hex private key from this variable instead of a keystore
    #[arg(long)]
    private_key_env: Option<String>,

    /// Which action to perform (defaults to deploy)
    #[arg(short, long, value_enum, default_value = "deploy")]
    action: Action,

    /// Hardhat artifact with the contract ABI and bytecode (deploy only)
    #[arg(long, default_value = DEFAULT_ARTIFACT)]
    artifact: PathBuf,

    /// Address of an existing deployment (register only)
    #[arg(long)]
    address: Option<String>,

    /// Amount in Gwei for bank and limit actions
    #[arg(long)]
    amount: Option<String>,

    /// Gwei to deposit into the bank right after deploying
    #[arg(long)]
    fund_bank: Option<String>,

    /// Max bet in Gwei to set right after deploying
    #[arg(long)]
    max_bet: Option<String>,

    /// Deploy even when the recorded deployment has the same bytecode
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum Action {
    Deploy,
    Register,
    State,
    DepositToBank,
    WithdrawFromBank,
    SetMaxBet,
    SetFee,
}

impl Action {
    fn bank_action(self) -> Option<BankAction> {
        match self {
            Action::DepositToBank => Some(BankAction::DepositToBank),
            Action::WithdrawFromBank => Some(BankAction::WithdrawFromBank),
            Action::SetMaxBet => Some(BankAction::SetMaxBet),
            Action::SetFee => Some(BankAction::SetWithdrawalFee),
            Action::Deploy | Action::Register | Action::State => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();
    deployments::ensure_structure().context("initializing deployment directories")?;

    let env = if args.hardhat {
        DeploymentEnv::Hardhat
    } else if args.polygon {
        DeploymentEnv::Polygon
    } else {
        DeploymentEnv::Sepolia
    };

    let mut table = NetworkTable::load().map_err(|e| anyhow!("{e}"))?;
    if let Some(url) = args.rpc_url.as_ref() {
        table.override_rpc_url(env, url.clone());
    }
    let network = table
        .by_name(env.dir_name())
        .cloned()
        .ok_or_else(|| anyhow!("no configuration for {env}"))?;

    let signer = load_signer(&args, env)?;
    let provider =
        chain::connect_provider(&network.rpc_url).context("failed to create provider")?;
    let chain_id = provider
        .get_chainid()
        .await
        .with_context(|| format!("failed to reach {}", network.rpc_url))?
        .as_u64();
    if chain_id != network.chain_id {
        bail!(
            "RPC endpoint {} reports chain {chain_id}, expected {} for {}",
            network.rpc_url,
            network.chain_id,
            network.display_name()
        );
    }
    let client = chain::signed_client(provider, signer, chain_id);
    info!(network = network.name(), signer = ?client.address(), "connected");

    match args.action {
        Action::Deploy => deploy(env, &network.rpc_url, client, &args).await,
        Action::Register => register(env, &network.rpc_url, client, &args).await,
        action => {
            if !network.is_deployed() {
                bail!(
                    "no roulette deployment recorded for {}; run --action deploy or register first",
                    network.display_name()
                );
            }
            let roulette =
                EthersRoulette::new(network.contract_address, client.address(), client);
            match action.bank_action() {
                Some(bank_action) => {
                    let raw = args
                        .amount
                        .as_deref()
                        .ok_or_else(|| anyhow!("--amount <gwei> is required for {bank_action}"))?;
                    warn_if_not_owner(&roulette).await;
                    run_bank_action(&roulette, bank_action, raw).await
                }
                None => print_state(&roulette).await,
            }
        }
    }
}

fn load_signer(args: &Args, env: DeploymentEnv) -> Result<LocalWallet> {
    if let Some(name) = args.wallet.as_deref() {
        let dir = wallets::resolve_wallet_dir(args.wallet_dir.as_deref())
            .map_err(|e| anyhow!("resolving keystore directory: {e}"))?;
        let descriptor =
            wallets::find_wallet(&dir, name).map_err(|e| anyhow!("locating keystore: {e}"))?;
        return wallets::unlock_wallet(&descriptor)
            .map_err(|e| anyhow!("unlocking keystore: {e}"));
    }
    let var = match (args.private_key_env.as_deref(), env) {
        (Some(var), _) => var,
        (None, DeploymentEnv::Hardhat) => wallets::LOCAL_PRIVATE_KEY_ENV,
        (None, DeploymentEnv::Sepolia) => wallets::SEPOLIA_PRIVATE_KEY_ENV,
        (None, DeploymentEnv::Polygon) => {
            bail!("--wallet or --private-key-env is required for {env}")
        }
    };
    wallets::wallet_from_env(var).map_err(|e| anyhow!("{e}"))
}

async fn deploy(
    env: DeploymentEnv,
    rpc_url: &str,
    client: Arc<SignedClient>,
    args: &Args,
) -> Result<()> {
    let artifact = RouletteArtifact::load(&args.artifact)
        .with_context(|| format!("loading artifact {}", args.artifact.display()))?;
    let bytecode_hash = deployments::hash_bytes(&artifact.bytecode);
    let store = DeploymentStore::new(env).context("opening deployment store")?;
    if let Some(existing) = store.load().context("loading deployment record")? {
        if existing.is_registered() && !args.force {
            println!(
                "Roulette at {} on {env} was registered from chain code, not this artifact; pass --force to replace it",
                existing.contract_address
            );
            return Ok(());
        }
        if existing.is_compatible_with_hash(&bytecode_hash) && !args.force {
            println!(
                "Roulette with this bytecode is already deployed at {} on {env}; pass --force to redeploy",
                existing.contract_address
            );
            return Ok(());
        }
    }
    let factory = ContractFactory::new(
        artifact.abi.clone(),
        artifact.bytecode.clone(),
        client.clone(),
    );
    let (contract, receipt) = factory
        .deploy(())
        .context("building deployment transaction")?
        .send_with_receipt()
        .await
        .context("deploying roulette contract")?;
    let address = contract.address();
    println!(
        "Roulette deployed: {:?} (tx: {:#x}) at block {}",
        address,
        receipt.transaction_hash,
        receipt
            .block_number
            .map(|b| b.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );

    let record = DeploymentRecord {
        deployed_at: Utc::now().to_rfc3339(),
        contract_address: format!("{address:?}"),
        bytecode_hash,
        bytecode_kind: BytecodeKind::Creation,
        network_url: rpc_url.to_string(),
        chain_id: Some(env.chain_id()),
        deployer: Some(format!("{:?}", client.address())),
        block_number: receipt.block_number.map(|b| b.as_u64()),
        tx_hash: Some(format!("{:#x}", receipt.transaction_hash)),
    };
    store.save(record).context("recording deployment")?;
    println!("Deployment metadata written to {}", store.path().display());

    let roulette = EthersRoulette::new(address, client.address(), client);
    if let Some(raw) = args.fund_bank.as_deref() {
        run_bank_action(&roulette, BankAction::DepositToBank, raw).await?;
    }
    if let Some(raw) = args.max_bet.as_deref() {
        run_bank_action(&roulette, BankAction::SetMaxBet, raw).await?;
    }
    Ok(())
}

async fn register(
    env: DeploymentEnv,
    rpc_url: &str,
    client: Arc<SignedClient>,
    args: &Args,
) -> Result<()> {
    let raw = args
        .address
        .as_deref()
        .ok_or_else(|| anyhow!("--address is required for register"))?;
    let address = Address::from_str(raw).with_context(|| format!("invalid address {raw}"))?;
    let code = client
        .get_code(address, None)
        .await
        .context("fetching contract code")?;
    if code.is_empty() {
        bail!("no contract code at {address:?} on {env}");
    }
    let roulette = EthersRoulette::new(address, client.address(), client);
    let owner = roulette
        .owner()
        .await
        .context("contract at this address does not answer owner()")?;
    deployments::record_deployment(
        env,
        format!("{address:?}"),
        deployments::hash_bytes(&code),
        BytecodeKind::Runtime,
        rpc_url,
    )
    .context("recording deployment")?;
    println!("Registered {address:?} on {env} (owner {owner:?})");
    Ok(())
}

async fn warn_if_not_owner(roulette: &EthersRoulette) {
    match roulette.owner().await {
        Ok(owner) if owner != roulette.account() => {
            warn!(owner = ?owner, signer = ?roulette.account(), "signer is not the contract owner; the call will revert");
        }
        Ok(_) => {}
        Err(e) => warn!("failed to query contract owner: {e}"),
    }
}

async fn run_bank_action(roulette: &EthersRoulette, action: BankAction, raw: &str) -> Result<()> {
    let amount = parse_gwei(raw).with_context(|| format!("parsing amount for {action}"))?;
    let operation = BankOperation::new(action, amount)?;
    let receipt = bank::execute(&operation, roulette)
        .await
        .with_context(|| format!("submitting {action}"))?;
    println!(
        "{} (tx: {})",
        operation.describe(),
        receipt.tx_hash.as_deref().unwrap_or("unknown")
    );
    Ok(())
}

async fn print_state(roulette: &EthersRoulette) -> Result<()> {
    let state = roulette
        .game_state()
        .await
        .context("fetching game state")?;
    let owner = roulette.owner().await.context("fetching owner")?;
    println!("Roulette {:?}", roulette.address());
    println!("  Owner:                 {owner:?}");
    println!("  Bank balance:          {} Gwei", format_gwei(state.bank_balance));
    println!(
        "  Total player balances: {} Gwei",
        format_gwei(state.total_player_balances)
    );
    println!("  Max bet:               {} Gwei", format_gwei(state.max_bet));
    println!("  Withdrawal fee:        {} Gwei", format_gwei(state.withdrawal_fee));
    println!(
        "  Signer balance:        {} Gwei",
        format_gwei(state.player_balance)
    );
    if !state.is_consistent() {
        warn!("bank balance is below the total of player balances");
    }
    Ok(())
}
