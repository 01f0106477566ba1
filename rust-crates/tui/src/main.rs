use color_eyre::eyre::{
    Result,
    eyre,
};
use roulette_client::{
    deployment::{
        self,
        DeploymentEnv,
    },
    wallets,
};
use std::sync::OnceLock;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

const LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "roulette-tui.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: roulette-tui [--hardhat | --polygon | --sepolia] [--rpc-url <url>]\n\
         [--wallet <name>] [--wallet-dir <path>] [--private-key-env <VAR>]\n\
         \n\
         Flags:\n\
           --hardhat               Connect to a local Hardhat node (default RPC {})\n\
           --polygon               Connect to Polygon mainnet (default RPC {})\n\
           --sepolia               Connect to Sepolia (RPC from ${})\n\
           --rpc-url <url>         Override the RPC URL for the selected network\n\
           --wallet <name>         Keystore to unlock for playing\n\
           --wallet-dir <path>     Override keystore directory (defaults to ~/.foundry/keystores)\n\
           --private-key-env <VAR> Read a hex private key from VAR instead of a keystore\n\
         \n\
         Without a network flag the client follows the chain reported by the RPC\n\
         endpoint and falls back to Hardhat. Without a wallet flag the key is read\n\
         from ${} (Hardhat) or ${} (Sepolia).",
        DeploymentEnv::Hardhat.default_rpc_url(),
        DeploymentEnv::Polygon.default_rpc_url(),
        deployment::SEPOLIA_RPC_ENV,
        wallets::LOCAL_PRIVATE_KEY_ENV,
        wallets::SEPOLIA_PRIVATE_KEY_ENV,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<client::AppConfig> {
    let mut args = std::env::args().skip(1);
    let mut network: Option<DeploymentEnv> = None;
    let mut custom_url: Option<String> = None;
    let mut wallet_dir: Option<String> = None;
    let mut wallet_name: Option<String> = None;
    let mut key_env: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--hardhat" | "--polygon" | "--sepolia" => {
                if network.is_some() {
                    return Err(eyre!(
                        "Multiple network flags provided; choose one of --hardhat/--polygon/--sepolia"
                    ));
                }
                let env = arg
                    .trim_start_matches("--")
                    .parse::<DeploymentEnv>()
                    .map_err(|e| eyre!(e))?;
                network = Some(env);
            }
            "--rpc-url" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--rpc-url requires a URL argument"))?;
                if custom_url.is_some() {
                    return Err(eyre!("--rpc-url may only be specified once"));
                }
                if network.is_none() {
                    return Err(eyre!(
                        "--rpc-url must follow a network flag (--hardhat/--polygon/--sepolia)"
                    ));
                }
                custom_url = Some(url);
            }
            "--wallet-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-dir requires a path argument"))?;
                if wallet_dir.is_some() {
                    return Err(eyre!("--wallet-dir may only be specified once"));
                }
                wallet_dir = Some(dir);
            }
            "--wallet" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet requires a wallet name"))?;
                if wallet_name.is_some() {
                    return Err(eyre!("--wallet may only be specified once"));
                }
                wallet_name = Some(name);
            }
            "--private-key-env" => {
                let var = args
                    .next()
                    .ok_or_else(|| eyre!("--private-key-env requires a variable name"))?;
                if key_env.is_some() {
                    return Err(eyre!("--private-key-env may only be specified once"));
                }
                key_env = Some(var);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let wallet = match (wallet_name, key_env) {
        (Some(_), Some(_)) => {
            return Err(eyre!("--wallet and --private-key-env are mutually exclusive"));
        }
        (Some(name), None) => client::WalletSource::Keystore {
            name,
            dir: wallets::resolve_wallet_dir(wallet_dir.as_deref())?,
        },
        (None, Some(var)) => client::WalletSource::Env { var },
        (None, None) => match network {
            Some(DeploymentEnv::Polygon) => {
                return Err(eyre!(
                    "Specify --wallet <name> or --private-key-env <VAR> for Polygon"
                ));
            }
            Some(DeploymentEnv::Sepolia) => client::WalletSource::Env {
                var: wallets::SEPOLIA_PRIVATE_KEY_ENV.to_string(),
            },
            Some(DeploymentEnv::Hardhat) | None => client::WalletSource::Env {
                var: wallets::LOCAL_PRIVATE_KEY_ENV.to_string(),
            },
        },
    };

    Ok(client::AppConfig {
        network,
        rpc_url: custom_url,
        wallet,
    })
}

/// Logs go to a daily file since the terminal belongs to the UI.
fn init_tracing(network: Option<DeploymentEnv>) {
    let default_level = match network {
        Some(env) if !env.debug() => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(LOG_DIR, LOG_FILE_PREFIX));
    let _ = LOG_GUARD.set(guard);
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let app_config = parse_cli_args()?;
    init_tracing(app_config.network);
    tracing::info!("starting roulette client");
    deployment::ensure_structure().map_err(|e| eyre!(e))?;
    client::run_app(app_config).await
}
