use std::{
    path::PathBuf,
    time::{
        Duration,
        Instant,
    },
};

use chrono::{
    DateTime,
    Utc,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::{
    signers::LocalWallet,
    types::Address,
};
use roulette_client::{
    bet::Bet,
    chain::{
        EthersRoulette,
        EthersWallet,
    },
    commands::{
        self,
        COMMANDS,
        Command,
    },
    connection,
    deployment::DeploymentEnv,
    game_state::GameState,
    ledger::RoundSummary,
    network::{
        NetworkConfig,
        NetworkTable,
    },
    session::Session,
    units::format_gwei,
    wallets,
};
use tokio::time;
use tracing::{
    error,
    info,
};

use crate::ui;

/// How long an error stays in the Errors panel.
const ERROR_TTL: Duration = Duration::from_secs(5);
const TICK: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub enum WalletSource {
    Keystore { name: String, dir: PathBuf },
    Env { var: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// `None` follows whatever chain the wallet endpoint reports.
    pub network: Option<DeploymentEnv>,
    pub rpc_url: Option<String>,
    pub wallet: WalletSource,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub network: String,
    pub currency: &'static str,
    pub account: Address,
    pub is_owner: bool,
    pub state: Option<GameState>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub stale: bool,
    pub bets: Vec<Bet>,
    pub pending_total: u128,
    pub summary: Option<RoundSummary>,
    /// Operation awaiting the chain; its controls are drawn disabled.
    pub busy: Option<&'static str>,
    pub status: String,
    pub errors: Vec<String>,
}

pub struct AppController {
    session: Session<EthersRoulette>,
    network: NetworkConfig,
    pub status: String,
    errors: Vec<String>,
    errors_at: Option<Instant>,
}

impl AppController {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let signer = load_signer(&config)?;

        let mut table = NetworkTable::load()?;
        if let (Some(env), Some(url)) = (config.network, config.rpc_url.as_ref()) {
            table.override_rpc_url(env, url.clone());
        }
        let initial = match config.network {
            Some(env) => table.by_name(env.dir_name()),
            None => table.default_network(),
        }
        .ok_or_else(|| eyre!("No network configuration available"))?;
        info!(network = initial.name(), rpc = %initial.rpc_url, "connecting wallet");

        let mut wallet = EthersWallet::connect(signer, &initial.rpc_url)
            .wrap_err("failed to create RPC provider")?;
        let preferred = config.network.map(|env| env.dir_name());
        let connection = connection::establish(&mut wallet, &table, preferred)
            .await
            .wrap_err("failed to connect to the roulette contract")?;
        let network = connection.network.clone();
        let session = Session::open(
            connection.contract,
            connection.account,
            network.display_name(),
        )
        .await
        .wrap_err("failed to load the game state")?;

        Ok(Self {
            session,
            network,
            status: String::from("Connected"),
            errors: Vec::new(),
            errors_at: None,
        })
    }

    pub fn build_snapshot(&self) -> AppSnapshot {
        let ledger = self.session.ledger();
        let cache = self.session.state_cache();
        AppSnapshot {
            network: self.session.network().to_string(),
            currency: self.network.currency(),
            account: self.session.account(),
            is_owner: self.session.is_owner(),
            state: cache.get().copied(),
            refreshed_at: cache.refreshed_at(),
            stale: cache.is_stale(),
            bets: ledger.bets().to_vec(),
            pending_total: if ledger.is_settled() { 0 } else { ledger.total() },
            summary: ledger.summary().copied(),
            busy: self.session.in_flight().current(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    /// Runs one command line through the dispatch table and records the outcome
    /// as status or error.
    async fn run_command(&mut self, command: Command) {
        match commands::dispatch(&mut self.session, command).await {
            Ok(outcome) => self.set_status(outcome.message),
            Err(e) => {
                error!(kind = e.kind().label(), error = %e, "operation failed");
                self.push_errors(vec![e.user_message()]);
            }
        }
    }

    fn help_text(&self) -> String {
        let owner = self.session.is_owner();
        COMMANDS
            .iter()
            .filter(|spec| owner || !spec.privileged)
            .map(|spec| format!("{:<28} {}", spec.usage, spec.summary))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.errors.clear();
        self.errors_at = None;
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > 50 {
            let drain = self.errors.len() - 50;
            self.errors.drain(0..drain);
        }
        self.errors_at = Some(Instant::now());
    }

    /// Drops errors older than [`ERROR_TTL`]. Returns whether anything changed.
    fn expire_errors(&mut self, now: Instant) -> bool {
        match self.errors_at {
            Some(at) if now.duration_since(at) >= ERROR_TTL => {
                self.errors.clear();
                self.errors_at = None;
                true
            }
            _ => false,
        }
    }
}

fn load_signer(config: &AppConfig) -> Result<LocalWallet> {
    match &config.wallet {
        WalletSource::Keystore { name, dir } => {
            let descriptor = wallets::find_wallet(dir, name)?;
            wallets::unlock_wallet(&descriptor)
        }
        WalletSource::Env { var } => wallets::wallet_from_env(var),
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let controller = AppController::new(config).await?;
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    info!("UI ready");
    let res = run_loop(controller, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

fn sync_status(
    controller: &mut AppController,
    snapshot: &mut AppSnapshot,
    status: impl Into<String>,
) {
    controller.set_status(status);
    snapshot.status = controller.status.clone();
    snapshot.errors = controller.errors.clone();
}

fn sync_error(
    controller: &mut AppController,
    snapshot: &mut AppSnapshot,
    error_msg: impl Into<String>,
) {
    controller.push_errors(vec![error_msg.into()]);
    snapshot.errors = controller.errors.clone();
    snapshot.status = controller.status.clone();
}

fn show_processing_status(
    controller: &mut AppController,
    snapshot: &mut AppSnapshot,
    ui_state: &mut ui::UiState,
    operation: &'static str,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    sync_status(controller, snapshot, message);
    snapshot.busy = Some(operation);
    ui::draw(ui_state, snapshot).wrap_err(context)
}

/// Status line shown while a command awaits the chain, or `None` when the
/// command is purely local.
fn processing_message(command: &Command) -> Option<(&'static str, String)> {
    match command {
        Command::Bet { .. } => Some(("bet", "Checking balance for bet...".to_string())),
        Command::Roll => Some(("roll", "Submitting roll...".to_string())),
        Command::Refresh => Some(("refresh", "Refreshing game state...".to_string())),
        Command::Bank { action, amount } => Some((
            action.name(),
            format!(
                "Processing {} of {} Gwei...",
                action.name(),
                format_gwei((*amount).max(0) as u128)
            ),
        )),
        Command::Clear => None,
    }
}

async fn run_loop(
    mut controller: AppController,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    info!("Running app loop");
    let mut snapshot = controller.build_snapshot();
    ui::draw(ui_state, &snapshot).wrap_err("initial draw failed")?;
    let mut ticker = time::interval(TICK);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            _ = ticker.tick() => {
                if controller.expire_errors(Instant::now()) {
                    snapshot = controller.build_snapshot();
                    ui::draw(ui_state, &snapshot)
                        .wrap_err("draw after clearing errors failed")?;
                }
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Run(line) => {
                        if line.trim().eq_ignore_ascii_case("help") {
                            let help = controller.help_text();
                            sync_status(&mut controller, &mut snapshot, help);
                            ui::draw(ui_state, &snapshot).wrap_err("draw after help failed")?;
                            continue;
                        }
                        let command = match commands::parse_command(&line) {
                            Ok(command) => command,
                            Err(e) => {
                                sync_error(&mut controller, &mut snapshot, e.to_string());
                                ui::draw(ui_state, &snapshot)
                                    .wrap_err("draw after command error failed")?;
                                continue;
                            }
                        };
                        if let Command::Bank { action, .. } = &command {
                            if action.is_privileged() && !snapshot.is_owner {
                                let msg = format!("{action} is only available to the contract owner");
                                sync_error(&mut controller, &mut snapshot, msg);
                                ui::draw(ui_state, &snapshot)
                                    .wrap_err("draw after command error failed")?;
                                continue;
                            }
                        }
                        if let Some((operation, message)) = processing_message(&command) {
                            show_processing_status(
                                &mut controller,
                                &mut snapshot,
                                ui_state,
                                operation,
                                message,
                                "draw while processing command failed",
                            )?;
                        }
                        controller.run_command(command).await;
                        let dropped = ui::discard_pending(input_events);
                        if dropped > 0 {
                            tracing::debug!(dropped, "discarded input received while busy");
                        }
                    }
                }
                snapshot = controller.build_snapshot();
                ui::draw(ui_state, &snapshot).wrap_err("draw after input failed")?;
            }
        }
    }
    Ok(())
}
