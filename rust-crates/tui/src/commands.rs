use crate::{
    bank::BankAction,
    bet::BetType,
    ledger::RoundSummary,
    remote::RouletteContract,
    session::{
        Session,
        SessionError,
    },
    units::{
        AmountError,
        format_gwei,
        parse_gwei,
    },
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Bet {
        bet_type: BetType,
        selector: i64,
        /// Wei.
        stake: i128,
    },
    Roll,
    Clear,
    Refresh,
    Bank {
        action: BankAction,
        /// Wei.
        amount: i128,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("enter a command; try `help`")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error("{0}")]
    BetType(String),
    #[error("`{selector}` is not a valid {bet_type} selector")]
    Selector { bet_type: BetType, selector: String },
}

type Parser = fn(&CommandSpec, &[&str]) -> Result<Command, CommandError>;

pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub summary: &'static str,
    /// Owner-only on the contract side; front-ends hide these from other accounts.
    pub privileged: bool,
    parse: Parser,
}

impl CommandSpec {
    pub fn parse(&self, args: &[&str]) -> Result<Command, CommandError> {
        (self.parse)(self, args)
    }
}

pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "bet",
        usage: "bet <type> <selector> <gwei>",
        summary: "add a bet to the ledger",
        privileged: false,
        parse: parse_bet,
    },
    CommandSpec {
        name: "roll",
        usage: "roll",
        summary: "submit every pending bet as one roll",
        privileged: false,
        parse: parse_roll,
    },
    CommandSpec {
        name: "clear",
        usage: "clear",
        summary: "discard pending bets",
        privileged: false,
        parse: parse_clear,
    },
    CommandSpec {
        name: "refresh",
        usage: "refresh",
        summary: "reload the game state",
        privileged: false,
        parse: parse_refresh,
    },
    CommandSpec {
        name: "deposit",
        usage: "deposit <gwei>",
        summary: "deposit into your player balance",
        privileged: false,
        parse: parse_deposit,
    },
    CommandSpec {
        name: "withdraw",
        usage: "withdraw <gwei>",
        summary: "withdraw from your player balance",
        privileged: false,
        parse: parse_withdraw,
    },
    CommandSpec {
        name: "bank-deposit",
        usage: "bank-deposit <gwei>",
        summary: "fund the bank",
        privileged: true,
        parse: parse_bank_deposit,
    },
    CommandSpec {
        name: "bank-withdraw",
        usage: "bank-withdraw <gwei>",
        summary: "withdraw uncommitted bank funds",
        privileged: true,
        parse: parse_bank_withdraw,
    },
    CommandSpec {
        name: "set-max-bet",
        usage: "set-max-bet <gwei>",
        summary: "change the maximum stake per bet",
        privileged: true,
        parse: parse_set_max_bet,
    },
    CommandSpec {
        name: "set-fee",
        usage: "set-fee <gwei>",
        summary: "change the withdrawal fee",
        privileged: true,
        parse: parse_set_fee,
    },
];

pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

/// Command-line name of the command that performs `action`.
pub fn bank_command_name(action: BankAction) -> &'static str {
    match action {
        BankAction::Deposit => "deposit",
        BankAction::Withdraw => "withdraw",
        BankAction::DepositToBank => "bank-deposit",
        BankAction::WithdrawFromBank => "bank-withdraw",
        BankAction::SetMaxBet => "set-max-bet",
        BankAction::SetWithdrawalFee => "set-fee",
    }
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let name = words.next().ok_or(CommandError::Empty)?;
    let args: Vec<&str> = words.collect();
    let spec = find(&name.to_ascii_lowercase())
        .ok_or_else(|| CommandError::Unknown(name.to_string()))?;
    spec.parse(&args)
}

fn no_args(spec: &CommandSpec, args: &[&str], command: Command) -> Result<Command, CommandError> {
    if !args.is_empty() {
        return Err(CommandError::Usage(spec.usage));
    }
    Ok(command)
}

fn single_amount(spec: &CommandSpec, args: &[&str]) -> Result<i128, CommandError> {
    match args {
        [amount] => Ok(parse_gwei(amount)?),
        _ => Err(CommandError::Usage(spec.usage)),
    }
}

fn bank_command(
    spec: &CommandSpec,
    args: &[&str],
    action: BankAction,
) -> Result<Command, CommandError> {
    let amount = single_amount(spec, args)?;
    Ok(Command::Bank { action, amount })
}

fn parse_bet(spec: &CommandSpec, args: &[&str]) -> Result<Command, CommandError> {
    let [bet_type, selector, stake] = args else {
        return Err(CommandError::Usage(spec.usage));
    };
    let bet_type: BetType = bet_type.parse().map_err(CommandError::BetType)?;
    let selector_value =
        bet_type
            .parse_selector(selector)
            .ok_or_else(|| CommandError::Selector {
                bet_type,
                selector: selector.to_string(),
            })?;
    Ok(Command::Bet {
        bet_type,
        selector: selector_value,
        stake: parse_gwei(stake)?,
    })
}

fn parse_roll(spec: &CommandSpec, args: &[&str]) -> Result<Command, CommandError> {
    no_args(spec, args, Command::Roll)
}

fn parse_clear(spec: &CommandSpec, args: &[&str]) -> Result<Command, CommandError> {
    no_args(spec, args, Command::Clear)
}

fn parse_refresh(spec: &CommandSpec, args: &[&str]) -> Result<Command, CommandError> {
    no_args(spec, args, Command::Refresh)
}

fn parse_deposit(spec: &CommandSpec, args: &[&str]) -> Result<Command, CommandError> {
    bank_command(spec, args, BankAction::Deposit)
}

fn parse_withdraw(spec: &CommandSpec, args: &[&str]) -> Result<Command, CommandError> {
    bank_command(spec, args, BankAction::Withdraw)
}

fn parse_bank_deposit(spec: &CommandSpec, args: &[&str]) -> Result<Command, CommandError> {
    bank_command(spec, args, BankAction::DepositToBank)
}

fn parse_bank_withdraw(spec: &CommandSpec, args: &[&str]) -> Result<Command, CommandError> {
    bank_command(spec, args, BankAction::WithdrawFromBank)
}

fn parse_set_max_bet(spec: &CommandSpec, args: &[&str]) -> Result<Command, CommandError> {
    bank_command(spec, args, BankAction::SetMaxBet)
}

fn parse_set_fee(spec: &CommandSpec, args: &[&str]) -> Result<Command, CommandError> {
    bank_command(spec, args, BankAction::SetWithdrawalFee)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOutcome {
    pub message: String,
    pub summary: Option<RoundSummary>,
}

impl CommandOutcome {
    fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            summary: None,
        }
    }
}

pub async fn dispatch<C: RouletteContract>(
    session: &mut Session<C>,
    command: Command,
) -> Result<CommandOutcome, SessionError> {
    match command {
        Command::Bet {
            bet_type,
            selector,
            stake,
        } => {
            let bet = session.add_bet(bet_type, selector, stake).await?;
            Ok(CommandOutcome::message(format!(
                "Bet placed: {} for {} Gwei",
                bet.describe(),
                format_gwei(bet.stake)
            )))
        }
        Command::Roll => {
            let result = session.roll().await?;
            let summary = session.ledger().summary().copied();
            let message = if result.total_win() > 0 {
                format!(
                    "Rolled {}. You won {} Gwei!",
                    result.random_number,
                    format_gwei(result.total_win())
                )
            } else {
                format!("Rolled {}. No winning bets.", result.random_number)
            };
            Ok(CommandOutcome { message, summary })
        }
        Command::Clear => {
            session.clear_bets();
            Ok(CommandOutcome::message("Bets cleared"))
        }
        Command::Refresh => {
            session.refresh().await?;
            Ok(CommandOutcome::message("Game state refreshed"))
        }
        Command::Bank { action, amount } => {
            let receipt = session.bank(action, amount).await?;
            Ok(CommandOutcome::message(receipt.operation.describe()))
        }
    }
}

/// Parses and runs one command line.
pub async fn run_line<C: RouletteContract>(
    session: &mut Session<C>,
    line: &str,
) -> Result<CommandOutcome, SessionError> {
    let command = parse_command(line)?;
    dispatch(session, command).await
}
