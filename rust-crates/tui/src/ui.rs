use crate::client::AppSnapshot;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEventKind,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use roulette_client::{
    bank::BankAction,
    bet::{
        Bet,
        BetType,
        Outcome,
    },
    commands::bank_command_name,
    units::format_gwei,
};
use std::io::stdout;
use tokio::sync::mpsc;
use tracing::warn;

const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

#[derive(Debug, PartialEq, Eq)]
pub enum UserEvent {
    Quit,
    Redraw,
    /// A command line for the dispatch table, e.g. `bet 2 1 0.5`.
    Run(String),
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<Event>;

#[derive(Debug)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    bet_type: BetType,
    selector: u8,
    is_owner: bool,
}

impl Default for UiState {
    fn default() -> Self {
        UiState {
            mode: Mode::Normal,
            terminal: None,
            bet_type: BetType::SingleNumber,
            selector: 0,
            is_owner: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum Mode {
    #[default]
    Normal,
    Amount(AmountPrompt),
    CommandLine(String),
    QuitModal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AmountPrompt {
    target: AmountTarget,
    input: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AmountTarget {
    Bet { bet_type: BetType, selector: u8 },
    Bank(BankAction),
}

impl AmountTarget {
    fn title(&self) -> String {
        match self {
            AmountTarget::Bet { bet_type, selector } => format!(
                "Bet on {} {}",
                bet_type.label(),
                bet_type.selector_label(*selector)
            ),
            AmountTarget::Bank(action) => match action {
                BankAction::Deposit => "Deposit".to_string(),
                BankAction::Withdraw => "Withdraw".to_string(),
                BankAction::DepositToBank => "Deposit to Bank".to_string(),
                BankAction::WithdrawFromBank => "Withdraw from Bank".to_string(),
                BankAction::SetMaxBet => "Set Max Bet".to_string(),
                BankAction::SetWithdrawalFee => "Set Withdrawal Fee".to_string(),
            },
        }
    }

    fn command_line(&self, amount: &str) -> String {
        match self {
            AmountTarget::Bet { bet_type, selector } => {
                format!("bet {} {} {}", bet_type.code(), selector, amount.trim())
            }
            AmountTarget::Bank(action) => {
                format!("{} {}", bank_command_name(*action), amount.trim())
            }
        }
    }
}

impl UiState {
    fn open_amount(&mut self, target: AmountTarget) -> UserEvent {
        self.mode = Mode::Amount(AmountPrompt {
            target,
            input: String::new(),
        });
        UserEvent::Redraw
    }

    fn step_selector(&mut self, forward: bool) {
        let max = self.bet_type.max_selector();
        self.selector = match (forward, self.selector) {
            (true, s) if s >= max => 0,
            (true, s) => s + 1,
            (false, 0) => max,
            (false, s) => s - 1,
        };
    }

    fn step_bet_type(&mut self, forward: bool) {
        let len = BetType::ALL.len();
        let idx = BetType::ALL
            .iter()
            .position(|t| *t == self.bet_type)
            .unwrap_or(0);
        let next = if forward {
            (idx + 1) % len
        } else {
            (idx + len - 1) % len
        };
        self.bet_type = BetType::ALL[next];
        self.selector = 0;
    }
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    // Create a single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

/// Reads terminal events on a dedicated thread so the app loop can `select!`
/// over them alongside ctrl-c and the redraw tick.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            match event::read() {
                Ok(ev) => {
                    if tx.send(ev).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("terminal input failed: {e}");
                    break;
                }
            }
        }
    });
    rx
}

pub async fn next_raw_event(input: &mut InputEventReceiver) -> Result<Event> {
    input
        .recv()
        .await
        .ok_or_else(|| eyre!("terminal input closed"))
}

/// Drops everything typed while a remote call was being awaited.
pub fn discard_pending(input: &mut InputEventReceiver) -> usize {
    let mut dropped = 0;
    while input.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    state.is_owner = snap.is_owner;
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let Event::Key(k) = event else {
        return None;
    };
    if k.kind != KeyEventKind::Press {
        return None;
    }
    match &mut state.mode {
        Mode::Amount(prompt) => {
            return match k.code {
                KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                KeyCode::Enter => {
                    let line = prompt.target.command_line(&prompt.input);
                    state.mode = Mode::Normal;
                    Some(UserEvent::Run(line))
                }
                KeyCode::Backspace => {
                    prompt.input.pop();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => {
                    prompt.input.push(c);
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::CommandLine(line) => {
            return match k.code {
                KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                KeyCode::Enter => {
                    let line = std::mem::take(line);
                    state.mode = Mode::Normal;
                    if line.trim().is_empty() {
                        Some(UserEvent::Redraw)
                    } else {
                        Some(UserEvent::Run(line))
                    }
                }
                KeyCode::Backspace => {
                    line.pop();
                    Some(UserEvent::Redraw)
                }
                KeyCode::Char(c) => {
                    line.push(c);
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::QuitModal => {
            return match k.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Redraw)
                }
                _ => None,
            };
        }
        Mode::Normal => {}
    }

    let owner = state.is_owner;
    Some(match k.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.mode = Mode::QuitModal;
            UserEvent::Redraw
        }
        KeyCode::Tab => {
            state.step_bet_type(true);
            UserEvent::Redraw
        }
        KeyCode::BackTab => {
            state.step_bet_type(false);
            UserEvent::Redraw
        }
        KeyCode::Right | KeyCode::Char('l') => {
            state.step_selector(true);
            UserEvent::Redraw
        }
        KeyCode::Left | KeyCode::Char('h') => {
            state.step_selector(false);
            UserEvent::Redraw
        }
        KeyCode::Char('b') | KeyCode::Enter => state.open_amount(AmountTarget::Bet {
            bet_type: state.bet_type,
            selector: state.selector,
        }),
        KeyCode::Char('d') => state.open_amount(AmountTarget::Bank(BankAction::Deposit)),
        KeyCode::Char('w') => state.open_amount(AmountTarget::Bank(BankAction::Withdraw)),
        KeyCode::Char('D') if owner => {
            state.open_amount(AmountTarget::Bank(BankAction::DepositToBank))
        }
        KeyCode::Char('W') if owner => {
            state.open_amount(AmountTarget::Bank(BankAction::WithdrawFromBank))
        }
        KeyCode::Char('M') if owner => {
            state.open_amount(AmountTarget::Bank(BankAction::SetMaxBet))
        }
        KeyCode::Char('F') if owner => {
            state.open_amount(AmountTarget::Bank(BankAction::SetWithdrawalFee))
        }
        KeyCode::Char('r') => UserEvent::Run("roll".to_string()),
        KeyCode::Char('x') => UserEvent::Run("clear".to_string()),
        KeyCode::Char('R') => UserEvent::Run("refresh".to_string()),
        KeyCode::Char(':') => {
            state.mode = Mode::CommandLine(String::new());
            UserEvent::Redraw
        }
        _ => return None,
    })
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    // Clear the whole frame to avoid leftover fragments
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // wallet
            Constraint::Length(4), // game state
            Constraint::Length(9), // board
            Constraint::Length(3), // selection
            Constraint::Min(6),    // ledger + last round
            Constraint::Length(7), // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_wallet_panel(f, chunks[0], snap);
    draw_game_panel(f, chunks[1], snap);
    draw_board(f, chunks[2], state, snap);
    draw_selection(f, chunks[3], state);
    draw_lower(f, chunks[4], snap);
    draw_status(f, chunks[5], snap);
    draw_help(f, chunks[6], snap);
    draw_modals(f, state);
}

fn draw_wallet_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let balance = snap
        .state
        .map(|s| format!("{} Gwei", format_gwei(s.player_balance)))
        .unwrap_or_else(|| "N/A".to_string());
    let mut spans = vec![Span::raw(format!(
        "Account: {:?} | Network: {} ({}) | Balance: {}",
        snap.account, snap.network, snap.currency, balance
    ))];
    if snap.is_owner {
        spans.push(Span::styled(
            " | Owner",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    }
    let widget = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title("Wallet"));
    f.render_widget(widget, area);
}

fn draw_game_panel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = Vec::new();
    match snap.state {
        Some(s) => {
            lines.push(Line::from(format!(
                "Bank: {} Gwei | Player balances: {} Gwei | Max bet: {} Gwei | Withdrawal fee: {} Gwei",
                format_gwei(s.bank_balance),
                format_gwei(s.total_player_balances),
                format_gwei(s.max_bet),
                format_gwei(s.withdrawal_fee)
            )));
        }
        None => lines.push(Line::styled(
            "Game state not loaded",
            Style::default().fg(Color::DarkGray),
        )),
    }
    let updated = snap
        .refreshed_at
        .map(|t| t.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());
    if snap.stale {
        lines.push(Line::styled(
            format!("Updated: {updated} (stale, press R to refresh)"),
            Style::default().fg(Color::Yellow),
        ));
    } else {
        lines.push(Line::from(format!("Updated: {updated}")));
    }
    let widget =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Game"));
    f.render_widget(widget, area);
}

fn pocket_color(n: u8) -> Color {
    if n == 0 {
        Color::Green
    } else if RED_NUMBERS.contains(&n) {
        Color::Red
    } else {
        Color::Black
    }
}

/// Whether a bet of `bet_type` on `selector` pays out when the ball lands on `n`.
fn covers(bet_type: BetType, selector: u8, n: u8) -> bool {
    if n == 0 {
        return bet_type == BetType::SingleNumber && selector == 0;
    }
    match bet_type {
        BetType::SingleNumber => n == selector,
        BetType::EvenOdd => (n % 2 == 0) == (selector == 0),
        BetType::RedBlack => RED_NUMBERS.contains(&n) == (selector == 0),
        BetType::Column => (n - 1) % 3 == selector,
        BetType::Dozen => (n - 1) / 12 == selector,
        BetType::Half => (n - 1) / 18 == selector,
    }
}

fn pocket_cell(n: u8, state: &UiState, snap: &AppSnapshot) -> Paragraph<'static> {
    let mut style = Style::default().fg(Color::White).bg(pocket_color(n));
    if covers(state.bet_type, state.selector, n) {
        style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
    }
    let last = snap.summary.map(|s| s.random_number);
    let border = if last == Some(n) {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Paragraph::new(n.to_string())
        .alignment(Alignment::Center)
        .style(style)
        .block(Block::default().borders(Borders::ALL).border_style(border))
}

fn draw_board(f: &mut Frame, area: Rect, state: &UiState, snap: &AppSnapshot) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(6), Constraint::Min(0)])
        .split(area);
    f.render_widget(pocket_cell(0, state, snap), cols[0]);

    // Standard layout: 3, 6, .. 36 on the top row, 1, 4, .. 34 on the bottom.
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3); 3])
        .split(cols[1]);
    for (r, row_area) in rows.iter().enumerate() {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 12); 12])
            .split(*row_area);
        for (c, cell_area) in cells.iter().enumerate() {
            let n = (c as u8) * 3 + (3 - r as u8);
            f.render_widget(pocket_cell(n, state, snap), *cell_area);
        }
    }
}

fn draw_selection(f: &mut Frame, area: Rect, state: &UiState) {
    let text = format!(
        "{}: {}   (Tab type, ←/→ selector, b place bet)",
        state.bet_type.label(),
        state.bet_type.selector_label(state.selector)
    );
    let widget =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Selection"));
    f.render_widget(widget, area);
}

fn bet_line(bet: &Bet) -> Line<'static> {
    let base = format!("{} for {} Gwei", bet.describe(), format_gwei(bet.stake));
    match bet.outcome {
        Outcome::Pending => Line::from(format!("{base}  pending")),
        Outcome::Won { payout } => Line::styled(
            format!("{base}  won {} Gwei", format_gwei(payout)),
            Style::default().fg(Color::Green),
        ),
        Outcome::Lost => Line::styled(
            format!("{base}  lost"),
            Style::default().fg(Color::Red),
        ),
    }
}

fn draw_lower(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let lower = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let mut bet_lines: Vec<Line> = Vec::new();
    if snap.bets.is_empty() {
        bet_lines.push(Line::styled("No bets", Style::default().fg(Color::DarkGray)));
    } else {
        bet_lines.extend(snap.bets.iter().map(bet_line));
    }
    let title = format!("Bets (pending total {} Gwei)", format_gwei(snap.pending_total));
    let bets = Paragraph::new(bet_lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(bets, lower[0]);

    let round_lines = match snap.summary {
        Some(summary) => vec![
            Line::styled(
                format!("Number: {}", summary.random_number),
                Style::default()
                    .fg(pocket_color(summary.random_number))
                    .bg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Line::from(format!("Total bet: {} Gwei", format_gwei(summary.total_bet))),
            Line::from(format!("Total win: {} Gwei", format_gwei(summary.total_win))),
        ],
        None => vec![Line::from("None")],
    };
    let round = Paragraph::new(round_lines)
        .block(Block::default().borders(Borders::ALL).title("Last Round"));
    f.render_widget(round, lower[1]);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let status_widget = if snap.errors.is_empty() {
        let mut lines: Vec<Line> = Vec::new();
        if snap.status.trim().is_empty() {
            lines.push(Line::from("Ready"));
        } else {
            for line in snap.status.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> = snap.errors.iter().map(|e| Line::from(e.clone())).collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, area);
}

fn draw_help(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut text = String::from(
        "b bet | r roll | x clear | R refresh | d deposit | w withdraw | : command | q quit",
    );
    if snap.is_owner {
        text.push_str(" | D/W bank | M max bet | F fee");
    }
    let (title, style) = match snap.busy {
        Some(op) => (
            format!("Help (waiting for {op})"),
            Style::default().fg(Color::DarkGray),
        ),
        None => ("Help".to_string(), Style::default()),
    };
    let help = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState) {
    match &state.mode {
        Mode::Amount(prompt) => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title(prompt.target.title());
            let p = Paragraph::new(format!(
                "Amount (Gwei): {}_\nEnter=confirm Esc=cancel",
                prompt.input
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::CommandLine(line) => {
            let area = centered_rect(60, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Command");
            let p = Paragraph::new(format!(
                ":{line}_\nEnter=run Esc=cancel (`help` lists commands)"
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit the game? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
