use std::{
    fmt,
    str::FromStr,
};

use crate::{
    game_state::GameState,
    units::gwei,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BetType {
    SingleNumber,
    EvenOdd,
    RedBlack,
    Column,
    Dozen,
    Half,
}

impl BetType {
    pub const ALL: [BetType; 6] = [
        BetType::SingleNumber,
        BetType::EvenOdd,
        BetType::RedBlack,
        BetType::Column,
        BetType::Dozen,
        BetType::Half,
    ];

    /// Wire code used in the `betType` field of a submitted bet.
    pub fn code(self) -> u8 {
        match self {
            BetType::SingleNumber => 0,
            BetType::EvenOdd => 1,
            BetType::RedBlack => 2,
            BetType::Column => 3,
            BetType::Dozen => 4,
            BetType::Half => 5,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|bet_type| bet_type.code() == code)
            .ok_or(ValidationError::UnknownBetType(code))
    }

    pub fn label(self) -> &'static str {
        match self {
            BetType::SingleNumber => "Number",
            BetType::EvenOdd => "Even/Odd",
            BetType::RedBlack => "Red/Black",
            BetType::Column => "Column",
            BetType::Dozen => "Dozen",
            BetType::Half => "Half",
        }
    }

    pub fn max_selector(self) -> u8 {
        match self {
            BetType::SingleNumber => 36,
            BetType::EvenOdd | BetType::RedBlack | BetType::Half => 1,
            BetType::Column | BetType::Dozen => 2,
        }
    }

    pub fn accepts(self, selector: i64) -> bool {
        (0..=i64::from(self.max_selector())).contains(&selector)
    }

    fn selector_names(self) -> &'static [&'static str] {
        match self {
            BetType::SingleNumber => &[],
            BetType::EvenOdd => &["Even", "Odd"],
            BetType::RedBlack => &["Red", "Black"],
            BetType::Column | BetType::Dozen => &["First", "Second", "Third"],
            BetType::Half => &["First", "Second"],
        }
    }

    pub fn selector_label(self, selector: u8) -> String {
        self.selector_names()
            .get(usize::from(selector))
            .map(|name| name.to_string())
            .unwrap_or_else(|| selector.to_string())
    }

    /// Accepts either the numeric selector or its display name (`red`, `odd`, `second`).
    pub fn parse_selector(self, raw: &str) -> Option<i64> {
        if let Ok(value) = raw.trim().parse::<i64>() {
            return Some(value);
        }
        self.selector_names()
            .iter()
            .position(|name| name.eq_ignore_ascii_case(raw.trim()))
            .map(|index| index as i64)
    }
}

impl fmt::Display for BetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        if let Ok(code) = needle.parse::<u8>() {
            return BetType::from_code(code).map_err(|e| e.to_string());
        }
        match needle.as_str() {
            "number" | "single" | "straight" => Ok(BetType::SingleNumber),
            "evenodd" | "even-odd" | "parity" => Ok(BetType::EvenOdd),
            "redblack" | "red-black" | "color" | "colour" => Ok(BetType::RedBlack),
            "column" => Ok(BetType::Column),
            "dozen" => Ok(BetType::Dozen),
            "half" => Ok(BetType::Half),
            other => Err(format!("unknown bet type '{other}'")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Pending,
    Won { payout: u128 },
    Lost,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bet {
    pub bet_type: BetType,
    pub selector: u8,
    /// Wei.
    pub stake: u128,
    pub outcome: Outcome,
}

impl Bet {
    pub fn submission(&self) -> BetSubmission {
        BetSubmission {
            bet_type: self.bet_type.code(),
            selector: self.selector,
            stake: self.stake,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == Outcome::Pending
    }

    pub fn describe(&self) -> String {
        match self.bet_type {
            BetType::SingleNumber => format!("Number {}", self.selector),
            other => format!("{} {}", other.label(), other.selector_label(self.selector)),
        }
    }
}

/// Wire form of a bet as passed to `roll`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BetSubmission {
    pub bet_type: u8,
    pub selector: u8,
    pub stake: u128,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("selector {selector} is not valid for a {bet_type} bet (0-{max})", max = .bet_type.max_selector())]
    OutOfRange { bet_type: BetType, selector: i64 },
    #[error("bet amount must be greater than zero")]
    NonPositiveStake,
    #[error(
        "insufficient balance: bet of {} Gwei exceeds balance of {} Gwei",
        gwei(.stake),
        gwei(.balance)
    )]
    InsufficientBalance { stake: u128, balance: u128 },
    #[error(
        "bet of {} Gwei exceeds the maximum bet of {} Gwei",
        gwei(.stake),
        gwei(.max_bet)
    )]
    ExceedsMaxBet { stake: u128, max_bet: u128 },
    #[error("unknown bet type code {0}")]
    UnknownBetType(u8),
}

/// Checks a candidate bet against the selector range of its type and the limits
/// in `state`, in that order.
pub fn validate(
    bet_type: BetType,
    selector: i64,
    stake: i128,
    state: &GameState,
) -> Result<Bet, ValidationError> {
    if !bet_type.accepts(selector) {
        return Err(ValidationError::OutOfRange { bet_type, selector });
    }
    if stake <= 0 {
        return Err(ValidationError::NonPositiveStake);
    }
    let stake = stake as u128;
    if stake > state.player_balance {
        return Err(ValidationError::InsufficientBalance {
            stake,
            balance: state.player_balance,
        });
    }
    if stake > state.max_bet {
        return Err(ValidationError::ExceedsMaxBet {
            stake,
            max_bet: state.max_bet,
        });
    }
    Ok(Bet {
        bet_type,
        selector: selector as u8,
        stake,
        outcome: Outcome::Pending,
    })
}
