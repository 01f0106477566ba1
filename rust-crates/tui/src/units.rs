//! Conversions between wei, the contract's unit, and Gwei, the unit players type
//! and read.

pub const WEI_PER_GWEI: u128 = 1_000_000_000;
const GWEI_DECIMALS: usize = 9;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("'{0}' is not a Gwei amount")]
    Invalid(String),
    #[error("'{0}' has more than 9 decimal places; the smallest unit is 1 wei")]
    TooPrecise(String),
    #[error("'{0}' is too large")]
    TooLarge(String),
}

/// Parses a decimal Gwei amount into wei without going through floating point.
///
/// The result is signed so callers can report non-positive amounts with their own
/// error instead of a parse failure.
pub fn parse_gwei(raw: &str) -> Result<i128, AmountError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (digits, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(AmountError::Invalid(trimmed.to_string()));
    }
    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if !is_digits(whole) || !is_digits(fraction) {
        return Err(AmountError::Invalid(trimmed.to_string()));
    }
    if fraction.len() > GWEI_DECIMALS {
        return Err(AmountError::TooPrecise(trimmed.to_string()));
    }

    let too_large = || AmountError::TooLarge(trimmed.to_string());
    let whole_value: i128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| too_large())?
    };
    let fraction_value: i128 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{fraction:0<width$}", width = GWEI_DECIMALS);
        padded.parse().map_err(|_| too_large())?
    };

    let wei = whole_value
        .checked_mul(WEI_PER_GWEI as i128)
        .and_then(|w| w.checked_add(fraction_value))
        .ok_or_else(too_large)?;
    Ok(if negative { -wei } else { wei })
}

/// Formats wei as Gwei, dropping trailing zeros from the fractional part.
pub fn format_gwei(wei: u128) -> String {
    let whole = wei / WEI_PER_GWEI;
    let fraction = wei % WEI_PER_GWEI;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{fraction:0>width$}", width = GWEI_DECIMALS);
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

/// `format_gwei` for error messages that hold a reference to the amount.
pub(crate) fn gwei(wei: &u128) -> String {
    format_gwei(*wei)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn parse_gwei__converts_whole_and_fractional_amounts_exactly() {
        assert_eq!(parse_gwei("1").unwrap(), 1_000_000_000);
        assert_eq!(parse_gwei("0.5").unwrap(), 500_000_000);
        assert_eq!(parse_gwei(".000000001").unwrap(), 1);
        assert_eq!(parse_gwei(" 12.25 ").unwrap(), 12_250_000_000);
        assert_eq!(parse_gwei("0.1").unwrap() * 3, parse_gwei("0.3").unwrap());
    }

    #[test]
    fn parse_gwei__keeps_sign_of_negative_and_zero_amounts() {
        assert_eq!(parse_gwei("-2").unwrap(), -2_000_000_000);
        assert_eq!(parse_gwei("0").unwrap(), 0);
        assert_eq!(parse_gwei("-0.0").unwrap(), 0);
    }

    #[test]
    fn parse_gwei__rejects_malformed_input() {
        assert_eq!(parse_gwei(""), Err(AmountError::Empty));
        assert!(matches!(parse_gwei("."), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_gwei("1e9"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_gwei("1.2.3"), Err(AmountError::Invalid(_))));
        assert!(matches!(parse_gwei("abc"), Err(AmountError::Invalid(_))));
    }

    #[test]
    fn parse_gwei__rejects_sub_wei_precision() {
        assert!(matches!(
            parse_gwei("0.0000000001"),
            Err(AmountError::TooPrecise(_))
        ));
    }

    #[test]
    fn parse_gwei__rejects_overflow() {
        let huge = "9".repeat(40);
        assert!(matches!(parse_gwei(&huge), Err(AmountError::TooLarge(_))));
    }

    #[test]
    fn format_gwei__trims_trailing_zeros() {
        assert_eq!(format_gwei(0), "0");
        assert_eq!(format_gwei(4_000_000_000), "4");
        assert_eq!(format_gwei(1_500_000_000), "1.5");
        assert_eq!(format_gwei(5), "0.000000005");
    }
}
