//! Native currency unit conversion
//!
//! Converts decimal strings such as `"0.5"` in a named unit (`"ether"`,
//! `"gwei"`, ...) to wei and back. Parsing is delegated to
//! `alloy_primitives::utils`.

use crate::errors::{LabError, Result};
use crate::types::Wei;
use alloy_primitives::utils::{format_units, parse_units, ParseUnits};

/// Decimals of a named unit, following the web3 unit table
pub fn unit_decimals(unit: &str) -> Result<u8> {
    let decimals = match unit.to_ascii_lowercase().as_str() {
        "wei" => 0,
        "kwei" | "babbage" | "femtoether" => 3,
        "mwei" | "lovelace" | "picoether" => 6,
        "gwei" | "shannon" | "nanoether" | "nano" => 9,
        "szabo" | "microether" | "micro" => 12,
        "finney" | "milliether" | "milli" => 15,
        "ether" | "eth" => 18,
        "kether" | "grand" => 21,
        "mether" => 24,
        "gether" => 27,
        "tether" => 30,
        other => return Err(LabError::InvalidAmount(format!("unknown unit `{other}`"))),
    };
    Ok(decimals)
}

/// Convert `amount` expressed in `unit` to wei
///
/// ```rust,ignore
/// assert_eq!(to_wei("0.5", "ether")?, U256::from(500_000_000_000_000_000u64));
/// ```
pub fn to_wei(amount: &str, unit: &str) -> Result<Wei> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(LabError::InvalidAmount("empty amount".into()));
    }
    if amount.starts_with('-') {
        return Err(LabError::InvalidAmount(format!("negative amount `{amount}`")));
    }
    let decimals = unit_decimals(unit)?;
    // parse_units would silently drop the excess digits
    if let Some((_, fraction)) = amount.split_once('.') {
        if fraction.trim_end_matches('0').len() > usize::from(decimals) {
            return Err(LabError::InvalidAmount(format!(
                "`{amount}` has more than {decimals} decimal places in {unit}"
            )));
        }
    }
    match parse_units(amount, decimals)? {
        ParseUnits::U256(wei) => Ok(wei),
        ParseUnits::I256(wei) => Ok(wei.unsigned_abs()),
    }
}

/// Parse `"<amount> <unit>"`, e.g. `"0.5 ether"`; a bare number is wei
pub fn parse_amount(input: &str) -> Result<Wei> {
    let mut parts = input.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(amount), Some(unit), None) => to_wei(amount, unit),
        (Some(amount), None, None) => to_wei(amount, "wei"),
        _ => Err(LabError::InvalidAmount(format!(
            "expected `<amount> <unit>`, got `{input}`"
        ))),
    }
}

/// Render a wei amount in `unit`
pub fn format_amount(wei: Wei, unit: &str) -> Result<String> {
    Ok(format_units(wei, unit_decimals(unit)?)?)
}

/// Render a wei amount as ether, trimming trailing zeros
pub fn format_ether(wei: Wei) -> String {
    match format_amount(wei, "ether") {
        Ok(s) if s.contains('.') => {
            let trimmed = s.trim_end_matches('0').trim_end_matches('.');
            format!("{trimmed} ETH")
        }
        Ok(s) => format!("{s} ETH"),
        Err(_) => format!("{wei} wei"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{U256, WEI_PER_ETHER, WEI_PER_GWEI};

    #[test]
    fn test_half_ether() {
        let wei = to_wei("0.5", "ether").unwrap();
        assert_eq!(wei, U256::from(WEI_PER_ETHER / 2));
        assert_eq!(wei.to_string(), "500000000000000000");
    }

    #[test]
    fn test_named_units() {
        assert_eq!(to_wei("1", "gwei").unwrap(), U256::from(WEI_PER_GWEI));
        assert_eq!(to_wei("1", "finney").unwrap(), U256::from(10u128.pow(15)));
        assert_eq!(to_wei("42", "wei").unwrap(), U256::from(42u64));
        assert_eq!(to_wei("2", "ETHER").unwrap(), U256::from(2 * WEI_PER_ETHER));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(
            parse_amount("0.5 ether").unwrap(),
            U256::from(WEI_PER_ETHER / 2)
        );
        assert_eq!(parse_amount("1000").unwrap(), U256::from(1000u64));
        assert!(parse_amount("1 ether extra").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn test_rejects_bad_amounts() {
        assert!(to_wei("-1", "ether").is_err());
        assert!(to_wei("abc", "ether").is_err());
        assert!(to_wei("1", "lightyear").is_err());
    }

    #[test]
    fn test_rejects_sub_wei_precision() {
        assert!(matches!(to_wei("0.5", "wei"), Err(LabError::InvalidAmount(_))));
        assert!(matches!(
            to_wei("1.0000000000000000001", "ether"),
            Err(LabError::InvalidAmount(_))
        ));
        assert!(parse_amount("1.5 wei").is_err());
        assert!(to_wei("1.5", "kwei").is_ok());

        // trailing zeros carry no precision
        assert_eq!(to_wei("3.000", "wei").unwrap(), U256::from(3u64));
        assert_eq!(
            to_wei("0.000000000000000001", "ether").unwrap(),
            U256::from(1u64)
        );
    }

    #[test]
    fn test_format_ether() {
        assert_eq!(format_ether(U256::from(WEI_PER_ETHER / 2)), "0.5 ETH");
        assert_eq!(format_ether(U256::from(3 * WEI_PER_ETHER)), "3 ETH");
        assert_eq!(format_ether(U256::ZERO), "0 ETH");
    }
}
