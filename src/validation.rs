//! Input validation run before any core computation.
//!
//! Covers request well-formedness only. Numeric edge cases (zero volatility,
//! zero days to expiry) are left to the models, which reject them with a
//! `DomainError`.

use crate::errors::{EngineError, EngineResult};
use crate::feeds::StrikeRange;
use crate::models::OptionSide;
use crate::risk::margin::Position;
use chrono::NaiveDate;

/// Upper-case ASCII letters only, e.g. NIFTY.
pub fn validate_instrument(name: &str) -> EngineResult<()> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_uppercase()) {
        return Err(EngineError::Validation(format!("invalid instrument name format: '{name}'")));
    }
    Ok(())
}

/// Strict `YYYY-MM-DD`, strictly after `today`.
pub fn validate_expiry(expiry: &str, today: NaiveDate) -> EngineResult<NaiveDate> {
    let well_formed = expiry.len() == 10
        && expiry.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(EngineError::Validation(format!(
            "invalid date format '{expiry}', use YYYY-MM-DD"
        )));
    }

    let date = NaiveDate::parse_from_str(expiry, "%Y-%m-%d")
        .map_err(|e| EngineError::Validation(format!("invalid date '{expiry}': {e}")))?;
    if date <= today {
        return Err(EngineError::Validation(format!("expiry date {date} must be in the future")));
    }
    Ok(date)
}

/// A validated option-chain request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRequest {
    pub instrument: String,
    pub expiry: NaiveDate,
    pub side: OptionSide,
    pub strike_range: Option<StrikeRange>,
}

pub fn validate_chain_request(
    instrument: &str,
    expiry: &str,
    side: &str,
    strike_range: Option<(f64, f64)>,
    today: NaiveDate,
) -> EngineResult<ChainRequest> {
    validate_instrument(instrument)?;
    let expiry = validate_expiry(expiry, today)?;
    let side = side.parse::<OptionSide>()?;
    let strike_range = strike_range
        .map(|(lower, upper)| StrikeRange::new(lower, upper))
        .transpose()?;

    Ok(ChainRequest {
        instrument: instrument.to_string(),
        expiry,
        side,
        strike_range,
    })
}

/// History window with `from` on or before `to`.
pub fn validate_history_window(from: NaiveDate, to: NaiveDate) -> EngineResult<()> {
    if from > to {
        return Err(EngineError::Validation(format!("history window start {from} is after end {to}")));
    }
    Ok(())
}

/// Side and position type are enforced by their types; this checks the rest.
pub fn validate_position(position: &Position) -> EngineResult<()> {
    validate_instrument(&position.instrument_name)?;
    if !(position.strike_price.is_finite() && position.strike_price > 0.0) {
        return Err(EngineError::Validation(format!(
            "strike price must be positive, got {}",
            position.strike_price
        )));
    }
    if position.qty == 0 {
        return Err(EngineError::Validation("quantity must be positive".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::margin::PositionType;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[test]
    fn test_instrument_format() {
        assert!(validate_instrument("NIFTY").is_ok());
        assert!(validate_instrument("BANKNIFTY").is_ok());
        assert!(validate_instrument("nifty").is_err());
        assert!(validate_instrument("NIFTY50").is_err());
        assert!(validate_instrument("").is_err());
    }

    #[test]
    fn test_expiry_format_and_future() {
        assert_eq!(
            validate_expiry("2026-10-29", today()).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 29).unwrap()
        );
        assert!(validate_expiry("2026-10-16", today()).is_err(), "today is not in the future");
        assert!(validate_expiry("2026-1-29", today()).is_err());
        assert!(validate_expiry("29-10-2026", today()).is_err());
        assert!(validate_expiry("2026-02-30", today()).is_err());
    }

    #[test]
    fn test_chain_request() {
        let req = validate_chain_request("NIFTY", "2026-10-29", "PE", Some((19_000.0, 21_000.0)), today()).unwrap();
        assert_eq!(req.side, OptionSide::Put);
        assert!(req.strike_range.unwrap().contains(20_000.0));

        assert!(validate_chain_request("NIFTY", "2026-10-29", "XX", None, today()).is_err());
        assert!(validate_chain_request("NIFTY", "2026-10-29", "CE", Some((21_000.0, 19_000.0)), today()).is_err());
    }

    #[test]
    fn test_history_window() {
        let d = |day| NaiveDate::from_ymd_opt(2026, 10, day).unwrap();
        assert!(validate_history_window(d(1), d(15)).is_ok());
        assert!(validate_history_window(d(15), d(15)).is_ok());
        assert!(validate_history_window(d(16), d(15)).is_err());
    }

    #[test]
    fn test_position_rules() {
        let mut p = Position {
            instrument_name: "NIFTY".into(),
            strike_price: 20_000.0,
            side: OptionSide::Call,
            qty: 1,
            position_type: PositionType::Sell,
        };
        assert!(validate_position(&p).is_ok());

        p.qty = 0;
        assert!(validate_position(&p).is_err());

        p.qty = 1;
        p.strike_price = 0.0;
        assert!(validate_position(&p).is_err());
    }
}
