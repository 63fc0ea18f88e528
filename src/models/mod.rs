pub mod black_scholes;
pub mod greeks;

use crate::errors::{DomainError, EngineError, EngineResult};
use serde::{Deserialize, Serialize};

/// Calendar days per year used to turn days-to-expiry into T.
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Option side, quoted on NSE as CE / PE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionSide {
    #[serde(rename = "CE", alias = "CALL", alias = "call")]
    Call,
    #[serde(rename = "PE", alias = "PUT", alias = "put")]
    Put,
}

impl OptionSide {
    #[inline]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Call => "CE",
            Self::Put => "PE",
        }
    }
}

impl std::fmt::Display for OptionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for OptionSide {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CE" => Ok(Self::Call),
            "PE" => Ok(Self::Put),
            other => Err(EngineError::Validation(format!(
                "side must be either 'CE' or 'PE', got '{other}'"
            ))),
        }
    }
}

/// Market inputs for one contract. Supplied by the caller, already fetched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketInputs {
    pub underlying_price: f64,
    pub strike_price: f64,
    pub days_to_expiry: u32,
    /// Annualized, decimal form (0.20 = 20%)
    pub volatility: f64,
    pub side: OptionSide,
}

/// d1/d2 and the intermediate terms shared by pricing and Greeks.
///
/// Both `BlackScholes::price` and `BlackScholes::greeks` go through this one
/// constructor, so a price and its Greeks always see identical floats.
/// Stack-allocated, Copy.
#[derive(Debug, Clone, Copy)]
pub struct BsTerms {
    pub spot: f64,
    pub strike: f64,
    pub rate: f64,
    pub sigma: f64,
    pub ttl_years: f64,
    pub sqrt_t: f64,
    pub sigma_sqrt_t: f64,
    /// e^(-rT)
    pub discount: f64,
    pub d1: f64,
    pub d2: f64,
}

impl BsTerms {
    /// Fails with a `DomainError` wherever d1/d2 would divide by zero or
    /// take the log of a non-positive ratio.
    pub fn new(market: &MarketInputs, rate: f64) -> EngineResult<Self> {
        let spot = market.underlying_price;
        let strike = market.strike_price;
        let sigma = market.volatility;

        if !(spot.is_finite() && spot > 0.0) {
            return Err(DomainError::NonPositivePrice { field: "underlying_price", value: spot }.into());
        }
        if !(strike.is_finite() && strike > 0.0) {
            return Err(DomainError::NonPositivePrice { field: "strike_price", value: strike }.into());
        }
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(DomainError::NonPositiveVolatility(sigma).into());
        }
        if market.days_to_expiry == 0 {
            return Err(DomainError::ZeroTimeToExpiry.into());
        }

        let ttl_years = market.days_to_expiry as f64 / DAYS_PER_YEAR;
        let sqrt_t = ttl_years.sqrt();
        let sigma_sqrt_t = sigma * sqrt_t;
        let d1 = ((spot / strike).ln() + (rate + 0.5 * sigma * sigma) * ttl_years) / sigma_sqrt_t;
        let d2 = d1 - sigma_sqrt_t;

        if !d1.is_finite() || !d2.is_finite() {
            return Err(DomainError::NonFinite("d1/d2").into());
        }

        Ok(Self {
            spot,
            strike,
            rate,
            sigma,
            ttl_years,
            sqrt_t,
            sigma_sqrt_t,
            discount: (-rate * ttl_years).exp(),
            d1,
            d2,
        })
    }
}
