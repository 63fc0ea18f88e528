use crate::errors::{DomainError, EngineResult};
use crate::models::greeks::Greeks;
use crate::models::{BsTerms, MarketInputs, OptionSide};
use statrs::distribution::{ContinuousCDF, Normal};

/// Black-Scholes European option pricing.
///
/// Call = S * Phi(d1) - K * e^(-rT) * Phi(d2)
/// Put  = K * e^(-rT) * Phi(-d2) - S * Phi(-d1)
///
/// where d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T)), d2 = d1 - sigma * sqrt(T)
/// and T = days_to_expiry / 365.
///
/// The risk-free rate is fixed at construction. Pure: no state changes after `new`.
#[derive(Debug, Clone)]
pub struct BlackScholes {
    risk_free_rate: f64,
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

/// Price and Greeks computed from the same `BsTerms`.
#[derive(Debug, Clone, Copy)]
pub struct Valuation {
    pub price: f64,
    pub greeks: Greeks,
}

impl Default for BlackScholes {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl BlackScholes {
    pub fn new(risk_free_rate: f64) -> Self {
        Self {
            risk_free_rate,
            normal: Normal::standard(),
        }
    }

    #[inline]
    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    #[inline]
    pub fn terms(&self, market: &MarketInputs) -> EngineResult<BsTerms> {
        BsTerms::new(market, self.risk_free_rate)
    }

    pub fn price(&self, market: &MarketInputs) -> EngineResult<f64> {
        let terms = self.terms(market)?;
        self.price_from_terms(&terms, market.side)
    }

    pub fn greeks(&self, market: &MarketInputs) -> EngineResult<Greeks> {
        let terms = self.terms(market)?;
        Greeks::from_terms(&terms, market.side, &self.normal)
    }

    /// Price and Greeks from a single d1/d2 evaluation.
    pub fn valuation(&self, market: &MarketInputs) -> EngineResult<Valuation> {
        let terms = self.terms(market)?;
        Ok(Valuation {
            price: self.price_from_terms(&terms, market.side)?,
            greeks: Greeks::from_terms(&terms, market.side, &self.normal)?,
        })
    }

    fn price_from_terms(&self, t: &BsTerms, side: OptionSide) -> EngineResult<f64> {
        let pv_strike = t.strike * t.discount;
        let price = match side {
            OptionSide::Call => t.spot * self.normal.cdf(t.d1) - pv_strike * self.normal.cdf(t.d2),
            OptionSide::Put => pv_strike * self.normal.cdf(-t.d2) - t.spot * self.normal.cdf(-t.d1),
        };

        if !price.is_finite() {
            return Err(DomainError::NonFinite("price").into());
        }
        // Cancellation deep out of the money can leave a tiny negative.
        Ok(price.max(0.0))
    }
}
