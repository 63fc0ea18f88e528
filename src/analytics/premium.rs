use crate::errors::{DomainError, EngineError, EngineResult};
use crate::feeds::{MarketDataProvider, OptionChain};
use crate::instruments;
use crate::models::black_scholes::{BlackScholes, Valuation};
use crate::models::greeks::Greeks;
use crate::models::{MarketInputs, OptionSide, DAYS_PER_YEAR};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A payoff bound that may be infinite in principle.
///
/// Long calls have no upper bound on profit. That is represented here rather
/// than as `f64::INFINITY` so ratio code has to match on it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Bound {
    Finite(f64),
    Unbounded,
}

impl Bound {
    #[inline]
    pub fn finite(&self) -> Option<f64> {
        match self {
            Bound::Finite(v) => Some(*v),
            Bound::Unbounded => None,
        }
    }

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Bound::Unbounded)
    }

    #[inline]
    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Bound {
        match self {
            Bound::Finite(v) => Bound::Finite(f(v)),
            Bound::Unbounded => Bound::Unbounded,
        }
    }
}

/// How the per-year theta is turned into the decay rate the projector
/// multiplies by a day count.
///
/// `Annual` reproduces the historical numbers: |theta| is used as is, even
/// though theta is a per-year figure. `PerCalendarDay` divides by 365 first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThetaScaling {
    Annual,
    PerCalendarDay,
}

impl ThetaScaling {
    #[inline]
    pub fn daily_decay(self, theta_per_year: f64) -> f64 {
        match self {
            ThetaScaling::Annual => theta_per_year.abs(),
            ThetaScaling::PerCalendarDay => theta_per_year.abs() / DAYS_PER_YEAR,
        }
    }
}

impl std::str::FromStr for ThetaScaling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" => Ok(Self::Annual),
            "calendar_day" | "per_calendar_day" | "daily" => Ok(Self::PerCalendarDay),
            other => Err(format!("unknown theta scaling '{other}' (annual | calendar_day)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// |max_loss / max_profit|, 0 when max profit is unbounded or zero
    pub risk_reward_ratio: f64,
    /// (max_profit - premium) / premium * 100. An unbounded max profit
    /// yields `Bound::Unbounded` here, not an error.
    pub annual_return_potential: Bound,
    /// annual_return_potential / volatility
    pub volatility_adjusted_return: Bound,
}

impl RiskMetrics {
    pub fn compute(premium: f64, max_profit: Bound, max_loss: f64, volatility: f64) -> EngineResult<Self> {
        if premium <= 0.0 {
            return Err(DomainError::ZeroPremium.into());
        }
        if !(volatility.is_finite() && volatility > 0.0) {
            return Err(DomainError::NonPositiveVolatility(volatility).into());
        }

        let risk_reward_ratio = match max_profit {
            Bound::Finite(p) if p != 0.0 => (max_loss / p).abs(),
            _ => 0.0,
        };

        let annual_return_potential = max_profit.map(|p| (p - premium) / premium * 100.0);
        let volatility_adjusted_return = annual_return_potential.map(|r| r / volatility);

        Ok(Self {
            risk_reward_ratio,
            annual_return_potential,
            volatility_adjusted_return,
        })
    }
}

/// Per-position premium report. Immutable once built; every field derives
/// from the single `market` value it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumReport {
    pub market: MarketInputs,
    pub lot_size: u32,
    pub premium: f64,
    pub total_premium: f64,
    pub daily_theta_decay: f64,
    pub greeks: Greeks,
    /// `greeks` scaled by lot size
    pub position_greeks: Greeks,
    pub max_profit: Bound,
    pub max_loss: f64,
    pub risk_metrics: RiskMetrics,
}

impl PremiumReport {
    /// Assemble a report from a price and Greeks already computed for `market`.
    pub fn from_valuation(
        market: &MarketInputs,
        lot_size: u32,
        valuation: Valuation,
        theta_scaling: ThetaScaling,
    ) -> EngineResult<Self> {
        if lot_size == 0 {
            return Err(DomainError::ZeroLotSize.into());
        }

        let premium = valuation.price;
        let max_profit = max_profit(premium, market.strike_price, market.side);
        let max_loss = premium;
        let risk_metrics = RiskMetrics::compute(premium, max_profit, max_loss, market.volatility)?;

        Ok(Self {
            market: *market,
            lot_size,
            premium,
            total_premium: premium * lot_size as f64,
            daily_theta_decay: theta_scaling.daily_decay(valuation.greeks.theta),
            greeks: valuation.greeks,
            position_greeks: valuation.greeks.scale(lot_size as f64),
            max_profit,
            max_loss,
            risk_metrics,
        })
    }
}

/// One strike of a scanned chain: the model report beside the traded price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainScanEntry {
    pub strike_price: f64,
    pub reference_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<PremiumReport>,
    /// Model premium less reference price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Composes pricing, Greeks and payoff bounds into a `PremiumReport`.
#[derive(Debug, Clone)]
pub struct PremiumAnalyzer {
    model: BlackScholes,
    theta_scaling: ThetaScaling,
}

impl PremiumAnalyzer {
    pub fn new(model: BlackScholes, theta_scaling: ThetaScaling) -> Self {
        Self { model, theta_scaling }
    }

    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        Self::new(BlackScholes::new(config.risk_free_rate), config.theta_scaling)
    }

    #[inline]
    pub fn model(&self) -> &BlackScholes {
        &self.model
    }

    pub fn premium_report(&self, market: &MarketInputs, lot_size: u32) -> EngineResult<PremiumReport> {
        let valuation = self.model.valuation(market)?;
        let report = PremiumReport::from_valuation(market, lot_size, valuation, self.theta_scaling)?;

        tracing::debug!(
            side = %market.side,
            strike = market.strike_price,
            premium = report.premium,
            delta = report.greeks.delta,
            daily_decay = report.daily_theta_decay,
            "premium report built"
        );

        Ok(report)
    }

    /// Build a report from live collaborator data: spot and implied vol
    /// from the chain, days to expiry and lot size from reference data.
    pub async fn analyze_quoted<P: MarketDataProvider>(
        &self,
        provider: &P,
        instrument: &str,
        expiry: NaiveDate,
        side: OptionSide,
        strike: f64,
        today: NaiveDate,
    ) -> EngineResult<PremiumReport> {
        let lot_size = instruments::lot_size(instrument)
            .ok_or_else(|| EngineError::Validation(format!("unknown lot size for {instrument}")))?;

        let spot = provider.underlying_price(instrument).await?;
        let chain = provider.option_chain(instrument, expiry, side).await?;
        let quote = chain.quote(strike).ok_or_else(|| EngineError::MissingQuote {
            instrument: instrument.to_string(),
            strike,
        })?;

        let market = MarketInputs {
            underlying_price: spot,
            strike_price: strike,
            days_to_expiry: instruments::days_to_expiry(expiry, today),
            volatility: quote.implied_volatility(),
            side,
        };

        self.premium_report(&market, lot_size)
    }

    /// Price every strike of `chain` at its quoted implied volatility.
    ///
    /// A strike the model rejects (no IV, already expired) is reported with
    /// its error and does not stop the scan.
    pub fn scan_chain(
        &self,
        chain: &OptionChain,
        underlying_price: f64,
        lot_size: u32,
        today: NaiveDate,
    ) -> Vec<ChainScanEntry> {
        let days_to_expiry = instruments::days_to_expiry(chain.expiry, today);

        chain
            .quotes
            .iter()
            .map(|quote| {
                let market = MarketInputs {
                    underlying_price,
                    strike_price: quote.strike_price,
                    days_to_expiry,
                    volatility: quote.implied_volatility(),
                    side: chain.side,
                };
                let reference_price = quote.reference_price(chain.side);
                match self.premium_report(&market, lot_size) {
                    Ok(report) => ChainScanEntry {
                        strike_price: quote.strike_price,
                        reference_price,
                        edge: Some(report.premium - reference_price),
                        report: Some(report),
                        error: None,
                    },
                    Err(e) => {
                        tracing::debug!(strike = quote.strike_price, error = %e, "strike skipped in scan");
                        ChainScanEntry {
                            strike_price: quote.strike_price,
                            reference_price,
                            report: None,
                            edge: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .collect()
    }
}

/// Long-option convention: calls unbounded, puts capped at strike less premium.
#[inline]
fn max_profit(premium: f64, strike: f64, side: OptionSide) -> Bound {
    match side {
        OptionSide::Call => Bound::Unbounded,
        OptionSide::Put => Bound::Finite((strike - premium).max(0.0)),
    }
}
