use crate::feeds::{HistoricalBar, OptionQuote};
use crate::models::greeks::Greeks;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Option chain ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOptionChain {
    #[serde(default)]
    pub data: Vec<RawOptionRow>,
}

/// One row of a broker option-chain payload. Every field is optional;
/// brokers drop keys they have no value for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOptionRow {
    pub strike_price: Option<f64>,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
    pub bid_qty: Option<f64>,
    pub ask_qty: Option<f64>,
    pub open_interest: Option<f64>,
    pub volume: Option<f64>,
    pub implied_volatility: Option<f64>,
    pub delta: Option<f64>,
    pub gamma: Option<f64>,
    pub theta: Option<f64>,
    pub vega: Option<f64>,
}

impl RawOptionRow {
    #[inline]
    fn has_greeks(&self) -> bool {
        self.delta.is_some() || self.gamma.is_some() || self.theta.is_some() || self.vega.is_some()
    }

    pub fn into_quote(self) -> OptionQuote {
        let greeks = self.has_greeks().then(|| Greeks {
            delta: self.delta.unwrap_or(0.0),
            gamma: self.gamma.unwrap_or(0.0),
            theta: self.theta.unwrap_or(0.0),
            vega: self.vega.unwrap_or(0.0),
        });

        OptionQuote {
            strike_price: self.strike_price.unwrap_or(0.0),
            bid_price: self.bid_price.unwrap_or(0.0),
            ask_price: self.ask_price.unwrap_or(0.0),
            bid_qty: count(self.bid_qty),
            ask_qty: count(self.ask_qty),
            oi: count(self.open_interest),
            volume: count(self.volume),
            iv: self.implied_volatility.unwrap_or(0.0),
            greeks,
        }
    }
}

// ── Historical bars ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHistoricalData {
    #[serde(default)]
    pub data: Vec<RawHistoricalRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHistoricalRow {
    pub date: Option<NaiveDate>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub open_interest: Option<f64>,
}

impl RawHistoricalRow {
    /// `None` when the row carries no date.
    pub fn into_bar(self) -> Option<HistoricalBar> {
        Some(HistoricalBar {
            date: self.date?,
            open: self.open.unwrap_or(0.0),
            high: self.high.unwrap_or(0.0),
            low: self.low.unwrap_or(0.0),
            close: self.close.unwrap_or(0.0),
            volume: count(self.volume),
            oi: count(self.open_interest),
        })
    }
}

#[inline]
fn count(v: Option<f64>) -> u64 {
    v.filter(|x| x.is_finite() && *x > 0.0).map_or(0, |x| x as u64)
}
