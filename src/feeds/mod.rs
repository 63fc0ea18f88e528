//! Collaborator seams.
//!
//! The engine never fetches market data or margin figures itself. Callers
//! implement these traits (broker REST clients, replay files, the in-memory
//! `StaticMarketBook`) and the engine consumes the already-resolved values.
//! Errors from an implementation are returned to the caller unchanged.

pub mod static_book;
pub mod types;

use crate::errors::{EngineError, EngineResult};
use crate::models::greeks::Greeks;
use crate::models::OptionSide;
use crate::risk::margin::Position;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Raw SPAN / exposure figures as quoted by the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMargin {
    #[serde(default)]
    pub span: f64,
    #[serde(default)]
    pub exposure: f64,
}

impl RawMargin {
    #[inline]
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            span: self.span * factor,
            exposure: self.exposure * factor,
        }
    }
}

/// Broker margin figures for one past trading day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedMargin {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub raw: RawMargin,
}

pub trait MarketDataProvider: Send + Sync {
    fn underlying_price(&self, instrument: &str) -> impl Future<Output = EngineResult<f64>> + Send;

    fn option_chain(
        &self,
        instrument: &str,
        expiry: NaiveDate,
        side: OptionSide,
    ) -> impl Future<Output = EngineResult<OptionChain>> + Send;

    /// Daily bars for one contract between `from` and `to` inclusive, oldest first.
    fn historical_data(
        &self,
        instrument: &str,
        strike: f64,
        side: OptionSide,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = EngineResult<Vec<HistoricalBar>>> + Send;
}

pub trait RawMarginProvider: Send + Sync {
    fn fetch_margin_requirements(&self, position: &Position) -> impl Future<Output = EngineResult<RawMargin>> + Send;

    /// The most recent `days` daily records for the contract and direction
    /// of `position`, oldest first.
    fn margin_history(
        &self,
        position: &Position,
        days: u32,
    ) -> impl Future<Output = EngineResult<Vec<DatedMargin>>> + Send;
}

/// Inclusive strike filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrikeRange {
    pub lower: f64,
    pub upper: f64,
}

impl StrikeRange {
    pub fn new(lower: f64, upper: f64) -> EngineResult<Self> {
        if !(lower < upper) {
            return Err(EngineError::Validation(format!(
                "upper bound must be greater than lower bound ({lower} >= {upper})"
            )));
        }
        Ok(Self { lower, upper })
    }

    #[inline]
    pub fn contains(&self, strike: f64) -> bool {
        strike >= self.lower && strike <= self.upper
    }
}

/// One strike of an option chain, normalised from the broker payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub strike_price: f64,
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_qty: u64,
    pub ask_qty: u64,
    pub oi: u64,
    pub volume: u64,
    /// Implied volatility in percent, as brokers quote it (15.0 = 15%)
    pub iv: f64,
    /// Broker-computed Greeks, when the payload carried any
    pub greeks: Option<Greeks>,
}

impl OptionQuote {
    /// Implied volatility in the decimal form `MarketInputs` expects.
    #[inline]
    pub fn implied_volatility(&self) -> f64 {
        self.iv / 100.0
    }

    /// Price a taker pays for calls, receives for puts.
    #[inline]
    pub fn reference_price(&self, side: OptionSide) -> f64 {
        match side {
            OptionSide::Call => self.ask_price,
            OptionSide::Put => self.bid_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub instrument: String,
    pub expiry: NaiveDate,
    pub side: OptionSide,
    /// Sorted by strike, ascending
    pub quotes: Vec<OptionQuote>,
}

impl OptionChain {
    pub fn new(instrument: &str, expiry: NaiveDate, side: OptionSide, mut quotes: Vec<OptionQuote>) -> Self {
        quotes.sort_by(|a, b| a.strike_price.total_cmp(&b.strike_price));
        Self {
            instrument: instrument.to_string(),
            expiry,
            side,
            quotes,
        }
    }

    /// Normalise a raw broker chain, keeping only strikes inside `range`.
    pub fn from_raw(
        instrument: &str,
        expiry: NaiveDate,
        side: OptionSide,
        raw: types::RawOptionChain,
        range: Option<StrikeRange>,
    ) -> Self {
        let total = raw.data.len();
        let quotes: Vec<OptionQuote> = raw
            .data
            .into_iter()
            .map(types::RawOptionRow::into_quote)
            .filter(|q| range.map_or(true, |r| r.contains(q.strike_price)))
            .collect();

        tracing::debug!(
            instrument,
            side = %side,
            kept = quotes.len(),
            total,
            "option chain normalised"
        );

        Self::new(instrument, expiry, side, quotes)
    }

    pub fn quote(&self, strike: f64) -> Option<&OptionQuote> {
        self.quotes
            .binary_search_by(|q| q.strike_price.total_cmp(&strike))
            .ok()
            .map(|i| &self.quotes[i])
    }

    #[inline]
    pub fn strikes(&self) -> impl Iterator<Item = f64> + '_ {
        self.quotes.iter().map(|q| q.strike_price)
    }
}

/// One daily OHLC bar of option history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub oi: u64,
}

impl HistoricalBar {
    /// Normalise a raw broker history payload into date order. Rows without
    /// a date are dropped.
    pub fn from_raw(raw: types::RawHistoricalData) -> Vec<Self> {
        let total = raw.data.len();
        let mut bars: Vec<Self> = raw
            .data
            .into_iter()
            .filter_map(types::RawHistoricalRow::into_bar)
            .collect();
        bars.sort_by_key(|b| b.date);

        tracing::debug!(kept = bars.len(), total, "historical bars normalised");
        bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expiry() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 29).unwrap()
    }

    const CHAIN_JSON: &str = r#"{
        "data": [
            {"strikePrice": 20100, "bidPrice": 80.5, "askPrice": 82.0, "openInterest": 1200, "impliedVolatility": 13.2},
            {"strikePrice": 19900, "bidPrice": 190.0, "askPrice": 192.5, "bidQty": 500, "askQty": 450,
             "openInterest": 3000, "volume": 9000, "impliedVolatility": 14.1,
             "delta": 0.62, "gamma": 0.0004, "theta": -9.5, "vega": 12.0},
            {"strikePrice": 20000, "bidPrice": 130.0, "askPrice": 131.0, "volume": 5000}
        ]
    }"#;

    #[test]
    fn test_from_raw_sorts_and_defaults() {
        let raw: types::RawOptionChain = serde_json::from_str(CHAIN_JSON).unwrap();
        let chain = OptionChain::from_raw("NIFTY", expiry(), OptionSide::Call, raw, None);

        let strikes: Vec<f64> = chain.strikes().collect();
        assert_eq!(strikes, vec![19_900.0, 20_000.0, 20_100.0]);

        let atm = chain.quote(20_000.0).unwrap();
        assert_eq!(atm.oi, 0);
        assert_eq!(atm.iv, 0.0);
        assert!(atm.greeks.is_none());

        let itm = chain.quote(19_900.0).unwrap();
        assert_eq!(itm.bid_qty, 500);
        assert!((itm.implied_volatility() - 0.141).abs() < 1e-12);
        assert_eq!(itm.greeks.unwrap().delta, 0.62);
    }

    #[test]
    fn test_strike_filter_inclusive() {
        let raw: types::RawOptionChain = serde_json::from_str(CHAIN_JSON).unwrap();
        let range = StrikeRange::new(19_950.0, 20_100.0).unwrap();
        let chain = OptionChain::from_raw("NIFTY", expiry(), OptionSide::Call, raw, Some(range));
        let strikes: Vec<f64> = chain.strikes().collect();
        assert_eq!(strikes, vec![20_000.0, 20_100.0]);
        assert!(chain.quote(19_900.0).is_none());
    }

    #[test]
    fn test_strike_range_ordering() {
        assert!(StrikeRange::new(20_000.0, 19_000.0).is_err());
        assert!(StrikeRange::new(20_000.0, 20_000.0).is_err());
    }

    #[test]
    fn test_reference_price_by_side() {
        let q = OptionQuote { bid_price: 10.0, ask_price: 11.0, ..OptionQuote::default() };
        assert_eq!(q.reference_price(OptionSide::Call), 11.0);
        assert_eq!(q.reference_price(OptionSide::Put), 10.0);
    }

    #[test]
    fn test_history_sorted_and_undated_rows_dropped() {
        let raw: types::RawHistoricalData = serde_json::from_str(
            r#"{
                "data": [
                    {"date": "2026-10-14", "open": 120, "high": 131, "low": 118, "close": 130, "volume": 9000, "openInterest": 4000},
                    {"open": 1, "close": 2},
                    {"date": "2026-10-13", "close": 118.5}
                ]
            }"#,
        )
        .unwrap();
        let bars = HistoricalBar::from_raw(raw);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2026, 10, 13).unwrap());
        assert_eq!(bars[0].close, 118.5);
        assert_eq!(bars[0].open, 0.0);
        assert_eq!(bars[0].oi, 0);
        assert_eq!(bars[1].high, 131.0);
        assert_eq!(bars[1].oi, 4000);
    }

    #[test]
    fn test_dated_margin_flat_wire_shape() {
        let m: DatedMargin = serde_json::from_str(r#"{"date": "2026-10-15", "span": 9000}"#).unwrap();
        assert_eq!(m.raw, RawMargin { span: 9_000.0, exposure: 0.0 });
    }

    #[test]
    fn test_raw_margin_defaults() {
        let m: RawMargin = serde_json::from_str(r#"{"span": 10000}"#).unwrap();
        assert_eq!(m, RawMargin { span: 10_000.0, exposure: 0.0 });
        assert_eq!(m.scale(2.0).span, 20_000.0);
    }
}
