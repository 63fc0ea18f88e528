//! In-memory market data and margin book.
//!
//! Serves pre-fetched snapshots through the collaborator traits, for replay
//! of captured broker data and for tests. Lookups that miss behave like a
//! broker 404 so callers see the same error path as a live client.

use crate::errors::{EngineError, EngineResult};
use crate::feeds::types::RawHistoricalData;
use crate::feeds::{
    DatedMargin, HistoricalBar, MarketDataProvider, OptionChain, OptionQuote, RawMargin, RawMarginProvider,
};
use crate::models::OptionSide;
use crate::risk::margin::{Position, PositionType};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

type ChainKey = (String, NaiveDate, OptionSide);
type ContractKey = (String, u64, OptionSide);
type MarginKey = (String, u64, OptionSide, PositionType);

/// Per-lot margin quote for one contract and direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginQuote {
    pub instrument_name: String,
    pub strike_price: f64,
    pub side: OptionSide,
    #[serde(default)]
    pub position_type: PositionType,
    pub span: f64,
    pub exposure: f64,
}

/// Captured broker history rows for one contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySeries {
    pub instrument_name: String,
    pub strike_price: f64,
    pub side: OptionSide,
    #[serde(flatten)]
    pub raw: RawHistoricalData,
}

/// Per-lot daily margin records for one contract and direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarginHistoryQuote {
    pub instrument_name: String,
    pub strike_price: f64,
    pub side: OptionSide,
    #[serde(default)]
    pub position_type: PositionType,
    #[serde(default)]
    pub records: Vec<DatedMargin>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookSnapshot {
    #[serde(default)]
    pub underlying: HashMap<String, f64>,
    #[serde(default)]
    pub chains: Vec<OptionChain>,
    #[serde(default)]
    pub margins: Vec<MarginQuote>,
    #[serde(default)]
    pub history: Vec<HistorySeries>,
    #[serde(default)]
    pub margin_history: Vec<MarginHistoryQuote>,
}

#[derive(Debug, Clone, Default)]
pub struct StaticMarketBook {
    underlying: HashMap<String, f64>,
    chains: HashMap<ChainKey, Vec<OptionQuote>>,
    /// Quoted per lot; scaled by position qty on fetch
    margins: HashMap<MarginKey, RawMargin>,
    /// Date order
    history: HashMap<ContractKey, Vec<HistoricalBar>>,
    /// Per lot, date order
    margin_history: HashMap<MarginKey, Vec<DatedMargin>>,
}

impl StaticMarketBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: BookSnapshot) -> Self {
        let mut book = Self::new();
        for (instrument, price) in snapshot.underlying {
            book.set_underlying(&instrument, price);
        }
        for chain in snapshot.chains {
            for quote in chain.quotes {
                book.add_quote(&chain.instrument, chain.expiry, chain.side, quote);
            }
        }
        for m in snapshot.margins {
            book.margins.insert(
                margin_key(&m.instrument_name, m.strike_price, m.side, m.position_type),
                RawMargin { span: m.span, exposure: m.exposure },
            );
        }
        for series in snapshot.history {
            book.add_history(
                &series.instrument_name,
                series.strike_price,
                series.side,
                HistoricalBar::from_raw(series.raw),
            );
        }
        for m in snapshot.margin_history {
            book.margin_history
                .entry(margin_key(&m.instrument_name, m.strike_price, m.side, m.position_type))
                .or_default()
                .extend(m.records);
        }
        for records in book.margin_history.values_mut() {
            records.sort_by_key(|r| r.date);
        }
        tracing::info!(
            underlyings = book.underlying.len(),
            chains = book.chains.len(),
            margin_quotes = book.margins.len(),
            histories = book.history.len(),
            margin_histories = book.margin_history.len(),
            "static market book loaded"
        );
        book
    }

    pub fn set_underlying(&mut self, instrument: &str, price: f64) {
        self.underlying.insert(instrument.to_ascii_uppercase(), price);
    }

    pub fn add_quote(&mut self, instrument: &str, expiry: NaiveDate, side: OptionSide, quote: OptionQuote) {
        self.chains
            .entry((instrument.to_ascii_uppercase(), expiry, side))
            .or_default()
            .push(quote);
    }

    /// Store the per-lot margin for the contract and direction of `position`.
    pub fn set_margin(&mut self, position: &Position, per_lot: RawMargin) {
        self.margins.insert(
            margin_key(&position.instrument_name, position.strike_price, position.side, position.position_type),
            per_lot,
        );
    }

    pub fn add_history(
        &mut self,
        instrument: &str,
        strike: f64,
        side: OptionSide,
        bars: impl IntoIterator<Item = HistoricalBar>,
    ) {
        let series = self
            .history
            .entry((instrument.to_ascii_uppercase(), strike.to_bits(), side))
            .or_default();
        series.extend(bars);
        series.sort_by_key(|b| b.date);
    }

    /// Append per-lot daily margin records for the contract and direction of `position`.
    pub fn add_margin_history(&mut self, position: &Position, records: impl IntoIterator<Item = DatedMargin>) {
        let series = self
            .margin_history
            .entry(margin_key(&position.instrument_name, position.strike_price, position.side, position.position_type))
            .or_default();
        series.extend(records);
        series.sort_by_key(|r| r.date);
    }
}

fn margin_key(instrument: &str, strike: f64, side: OptionSide, position_type: PositionType) -> MarginKey {
    (instrument.to_ascii_uppercase(), strike.to_bits(), side, position_type)
}

fn not_found(what: String) -> EngineError {
    EngineError::Broker { status: 404, body: what }
}

impl MarketDataProvider for StaticMarketBook {
    async fn underlying_price(&self, instrument: &str) -> EngineResult<f64> {
        self.underlying
            .get(&instrument.to_ascii_uppercase())
            .copied()
            .ok_or_else(|| not_found(format!("no underlying price for {instrument}")))
    }

    async fn option_chain(&self, instrument: &str, expiry: NaiveDate, side: OptionSide) -> EngineResult<OptionChain> {
        let quotes = self
            .chains
            .get(&(instrument.to_ascii_uppercase(), expiry, side))
            .ok_or_else(|| not_found(format!("no {side} chain for {instrument} {expiry}")))?;
        Ok(OptionChain::new(instrument, expiry, side, quotes.clone()))
    }

    async fn historical_data(
        &self,
        instrument: &str,
        strike: f64,
        side: OptionSide,
        from: NaiveDate,
        to: NaiveDate,
    ) -> EngineResult<Vec<HistoricalBar>> {
        let series = self
            .history
            .get(&(instrument.to_ascii_uppercase(), strike.to_bits(), side))
            .ok_or_else(|| not_found(format!("no history for {instrument} {strike} {side}")))?;
        Ok(series
            .iter()
            .filter(|b| b.date >= from && b.date <= to)
            .copied()
            .collect())
    }
}

impl RawMarginProvider for StaticMarketBook {
    async fn fetch_margin_requirements(&self, position: &Position) -> EngineResult<RawMargin> {
        let key = margin_key(&position.instrument_name, position.strike_price, position.side, position.position_type);
        let per_lot = self.margins.get(&key).ok_or_else(|| {
            not_found(format!(
                "no margin quote for {} {} {} {}",
                position.instrument_name, position.strike_price, position.side, position.position_type
            ))
        })?;
        Ok(per_lot.scale(position.qty as f64))
    }

    async fn margin_history(&self, position: &Position, days: u32) -> EngineResult<Vec<DatedMargin>> {
        let key = margin_key(&position.instrument_name, position.strike_price, position.side, position.position_type);
        let series = self.margin_history.get(&key).ok_or_else(|| {
            not_found(format!(
                "no margin history for {} {} {} {}",
                position.instrument_name, position.strike_price, position.side, position.position_type
            ))
        })?;
        let skip = series.len().saturating_sub(days as usize);
        let qty = position.qty as f64;
        Ok(series[skip..]
            .iter()
            .map(|r| DatedMargin { date: r.date, raw: r.raw.scale(qty) })
            .collect())
    }
}
