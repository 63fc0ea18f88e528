use crate::errors::{DomainError, EngineError, EngineResult};
use crate::feeds::{RawMargin, RawMarginProvider};
use chrono::NaiveDate;
use crate::models::OptionSide;
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};

/// Multipliers applied to broker-quoted SPAN and exposure figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginMultipliers {
    pub span: f64,
    pub exposure: f64,
}

impl Default for MarginMultipliers {
    fn default() -> Self {
        Self { span: 1.0, exposure: 0.5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    Buy,
    #[default]
    Sell,
}

impl std::fmt::Display for PositionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for PositionType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(EngineError::Validation(format!(
                "position type must be either 'buy' or 'sell', got '{other}'"
            ))),
        }
    }
}

/// A caller-owned option position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument_name: String,
    pub strike_price: f64,
    pub side: OptionSide,
    /// Number of lots
    pub qty: u32,
    #[serde(default)]
    pub position_type: PositionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginBreakdown {
    pub span_margin: f64,
    pub exposure_margin: f64,
    pub total_margin: f64,
    pub raw_span: f64,
    pub raw_exposure: f64,
    pub span_multiplier: f64,
    pub exposure_multiplier: f64,
}

/// Apply multipliers to one broker quote.
///
/// span_margin     = raw.span * span_mult
/// exposure_margin = raw.exposure * exposure_mult
/// total_margin    = span_margin + exposure_margin
#[inline]
pub fn position_margin(raw: RawMargin, multipliers: MarginMultipliers) -> MarginBreakdown {
    let span_margin = raw.span * multipliers.span;
    let exposure_margin = raw.exposure * multipliers.exposure;
    MarginBreakdown {
        span_margin,
        exposure_margin,
        total_margin: span_margin + exposure_margin,
        raw_span: raw.span,
        raw_exposure: raw.exposure,
        span_multiplier: multipliers.span,
        exposure_multiplier: multipliers.exposure,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionMargin {
    pub position: Position,
    pub margin: MarginBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioMargin {
    pub total_portfolio_margin: f64,
    /// Same order as the input positions
    pub per_position: Vec<PositionMargin>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginImpact {
    pub current_margin: f64,
    pub new_margin: f64,
    pub margin_impact: f64,
    pub percentage_increase: f64,
}

impl MarginImpact {
    fn between(current: f64, new: f64) -> EngineResult<Self> {
        if current == 0.0 {
            return Err(DomainError::EmptyBaseline.into());
        }
        let margin_impact = new - current;
        Ok(Self {
            current_margin: current,
            new_margin: new,
            margin_impact,
            percentage_increase: margin_impact / current * 100.0,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginHistoryPoint {
    pub date: NaiveDate,
    pub margin: MarginBreakdown,
}

/// Daily margin series for one position, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionMarginHistory {
    pub position: Position,
    pub points: Vec<MarginHistoryPoint>,
}

/// Folds broker margin quotes into position and portfolio figures.
///
/// Holds only the multipliers; every call recomputes from fresh quotes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarginCalculator {
    multipliers: MarginMultipliers,
}

impl MarginCalculator {
    pub fn new(multipliers: MarginMultipliers) -> Self {
        Self { multipliers }
    }

    #[inline]
    pub fn multipliers(&self) -> MarginMultipliers {
        self.multipliers
    }

    #[inline]
    pub fn position_margin(&self, raw: RawMargin) -> MarginBreakdown {
        position_margin(raw, self.multipliers)
    }

    /// One lookup per position, in input order. The first lookup error is
    /// returned unchanged.
    pub fn portfolio_margin<F>(&self, positions: &[Position], mut lookup: F) -> EngineResult<PortfolioMargin>
    where
        F: FnMut(&Position) -> EngineResult<RawMargin>,
    {
        let quotes = positions.iter().map(&mut lookup).collect::<EngineResult<Vec<_>>>()?;
        Ok(self.fold(positions, quotes))
    }

    /// Margin before and after adding `new_position`.
    pub fn margin_impact<F>(
        &self,
        current: &[Position],
        new_position: &Position,
        mut lookup: F,
    ) -> EngineResult<MarginImpact>
    where
        F: FnMut(&Position) -> EngineResult<RawMargin>,
    {
        let before = self.portfolio_margin(current, &mut lookup)?;
        if before.total_portfolio_margin == 0.0 {
            tracing::warn!(positions = current.len(), "margin impact requested against empty baseline");
            return Err(DomainError::EmptyBaseline.into());
        }

        let mut combined = current.to_vec();
        combined.push(new_position.clone());
        let after = self.portfolio_margin(&combined, &mut lookup)?;

        MarginImpact::between(before.total_portfolio_margin, after.total_portfolio_margin)
    }

    /// Same as `portfolio_margin`, with the broker lookups issued concurrently.
    pub async fn portfolio_margin_from<P: RawMarginProvider>(
        &self,
        positions: &[Position],
        provider: &P,
    ) -> EngineResult<PortfolioMargin> {
        let quotes = try_join_all(positions.iter().map(|p| provider.fetch_margin_requirements(p))).await?;
        Ok(self.fold(positions, quotes))
    }

    pub async fn margin_impact_from<P: RawMarginProvider>(
        &self,
        current: &[Position],
        new_position: &Position,
        provider: &P,
    ) -> EngineResult<MarginImpact> {
        let before = self.portfolio_margin_from(current, provider).await?;
        if before.total_portfolio_margin == 0.0 {
            tracing::warn!(positions = current.len(), "margin impact requested against empty baseline");
            return Err(DomainError::EmptyBaseline.into());
        }

        let mut combined = current.to_vec();
        combined.push(new_position.clone());
        let after = self.portfolio_margin_from(&combined, provider).await?;

        MarginImpact::between(before.total_portfolio_margin, after.total_portfolio_margin)
    }

    /// Past daily margin for `position` under the current multipliers.
    pub async fn margin_history<P: RawMarginProvider>(
        &self,
        position: &Position,
        days: u32,
        provider: &P,
    ) -> EngineResult<PositionMarginHistory> {
        let records = provider.margin_history(position, days).await?;
        let points: Vec<MarginHistoryPoint> = records
            .into_iter()
            .map(|r| MarginHistoryPoint {
                date: r.date,
                margin: self.position_margin(r.raw),
            })
            .collect();

        tracing::debug!(
            instrument = %position.instrument_name,
            strike = position.strike_price,
            days,
            points = points.len(),
            "margin history loaded"
        );

        Ok(PositionMarginHistory {
            position: position.clone(),
            points,
        })
    }

    fn fold(&self, positions: &[Position], quotes: Vec<RawMargin>) -> PortfolioMargin {
        let per_position: Vec<PositionMargin> = positions
            .iter()
            .zip(quotes)
            .map(|(position, raw)| PositionMargin {
                position: position.clone(),
                margin: self.position_margin(raw),
            })
            .collect();

        let total_portfolio_margin: f64 = per_position.iter().map(|p| p.margin.total_margin).sum();

        tracing::debug!(
            positions = per_position.len(),
            total = total_portfolio_margin,
            "portfolio margin computed"
        );

        PortfolioMargin {
            total_portfolio_margin,
            per_position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feeds::static_book::StaticMarketBook;
    use crate::feeds::DatedMargin;
    use std::collections::HashMap;

    fn pos(strike: f64, side: OptionSide, qty: u32) -> Position {
        Position {
            instrument_name: "NIFTY".into(),
            strike_price: strike,
            side,
            qty,
            position_type: PositionType::Sell,
        }
    }

    fn quotes() -> HashMap<u64, RawMargin> {
        HashMap::from([
            (20_000_f64.to_bits(), RawMargin { span: 10_000.0, exposure: 5_000.0 }),
            (20_500_f64.to_bits(), RawMargin { span: 8_000.0, exposure: 4_000.0 }),
            (19_500_f64.to_bits(), RawMargin { span: 12_000.0, exposure: 6_000.0 }),
        ])
    }

    fn lookup(book: &HashMap<u64, RawMargin>) -> impl FnMut(&Position) -> EngineResult<RawMargin> + '_ {
        move |p| {
            book.get(&p.strike_price.to_bits()).copied().ok_or_else(|| EngineError::Broker {
                status: 404,
                body: format!("no margin for {}", p.strike_price),
            })
        }
    }

    #[test]
    fn test_position_margin_default_multipliers() {
        let m = position_margin(RawMargin { span: 10_000.0, exposure: 5_000.0 }, MarginMultipliers::default());
        assert_eq!(m.span_margin, 10_000.0);
        assert_eq!(m.exposure_margin, 2_500.0);
        assert_eq!(m.total_margin, 12_500.0);
        assert_eq!(m.raw_span, 10_000.0);
        assert_eq!(m.raw_exposure, 5_000.0);
    }

    #[test]
    fn test_multipliers_overridable() {
        let calc = MarginCalculator::new(MarginMultipliers { span: 1.5, exposure: 1.0 });
        let m = calc.position_margin(RawMargin { span: 10_000.0, exposure: 5_000.0 });
        assert_eq!(m.total_margin, 20_000.0);
        assert_eq!(m.span_multiplier, 1.5);
    }

    #[test]
    fn test_portfolio_total_and_order() {
        let book = quotes();
        let calc = MarginCalculator::default();
        let positions = vec![
            pos(20_000.0, OptionSide::Call, 1),
            pos(20_500.0, OptionSide::Call, 1),
            pos(19_500.0, OptionSide::Put, 2),
        ];
        let result = calc.portfolio_margin(&positions, lookup(&book)).unwrap();
        assert_eq!(result.total_portfolio_margin, 12_500.0 + 10_000.0 + 15_000.0);
        let strikes: Vec<f64> = result.per_position.iter().map(|p| p.position.strike_price).collect();
        assert_eq!(strikes, vec![20_000.0, 20_500.0, 19_500.0]);
    }

    #[test]
    fn test_portfolio_order_independent_total() {
        let book = quotes();
        let calc = MarginCalculator::default();
        let a = vec![
            pos(20_000.0, OptionSide::Call, 1),
            pos(20_500.0, OptionSide::Call, 1),
            pos(19_500.0, OptionSide::Put, 1),
        ];
        let mut b = a.clone();
        b.reverse();

        let ra = calc.portfolio_margin(&a, lookup(&book)).unwrap();
        let rb = calc.portfolio_margin(&b, lookup(&book)).unwrap();
        assert_eq!(ra.total_portfolio_margin, rb.total_portfolio_margin);
        assert_eq!(ra.per_position[0], rb.per_position[2]);
        assert_eq!(ra.per_position[2], rb.per_position[0]);
    }

    #[test]
    fn test_lookup_failure_passes_through() {
        let book = quotes();
        let calc = MarginCalculator::default();
        let positions = vec![pos(20_000.0, OptionSide::Call, 1), pos(21_000.0, OptionSide::Call, 1)];
        let err = calc.portfolio_margin(&positions, lookup(&book)).unwrap_err();
        assert!(matches!(err, EngineError::Broker { status: 404, .. }));
    }

    #[test]
    fn test_margin_impact() {
        let book = quotes();
        let calc = MarginCalculator::default();
        let current = vec![pos(20_000.0, OptionSide::Call, 1)];
        let impact = calc
            .margin_impact(&current, &pos(20_500.0, OptionSide::Call, 1), lookup(&book))
            .unwrap();
        assert_eq!(impact.current_margin, 12_500.0);
        assert_eq!(impact.new_margin, 22_500.0);
        assert_eq!(impact.margin_impact, 10_000.0);
        assert!((impact.percentage_increase - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_margin_impact_empty_baseline() {
        let book = quotes();
        let calc = MarginCalculator::default();
        let err = calc
            .margin_impact(&[], &pos(20_000.0, OptionSide::Call, 1), lookup(&book))
            .unwrap_err();
        assert_eq!(err.as_domain(), Some(&DomainError::EmptyBaseline));

        let zero_book = HashMap::from([(20_000_f64.to_bits(), RawMargin { span: 0.0, exposure: 0.0 })]);
        let err = calc
            .margin_impact(
                &[pos(20_000.0, OptionSide::Call, 1)],
                &pos(20_000.0, OptionSide::Call, 1),
                lookup(&zero_book),
            )
            .unwrap_err();
        assert_eq!(err.as_domain(), Some(&DomainError::EmptyBaseline));
    }

    #[test]
    fn test_position_type_parsing() {
        assert_eq!("buy".parse::<PositionType>().unwrap(), PositionType::Buy);
        assert!("hold".parse::<PositionType>().is_err());
        let p: Position = serde_json::from_str(
            r#"{"instrument_name":"NIFTY","strike_price":20000,"side":"CE","qty":1}"#,
        )
        .unwrap();
        assert_eq!(p.position_type, PositionType::Sell);
    }

    #[tokio::test]
    async fn test_concurrent_lookups_match_sequential() {
        let mut book = StaticMarketBook::new();
        book.set_margin(&pos(20_000.0, OptionSide::Call, 1), RawMargin { span: 10_000.0, exposure: 5_000.0 });
        book.set_margin(&pos(19_500.0, OptionSide::Put, 1), RawMargin { span: 12_000.0, exposure: 6_000.0 });

        let calc = MarginCalculator::default();
        let positions = vec![pos(20_000.0, OptionSide::Call, 2), pos(19_500.0, OptionSide::Put, 1)];

        let result = calc.portfolio_margin_from(&positions, &book).await.unwrap();
        // Per-lot quotes scale with qty in the static book
        assert_eq!(result.per_position[0].margin.total_margin, 25_000.0);
        assert_eq!(result.per_position[1].margin.total_margin, 15_000.0);
        assert_eq!(result.total_portfolio_margin, 40_000.0);

        let impact = calc
            .margin_impact_from(&positions[..1], &positions[1], &book)
            .await
            .unwrap();
        assert_eq!(impact.margin_impact, 15_000.0);
        assert!((impact.percentage_increase - 60.0).abs() < 1e-9);

        let err = calc
            .margin_impact_from(&[], &positions[0], &book)
            .await
            .unwrap_err();
        assert_eq!(err.as_domain(), Some(&DomainError::EmptyBaseline));
    }

    #[tokio::test]
    async fn test_margin_history_applies_multipliers() {
        let position = pos(20_000.0, OptionSide::Call, 1);
        let mut book = StaticMarketBook::new();
        book.add_margin_history(
            &position,
            (10..=12).map(|day| DatedMargin {
                date: NaiveDate::from_ymd_opt(2026, 10, day).unwrap(),
                raw: RawMargin { span: 10_000.0, exposure: 5_000.0 },
            }),
        );

        let calc = MarginCalculator::new(MarginMultipliers { span: 1.0, exposure: 0.5 });
        let history = calc.margin_history(&position, 30, &book).await.unwrap();
        assert_eq!(history.position, position);
        assert_eq!(history.points.len(), 3);
        assert!(history.points.iter().all(|p| p.margin.total_margin == 12_500.0));
        assert_eq!(history.points[0].date, NaiveDate::from_ymd_opt(2026, 10, 10).unwrap());
    }

    #[tokio::test]
    async fn test_margin_history_lookup_error_unchanged() {
        let book = StaticMarketBook::new();
        let err = MarginCalculator::default()
            .margin_history(&pos(20_000.0, OptionSide::Call, 1), 30, &book)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Broker { status: 404, .. }));
    }
}
