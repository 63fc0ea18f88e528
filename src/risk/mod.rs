pub mod margin;

pub use margin::{
    position_margin, MarginBreakdown, MarginCalculator, MarginImpact, MarginHistoryPoint, MarginMultipliers,
    PortfolioMargin, Position, PositionMargin, PositionMarginHistory, PositionType,
};
