pub mod decay;
pub mod premium;

pub use decay::{project_decay, DecayCurve, DecayPoint};
pub use premium::{Bound, ChainScanEntry, PremiumAnalyzer, PremiumReport, RiskMetrics, ThetaScaling};
