use crate::analytics::premium::PremiumReport;
use crate::errors::{DomainError, EngineResult};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One point on a projected premium-erosion curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayPoint {
    pub days: u32,
    /// Remaining premium, floored at zero
    pub premium: f64,
    pub decay_amount: f64,
    /// Decay as a percentage of today's premium. Not capped at 100.
    pub decay_percentage: f64,
}

/// Projection output, one point per requested offset in request order.
pub type DecayCurve = SmallVec<[DecayPoint; 8]>;

/// Project premium erosion at each day offset.
///
/// decay_amount = daily_theta_decay * days
/// premium      = max(0, premium - decay_amount)
///
/// Pure function: no state survives between calls.
pub fn project_decay(report: &PremiumReport, day_offsets: &[u32]) -> EngineResult<DecayCurve> {
    let premium = report.premium;
    if premium <= 0.0 {
        return Err(DomainError::ZeroPremium.into());
    }

    let rate = report.daily_theta_decay;
    let curve: DecayCurve = day_offsets
        .iter()
        .map(|&days| {
            let decay_amount = rate * days as f64;
            DecayPoint {
                days,
                premium: (premium - decay_amount).max(0.0),
                decay_amount,
                decay_percentage: decay_amount / premium * 100.0,
            }
        })
        .collect();

    Ok(curve)
}
