//! Option Greeks
//!
//! First and second order sensitivities, evaluated on the same `BsTerms`
//! the price uses.

use crate::errors::{DomainError, EngineResult};
use crate::models::{BsTerms, OptionSide};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    /// dV/dS
    pub delta: f64,
    /// d²V/dS²
    pub gamma: f64,
    /// dV/dt, per year (not per day)
    pub theta: f64,
    /// dV/dσ, per 1.00 change in volatility
    pub vega: f64,
}

impl Greeks {
    pub(crate) fn from_terms(t: &BsTerms, side: OptionSide, normal: &Normal) -> EngineResult<Self> {
        let pdf_d1 = normal.pdf(t.d1);
        let cdf_d1 = normal.cdf(t.d1);

        let delta = match side {
            OptionSide::Call => cdf_d1,
            OptionSide::Put => cdf_d1 - 1.0,
        };

        let gamma = pdf_d1 / (t.spot * t.sigma_sqrt_t);

        let decay = -(t.spot * pdf_d1 * t.sigma) / (2.0 * t.sqrt_t);
        let carry = t.rate * t.strike * t.discount;
        let theta = match side {
            OptionSide::Call => decay - carry * normal.cdf(t.d2),
            OptionSide::Put => decay + carry * normal.cdf(-t.d2),
        };

        let vega = t.spot * t.sqrt_t * pdf_d1;

        let greeks = Self { delta, gamma, theta, vega };
        if !greeks.is_finite() {
            return Err(DomainError::NonFinite("greeks").into());
        }
        Ok(greeks)
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.delta.is_finite() && self.gamma.is_finite() && self.theta.is_finite() && self.vega.is_finite()
    }

    /// Scale by a quantity (e.g. lot size) for position-level exposure.
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            theta: self.theta * factor,
            vega: self.vega * factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::models::black_scholes::BlackScholes;
    use crate::models::{MarketInputs, OptionSide};

    fn market(spot: f64, side: OptionSide) -> MarketInputs {
        MarketInputs {
            underlying_price: spot,
            strike_price: 20_000.0,
            days_to_expiry: 30,
            volatility: 0.15,
            side,
        }
    }

    #[test]
    fn test_call_put_delta_gap_is_one() {
        let model = BlackScholes::new(0.05);
        for spot in [18_500.0, 19_800.0, 20_000.0, 20_400.0, 22_000.0] {
            let c = model.greeks(&market(spot, OptionSide::Call)).unwrap();
            let p = model.greeks(&market(spot, OptionSide::Put)).unwrap();
            assert!((c.delta - p.delta - 1.0).abs() < 1e-12, "S={spot}: {} - {}", c.delta, p.delta);
            assert!((0.0..=1.0).contains(&c.delta));
            assert!((-1.0..=0.0).contains(&p.delta));
        }
    }

    #[test]
    fn test_gamma_vega_side_independent() {
        let model = BlackScholes::new(0.05);
        let c = model.greeks(&market(20_150.0, OptionSide::Call)).unwrap();
        let p = model.greeks(&market(20_150.0, OptionSide::Put)).unwrap();
        assert_eq!(c.gamma, p.gamma);
        assert_eq!(c.vega, p.vega);
        assert!(c.gamma > 0.0 && c.vega > 0.0);
    }

    #[test]
    fn test_delta_matches_finite_difference() {
        let model = BlackScholes::new(0.05);
        for side in [OptionSide::Call, OptionSide::Put] {
            let h = 0.5;
            let up = model.price(&market(20_000.0 + h, side)).unwrap();
            let down = model.price(&market(20_000.0 - h, side)).unwrap();
            let numeric = (up - down) / (2.0 * h);
            let g = model.greeks(&market(20_000.0, side)).unwrap();
            assert!((numeric - g.delta).abs() < 1e-5, "{side}: numeric={numeric} analytic={}", g.delta);
        }
    }

    #[test]
    fn test_vega_matches_finite_difference() {
        let model = BlackScholes::new(0.05);
        let base = market(20_000.0, OptionSide::Call);
        let h = 1e-4;
        let mut up = base;
        up.volatility += h;
        let mut down = base;
        down.volatility -= h;
        let numeric = (model.price(&up).unwrap() - model.price(&down).unwrap()) / (2.0 * h);
        let vega = model.greeks(&base).unwrap().vega;
        assert!((numeric - vega).abs() / vega < 1e-5, "numeric={numeric} analytic={vega}");
    }

    #[test]
    fn test_theta_negative_for_atm_call() {
        let model = BlackScholes::new(0.05);
        let g = model.greeks(&market(20_000.0, OptionSide::Call)).unwrap();
        assert!(g.theta < 0.0, "theta={}", g.theta);
    }

    #[test]
    fn test_scale() {
        let model = BlackScholes::new(0.05);
        let g = model.greeks(&market(20_000.0, OptionSide::Call)).unwrap();
        let lot = g.scale(50.0);
        assert!((lot.delta - g.delta * 50.0).abs() < 1e-12);
        assert!((lot.vega - g.vega * 50.0).abs() < 1e-9);
    }
}
