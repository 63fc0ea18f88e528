use crate::analytics::premium::ThetaScaling;
use crate::errors::{EngineError, EngineResult};
use crate::risk::margin::MarginMultipliers;

/// Engine configuration. Passed explicitly into the pricing model and the
/// margin calculator; nothing here is read from a global at compute time.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub risk_free_rate: f64,
    pub margin_multipliers: MarginMultipliers,
    pub theta_scaling: ThetaScaling,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.05,
            margin_multipliers: MarginMultipliers::default(),
            theta_scaling: ThetaScaling::Annual,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Missing keys fall back to defaults.
    pub fn from_source<F>(lookup: F) -> EngineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let risk_free_rate = parse_f64("RISK_FREE_RATE", &var_or("RISK_FREE_RATE", "0.05"))?;
        if !risk_free_rate.is_finite() {
            return Err(EngineError::Config(format!("RISK_FREE_RATE: not finite ({risk_free_rate})")));
        }

        let span = parse_multiplier("SPAN_MULTIPLIER", &var_or("SPAN_MULTIPLIER", "1.0"))?;
        let exposure = parse_multiplier("EXPOSURE_MULTIPLIER", &var_or("EXPOSURE_MULTIPLIER", "0.5"))?;

        let theta_scaling = var_or("THETA_SCALING", "annual")
            .parse::<ThetaScaling>()
            .map_err(|e| EngineError::Config(format!("THETA_SCALING: {e}")))?;

        Ok(Self {
            risk_free_rate,
            margin_multipliers: MarginMultipliers { span, exposure },
            theta_scaling,
        })
    }
}

fn parse_f64(key: &str, raw: &str) -> EngineResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| EngineError::Config(format!("{key}: {e}")))
}

fn parse_multiplier(key: &str, raw: &str) -> EngineResult<f64> {
    let v = parse_f64(key, raw)?;
    if !v.is_finite() || v < 0.0 {
        return Err(EngineError::Config(format!("{key}: must be finite and >= 0, got {v}")));
    }
    Ok(v)
}
