/// Error types for the analytics engine.
///
/// Three kinds of failure reach a caller:
/// - `DomainError`: the requested quantity is mathematically undefined for the inputs
/// - collaborator failures (broker, network, parse) passed through as-is
/// - local configuration / validation problems
///
/// "Unbounded" profit is not an error; see `analytics::Bound`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("volatility must be positive and finite, got {0}")]
    NonPositiveVolatility(f64),

    #[error("undefined at zero time to expiry")]
    ZeroTimeToExpiry,

    #[error("{field} must be positive and finite, got {value}")]
    NonPositivePrice { field: &'static str, value: f64 },

    #[error("premium is zero, ratio undefined")]
    ZeroPremium,

    #[error("lot size must be positive")]
    ZeroLotSize,

    #[error("empty baseline: current portfolio margin is zero")]
    EmptyBaseline,

    #[error("non-finite result for {0}")]
    NonFinite(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("broker API error: {status} {body}")]
    Broker { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("no quote for {instrument} strike {strike}")]
    MissingQuote { instrument: String, strike: f64 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// The domain error behind this failure, if the engine raised it itself.
    #[inline]
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            EngineError::Domain(d) => Some(d),
            _ => None,
        }
    }

    /// True for failures coming from a market data or margin collaborator.
    #[inline]
    pub fn is_collaborator(&self) -> bool {
        matches!(
            self,
            EngineError::Broker { .. } | EngineError::Network(_) | EngineError::Parse(_)
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::Parse(e.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
