use chrono::NaiveDate;
use quantedge::analytics::{project_decay, ChainScanEntry, DecayCurve, PremiumAnalyzer, PremiumReport};
use quantedge::config::AppConfig;
use quantedge::errors::{EngineError, EngineResult};
use quantedge::feeds::static_book::{BookSnapshot, StaticMarketBook};
use quantedge::feeds::types::RawOptionChain;
use quantedge::feeds::{HistoricalBar, MarketDataProvider, OptionChain};
use quantedge::instruments;
use quantedge::models::{MarketInputs, OptionSide};
use quantedge::risk::{MarginCalculator, MarginImpact, PortfolioMargin, Position, PositionMarginHistory};
use quantedge::validation;
use serde::{Deserialize, Serialize};
use std::io::Read;

// ── Request / response (JSON in, JSON out) ──

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    analyses: Vec<AnalysisRequest>,
    /// Captured broker data backing the chain, history and margin blocks
    #[serde(default)]
    book: BookSnapshot,
    chain: Option<ChainScanRequest>,
    history: Option<HistoryRequest>,
    margin: Option<MarginRequest>,
}

#[derive(Debug, Deserialize)]
struct AnalysisRequest {
    market: MarketInputs,
    lot_size: u32,
    #[serde(default)]
    decay_days: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct ChainScanRequest {
    instrument: String,
    /// Defaults to the next monthly expiry
    expiry: Option<String>,
    side: String,
    strike_range: Option<(f64, f64)>,
    #[serde(default)]
    quotes: RawOptionChain,
}

#[derive(Debug, Deserialize)]
struct HistoryRequest {
    instrument: String,
    strike_price: f64,
    side: OptionSide,
    from: NaiveDate,
    to: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct MarginRequest {
    current: Vec<Position>,
    new_position: Option<Position>,
    /// Daily margin history per current position
    history_days: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum AnalysisOutcome {
    Ok { report: PremiumReport, decay: DecayCurve },
    Failed { error: String },
}

#[derive(Debug, Serialize)]
struct ChainScanOutcome {
    instrument: String,
    expiry: NaiveDate,
    side: OptionSide,
    underlying_price: f64,
    entries: Vec<ChainScanEntry>,
}

#[derive(Debug, Serialize)]
struct MarginOutcome {
    portfolio: PortfolioMargin,
    impact: Option<MarginImpact>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    history: Vec<PositionMarginHistory>,
}

#[derive(Debug, Serialize)]
struct Response {
    analyses: Vec<AnalysisOutcome>,
    chain: Option<ChainScanOutcome>,
    history: Option<Vec<HistoricalBar>>,
    margin: Option<MarginOutcome>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        risk_free_rate = cfg.risk_free_rate,
        span_mult = cfg.margin_multipliers.span,
        exposure_mult = cfg.margin_multipliers.exposure,
        theta_scaling = ?cfg.theta_scaling,
        "quantedge starting"
    );

    let request = match read_request() {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("request error: {e}");
            std::process::exit(1);
        }
    };

    match run(&cfg, request).await {
        Ok(response) => match serde_json::to_string_pretty(&response) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!("serialize error: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "analysis failed");
            std::process::exit(1);
        }
    }
}

/// Request JSON from the path in argv[1], or stdin.
fn read_request() -> EngineResult<Request> {
    let raw = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(serde_json::from_str(&raw)?)
}

async fn run(cfg: &AppConfig, request: Request) -> EngineResult<Response> {
    let analyzer = PremiumAnalyzer::from_config(cfg);

    let analyses = request
        .analyses
        .iter()
        .map(|a| {
            let outcome = analyzer
                .premium_report(&a.market, a.lot_size)
                .and_then(|report| project_decay(&report, &a.decay_days).map(|decay| (report, decay)));
            match outcome {
                Ok((report, decay)) => AnalysisOutcome::Ok { report, decay },
                Err(e) => {
                    tracing::warn!(strike = a.market.strike_price, side = %a.market.side, error = %e, "analysis rejected");
                    AnalysisOutcome::Failed { error: e.to_string() }
                }
            }
        })
        .collect();

    let book = StaticMarketBook::from_snapshot(request.book);
    let today = chrono::Utc::now().date_naive();

    let chain = match request.chain {
        Some(c) => Some(run_chain_scan(&analyzer, &book, c, today).await?),
        None => None,
    };

    let history = match request.history {
        Some(h) => {
            validation::validate_instrument(&h.instrument)?;
            validation::validate_history_window(h.from, h.to)?;
            Some(
                book.historical_data(&h.instrument, h.strike_price, h.side, h.from, h.to)
                    .await?,
            )
        }
        None => None,
    };

    let margin = match request.margin {
        Some(m) => Some(run_margin(cfg, &book, m).await?),
        None => None,
    };

    Ok(Response {
        analyses,
        chain,
        history,
        margin,
    })
}

async fn run_chain_scan(
    analyzer: &PremiumAnalyzer,
    book: &StaticMarketBook,
    request: ChainScanRequest,
    today: NaiveDate,
) -> EngineResult<ChainScanOutcome> {
    let expiry = match request.expiry {
        Some(e) => e,
        None => today
            .succ_opt()
            .and_then(instruments::next_monthly_expiry)
            .ok_or_else(|| EngineError::Validation(format!("no monthly expiry after {today}")))?
            .format("%Y-%m-%d")
            .to_string(),
    };
    let req = validation::validate_chain_request(
        &request.instrument,
        &expiry,
        &request.side,
        request.strike_range,
        today,
    )?;
    let lot_size = instruments::lot_size(&req.instrument)
        .ok_or_else(|| EngineError::Validation(format!("unknown lot size for {}", req.instrument)))?;

    let chain = OptionChain::from_raw(&req.instrument, req.expiry, req.side, request.quotes, req.strike_range);
    let underlying_price = book.underlying_price(&req.instrument).await?;
    let entries = analyzer.scan_chain(&chain, underlying_price, lot_size, today);

    tracing::info!(
        instrument = %req.instrument,
        expiry = %req.expiry,
        strikes = entries.len(),
        priced = entries.iter().filter(|e| e.report.is_some()).count(),
        "chain scanned"
    );

    Ok(ChainScanOutcome {
        instrument: req.instrument,
        expiry: req.expiry,
        side: req.side,
        underlying_price,
        entries,
    })
}

async fn run_margin(cfg: &AppConfig, book: &StaticMarketBook, request: MarginRequest) -> EngineResult<MarginOutcome> {
    for p in request.current.iter().chain(request.new_position.as_ref()) {
        validation::validate_position(p)?;
    }

    let calc = MarginCalculator::new(cfg.margin_multipliers);

    let portfolio = calc.portfolio_margin_from(&request.current, book).await?;
    let impact = match &request.new_position {
        Some(new_position) => Some(calc.margin_impact_from(&request.current, new_position, book).await?),
        None => None,
    };

    let mut history = Vec::new();
    if let Some(days) = request.history_days {
        for p in &request.current {
            history.push(calc.margin_history(p, days, book).await?);
        }
    }

    tracing::info!(
        positions = portfolio.per_position.len(),
        total = portfolio.total_portfolio_margin,
        impact = ?impact.map(|i| i.margin_impact),
        "margin computed"
    );

    Ok(MarginOutcome {
        portfolio,
        impact,
        history,
    })
}
