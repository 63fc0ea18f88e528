//! QuantEdge: pricing, Greeks, premium decay and portfolio margin analytics
//! for NSE index options.
//!
//! Everything here is pure computation over already-fetched market data.
//! Broker access sits behind the traits in [`feeds`].

pub mod analytics;
pub mod config;
pub mod errors;
pub mod feeds;
pub mod instruments;
pub mod models;
pub mod risk;
pub mod validation;

pub use errors::{DomainError, EngineError, EngineResult};
