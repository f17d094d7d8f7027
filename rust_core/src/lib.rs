//! Goldwatch Core - gold price acquisition building blocks.
//!
//! This crate provides:
//! - Trading session calendar for the Shanghai gold market
//! - Quote sources (exchange intraday/quotations, bank price list, synthetic)
//! - Intraday series sanitizing (night session, placeholders, padded tails)
//! - Threshold alert evaluation with re-arm on recovery
//! - Persisted key/value state over redis or memory

pub mod alerts;
pub mod calendar;
pub mod clients;
pub mod models;
pub mod redis;
pub mod series;
pub mod store;

pub use calendar::TradingCalendar;
pub use models::{AlertConfig, DaySeries, PriceSample, SeriesPoint, SourceId};
