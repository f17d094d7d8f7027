//! price_engine_rust - gold price acquisition service

pub mod config;
pub mod engine;
pub mod error;
pub mod observer;
pub mod requests;
pub mod scheduler;
pub mod state;

pub use config::EngineConfig;
pub use engine::{AcquisitionEngine, CapturedQuote, CycleOutcome, DataSnapshot, SourceChain};
pub use error::InvalidInput;
pub use observer::{ObserverBus, PriceUpdate};
pub use requests::{EngineRequest, EngineResponse, RequestHandle};
pub use state::{AcquisitionState, HISTORY_LIMIT};
