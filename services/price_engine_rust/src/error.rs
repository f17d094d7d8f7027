use thiserror::Error;

/// Caller-supplied values the engine refuses to apply. Reported back in the
/// response, never dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidInput {
    #[error("invalid price: {0}")]
    Price(String),

    #[error("invalid alert price: {0}")]
    AlertPrice(String),

    #[error("malformed request: {0}")]
    Request(String),
}

impl InvalidInput {
    pub fn price(value: f64) -> Self {
        InvalidInput::Price(value.to_string())
    }
}
