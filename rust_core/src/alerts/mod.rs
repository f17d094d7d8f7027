pub mod evaluator;
pub mod notifier;

pub use evaluator::{evaluate, AlertDecision, PriceAlert};
pub use notifier::{AlertNotifier, RedisAlertNotifier};
