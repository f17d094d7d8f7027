pub mod fixing;
pub mod icbc;
pub mod mock;
pub mod quote_source;
pub mod sge;

// Re-export commonly used types
pub use fixing::extract_session_fixing_price;
pub use icbc::IcbcQuoteAdapter;
pub use mock::MockQuoteSource;
pub use quote_source::{AdapterError, FetchOutcome, QuoteSource};
pub use sge::{SgeClient, SgeIntradayAdapter, SgeQuotationsAdapter};
