//! Process-wide acquisition state

use chrono::{DateTime, Utc};
use goldwatch_core::store::PersistedPrice;
use goldwatch_core::{DaySeries, PriceSample};
use std::collections::VecDeque;

/// Maximum retained history entries; oldest are evicted first.
pub const HISTORY_LIMIT: usize = 100;

/// Price state owned by the engine for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct AcquisitionState {
    pub current_price: Option<f64>,
    history: VecDeque<PriceSample>,
    pub day_series: Option<DaySeries>,
    pub last_notified_observers_at: Option<DateTime<Utc>>,
}

impl AcquisitionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from storage. Over-long persisted histories keep their newest
    /// entries.
    pub fn restore(persisted: PersistedPrice) -> Self {
        let mut state = Self {
            current_price: persisted.current_price,
            day_series: persisted.day_series,
            ..Self::default()
        };
        for sample in persisted.history {
            state.push_history(sample);
        }
        state
    }

    pub fn push_history(&mut self, sample: PriceSample) {
        self.history.push_back(sample);
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> Vec<PriceSample> {
        self.history.iter().cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_sample(&self) -> Option<&PriceSample> {
        self.history.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldwatch_core::SourceId;

    #[test]
    fn test_history_evicts_oldest_first() {
        let mut state = AcquisitionState::new();
        for i in 0..150 {
            state.push_history(PriceSample::flat(800.0 + i as f64, SourceId::IcbcBank));
        }

        let history = state.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].price, 850.0);
        assert_eq!(history[99].price, 949.0);
        assert!(history.windows(2).all(|w| w[0].price < w[1].price));
    }

    #[test]
    fn test_restore_truncates_long_history() {
        let persisted = PersistedPrice {
            current_price: Some(917.0),
            history: (0..120)
                .map(|i| PriceSample::flat(i as f64 + 1.0, SourceId::SgeQuotations))
                .collect(),
            day_series: None,
        };
        let state = AcquisitionState::restore(persisted);
        assert_eq!(state.current_price, Some(917.0));
        assert_eq!(state.history_len(), HISTORY_LIMIT);
        assert_eq!(state.last_sample().map(|s| s.price), Some(120.0));
    }
}
