//! Intraday series sanitizing
//!
//! Chart endpoints return every slot of the trading cycle, including the night
//! session and slots that have not traded yet. Unpublished slots come back
//! either as zero or as a copy of the last real price, so a raw series has to
//! be cleaned before its last point can stand in for the live price.
//!
//! The engine and any chart renderer must both go through [`sanitize`] or the
//! live price and the chart's rightmost point will disagree.

use crate::calendar::in_day_session;
use crate::models::{DaySeries, SeriesPoint};
use chrono::NaiveTime;

/// Trailing runs of identical prices longer than this are placeholder slots.
pub const PLACEHOLDER_RUN_LIMIT: usize = 5;

fn parse_label(label: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(label.trim(), "%H:%M").ok()
}

/// Keep only points whose time label falls inside the day session.
/// Points with unparseable labels are dropped.
pub fn filter_day_session(points: &[SeriesPoint]) -> Vec<SeriesPoint> {
    points
        .iter()
        .filter(|p| parse_label(&p.time).map_or(false, in_day_session))
        .cloned()
        .collect()
}

/// Drop placeholder (non-positive) points.
pub fn valid_points(points: &[SeriesPoint]) -> Vec<SeriesPoint> {
    points.iter().filter(|p| !p.is_placeholder()).cloned().collect()
}

/// Length of the suffix run sharing the final price.
fn trailing_run(points: &[SeriesPoint]) -> usize {
    let Some(last) = points.last() else {
        return 0;
    };
    points
        .iter()
        .rev()
        .take_while(|p| p.price == last.price)
        .count()
}

/// Cut a trailing run of repeated prices longer than [`PLACEHOLDER_RUN_LIMIT`].
///
/// A series that is one flat run throughout is kept whole: it is the latest
/// known price, not padding. Repeats until the tail is stable so that the
/// result is a fixed point.
pub fn trim_trailing_placeholders(mut points: Vec<SeriesPoint>) -> Vec<SeriesPoint> {
    loop {
        let run = trailing_run(&points);
        if run <= PLACEHOLDER_RUN_LIMIT || run == points.len() {
            return points;
        }
        points.truncate(points.len() - run);
    }
}

/// Full pipeline: day-session window, placeholder filter, trailing trim.
pub fn sanitize(points: &[SeriesPoint]) -> Vec<SeriesPoint> {
    let day = filter_day_session(points);
    trim_trailing_placeholders(valid_points(&day))
}

/// Last point that carries a real price, ignoring session windows.
pub fn last_positive(points: &[SeriesPoint]) -> Option<&SeriesPoint> {
    points.iter().rev().find(|p| !p.is_placeholder())
}

impl DaySeries {
    /// Copy of this series passed through [`sanitize`].
    pub fn sanitized(&self) -> DaySeries {
        DaySeries {
            samples: sanitize(&self.samples),
            ..self.clone()
        }
    }

    /// Price and time label of the last sanitized point.
    pub fn latest_sanitized(&self) -> Option<SeriesPoint> {
        sanitize(&self.samples).pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(prices: &[f64]) -> Vec<SeriesPoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| SeriesPoint::new(format!("{:02}:{:02}", 9 + i / 60, i % 60), *p))
            .collect()
    }

    fn prices(points: &[SeriesPoint]) -> Vec<f64> {
        points.iter().map(|p| p.price).collect()
    }

    #[test]
    fn test_five_repeats_kept() {
        let raw = pts(&[910.0, 911.0, 912.0, 912.0, 912.0, 912.0, 912.0]);
        let out = sanitize(&raw);
        assert_eq!(out.len(), 7);
        assert_eq!(out.last().unwrap().price, 912.0);
    }

    #[test]
    fn test_six_repeats_dropped() {
        let raw = pts(&[910.0, 911.0, 912.0, 912.0, 912.0, 912.0, 912.0, 912.0]);
        let out = sanitize(&raw);
        assert_eq!(prices(&out), vec![910.0, 911.0]);
        assert_eq!(out.last().unwrap().time, "09:01");
    }

    #[test]
    fn test_flat_series_kept_whole() {
        let raw = pts(&[915.0; 10]);
        assert_eq!(sanitize(&raw).len(), 10);
    }

    #[test]
    fn test_night_session_and_placeholders_removed() {
        let raw = vec![
            SeriesPoint::new("20:00", 905.0),
            SeriesPoint::new("02:30", 906.0),
            SeriesPoint::new("08:59", 907.0),
            SeriesPoint::new("09:00", 908.0),
            SeriesPoint::new("09:01", 0.0),
            SeriesPoint::new("09:02", 909.0),
            SeriesPoint::new("15:30", 910.0),
            SeriesPoint::new("15:31", 911.0),
            SeriesPoint::new("bogus", 912.0),
        ];
        let out = sanitize(&raw);
        assert_eq!(prices(&out), vec![908.0, 909.0, 910.0]);
    }

    #[test]
    fn test_sanitize_idempotent() {
        let cases: Vec<Vec<f64>> = vec![
            vec![],
            vec![900.0],
            vec![900.0, 901.0, 901.0, 901.0, 901.0, 901.0, 901.0],
            vec![899.0, 900.0, 900.0, 900.0, 900.0, 900.0, 900.0, 901.0, 901.0, 901.0, 901.0, 901.0, 901.0],
            vec![0.0, 900.0, 0.0, 902.0, 902.0, 902.0, 902.0, 902.0, 902.0, 902.0],
            vec![905.0; 8],
        ];
        for case in cases {
            let once = sanitize(&pts(&case));
            let twice = sanitize(&once);
            assert_eq!(once, twice, "case {:?}", case);
        }
    }

    #[test]
    fn test_stacked_runs_trim_to_fixed_point() {
        let raw = pts(&[899.0, 900.0, 900.0, 900.0, 900.0, 900.0, 900.0, 901.0, 901.0, 901.0, 901.0, 901.0, 901.0]);
        assert_eq!(prices(&sanitize(&raw)), vec![899.0]);
    }

    #[test]
    fn test_last_positive() {
        let raw = pts(&[900.0, 901.0, 0.0, 0.0]);
        assert_eq!(last_positive(&raw).unwrap().price, 901.0);
        assert!(last_positive(&pts(&[0.0, -1.0])).is_none());
    }

    #[test]
    fn test_latest_sanitized_point() {
        let series = DaySeries {
            session_date: chrono::NaiveDate::from_ymd_opt(2024, 11, 13).unwrap(),
            samples: pts(&[910.0, 913.5, 913.5, 913.5, 913.5, 913.5, 913.5, 913.5]),
            ceiling_price: 913.5,
            instrument_label: "Au99.99".to_string(),
            fetched_at: chrono::Utc::now(),
        };
        let latest = series.latest_sanitized().unwrap();
        assert_eq!(latest.price, 910.0);
        assert_eq!(latest.time, "09:00");
        assert_eq!(series.sanitized().samples.len(), 1);
    }
}
