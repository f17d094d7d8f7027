//! Trading session calendar for the Shanghai gold market
//!
//! Pure logic over exchange-local wall-clock time. Two sessions per weekday:
//! - Day session: 09:00–15:30 inclusive
//! - Night session: 20:00 through 02:30 of the next calendar day, inclusive
//!
//! Times are evaluated at minute resolution, so 15:30:59 still counts as 15:30.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;

const DAY_OPEN: u32 = 9 * 60;
const DAY_CLOSE: u32 = 15 * 60 + 30;
const NIGHT_OPEN: u32 = 20 * 60;
const NIGHT_CLOSE: u32 = 2 * 60 + 30;
const MIDDAY_FIXING_START: u32 = 13 * 60 + 30;

/// Exchange timezone used when none is configured.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Shanghai;

/// Which session fixing the exchange homepage should currently be showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixingWindow {
    Morning,
    Midday,
}

/// Maps wall-clock instants in the exchange timezone to session facts.
#[derive(Debug, Clone, Copy)]
pub struct TradingCalendar {
    tz: Tz,
}

impl TradingCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Current exchange-local wall-clock time.
    pub fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }

    pub fn is_trading_now(&self, now: NaiveDateTime) -> bool {
        is_trading_at(now)
    }

    pub fn session_date_for(&self, now: NaiveDateTime) -> NaiveDate {
        session_date_for(now)
    }
}

impl Default for TradingCalendar {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

fn in_early_morning(t: NaiveTime) -> bool {
    minute_of_day(t) <= NIGHT_CLOSE
}

/// True when `t` falls inside the day session (09:00–15:30 inclusive).
pub fn in_day_session(t: NaiveTime) -> bool {
    (DAY_OPEN..=DAY_CLOSE).contains(&minute_of_day(t))
}

/// Whether either session is open at `now`.
///
/// Weekends are always closed. Monday before 02:30 is closed too: the
/// early-morning window is the tail of the previous evening's night session,
/// and there is no Sunday night session.
pub fn is_trading_at(now: NaiveDateTime) -> bool {
    let day = now.weekday();
    if is_weekend(day) {
        return false;
    }

    let t = now.time();
    if in_day_session(t) || minute_of_day(t) >= NIGHT_OPEN {
        return true;
    }

    in_early_morning(t) && day != Weekday::Mon
}

/// The calendar day whose session data a poll at `now` should be attributed to.
///
/// The early-morning window belongs to the session that opened the previous
/// evening, so it resolves to the prior trading day even while trading.
pub fn session_date_for(now: NaiveDateTime) -> NaiveDate {
    let today = now.date();
    let back = match now.weekday() {
        Weekday::Sun => 2,
        Weekday::Sat => 1,
        Weekday::Mon if in_early_morning(now.time()) => 3,
        _ if in_early_morning(now.time()) => 1,
        _ => 0,
    };
    today - Duration::days(back)
}

/// Midday fixing is expected between 13:30 and 15:30; morning otherwise.
pub fn fixing_window_at(t: NaiveTime) -> FixingWindow {
    let m = minute_of_day(t);
    if (MIDDAY_FIXING_START..=DAY_CLOSE).contains(&m) {
        FixingWindow::Midday
    } else {
        FixingWindow::Morning
    }
}

/// Short "M/D" label shown next to a session's chart.
pub fn session_label(date: NaiveDate) -> String {
    format!("{}/{}", date.month(), date.day())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-11-11 is a Monday
    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, day).unwrap()
    }

    #[test]
    fn test_day_session_bounds_inclusive() {
        assert!(is_trading_at(at(13, 9, 0)));
        assert!(is_trading_at(at(13, 15, 30)));
        assert!(!is_trading_at(at(13, 8, 59)));
        assert!(!is_trading_at(at(13, 15, 31)));
    }

    #[test]
    fn test_night_session_wraps_midnight() {
        assert!(is_trading_at(at(13, 20, 0)));
        assert!(is_trading_at(at(13, 23, 59)));
        assert!(is_trading_at(at(14, 0, 0)));
        assert!(is_trading_at(at(14, 2, 30)));
        assert!(!is_trading_at(at(14, 2, 31)));
        assert!(!is_trading_at(at(13, 19, 59)));
    }

    #[test]
    fn test_monday_early_morning_closed() {
        assert!(!is_trading_at(at(11, 1, 0)));
        assert!(is_trading_at(at(11, 9, 30)));
    }

    #[test]
    fn test_weekend_always_closed() {
        for day in [16, 17] {
            for h in 0..24 {
                for m in [0, 15, 30, 45, 59] {
                    assert!(!is_trading_at(at(day, h, m)), "{day} {h}:{m}");
                }
            }
        }
    }

    #[test]
    fn test_calendar_total_over_a_week() {
        // Every minute of the week yields an answer and a session date no
        // later than today and no earlier than three days back.
        let start = at(11, 0, 0);
        for i in 0..(7 * 24 * 60) {
            let now = start + Duration::minutes(i);
            let _ = is_trading_at(now);
            let d = session_date_for(now);
            assert!(d <= now.date());
            assert!(now.date() - d <= Duration::days(3));
        }
    }

    #[test]
    fn test_session_dates() {
        // Sunday 10:00 -> Friday
        assert_eq!(session_date_for(at(17, 10, 0)), date(15));
        // Saturday 12:00 -> Friday
        assert_eq!(session_date_for(at(16, 12, 0)), date(15));
        // Monday 01:00 -> Friday
        assert_eq!(session_date_for(at(18, 1, 0)), date(15));
        // Tuesday 01:00 -> Monday
        assert_eq!(session_date_for(at(19, 1, 0)), date(18));
        // Wednesday 16:00 -> Wednesday (post-close)
        assert_eq!(session_date_for(at(20, 16, 0)), date(20));
        // Wednesday 10:00 -> Wednesday (trading)
        assert_eq!(session_date_for(at(20, 10, 0)), date(20));
        // Thursday 21:00 -> Thursday (night session opened today)
        assert_eq!(session_date_for(at(21, 21, 0)), date(21));
    }

    #[test]
    fn test_fixing_window() {
        assert_eq!(fixing_window_at(NaiveTime::from_hms_opt(10, 0, 0).unwrap()), FixingWindow::Morning);
        assert_eq!(fixing_window_at(NaiveTime::from_hms_opt(13, 29, 0).unwrap()), FixingWindow::Morning);
        assert_eq!(fixing_window_at(NaiveTime::from_hms_opt(13, 30, 0).unwrap()), FixingWindow::Midday);
        assert_eq!(fixing_window_at(NaiveTime::from_hms_opt(15, 30, 0).unwrap()), FixingWindow::Midday);
        assert_eq!(fixing_window_at(NaiveTime::from_hms_opt(20, 30, 0).unwrap()), FixingWindow::Morning);
    }

    #[test]
    fn test_session_label() {
        assert_eq!(session_label(date(5)), "11/5");
    }
}
