//! Session fixing price extraction from the exchange homepage markup
//!
//! The homepage lists the morning and midday benchmark ("上海金早盘价" /
//! "上海金午盘价") with the value in a highlighted span shortly after the
//! caption. Before the midday fixing is published its slot shows "/".

use crate::calendar::FixingWindow;
use regex::Regex;
use std::sync::OnceLock;

fn fixing_pattern(caption: &str) -> Regex {
    let pattern = format!(
        r#"{}（元/克）[\s\S]{{0,100}}?<span[^>]*class="[^"]*colorRed[^"]*"[^>]*>([0-9.]+)</span>"#,
        regex::escape(caption)
    );
    Regex::new(&pattern).expect("static fixing pattern")
}

fn morning_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| fixing_pattern("上海金早盘价"))
}

fn midday_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| fixing_pattern("上海金午盘价"))
}

fn capture_price(re: &Regex, html: &str) -> Option<f64> {
    let raw = re.captures(html)?.get(1)?.as_str();
    raw.parse::<f64>().ok().filter(|p| *p > 0.0)
}

/// Pull the fixing price for `window` out of the homepage html.
///
/// In the midday window an unpublished midday value falls back to the
/// morning fixing.
pub fn extract_session_fixing_price(html: &str, window: FixingWindow) -> Option<f64> {
    if window == FixingWindow::Midday {
        if let Some(price) = capture_price(midday_pattern(), html) {
            return Some(price);
        }
    }
    capture_price(morning_pattern(), html)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="item"><p>上海金早盘价（元/克）</p>
            <span class="num colorRed fs20">917.32</span></div>
        <div class="item"><p>上海金午盘价（元/克）</p>
            <span class="num colorRed fs20">919.05</span></div>
    "#;

    const PAGE_MIDDAY_PENDING: &str = r#"
        <div class="item"><p>上海金早盘价（元/克）</p>
            <span class="num colorRed fs20">917.32</span></div>
        <div class="item"><p>上海金午盘价（元/克）</p>
            <span class="num colorRed fs20">/</span></div>
    "#;

    #[test]
    fn test_morning_window_uses_morning_fixing() {
        assert_eq!(extract_session_fixing_price(PAGE, FixingWindow::Morning), Some(917.32));
    }

    #[test]
    fn test_midday_window_uses_midday_fixing() {
        assert_eq!(extract_session_fixing_price(PAGE, FixingWindow::Midday), Some(919.05));
    }

    #[test]
    fn test_unpublished_midday_falls_back_to_morning() {
        assert_eq!(
            extract_session_fixing_price(PAGE_MIDDAY_PENDING, FixingWindow::Midday),
            Some(917.32)
        );
    }

    #[test]
    fn test_missing_caption() {
        assert_eq!(extract_session_fixing_price("<html></html>", FixingWindow::Morning), None);
    }

    #[test]
    fn test_caption_too_far_from_value() {
        let filler = "x".repeat(200);
        let page = format!(
            r#"上海金早盘价（元/克）{}<span class="colorRed">917.32</span>"#,
            filler
        );
        assert_eq!(extract_session_fixing_price(&page, FixingWindow::Morning), None);
    }
}
