//! ICBC precious-metal price list client
//!
//! The bank's mobile site lists every account-metal product it quotes. The
//! renminbi gold account product is located by scanning labels rather than by
//! a fixed product code, since the catalog order and codes change.

use super::quote_source::{json_price, AdapterError, FetchOutcome, QuoteSource};
use crate::models::{PriceSample, SourceId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const QUOTE_URL: &str = "https://papi.icbc.com.cn/wapDynamicPage/goldMarket/accList";
const USER_AGENT: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148";

const RENMINBI: &str = "人民币";
const GOLD: &str = "黄金";

#[derive(Debug, Deserialize)]
struct PriceListResponse {
    code: Option<i64>,
    data: Option<Vec<ProductQuote>>,
}

#[derive(Debug, Deserialize)]
struct ProductQuote {
    /// Product label, e.g. "人民币账户黄金"
    #[serde(default)]
    bz: Option<String>,
    /// Mid price
    #[serde(default)]
    zjj: Option<serde_json::Value>,
    #[serde(default, rename = "upDownRate")]
    up_down_rate: Option<serde_json::Value>,
}

/// Parse the bank price list and extract the renminbi gold account quote.
pub fn parse_price_list(body: &str) -> Result<PriceSample, AdapterError> {
    let resp: PriceListResponse = serde_json::from_str(body)?;

    let products = match (resp.code, resp.data) {
        (Some(0), Some(products)) => products,
        (code, _) => {
            return Err(AdapterError::Shape(format!(
                "price list code {:?} without product data",
                code
            )))
        }
    };

    let product = products
        .iter()
        .find(|p| {
            p.bz
                .as_deref()
                .map_or(false, |name| name.contains(RENMINBI) && name.contains(GOLD))
        })
        .ok_or_else(|| {
            let available: Vec<&str> = products.iter().filter_map(|p| p.bz.as_deref()).collect();
            AdapterError::NoData(format!("renminbi gold product not listed (have: {:?})", available))
        })?;

    let price = product
        .zjj
        .as_ref()
        .and_then(json_price)
        .filter(|p| *p > 0.0)
        .ok_or_else(|| AdapterError::NoData("renminbi gold product without a positive price".into()))?;

    let mut sample = PriceSample::flat(price, SourceId::IcbcBank)
        .with_label(product.bz.clone().unwrap_or_default());
    sample.change_percent = product.up_down_rate.as_ref().and_then(json_price);
    Ok(sample)
}

/// Bank quote fallback source.
pub struct IcbcQuoteAdapter {
    client: Client,
    url: String,
}

impl IcbcQuoteAdapter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl QuoteSource for IcbcQuoteAdapter {
    fn provider_name(&self) -> &str {
        "ICBC"
    }

    fn source_id(&self) -> SourceId {
        SourceId::IcbcBank
    }

    async fn try_fetch(&self, _now: NaiveDateTime) -> Result<FetchOutcome, AdapterError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9")
            .header(REFERER, "https://m.icbc.com.cn/mpage/precious-metal/list")
            .header(ORIGIN, "https://m.icbc.com.cn")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Network(format!("ICBC price list: {}", response.status())));
        }

        let body = response.text().await?;
        let sample = parse_price_list(&body)?;
        debug!("ICBC {}: {}", sample.label.as_deref().unwrap_or("?"), sample.price);
        Ok(FetchOutcome::Price(sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_renminbi_gold_by_label_scan() {
        let body = r#"{
            "code": 0,
            "data": [
                {"bz": "美元账户黄金", "zjj": "2650.10", "upDownRate": "0.10"},
                {"bz": "人民币账户白银", "zjj": "7.80", "upDownRate": "-0.20"},
                {"bz": "人民币账户黄金", "zjj": "617.42", "upDownRate": "0.35"}
            ]
        }"#;
        let sample = parse_price_list(body).unwrap();
        assert_eq!(sample.price, 617.42);
        assert_eq!(sample.source, SourceId::IcbcBank);
        assert_eq!(sample.label.as_deref(), Some("人民币账户黄金"));
        assert_eq!(sample.change_percent, Some(0.35));
    }

    #[test]
    fn test_missing_product_is_no_data() {
        let body = r#"{"code": 0, "data": [{"bz": "美元账户黄金", "zjj": "2650.10"}]}"#;
        match parse_price_list(body) {
            Err(AdapterError::NoData(msg)) => assert!(msg.contains("美元账户黄金")),
            other => panic!("expected NoData, got {:?}", other),
        }
    }

    #[test]
    fn test_non_zero_code_is_shape_error() {
        let body = r#"{"code": 500, "data": null}"#;
        assert!(matches!(parse_price_list(body), Err(AdapterError::Shape(_))));
    }

    #[test]
    fn test_zero_price_is_no_data() {
        let body = r#"{"code": 0, "data": [{"bz": "人民币账户黄金", "zjj": "0"}]}"#;
        assert!(matches!(parse_price_list(body), Err(AdapterError::NoData(_))));
    }
}
