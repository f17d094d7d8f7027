//! Inbound request handling
//!
//! Requests arrive as JSON tagged by `action`. All of them funnel through a
//! single dispatcher task, so message-driven writes are applied one at a
//! time and each caller gets its reply over a oneshot.

use crate::engine::{AcquisitionEngine, CapturedQuote};
use crate::error::InvalidInput;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action")]
pub enum EngineRequest {
    #[serde(rename = "getData")]
    GetData,

    #[serde(rename = "updateCurrentPrice")]
    UpdateCurrentPrice { price: Value },

    #[serde(rename = "updatePrice")]
    UpdatePrice { price: CapturedPayload },

    #[serde(rename = "setAlert")]
    SetAlert {
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        price: Option<Value>,
    },
}

/// Quote as sent by the page-capture collaborator. Prices may be numbers or
/// numeric strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPayload {
    #[serde(default)]
    pub buy_price: Value,
    #[serde(default)]
    pub sell_price: Option<Value>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, alias = "label")]
    pub name: Option<String>,
    #[serde(default, alias = "changePercent")]
    pub up_down_rate: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl EngineResponse {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            request_id: None,
            success: true,
            error: None,
            data,
        }
    }

    pub fn failed(err: &InvalidInput) -> Self {
        Self {
            request_id: None,
            success: false,
            error: Some(err.to_string()),
            data: None,
        }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

/// Split a raw transport payload into its request id and request.
pub fn decode(payload: &str) -> Result<(Option<String>, EngineRequest), (Option<String>, InvalidInput)> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| (None, InvalidInput::Request(e.to_string())))?;
    let request_id = value
        .get("requestId")
        .and_then(Value::as_str)
        .map(str::to_string);

    match serde_json::from_value::<EngineRequest>(value) {
        Ok(request) => Ok((request_id, request)),
        Err(e) => Err((request_id, InvalidInput::Request(e.to_string()))),
    }
}

/// Coerce a JSON number or numeric string; anything else names itself in the
/// error.
fn parse_price(value: &Value) -> Result<f64, InvalidInput> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        InvalidInput::Price(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    })
}

fn parse_optional(value: Option<&Value>) -> Option<f64> {
    value.and_then(|v| parse_price(v).ok())
}

/// Apply one request to the engine.
pub async fn handle(engine: &AcquisitionEngine, request: EngineRequest) -> EngineResponse {
    match request {
        EngineRequest::GetData => {
            let snapshot = engine.snapshot().await;
            EngineResponse::ok(serde_json::to_value(snapshot).ok())
        }

        EngineRequest::UpdateCurrentPrice { price } => {
            let result = match parse_price(&price) {
                Ok(price) => engine.update_current_price(price).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(price) => EngineResponse::ok(Some(json!({ "currentPrice": price }))),
                Err(e) => EngineResponse::failed(&e),
            }
        }

        EngineRequest::UpdatePrice { price } => {
            let buy_price = match parse_price(&price.buy_price) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Rejecting captured quote: {}", e);
                    return EngineResponse::failed(&e);
                }
            };
            let quote = CapturedQuote {
                buy_price,
                sell_price: parse_optional(price.sell_price.as_ref()),
                source: price.source,
                name: price.name,
                change_percent: parse_optional(price.up_down_rate.as_ref()),
            };
            match engine.update_price(quote).await {
                Ok(sample) => {
                    info!(
                        "Captured price {} ({})",
                        sample.price,
                        sample.label.as_deref().unwrap_or("page")
                    );
                    EngineResponse::ok(serde_json::to_value(sample).ok())
                }
                Err(e) => EngineResponse::failed(&e),
            }
        }

        EngineRequest::SetAlert { enabled, price } => {
            let threshold = match price.as_ref().map(parse_price).transpose() {
                Ok(t) => t,
                Err(InvalidInput::Price(raw)) => {
                    return EngineResponse::failed(&InvalidInput::AlertPrice(raw))
                }
                Err(e) => return EngineResponse::failed(&e),
            };
            match engine.set_alert(enabled, threshold).await {
                Ok(config) => EngineResponse::ok(serde_json::to_value(config).ok()),
                Err(e) => EngineResponse::failed(&e),
            }
        }
    }
}

type Job = (EngineRequest, oneshot::Sender<EngineResponse>);

/// Cloneable handle for submitting requests to the dispatcher task.
#[derive(Clone)]
pub struct RequestHandle {
    tx: mpsc::Sender<Job>,
}

impl RequestHandle {
    pub async fn call(&self, request: EngineRequest) -> Result<EngineResponse> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send((request, tx))
            .await
            .map_err(|_| anyhow!("Request dispatcher stopped"))?;
        rx.await.map_err(|_| anyhow!("Request dispatcher dropped the reply"))
    }
}

/// Spawn the dispatcher task; it runs until every handle is dropped.
pub fn spawn_dispatcher(engine: Arc<AcquisitionEngine>, capacity: usize) -> RequestHandle {
    let (tx, mut rx) = mpsc::channel::<Job>(capacity);

    tokio::spawn(async move {
        while let Some((request, reply)) = rx.recv().await {
            debug!("Dispatching {:?}", request);
            let response = handle(&engine, request).await;
            if reply.send(response).is_err() {
                debug!("Requester went away before the reply");
            }
        }
        info!("Request dispatcher stopped");
    });

    RequestHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_tagged_requests() {
        let (id, request) = decode(r#"{"action":"getData","requestId":"r1"}"#).unwrap();
        assert_eq!(id.as_deref(), Some("r1"));
        assert!(matches!(request, EngineRequest::GetData));

        let (_, request) =
            decode(r#"{"action":"updatePrice","price":{"buyPrice":"617.5","name":"人民币账户黄金","upDownRate":"0.3"}}"#)
                .unwrap();
        match request {
            EngineRequest::UpdatePrice { price } => {
                assert_eq!(parse_price(&price.buy_price).unwrap(), 617.5);
                assert_eq!(price.name.as_deref(), Some("人民币账户黄金"));
                assert_eq!(parse_optional(price.up_down_rate.as_ref()), Some(0.3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_unknown_action_keeps_request_id() {
        let (id, err) = decode(r#"{"action":"reboot","requestId":"r9"}"#).unwrap_err();
        assert_eq!(id.as_deref(), Some("r9"));
        assert!(matches!(err, InvalidInput::Request(_)));
    }

    #[test]
    fn test_parse_price_names_bad_value() {
        assert_eq!(parse_price(&json!("abc")), Err(InvalidInput::Price("abc".into())));
        assert_eq!(parse_price(&json!(null)), Err(InvalidInput::Price("null".into())));
        assert_eq!(parse_price(&json!(-5)).unwrap(), -5.0);
    }

    #[test]
    fn test_response_wire_shape() {
        let resp = EngineResponse::failed(&InvalidInput::price(-5.0)).with_request_id(Some("r2".into()));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["requestId"], "r2");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "invalid price: -5");
        assert!(json.get("data").is_none());
    }
}
