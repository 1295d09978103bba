//! Simulated paid services
//!
//! Stands in for real endpoints in mock mode: settles a fake transaction and
//! answers with a category-appropriate payload. AI and generation services
//! go through the content generator so a configured model is still used.

use async_trait::async_trait;
use paypipe_core::domain::service::{ServiceCategory, ServiceDescriptor};
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::provider::content::ContentGenerator;
use crate::provider::payment::{PaidResponse, PaymentError, PaymentProvider};

pub struct MockPaymentProvider {
    content: Arc<dyn ContentGenerator>,
    /// Remaining simulated wallet balance; unlimited when `None`
    balance: Mutex<Option<u64>>,
}

impl MockPaymentProvider {
    pub fn new(content: Arc<dyn ContentGenerator>) -> Self {
        Self {
            content,
            balance: Mutex::new(None),
        }
    }

    /// Simulates a wallet holding `balance` micro-units
    pub fn with_balance(self, balance: u64) -> Self {
        *self.balance.lock().unwrap() = Some(balance);
        self
    }

    fn debit(&self, amount: u64) -> Result<(), PaymentError> {
        let mut balance = self.balance.lock().unwrap();
        match balance.as_mut() {
            Some(remaining) if *remaining < amount => Err(PaymentError::InsufficientBalance),
            Some(remaining) => {
                *remaining -= amount;
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn respond(&self, service: &ServiceDescriptor, payload: &JsonValue) -> JsonValue {
        let query = payload
            .get("query")
            .and_then(JsonValue::as_str)
            .unwrap_or_default();
        let input = input_text(payload);

        match service.category {
            ServiceCategory::Market => price_payload(query),
            ServiceCategory::News => news_payload(query),
            ServiceCategory::Ai if has_tag(service, "sentiment") => {
                let result = self.content.analyze_sentiment(&input).await;
                json!({
                    "type": "sentiment",
                    "label": result.output.label,
                    "score": result.output.score,
                    "isReal": result.is_real,
                })
            }
            ServiceCategory::Ai if has_tag(service, "translate") => {
                let language = payload
                    .get("language")
                    .and_then(JsonValue::as_str)
                    .unwrap_or("es");
                let result = self.content.translate(&input, language).await;
                json!({
                    "type": "translation",
                    "text": result.output,
                    "language": language,
                    "isReal": result.is_real,
                })
            }
            ServiceCategory::Ai => {
                let result = self.content.summarize(&input).await;
                json!({ "type": "summary", "text": result.output, "isReal": result.is_real })
            }
            ServiceCategory::Generation if has_tag(service, "report") => {
                let context = (input != query).then_some(input.as_str());
                let result = self.content.generate_report(query, context).await;
                json!({
                    "type": "report",
                    "title": result.output.title,
                    "body": result.output.body,
                    "isReal": result.is_real,
                })
            }
            ServiceCategory::Generation => {
                let context = (input != query).then_some(input.as_str());
                let result = self.content.generate_tweet(query, context).await;
                json!({ "type": "tweet", "text": result.output, "isReal": result.is_real })
            }
            ServiceCategory::Data | ServiceCategory::Other => json!({
                "type": "data",
                "service": service.id,
                "query": query,
                "blockHeight": 880_000,
                "mempoolSize": 42_000,
                "feeRate": 12,
            }),
        }
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn pay(
        &self,
        service: &ServiceDescriptor,
        payload: &JsonValue,
    ) -> Result<PaidResponse, PaymentError> {
        self.debit(service.price.amount)?;
        let data = self.respond(service, payload).await;

        Ok(PaidResponse {
            tx_id: mock_tx_id(),
            amount: service.price.amount,
            asset: service.price.asset,
            data,
        })
    }
}

/// `0x` followed by 64 hex characters, shaped like a chain transaction id
pub fn mock_tx_id() -> String {
    format!(
        "0x{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

fn has_tag(service: &ServiceDescriptor, tag: &str) -> bool {
    service.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
}

/// Text a processing service should work on
///
/// Prefers the forwarded previous output. Structured outputs are flattened
/// to their readable text so summaries read like prose.
fn input_text(payload: &JsonValue) -> String {
    let query = payload
        .get("query")
        .and_then(JsonValue::as_str)
        .unwrap_or_default();
    let Some(input) = payload.get("input") else {
        return query.to_string();
    };

    let parsed = match input {
        JsonValue::String(s) => serde_json::from_str::<JsonValue>(s).unwrap_or(input.clone()),
        other => other.clone(),
    };
    readable_text(&parsed).unwrap_or_else(|| query.to_string())
}

fn readable_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
        JsonValue::Object(map) => {
            if let Some(headlines) = map.get("headlines").and_then(JsonValue::as_array) {
                let titles: Vec<String> = headlines
                    .iter()
                    .filter_map(|h| h.get("title").and_then(JsonValue::as_str))
                    .map(|t| format!("{}.", t.trim_end_matches('.')))
                    .collect();
                return (!titles.is_empty()).then(|| titles.join(" "));
            }
            for key in ["text", "body", "summary"] {
                if let Some(text) = map.get(key).and_then(JsonValue::as_str) {
                    return Some(text.to_string());
                }
            }
            if let (Some(symbol), Some(price)) = (
                map.get("symbol").and_then(JsonValue::as_str),
                map.get("price").and_then(JsonValue::as_f64),
            ) {
                return Some(format!("{} is trading at {:.2} USD.", symbol, price));
            }
            Some(value.to_string())
        }
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

fn price_payload(query: &str) -> JsonValue {
    let lowered = query.to_lowercase();
    let (symbol, price, change) = if lowered.contains("stx") || lowered.contains("stacks") {
        ("STX", 1.85, -1.2)
    } else if lowered.contains("eth") {
        ("ETH", 3_420.0, 0.8)
    } else {
        ("BTC", 97_250.0, 2.4)
    };
    json!({
        "type": "price",
        "symbol": symbol,
        "price": price,
        "currency": "USD",
        "change24h": change,
    })
}

fn news_payload(query: &str) -> JsonValue {
    let topic = if query.to_lowercase().contains("bitcoin") {
        "Bitcoin"
    } else {
        "Crypto"
    };
    json!({
        "type": "news",
        "headlines": [
            {
                "title": format!("{} markets rally as ETF inflows hit a record", topic),
                "source": "CoinDesk",
                "url": "https://example.com/news/1"
            },
            {
                "title": "Stacks developers ship faster block times",
                "source": "The Block",
                "url": "https://example.com/news/2"
            },
            {
                "title": "Regulators outline new stablecoin framework",
                "source": "Reuters",
                "url": "https://example.com/news/3"
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::catalog::fallback_services;
    use crate::provider::content::MockContentGenerator;

    fn provider() -> MockPaymentProvider {
        MockPaymentProvider::new(Arc::new(MockContentGenerator::new()))
    }

    fn service(id: &str) -> ServiceDescriptor {
        fallback_services("testnet")
            .into_iter()
            .find(|s| s.id == id)
            .unwrap()
    }

    #[test]
    fn test_mock_tx_id_shape() {
        let tx = mock_tx_id();
        assert!(tx.starts_with("0x"));
        assert_eq!(tx.len(), 66);
        assert!(tx[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_price_service_payload() {
        let paid = provider()
            .pay(&service("market-price"), &json!({ "query": "Get Bitcoin price" }))
            .await
            .unwrap();

        assert_eq!(paid.amount, 1_000);
        assert_eq!(paid.data["type"], "price");
        assert_eq!(paid.data["symbol"], "BTC");
    }

    #[tokio::test]
    async fn test_summarizer_reads_forwarded_headlines() {
        let news = news_payload("news");
        let payload = json!({
            "query": "Summarize the news",
            "input": serde_json::to_string(&news).unwrap(),
        });

        let paid = provider()
            .pay(&service("ai-summarizer"), &payload)
            .await
            .unwrap();

        assert_eq!(paid.data["type"], "summary");
        let text = paid.data["text"].as_str().unwrap();
        assert!(text.starts_with("Summary: Crypto markets rally"));
    }

    #[tokio::test]
    async fn test_balance_is_enforced() {
        let provider = provider().with_balance(1_500);
        let price = service("market-price");

        assert!(provider.pay(&price, &json!({})).await.is_ok());
        let err = provider.pay(&price, &json!({})).await.unwrap_err();
        assert_eq!(err, PaymentError::InsufficientBalance);
        assert_eq!(err.to_string(), "insufficient balance");
    }
}
