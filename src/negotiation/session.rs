//! Conversation contract with the external negotiation partner, plus the two
//! shipped implementations: a real HTTP client and a simulated partner for
//! demos and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 12;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 6;

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent("sourcewise/0.1")
        .timeout(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
        .build()
        .expect("failed to build HTTP client")
});

/// One partner reply. `audio_b64` is an opaque speech-synthesis blob passed
/// through for presentation; the core never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerReply {
    pub text: String,
    pub quoted_price: Option<f64>,
    pub audio_b64: Option<String>,
}

#[async_trait]
pub trait NegotiationSession: Send + Sync {
    /// Opens a conversation for the named offer's vendor and returns its id.
    async fn start_conversation(&self, offer_name: &str) -> Result<String>;

    /// Posts one message and returns the reply with any price it contained.
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<PartnerReply>;
}

/// Extracts the last currency amount stated in a reply, treating the most
/// recently quoted figure as the vendor's final offer. Tolerates `$`,
/// thousands separators and trailing punctuation.
pub fn parse_last_price(text: &str) -> Option<f64> {
    let mut last = None;
    for raw in text.split_whitespace() {
        let token = raw.trim_end_matches(|c: char| !c.is_ascii_digit());
        if !token.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        // Percentages ("12.5% off") are discounts, not prices.
        if raw.as_bytes().get(token.len()) == Some(&b'%') {
            continue;
        }
        // Require a currency cue so plain counts ("10 units") are ignored.
        let looks_like_money =
            raw.starts_with('$') || token.contains('.') || token.contains(',');
        if !looks_like_money {
            continue;
        }
        let cleaned: String = token
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if let Ok(value) = cleaned.parse::<f64>() {
            if value.is_finite() && value >= 0.0 {
                last = Some(value);
            }
        }
    }
    last
}

/// HTTP client for the partner API: create-vendor-if-absent by name, then a
/// conversation per vendor, then message round trips.
pub struct HttpPartnerSession {
    base_url: String,
}

impl HttpPartnerSession {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn vendor_id(&self, name: &str) -> Result<String> {
        let url = format!("{}/vendors", self.base_url);
        let response = HTTP_CLIENT
            .post(&url)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .with_context(|| format!("failed POST {url}"))?
            .error_for_status()?;
        let body: Value = response.json().await.context("invalid vendor response")?;
        extract_id(&body).ok_or_else(|| anyhow!("vendor response carried no id"))
    }
}

#[async_trait]
impl NegotiationSession for HttpPartnerSession {
    async fn start_conversation(&self, offer_name: &str) -> Result<String> {
        let vendor_id = self.vendor_id(offer_name).await?;
        let url = format!("{}/vendors/{vendor_id}/conversations", self.base_url);
        let response = HTTP_CLIENT
            .post(&url)
            .send()
            .await
            .with_context(|| format!("failed POST {url}"))?
            .error_for_status()?;
        let body: Value = response
            .json()
            .await
            .context("invalid conversation response")?;
        extract_id(&body).ok_or_else(|| anyhow!("conversation response carried no id"))
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<PartnerReply> {
        let url = format!("{}/conversations/{conversation_id}/messages", self.base_url);
        let response = HTTP_CLIENT
            .post(&url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .with_context(|| format!("failed POST {url}"))?
            .error_for_status()?;
        let body: Value = response.json().await.context("invalid message response")?;
        let reply_text = body
            .get("reply")
            .or_else(|| body.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let audio_b64 = body
            .get("audio")
            .and_then(Value::as_str)
            .map(str::to_string);
        let quoted_price = parse_last_price(&reply_text);
        Ok(PartnerReply {
            text: reply_text,
            quoted_price,
            audio_b64,
        })
    }
}

fn extract_id(body: &Value) -> Option<String> {
    for key in ["id", "vendor_id", "conversation_id"] {
        if let Some(id) = body.get(key) {
            match id {
                Value::String(s) if !s.is_empty() => return Some(s.clone()),
                Value::Number(n) => return Some(n.to_string()),
                _ => {}
            }
        }
    }
    None
}

/// Stand-in partner used when no base URL is configured: agrees to a random
/// discount most of the time, declines otherwise. Never raises a price.
pub struct SimulatedSession {
    success_rate: f64,
    min_discount: f64,
    max_discount: f64,
    next_id: AtomicUsize,
}

impl SimulatedSession {
    pub fn new(success_rate: f64, min_discount: f64, max_discount: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
            min_discount: min_discount.max(0.0),
            max_discount: max_discount.max(min_discount.max(0.0)),
            next_id: AtomicUsize::new(1),
        }
    }

    /// The orchestrator states the current price in its opening message; the
    /// simulator quotes its counter-offer relative to that figure.
    fn asking_price(text: &str) -> Option<f64> {
        parse_last_price(text)
    }
}

impl Default for SimulatedSession {
    fn default() -> Self {
        Self::new(0.8, 0.05, 0.15)
    }
}

#[async_trait]
impl NegotiationSession for SimulatedSession {
    async fn start_conversation(&self, offer_name: &str) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(offer_name, "simulated vendor lookup");
        Ok(format!("sim-{id}"))
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<PartnerReply> {
        let Some(asking) = Self::asking_price(text) else {
            return Ok(PartnerReply {
                text: "Could you state the current price?".to_string(),
                quoted_price: None,
                audio_b64: None,
            });
        };
        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() > self.success_rate {
            debug!(conversation_id, "simulated vendor declined");
            return Ok(PartnerReply {
                text: "We cannot go lower than our listed price.".to_string(),
                quoted_price: None,
                audio_b64: None,
            });
        }
        let discount = rng.gen_range(self.min_discount..=self.max_discount);
        let counter = asking * (1.0 - discount);
        let text = format!("We can offer ${counter:.2} for this order.");
        let quoted_price = parse_last_price(&text);
        Ok(PartnerReply {
            text,
            quoted_price,
            audio_b64: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_amount_wins() {
        let text = "Our list price is $400.00 but we could do $362.50 today.";
        assert_eq!(parse_last_price(text), Some(362.5));
    }

    #[test]
    fn thousands_separators_are_tolerated() {
        assert_eq!(parse_last_price("Final offer: $1,250.00."), Some(1250.0));
    }

    #[test]
    fn plain_counts_are_not_prices() {
        assert_eq!(parse_last_price("We can ship 10 units in 3 days"), None);
    }

    #[test]
    fn percentages_are_not_prices() {
        assert_eq!(parse_last_price("We can do 12.5% off for you."), None);
        // The discount figure must not shadow the actual quote.
        assert_eq!(
            parse_last_price("With 10% off the final price is $108.00."),
            Some(108.0)
        );
    }

    #[test]
    fn no_amount_means_no_price() {
        assert_eq!(parse_last_price("We will get back to you."), None);
        assert_eq!(parse_last_price(""), None);
    }

    #[tokio::test]
    async fn simulator_never_raises_the_price() {
        let session = SimulatedSession::new(1.0, 0.05, 0.15);
        let id = session.start_conversation("CheapChair 3000").await.unwrap();
        for _ in 0..20 {
            let reply = session
                .send_message(&id, "Current price is $120.00, can you do better?")
                .await
                .unwrap();
            let quote = reply.quoted_price.expect("always-successful simulator");
            assert!(quote < 120.0);
            assert!(quote >= 120.0 * 0.84);
        }
    }

    #[tokio::test]
    async fn simulator_declines_without_an_asking_price() {
        let session = SimulatedSession::default();
        let id = session.start_conversation("Budget Desk").await.unwrap();
        let reply = session.send_message(&id, "hello").await.unwrap();
        assert!(reply.quoted_price.is_none());
    }
}
