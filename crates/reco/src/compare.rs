//! Multi-room comparison narrative via an external text-completion
//! service.
//!
//! The generator is an opaque capability: prompt in, prose out. Calls are
//! bounded by a timeout and any failure degrades to a rule-based summary,
//! so the auxiliary narrative can never fail a request.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::CompareConfig;
use crate::types::Room;

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// OpenAI-style chat-completion client.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    config: CompareConfig,
}

impl HttpTextGenerator {
    pub fn new(config: CompareConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let mut request = self.client.post(&self.config.api_url).json(&serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
        }));
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Text generation request failed")?
            .error_for_status()
            .context("Text generation returned an error status")?;

        let body: serde_json::Value = response
            .json()
            .await
            .context("Text generation response was not JSON")?;

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .context("Text generation response carried no content")
    }
}

/// Builds the comparison prompt and degrades gracefully when the
/// generator is unavailable.
pub struct RoomComparator {
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl RoomComparator {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    pub async fn compare(&self, rooms: &[Room]) -> String {
        if rooms.len() < 2 {
            return "At least two rooms are needed for a comparison.".to_string();
        }

        if let Some(generator) = &self.generator {
            let prompt = Self::build_prompt(rooms);
            match tokio::time::timeout(self.timeout, generator.generate(&prompt)).await {
                Ok(Ok(narrative)) => {
                    debug!(rooms = rooms.len(), "Generated comparison narrative");
                    return narrative;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Text generation failed, using rule-based summary");
                }
                Err(_) => {
                    warn!("Text generation timed out, using rule-based summary");
                }
            }
        }

        Self::fallback_summary(rooms)
    }

    fn build_prompt(rooms: &[Room]) -> String {
        let mut prompt = String::from(
            "Compare these rental rooms for a prospective tenant. Keep it short and factual.\n",
        );
        for room in rooms {
            prompt.push_str(&format!(
                "- {}: {:.0} per month, {:.0} m2, amenities: {}\n",
                room.title,
                room.price,
                room.area_m2,
                if room.amenities.is_empty() {
                    "none listed".to_string()
                } else {
                    room.amenities.join(", ")
                }
            ));
        }
        prompt
    }

    /// Deterministic summary used when the generator is missing or failing.
    fn fallback_summary(rooms: &[Room]) -> String {
        let cheapest = rooms
            .iter()
            .min_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal))
            .expect("rooms checked non-empty");
        let largest = rooms
            .iter()
            .max_by(|a, b| {
                a.area_m2
                    .partial_cmp(&b.area_m2)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .expect("rooms checked non-empty");

        format!(
            "Comparing {} rooms: \"{}\" is the most affordable at {:.0} per month, while \"{}\" offers the most space at {:.0} m2.",
            rooms.len(),
            cheapest.title,
            cheapest.price,
            largest.title,
            largest.area_m2
        )
    }
}
