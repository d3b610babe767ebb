//! AI review service client
//!
//! Uploads a candidate to the review service and maps its answer onto a
//! verdict. The upstream quota is shared by every workflow in the process,
//! so the client owns a single rate limiter and all review calls wait on it.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use songforge_common::events::Verdict;
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Duration;

use super::{PortError, ReviewPort};

const USER_AGENT: &str = concat!("songforge-wo/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewBody<'a> {
    file_name: &'a str,
    audio_base64: String,
    planning_structure_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    verdict: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Review service HTTP client
pub struct ReviewClient {
    http_client: reqwest::Client,
    review_url: Url,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl ReviewClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        requests_per_minute: u32,
    ) -> Result<Self, PortError> {
        let per_minute = NonZeroU32::new(requests_per_minute).ok_or_else(|| {
            PortError::Configuration("review requests_per_minute must be at least 1".to_string())
        })?;

        let mut review_url = Url::parse(base_url)
            .map_err(|e| PortError::Configuration(format!("invalid review URL {}: {}", base_url, e)))?;
        review_url
            .path_segments_mut()
            .map_err(|_| PortError::Configuration(format!("review URL cannot be a base: {}", base_url)))?
            .pop_if_empty()
            .push("review");

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            review_url,
            rate_limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
        })
    }
}

/// Map the reviewer's verdict string; unknown values are a protocol error
fn parse_review(response: ReviewResponse) -> Result<Verdict, PortError> {
    let verdict = Verdict::parse(&response.verdict).ok_or_else(|| {
        PortError::InvalidResponse(format!("unknown verdict '{}'", response.verdict))
    })?;
    if let Some(reason) = response.reason.as_deref() {
        tracing::debug!(verdict = %verdict, reason, "Review reason");
    }
    Ok(verdict)
}

#[async_trait]
impl ReviewPort for ReviewClient {
    async fn review(
        &self,
        audio_path: &Path,
        planning_structure_id: Option<&str>,
    ) -> Result<Verdict, PortError> {
        let audio = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        // Upstream quota
        self.rate_limiter.until_ready().await;

        tracing::debug!(
            file = %file_name,
            bytes = audio.len(),
            planning_structure_id = ?planning_structure_id,
            "Submitting candidate for review"
        );

        let body = ReviewBody {
            file_name: &file_name,
            audio_base64: STANDARD.encode(&audio),
            planning_structure_id,
        };

        let response = self
            .http_client
            .post(self.review_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PortError::Remote(status.as_u16(), text));
        }

        let parsed: ReviewResponse = response
            .json()
            .await
            .map_err(|e| PortError::InvalidResponse(e.to_string()))?;
        parse_review(parsed)
    }
}
