//! Client for the UK Food Standards Agency alerts API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::alerts::{Alert, AlertsSource};
use crate::error::AppError;

const USER_AGENT: &str = "FoodAlertsBot/0.1";

#[derive(Clone)]
pub struct FoodAlertsClient {
    base_url: String,
    http: Client,
}

/// `GET /id` response. Only `items` is used.
#[derive(Debug, Deserialize)]
struct AlertListResponse {
    items: Option<Vec<Alert>>,
}

impl FoodAlertsClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AppError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Config(format!("failed to build HTTP client: {}", err)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn fetch_alerts(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<Alert>, AppError> {
        let url = format!("{}/id", self.base_url);
        // Millisecond precision, rounded down, so `since` never passes an
        // unprocessed alert.
        let since_iso = since.to_rfc3339_opts(SecondsFormat::Millis, true);
        let limit = limit.to_string();

        tracing::debug!("Fetching food alerts from {} since {}", url, since_iso);

        let response = self
            .http
            .get(&url)
            .query(&[("since", since_iso.as_str()), ("_limit", limit.as_str())])
            .send()
            .await
            .map_err(|err| AppError::UpstreamUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamUnavailable(format!(
                "Food alerts API returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| AppError::UpstreamUnavailable(err.to_string()))?;

        let parsed: AlertListResponse = serde_json::from_slice(&body)
            .map_err(|err| AppError::MalformedResponse(err.to_string()))?;

        let items = parsed
            .items
            .ok_or_else(|| AppError::MalformedResponse("response has no items list".into()))?;

        tracing::debug!("Food alerts API returned {} items", items.len());
        Ok(items)
    }
}

#[async_trait]
impl AlertsSource for FoodAlertsClient {
    async fn list_since(&self, since: DateTime<Utc>, limit: u32) -> Result<Vec<Alert>, AppError> {
        self.fetch_alerts(since, limit).await
    }

    fn source_name(&self) -> &str {
        "Food Standards Agency"
    }
}
