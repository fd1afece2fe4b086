//! Bluesky (AT Protocol) publishing client.
//!
//! Logs in once with `com.atproto.server.createSession` and posts with
//! `com.atproto.repo.createRecord`. The session is held inside the client;
//! when the PDS answers `ExpiredToken` the session is refreshed once and the
//! post retried once.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::publish::richtext::{detect_link_facets, Facet};
use crate::publish::Publisher;

const POST_COLLECTION: &str = "app.bsky.feed.post";
const EXPIRED_TOKEN: &str = "ExpiredToken";

/// Authenticated session returned by `createSession` / `refreshSession`.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_jwt: String,
    pub refresh_jwt: String,
    pub did: String,
    pub handle: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct PostRecord<'a> {
    #[serde(rename = "$type")]
    kind: &'static str,
    text: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    facets: Vec<Facet>,
    #[serde(rename = "createdAt")]
    created_at: String,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'static str,
    record: &'a PostRecord<'a>,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

/// XRPC error body, e.g. `{"error":"ExpiredToken","message":"Token has expired"}`.
#[derive(Debug, Default, Deserialize)]
struct XrpcError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

enum PostFailure {
    ExpiredToken,
    Rejected(String),
}

pub struct BlueskyClient {
    service_url: String,
    http: Client,
    session: RwLock<Session>,
}

impl BlueskyClient {
    /// Create a session. Any failure here is `AppError::Auth`.
    pub async fn login(
        service_url: &str,
        identifier: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let service_url = service_url.trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Config(format!("failed to build HTTP client: {}", err)))?;

        let response = http
            .post(format!("{}/xrpc/com.atproto.server.createSession", service_url))
            .json(&LoginRequest { identifier, password })
            .send()
            .await
            .map_err(|err| AppError::Auth(format!("login request failed: {}", err)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = read_xrpc_error(response).await;
            return Err(AppError::Auth(format!(
                "Bluesky returned HTTP {}: {} {}",
                status, body.error, body.message
            )));
        }

        let session = response
            .json::<Session>()
            .await
            .map_err(|err| AppError::Auth(format!("unreadable session: {}", err)))?;

        tracing::info!("Logged in to {} as {}", service_url, session.handle);

        Ok(Self {
            service_url,
            http,
            session: RwLock::new(session),
        })
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    async fn create_post(&self, session: &Session, record: &PostRecord<'_>) -> Result<String, PostFailure> {
        let response = self
            .http
            .post(format!("{}/xrpc/com.atproto.repo.createRecord", self.service_url))
            .bearer_auth(&session.access_jwt)
            .json(&CreateRecordRequest {
                repo: &session.did,
                collection: POST_COLLECTION,
                record,
            })
            .send()
            .await
            .map_err(|err| PostFailure::Rejected(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let created = response
                .json::<CreateRecordResponse>()
                .await
                .map_err(|err| PostFailure::Rejected(format!("unreadable createRecord response: {}", err)))?;
            return Ok(created.uri);
        }

        let body = read_xrpc_error(response).await;
        if body.error == EXPIRED_TOKEN
            && (status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED)
        {
            return Err(PostFailure::ExpiredToken);
        }

        Err(PostFailure::Rejected(format!(
            "Bluesky returned HTTP {}: {} {}",
            status, body.error, body.message
        )))
    }

    async fn refresh_session(&self, stale: &Session) -> Result<Session, AppError> {
        let response = self
            .http
            .post(format!("{}/xrpc/com.atproto.server.refreshSession", self.service_url))
            .bearer_auth(&stale.refresh_jwt)
            .send()
            .await
            .map_err(|err| AppError::PublishRejected(format!("session refresh failed: {}", err)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = read_xrpc_error(response).await;
            return Err(AppError::PublishRejected(format!(
                "session refresh returned HTTP {}: {} {}",
                status, body.error, body.message
            )));
        }

        let fresh = response
            .json::<Session>()
            .await
            .map_err(|err| AppError::PublishRejected(format!("unreadable refreshed session: {}", err)))?;

        *self.session.write().await = fresh.clone();
        tracing::info!("Bluesky session refreshed for {}", fresh.handle);
        Ok(fresh)
    }
}

async fn read_xrpc_error(response: Response) -> XrpcError {
    response.json::<XrpcError>().await.unwrap_or_default()
}

#[async_trait]
impl Publisher for BlueskyClient {
    fn name(&self) -> &'static str {
        "Bluesky"
    }

    async fn publish(&self, text: &str) -> Result<(), AppError> {
        let record = PostRecord {
            kind: POST_COLLECTION,
            text,
            facets: detect_link_facets(text),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        tracing::debug!("Bluesky post record: {:?}", record);

        let session = self.session().await;
        let uri = match self.create_post(&session, &record).await {
            Ok(uri) => uri,
            Err(PostFailure::ExpiredToken) => {
                let fresh = self.refresh_session(&session).await?;
                match self.create_post(&fresh, &record).await {
                    Ok(uri) => uri,
                    Err(PostFailure::ExpiredToken) => {
                        return Err(AppError::PublishRejected(
                            "token expired again after refresh".into(),
                        ))
                    }
                    Err(PostFailure::Rejected(reason)) => {
                        return Err(AppError::PublishRejected(reason))
                    }
                }
            }
            Err(PostFailure::Rejected(reason)) => return Err(AppError::PublishRejected(reason)),
        };

        tracing::debug!("Bluesky post submitted: {}", uri);
        Ok(())
    }
}
