use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::models::{ApiEnvelope, Contest, RankingPage, RankingQuery};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("rank request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{endpoint} failed ({status})")]
    Status { endpoint: String, status: u16 },

    #[error("{0}")]
    Api(String),

    #[error("invalid backend url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid session cookie")]
    InvalidSession,

    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[async_trait]
pub trait RankDataClient: Send + Sync {
    async fn get_contest_rank(&self, query: &RankingQuery) -> Result<RankingPage, ClientError>;
}

#[derive(Clone)]
pub struct HttpRankClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpRankClient {
    pub fn new(
        base_url: &str,
        session_id: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(session_id) = session_id {
            let cookie = HeaderValue::from_str(&format!("sessionid={}", session_id))
                .map_err(|_| ClientError::InvalidSession)?;
            headers.insert(COOKIE, cookie);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    pub async fn get_contest(&self, contest_id: &str) -> Result<Contest, ClientError> {
        self.get("api/contest", &[("id", contest_id)]).await
    }

    /// Non-admin callers get the backend's error envelope instead of a file.
    pub async fn download_rank(&self, contest_id: &str) -> Result<Bytes, ClientError> {
        let endpoint = "api/contest_rank";
        let url = self.base_url.join(endpoint)?;
        let response = self
            .client
            .get(url)
            .query(&[("contest_id", contest_id), ("download_csv", "1")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));
        let body = response.bytes().await?;
        if is_json {
            let envelope: ApiEnvelope = serde_json::from_slice(&body)?;
            return Err(ClientError::Api(envelope_message(envelope.data)));
        }
        debug!(contest_id, size = body.len(), "downloaded rank export");
        Ok(body)
    }

    async fn get<T, Q>(&self, endpoint: &str, query: &Q) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = self.base_url.join(endpoint)?;
        let response = self.client.get(url).query(query).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status {
                endpoint: endpoint.to_string(),
                status: response.status().as_u16(),
            });
        }

        let envelope: ApiEnvelope = response.json().await?;
        if envelope.error.is_some() {
            return Err(ClientError::Api(envelope_message(envelope.data)));
        }
        Ok(serde_json::from_value(envelope.data)?)
    }
}

fn envelope_message(data: serde_json::Value) -> String {
    match data {
        serde_json::Value::String(message) => message,
        other => other.to_string(),
    }
}

#[async_trait]
impl RankDataClient for HttpRankClient {
    async fn get_contest_rank(&self, query: &RankingQuery) -> Result<RankingPage, ClientError> {
        debug!(
            contest_id = %query.contest_id,
            offset = query.offset,
            limit = query.limit,
            force_refresh = query.force_refresh,
            "requesting contest rank"
        );
        self.get("api/contest_rank", query).await
    }
}
