//! HTTP publisher for the external content service
//!
//! Posts are sent as JSON to `{base_url}/posts`. Status codes map onto the
//! publish contract: 429 is a rate limit, 400/422 a validation failure,
//! anything else unexpected is unknown.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::core::config::PublishConfig;
use crate::core::error::{EngineError, Result};
use crate::core::types::now_millis;
use crate::publish::contract::{PublishError, PublishReceipt, PublishRequest, Publisher};

pub struct HttpPublisher {
    client: Client,
    api_key: Option<String>,
    posts_url: String,
}

impl HttpPublisher {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::InvalidConfig(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            posts_url: format!("{}/posts", base_url.trim_end_matches('/')),
        })
    }

    /// Build from the publish section; None when no service URL is configured
    pub fn from_config(config: &PublishConfig) -> Result<Option<Self>> {
        match &config.url {
            Some(url) => Ok(Some(Self::new(
                url,
                config.api_key.clone(),
                Duration::from_secs(config.timeout_secs),
            )?)),
            None => Ok(None),
        }
    }

    pub fn posts_url(&self) -> &str {
        &self.posts_url
    }

    async fn send(&self, request: &PublishRequest) -> std::result::Result<PublishReceipt, PublishError> {
        let body = PostBody {
            agent_id: request.agent_id.to_string(),
            title: &request.title,
            content: &request.content,
        };

        let mut builder = self
            .client
            .post(&self.posts_url)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PublishError::Unknown(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, error_text));
        }

        let created: PostCreated = response
            .json()
            .await
            .map_err(|e| PublishError::Unknown(e.to_string()))?;

        Ok(PublishReceipt {
            post_id: created.id,
            timestamp: created.created_at.unwrap_or_else(now_millis),
        })
    }
}

impl Publisher for HttpPublisher {
    async fn publish(&self, request: PublishRequest) -> std::result::Result<PublishReceipt, PublishError> {
        self.send(&request).await
    }
}

fn classify_status(status: StatusCode, body: String) -> PublishError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => PublishError::RateLimited,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => PublishError::ValidationFailed(body),
        other => PublishError::Unknown(format!("{}: {}", other, body)),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostBody<'a> {
    agent_id: String,
    title: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostCreated {
    #[serde(alias = "postId")]
    id: String,
    #[serde(default)]
    created_at: Option<u64>,
}
