//! The narrow "publish post" contract of the external content service

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{now_millis, AgentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub agent_id: AgentId,
    pub title: String,
    pub content: String,
}

/// Confirmation that a post was persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub post_id: String,
    /// Epoch milliseconds assigned by the service
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PublishError {
    #[error("rate limited by content service")]
    RateLimited,
    #[error("post rejected: {0}")]
    ValidationFailed(String),
    #[error("publish failed: {0}")]
    Unknown(String),
}

impl PublishError {
    /// Soft failures skip this announcement and allow a retry on the next
    /// eligible trigger
    pub fn is_soft(&self) -> bool {
        matches!(self, PublishError::RateLimited | PublishError::ValidationFailed(_))
    }
}

/// Anything that can persist a post
pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        request: PublishRequest,
    ) -> impl Future<Output = Result<PublishReceipt, PublishError>> + Send;
}

/// Offline publisher that accepts every post and hands out local ids
#[derive(Debug, Default)]
pub struct LocalPublisher {
    next_id: AtomicU64,
}

impl LocalPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }
}

impl Publisher for LocalPublisher {
    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, PublishError> {
        if request.title.trim().is_empty() || request.content.trim().is_empty() {
            return Err(PublishError::ValidationFailed("empty title or content".into()));
        }
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(PublishReceipt {
            post_id: format!("local-{}", n),
            timestamp: now_millis(),
        })
    }
}
