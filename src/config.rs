use std::time::Duration;

use crate::error::{ChatError, Result};

pub const DEFAULT_DEDUP_CAPACITY: usize = 50;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ChatError::Config("base url is empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ChatError::Config(format!(
                "base url '{url}' must start with http:// or https://"
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ChatError::Config("request timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// Base url without trailing slashes.
    pub fn normalized_base_url(&self) -> String {
        self.base_url.trim().trim_end_matches('/').to_string()
    }
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    pub dedup_capacity: usize,
    /// Messages authored by this user are never surfaced.
    pub self_user_id: String,
}

impl PollerConfig {
    pub fn new(poll_interval: Duration, self_user_id: impl Into<String>) -> Self {
        Self {
            poll_interval,
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            self_user_id: self_user_id.into(),
        }
    }

    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(ChatError::Config("poll interval must be positive".to_string()));
        }
        // Bulk eviction keeps capacity / 2 entries, so 1 would keep nothing.
        if self.dedup_capacity < 2 {
            return Err(ChatError::Config(format!(
                "dedup capacity must be at least 2, got {}",
                self.dedup_capacity
            )));
        }
        if self.self_user_id.trim().is_empty() {
            return Err(ChatError::Config("self user id is empty".to_string()));
        }
        Ok(())
    }
}
