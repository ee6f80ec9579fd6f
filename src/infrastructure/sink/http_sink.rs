// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::SinkSettings;
use crate::domain::models::product::ExtractedProduct;
use crate::domain::repositories::product_sink::{ProductSink, SinkError};
use crate::utils::retry_policy::{is_retryable_error, is_retryable_status, RetryPolicy};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Serialize)]
struct ItemsPayload<'a> {
    items: &'a [ExtractedProduct],
}

/// HTTP商品下游
///
/// 以 `PUT {"items": [...]}` 提交，失败时按指数退避重试
pub struct HttpProductSink {
    client: Client,
    api_url: String,
    timeout: Duration,
    retry_policy: RetryPolicy,
}

impl HttpProductSink {
    pub fn new(api_url: impl Into<String>, timeout: Duration, retry_policy: RetryPolicy) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into(),
            timeout,
            retry_policy,
        }
    }

    pub fn from_settings(api_url: &str, settings: &SinkSettings) -> Self {
        Self::new(
            api_url,
            Duration::from_secs(settings.timeout_secs),
            RetryPolicy::with_max_retries(settings.max_retries),
        )
    }
}

#[async_trait]
impl ProductSink for HttpProductSink {
    async fn submit(&self, items: &[ExtractedProduct]) -> Result<(), SinkError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut attempt: u32 = 0;
        loop {
            let response = self
                .client
                .put(&self.api_url)
                .timeout(self.timeout)
                .json(&ItemsPayload { items })
                .send()
                .await;

            let (retryable, error) = match response {
                Ok(resp) if resp.status().is_success() => {
                    info!("Submitted {} items to {}", items.len(), self.api_url);
                    return Ok(());
                }
                Ok(resp) => {
                    let status = resp.status();
                    if !is_retryable_status(status) {
                        return Err(SinkError::Rejected(status.as_u16()));
                    }
                    (true, format!("status {}", status))
                }
                Err(e) => (is_retryable_error(&e), e.to_string()),
            };

            if !retryable {
                return Err(SinkError::Request(error));
            }
            if !self.retry_policy.should_retry(attempt) {
                return Err(SinkError::RetriesExhausted {
                    attempts: attempt + 1,
                    last_error: error,
                });
            }

            attempt += 1;
            let backoff = self.retry_policy.calculate_backoff(attempt);
            warn!(
                "Sink submit failed ({}), retry {} in {:?}",
                error, attempt, backoff
            );
            sleep(backoff).await;
        }
    }
}

/// 未配置下游地址时使用，只记录日志
#[derive(Debug, Default)]
pub struct LoggingProductSink;

#[async_trait]
impl ProductSink for LoggingProductSink {
    async fn submit(&self, items: &[ExtractedProduct]) -> Result<(), SinkError> {
        warn!(
            "No sink API URL configured, dropping batch of {} items",
            items.len()
        );
        Ok(())
    }
}
