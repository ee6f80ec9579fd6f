// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_result::CrawlResult;
use crate::domain::services::link_discoverer::LinkDiscoverer;
use crate::engines::traits::{CrawlConfig, CrawlEngine, EngineError};
use crate::utils::retry_policy::RetryPolicy;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// HTTP抓取引擎
///
/// 基于reqwest实现，共享连接池，不执行JavaScript；
/// 可重试的错误按重试策略退避后重新请求
pub struct HttpCrawlEngine {
    client: reqwest::Client,
    retry: RetryPolicy,
}

/// 抓取成功的原始页面
struct FetchedPage {
    final_url: String,
    status_code: u16,
    body: String,
}

/// 只解析HTML页面，缺少 Content-Type 时按HTML处理
fn is_html(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime.is_empty() || mime == "text/html" || mime == "application/xhtml+xml"
}

impl HttpCrawlEngine {
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            client,
            retry: RetryPolicy {
                initial_backoff: Duration::from_millis(500),
                ..RetryPolicy::with_max_retries(1)
            },
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_with_retry(&self, url: &str, config: &CrawlConfig) -> Result<FetchedPage, EngineError> {
        let mut attempt = 0;
        loop {
            match self.fetch_page(url, config).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_retryable() && self.retry.should_retry(attempt) => {
                    attempt += 1;
                    let backoff = self.retry.calculate_backoff(attempt);
                    debug!("Retrying {} in {:?} after: {}", url, backoff, e);
                    sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn fetch_page(&self, url: &str, config: &CrawlConfig) -> Result<FetchedPage, EngineError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, config.user_agent.as_str())
            .timeout(config.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout
                } else {
                    EngineError::RequestFailed(e)
                }
            })?;

        let status_code = response.status().as_u16();
        if !response.status().is_success() {
            return Err(EngineError::Status(status_code));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !is_html(&content_type) {
            return Err(EngineError::UnsupportedContentType(content_type));
        }

        let final_url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchedPage {
            final_url,
            status_code,
            body,
        })
    }
}

#[async_trait]
impl CrawlEngine for HttpCrawlEngine {
    async fn fetch(&self, url: &str, config: &CrawlConfig) -> CrawlResult {
        match self.fetch_with_retry(url, config).await {
            Ok(page) => {
                let mut links = LinkDiscoverer::discover(&page.body, &page.final_url);
                if !config.include_external {
                    links.external.clear();
                }
                CrawlResult::success(url, page.status_code, page.body, links)
            }
            Err(e) => {
                debug!("Fetch of {} failed: {}", url, e);
                let status_code = match &e {
                    EngineError::Status(code) => Some(*code),
                    _ => None,
                };
                let mut result = CrawlResult::failure(url, e.to_string());
                result.status_code = status_code;
                result
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
#[path = "http_engine_test.rs"]
mod tests;
