// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::CrawlSettings;
use crate::domain::models::crawl_result::CrawlResult;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 请求失败
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    /// 非成功状态码
    #[error("Unexpected status code: {0}")]
    Status(u16),
    /// 超时
    #[error("Timeout")]
    Timeout,
    /// 响应不是HTML页面
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),
    /// 其他错误
    #[error("Other error: {0}")]
    Other(String),
}

impl EngineError {
    /// 判断错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::RequestFailed(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            EngineError::Status(code) => *code >= 500 || *code == 429,
            EngineError::Timeout => true,
            EngineError::UnsupportedContentType(_) | EngineError::Other(_) => false,
        }
    }
}

/// 抓取配置
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// 单次请求超时
    pub timeout: Duration,
    /// User-Agent
    pub user_agent: String,
    /// `fetch_many` 的并发上限
    pub concurrency: usize,
    /// 是否保留外部链接
    pub include_external: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: "harvestrs/0.1".to_string(),
            concurrency: 8,
            include_external: false,
        }
    }
}

impl From<&CrawlSettings> for CrawlConfig {
    fn from(settings: &CrawlSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.request_timeout_secs),
            user_agent: settings.user_agent.clone(),
            concurrency: settings.concurrency.max(1),
            include_external: settings.include_external,
        }
    }
}

/// 抓取引擎特质
///
/// 失败不会以 `Err` 返回，而是编码在 `CrawlResult::success` 中
#[async_trait]
pub trait CrawlEngine: Send + Sync {
    /// 抓取单个URL
    async fn fetch(&self, url: &str, config: &CrawlConfig) -> CrawlResult;

    /// 并发抓取多个URL，结果顺序与输入一致
    async fn fetch_many(&self, urls: &[String], config: &CrawlConfig) -> Vec<CrawlResult> {
        let fetches: Vec<_> = urls.iter().map(|url| self.fetch(url, config)).collect();
        stream::iter(fetches)
            .buffered(config.concurrency.max(1))
            .collect()
            .await
    }

    /// 引擎名称
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: CrawlEngine + ?Sized> CrawlEngine for Arc<T> {
    async fn fetch(&self, url: &str, config: &CrawlConfig) -> CrawlResult {
        (**self).fetch(url, config).await
    }

    async fn fetch_many(&self, urls: &[String], config: &CrawlConfig) -> Vec<CrawlResult> {
        (**self).fetch_many(urls, config).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}
