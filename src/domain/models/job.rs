// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::url_utils::clean_domain;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 消息体解析错误
///
/// 这类错误不可重试，消息会被直接确认丢弃
#[derive(Error, Debug, PartialEq, Eq)]
pub enum JobParseError {
    /// 消息体不是合法的JSON对象
    #[error("Invalid message body: {0}")]
    InvalidJson(String),
    /// 缺少域名字段
    #[error("Missing domain in message body")]
    MissingDomain,
}

/// 域名任务
///
/// 一个工作单元，`next` 为上次中断时的续爬游标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainJob {
    /// 清理后的域名
    pub domain: String,
    /// 续爬游标
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

#[derive(Deserialize)]
struct RawJob {
    #[serde(default)]
    domain: Option<Value>,
    #[serde(default)]
    next: Option<Value>,
}

impl DomainJob {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            next: None,
        }
    }

    pub fn with_next(domain: impl Into<String>, next: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            next: Some(next.into()),
        }
    }

    /// 解析消息体
    ///
    /// 接受 `{"domain": "..."}` 或 `{"domain": "...", "next": "..."|null}`
    pub fn parse(body: &str) -> Result<Self, JobParseError> {
        let raw: RawJob =
            serde_json::from_str(body).map_err(|e| JobParseError::InvalidJson(e.to_string()))?;

        let domain = raw
            .domain
            .as_ref()
            .and_then(Value::as_str)
            .map(clean_domain)
            .filter(|d| !d.is_empty())
            .ok_or(JobParseError::MissingDomain)?;

        let next = raw
            .next
            .as_ref()
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(Self { domain, next })
    }

    /// 序列化为消息体
    pub fn to_body(&self) -> String {
        match &self.next {
            Some(next) => serde_json::json!({ "domain": self.domain, "next": next }).to_string(),
            None => serde_json::json!({ "domain": self.domain }).to_string(),
        }
    }

    /// 站点起始URL
    pub fn start_url(&self) -> String {
        format!("https://{}", self.domain)
    }
}
