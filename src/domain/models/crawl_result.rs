// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 页面上发现的链接
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredLinks {
    /// 同站点链接
    pub internal: Vec<String>,
    /// 外部站点链接
    pub external: Vec<String>,
}

/// 爬取元数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlMetadata {
    /// 发现深度，起始URL为0
    pub depth: usize,
    /// 发现该URL的父页面
    pub parent_url: Option<String>,
}

/// 单个URL的爬取结果
///
/// 由抓取引擎产生，被广度优先策略和编排器消费，返回后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    /// 页面URL
    pub url: String,
    /// 是否成功
    pub success: bool,
    /// HTTP状态码
    pub status_code: Option<u16>,
    /// 发现的链接
    pub links: DiscoveredLinks,
    /// 页面HTML
    pub html: Option<String>,
    /// 错误信息
    pub error_message: Option<String>,
    /// 元数据
    pub metadata: CrawlMetadata,
}

impl CrawlResult {
    /// 构建成功的爬取结果
    pub fn success(url: impl Into<String>, status_code: u16, html: String, links: DiscoveredLinks) -> Self {
        Self {
            url: url.into(),
            success: true,
            status_code: Some(status_code),
            links,
            html: Some(html),
            error_message: None,
            metadata: CrawlMetadata::default(),
        }
    }

    /// 构建失败的爬取结果
    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            status_code: None,
            links: DiscoveredLinks::default(),
            html: None,
            error_message: Some(error.into()),
            metadata: CrawlMetadata::default(),
        }
    }

    /// 附加深度和父页面信息
    pub fn with_metadata(mut self, depth: usize, parent_url: Option<String>) -> Self {
        self.metadata = CrawlMetadata { depth, parent_url };
        self
    }
}
