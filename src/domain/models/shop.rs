// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// URL条目
///
/// 每个发现的URL持久化一条，`hash` 编码可观察状态（价格、库存）用于变更检测
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlEntry {
    /// 所属域名
    pub domain: String,
    /// URL
    pub url: String,
    /// 是否为商品页
    pub is_product: bool,
    /// 最近一次提取的状态哈希
    pub hash: Option<String>,
    /// 是否通过结构化数据标准提取
    pub standards_used: bool,
}

impl UrlEntry {
    /// 发现阶段产生的条目，尚无哈希
    ///
    /// 写入时保留已记录的哈希和标准标记
    pub fn discovered(domain: impl Into<String>, url: impl Into<String>, is_product: bool) -> Self {
        Self {
            domain: domain.into(),
            url: url.into(),
            is_product,
            hash: None,
            standards_used: false,
        }
    }

    /// 抓取阶段产生的条目，携带新哈希
    pub fn scraped(domain: impl Into<String>, url: impl Into<String>, hash: String, standards_used: bool) -> Self {
        Self {
            domain: domain.into(),
            url: url.into(),
            is_product: true,
            hash: Some(hash),
            standards_used,
        }
    }
}

/// 店铺元数据
///
/// 按域名持久化；字段为 `None` 时表示保持原值不变
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopMetadata {
    /// 域名
    pub domain: String,
    /// 最近一次抓取是否有页面命中结构化数据标准
    #[serde(default)]
    pub standards_used: Option<bool>,
    /// 最近一次发现开始时间
    pub last_crawled_start: Option<DateTime<Utc>>,
    /// 最近一次发现结束时间
    pub last_crawled_end: Option<DateTime<Utc>>,
    /// 最近一次抓取开始时间
    pub last_scraped_start: Option<DateTime<Utc>>,
    /// 最近一次抓取结束时间
    pub last_scraped_end: Option<DateTime<Utc>>,
}

impl ShopMetadata {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    /// 用 `update` 中已设置的字段覆盖当前值
    pub fn merge(&mut self, update: &ShopMetadata) {
        if update.standards_used.is_some() {
            self.standards_used = update.standards_used;
        }
        if update.last_crawled_start.is_some() {
            self.last_crawled_start = update.last_crawled_start;
        }
        if update.last_crawled_end.is_some() {
            self.last_crawled_end = update.last_crawled_end;
        }
        if update.last_scraped_start.is_some() {
            self.last_scraped_start = update.last_scraped_start;
        }
        if update.last_scraped_end.is_some() {
            self.last_scraped_end = update.last_scraped_end;
        }
    }
}
