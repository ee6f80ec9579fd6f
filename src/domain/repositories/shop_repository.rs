// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::shop::{ShopMetadata, UrlEntry};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// 连接错误
    #[error("Storage connection error: {0}")]
    Connection(String),
    /// 操作错误
    #[error("Storage operation error: {0}")]
    Operation(String),
    /// 数据格式错误
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

/// 店铺仓库特质
///
/// 定义域名到URL条目、店铺元数据的数据访问接口
#[async_trait]
pub trait ShopRepository: Send + Sync {
    /// 获取域名下的候选商品URL
    ///
    /// `cursor` 存在且在列表中时从该位置开始，否则返回完整列表
    async fn get_product_urls(
        &self,
        domain: &str,
        cursor: Option<&str>,
    ) -> Result<Vec<String>, StorageError>;

    /// 批量写入URL条目
    async fn batch_write_url_entries(&self, entries: &[UrlEntry]) -> Result<(), StorageError>;

    /// 更新店铺元数据，未设置的时间字段保持原值
    async fn update_shop_metadata(&self, metadata: &ShopMetadata) -> Result<(), StorageError>;

    /// 读取店铺元数据
    async fn get_shop_metadata(&self, domain: &str) -> Result<Option<ShopMetadata>, StorageError>;

    /// 读取URL上次记录的状态哈希
    async fn get_url_hash(&self, domain: &str, url: &str) -> Result<Option<String>, StorageError>;

    /// 更新URL的状态哈希
    async fn update_url_hash(&self, domain: &str, url: &str, hash: &str)
        -> Result<(), StorageError>;
}

#[async_trait]
impl<T: ShopRepository + ?Sized> ShopRepository for Arc<T> {
    async fn get_product_urls(
        &self,
        domain: &str,
        cursor: Option<&str>,
    ) -> Result<Vec<String>, StorageError> {
        (**self).get_product_urls(domain, cursor).await
    }

    async fn batch_write_url_entries(&self, entries: &[UrlEntry]) -> Result<(), StorageError> {
        (**self).batch_write_url_entries(entries).await
    }

    async fn update_shop_metadata(&self, metadata: &ShopMetadata) -> Result<(), StorageError> {
        (**self).update_shop_metadata(metadata).await
    }

    async fn get_shop_metadata(&self, domain: &str) -> Result<Option<ShopMetadata>, StorageError> {
        (**self).get_shop_metadata(domain).await
    }

    async fn get_url_hash(&self, domain: &str, url: &str) -> Result<Option<String>, StorageError> {
        (**self).get_url_hash(domain, url).await
    }

    async fn update_url_hash(
        &self,
        domain: &str,
        url: &str,
        hash: &str,
    ) -> Result<(), StorageError> {
        (**self).update_url_hash(domain, url, hash).await
    }
}

/// 从游标位置截取URL列表
///
/// 游标不在列表中时从头开始
pub fn resume_from_cursor(urls: Vec<String>, cursor: Option<&str>) -> Vec<String> {
    match cursor.and_then(|c| urls.iter().position(|u| u == c)) {
        Some(start) => urls.into_iter().skip(start).collect(),
        None => urls,
    }
}
