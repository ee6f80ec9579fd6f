// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::shop::{ShopMetadata, UrlEntry};
use crate::domain::repositories::shop_repository::{
    resume_from_cursor, ShopRepository, StorageError,
};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::collections::HashMap;

impl From<redis::RedisError> for StorageError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout() {
            StorageError::Connection(e.to_string())
        } else {
            StorageError::Operation(e.to_string())
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::InvalidData(e.to_string())
    }
}

fn urls_key(domain: &str) -> String {
    format!("harvest:shop:{}:urls", domain)
}

fn meta_key(domain: &str) -> String {
    format!("harvest:shop:{}:meta", domain)
}

/// Redis店铺仓库实现
///
/// 每个域名一个哈希表保存URL条目（字段为URL，值为JSON），
/// 另有一个键保存店铺元数据
#[derive(Clone)]
pub struct RedisShopRepositoryImpl {
    connection: MultiplexedConnection,
}

impl RedisShopRepositoryImpl {
    pub async fn new(redis_url: &str) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(Self { connection })
    }

    async fn get_entry(&self, domain: &str, url: &str) -> Result<Option<UrlEntry>, StorageError> {
        let mut con = self.connection.clone();
        let raw: Option<String> = con.hget(urls_key(domain), url).await?;
        raw.map(|r| serde_json::from_str(&r).map_err(StorageError::from))
            .transpose()
    }
}

#[async_trait]
impl ShopRepository for RedisShopRepositoryImpl {
    async fn get_product_urls(
        &self,
        domain: &str,
        cursor: Option<&str>,
    ) -> Result<Vec<String>, StorageError> {
        let mut con = self.connection.clone();
        let raw: HashMap<String, String> = con.hgetall(urls_key(domain)).await?;

        let mut urls = Vec::new();
        for (url, value) in raw {
            let entry: UrlEntry = serde_json::from_str(&value)?;
            if entry.is_product {
                urls.push(url);
            }
        }
        urls.sort();

        Ok(resume_from_cursor(urls, cursor))
    }

    async fn batch_write_url_entries(&self, entries: &[UrlEntry]) -> Result<(), StorageError> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut con = self.connection.clone();
        let mut pipe = redis::pipe();
        for entry in entries {
            let mut entry = entry.clone();
            // discovery must not wipe what a previous scrape recorded
            if entry.hash.is_none() {
                if let Some(existing) = self.get_entry(&entry.domain, &entry.url).await? {
                    entry.hash = existing.hash;
                    entry.standards_used = existing.standards_used;
                }
            }
            pipe.hset(urls_key(&entry.domain), &entry.url, serde_json::to_string(&entry)?)
                .ignore();
        }
        pipe.query_async::<()>(&mut con).await?;
        Ok(())
    }

    async fn update_shop_metadata(&self, metadata: &ShopMetadata) -> Result<(), StorageError> {
        let mut current = self
            .get_shop_metadata(&metadata.domain)
            .await?
            .unwrap_or_else(|| ShopMetadata::new(&metadata.domain));
        current.merge(metadata);

        let mut con = self.connection.clone();
        con.set::<_, _, ()>(meta_key(&metadata.domain), serde_json::to_string(&current)?)
            .await?;
        Ok(())
    }

    async fn get_shop_metadata(&self, domain: &str) -> Result<Option<ShopMetadata>, StorageError> {
        let mut con = self.connection.clone();
        let raw: Option<String> = con.get(meta_key(domain)).await?;
        raw.map(|r| serde_json::from_str(&r).map_err(StorageError::from))
            .transpose()
    }

    async fn get_url_hash(&self, domain: &str, url: &str) -> Result<Option<String>, StorageError> {
        Ok(self.get_entry(domain, url).await?.and_then(|e| e.hash))
    }

    async fn update_url_hash(
        &self,
        domain: &str,
        url: &str,
        hash: &str,
    ) -> Result<(), StorageError> {
        let mut entry = self
            .get_entry(domain, url)
            .await?
            .unwrap_or_else(|| UrlEntry::discovered(domain, url, true));
        entry.hash = Some(hash.to_string());

        let mut con = self.connection.clone();
        con.hset::<_, _, _, ()>(urls_key(domain), url, serde_json::to_string(&entry)?)
            .await?;
        Ok(())
    }
}
