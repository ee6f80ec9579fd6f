// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::shop::{ShopMetadata, UrlEntry};
use crate::domain::repositories::shop_repository::{
    resume_from_cursor, ShopRepository, StorageError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct ShopState {
    urls: HashMap<String, BTreeMap<String, UrlEntry>>,
    metadata: HashMap<String, ShopMetadata>,
    batch_writes: usize,
}

/// 内存店铺仓库实现，用于本地开发
#[derive(Default)]
pub struct MemoryShopRepositoryImpl {
    state: Mutex<ShopState>,
}

impl MemoryShopRepositoryImpl {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置商品URL
    pub fn seed_products<I, S>(&self, domain: &str, urls: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.lock();
        let entries = state.urls.entry(domain.to_string()).or_default();
        for url in urls {
            let url = url.into();
            entries.insert(url.clone(), UrlEntry::discovered(domain, url, true));
        }
    }

    /// 某个域名下的全部URL条目
    pub fn entries(&self, domain: &str) -> Vec<UrlEntry> {
        self.state
            .lock()
            .urls
            .get(domain)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 已执行的批量写入次数
    pub fn batch_writes(&self) -> usize {
        self.state.lock().batch_writes
    }

    pub fn metadata(&self, domain: &str) -> Option<ShopMetadata> {
        self.state.lock().metadata.get(domain).cloned()
    }
}

#[async_trait]
impl ShopRepository for MemoryShopRepositoryImpl {
    async fn get_product_urls(
        &self,
        domain: &str,
        cursor: Option<&str>,
    ) -> Result<Vec<String>, StorageError> {
        let urls = self
            .state
            .lock()
            .urls
            .get(domain)
            .map(|m| {
                m.values()
                    .filter(|e| e.is_product)
                    .map(|e| e.url.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(resume_from_cursor(urls, cursor))
    }

    async fn batch_write_url_entries(&self, entries: &[UrlEntry]) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        state.batch_writes += 1;
        for entry in entries {
            let stored = state.urls.entry(entry.domain.clone()).or_default();
            let mut entry = entry.clone();
            if entry.hash.is_none() {
                if let Some(existing) = stored.get(&entry.url) {
                    entry.hash = existing.hash.clone();
                    entry.standards_used = existing.standards_used;
                }
            }
            stored.insert(entry.url.clone(), entry);
        }
        Ok(())
    }

    async fn update_shop_metadata(&self, metadata: &ShopMetadata) -> Result<(), StorageError> {
        self.state
            .lock()
            .metadata
            .entry(metadata.domain.clone())
            .or_insert_with(|| ShopMetadata::new(&metadata.domain))
            .merge(metadata);
        Ok(())
    }

    async fn get_shop_metadata(&self, domain: &str) -> Result<Option<ShopMetadata>, StorageError> {
        Ok(self.metadata(domain))
    }

    async fn get_url_hash(&self, domain: &str, url: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .state
            .lock()
            .urls
            .get(domain)
            .and_then(|m| m.get(url))
            .and_then(|e| e.hash.clone()))
    }

    async fn update_url_hash(
        &self,
        domain: &str,
        url: &str,
        hash: &str,
    ) -> Result<(), StorageError> {
        self.state
            .lock()
            .urls
            .entry(domain.to_string())
            .or_default()
            .entry(url.to_string())
            .or_insert_with(|| UrlEntry::discovered(domain, url, true))
            .hash = Some(hash.to_string());
        Ok(())
    }
}
