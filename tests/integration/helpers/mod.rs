// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use harvestrs::domain::models::crawl_result::{CrawlResult, DiscoveredLinks};
use harvestrs::domain::models::product::ExtractedProduct;
use harvestrs::domain::repositories::product_sink::{ProductSink, SinkError};
use harvestrs::engines::traits::{CrawlConfig, CrawlEngine};
use harvestrs::infrastructure::repositories::redis_shop_repo_impl::RedisShopRepositoryImpl;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use testcontainers::core::WaitFor;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

/// 带 JSON-LD 商品数据的页面
pub fn product_html(sku: &str, price: &str) -> String {
    format!(
        r#"<html><head><script type="application/ld+json">
        {{"@type": "Product", "sku": "{}", "name": "Lot {}",
          "offers": {{"price": "{}", "priceCurrency": "EUR",
                      "availability": "https://schema.org/InStock"}}}}
        </script></head><body><h1>Lot {}</h1></body></html>"#,
        sku, sku, price, sku
    )
}

/// 内存中的商品页面集合，可为每个页面设置响应延迟
#[derive(Default)]
pub struct FakeShopEngine {
    pages: HashMap<String, (String, Duration)>,
    fetches: AtomicUsize,
}

impl FakeShopEngine {
    pub fn with_page(mut self, url: impl Into<String>, html: String) -> Self {
        self.pages.insert(url.into(), (html, Duration::ZERO));
        self
    }

    pub fn with_slow_page(mut self, url: impl Into<String>, html: String, delay: Duration) -> Self {
        self.pages.insert(url.into(), (html, delay));
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CrawlEngine for FakeShopEngine {
    async fn fetch(&self, url: &str, _config: &CrawlConfig) -> CrawlResult {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some((html, delay)) => {
                tokio::time::sleep(*delay).await;
                CrawlResult::success(url, 200, html.clone(), DiscoveredLinks::default())
            }
            None => CrawlResult::failure(url, "not found"),
        }
    }

    fn name(&self) -> &'static str {
        "fake-shop"
    }
}

/// 记录每批提交的商品编号
#[derive(Default)]
pub struct CollectingSink {
    batches: Mutex<Vec<Vec<String>>>,
}

impl CollectingSink {
    pub fn item_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.batches.lock().iter().flatten().cloned().collect();
        ids.sort();
        ids
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl ProductSink for CollectingSink {
    async fn submit(&self, items: &[ExtractedProduct]) -> Result<(), SinkError> {
        self.batches
            .lock()
            .push(items.iter().map(|i| i.shops_item_id.clone()).collect());
        Ok(())
    }
}

/// Redis容器及连接到它的仓库
pub struct RedisFixture {
    pub repo: RedisShopRepositoryImpl,
    // Keep node alive
    _node: ContainerAsync<GenericImage>,
}

/// 启动Redis容器
///
/// 没有可用的Docker时返回 `None`，调用方跳过测试
pub async fn start_redis() -> Option<RedisFixture> {
    let node = match GenericImage::new("redis", "7-alpine")
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
    {
        Ok(node) => node,
        Err(e) => {
            eprintln!("Skipping Redis test, container unavailable: {}", e);
            return None;
        }
    };
    let port = node
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get Redis port");
    let redis_url = format!("redis://127.0.0.1:{}", port);

    for _ in 0..20 {
        if let Ok(repo) = RedisShopRepositoryImpl::new(&redis_url).await {
            return Some(RedisFixture { repo, _node: node });
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    panic!("Failed to connect to Redis at {}", redis_url);
}
