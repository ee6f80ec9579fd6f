// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::{Settings, WorkerMode};
use crate::domain::models::crawl_result::CrawlResult;
use crate::domain::models::disposition::MessageDisposition;
use crate::domain::models::job::DomainJob;
use crate::domain::models::queue_message::QueueMessage;
use crate::domain::models::shop::{ShopMetadata, UrlEntry};
use crate::domain::repositories::product_sink::ProductSink;
use crate::domain::repositories::shop_repository::ShopRepository;
use crate::domain::services::bfs_strategy::{BfsConfig, CycleSafeBfsStrategy, UrlFilter};
use crate::domain::services::classifier::{BlockingClassifier, PatternUrlScorer, UrlClassifier};
use crate::domain::services::extraction_service::{ProductExtractor, StructuredDataExtractor};
use crate::engines::traits::{CrawlConfig, CrawlEngine};
use crate::infrastructure::metrics::{ITEMS_UNCHANGED_TOTAL, MESSAGES_TOTAL, URLS_FETCHED_TOTAL};
use crate::queue::message_queue::MessageQueue;
use crate::workers::batch_sender::{BatchItem, BatchSender};
use crate::workers::heartbeat::VisibilityHeartbeat;
use crate::workers::worker::MessageHandler;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use futures::{stream, StreamExt};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Span};

/// 域名处理器配置
#[derive(Debug, Clone)]
pub struct DomainWorkerConfig {
    /// 工作模式
    pub mode: WorkerMode,
    /// 下游批量大小，同时作为分类批量大小
    pub batch_size: usize,
    /// 单个URL的抓取超时
    pub fetch_timeout: Duration,
    /// 进入死信前允许的最大接收次数
    pub max_receives: u32,
    /// 完成后续爬任务的延迟
    pub recrawl_delay: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_extend: Duration,
    pub crawl: CrawlConfig,
    pub bfs: BfsConfig,
    pub filter: UrlFilter,
    /// 发现模式是否使用流式广度优先
    pub streaming: bool,
    /// 分类器并发线程数
    pub classifier_threads: usize,
}

impl Default for DomainWorkerConfig {
    fn default() -> Self {
        Self {
            mode: WorkerMode::Scrape,
            batch_size: 50,
            fetch_timeout: Duration::from_secs(60),
            max_receives: 5,
            recrawl_delay: Duration::from_secs(900),
            heartbeat_interval: Duration::from_secs(300),
            heartbeat_extend: Duration::from_secs(600),
            crawl: CrawlConfig::default(),
            bfs: BfsConfig::default(),
            filter: UrlFilter::default(),
            streaming: true,
            classifier_threads: 4,
        }
    }
}

impl DomainWorkerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            mode: settings.worker.mode,
            batch_size: settings.worker.batch_size.max(1),
            fetch_timeout: Duration::from_secs(settings.worker.fetch_timeout_secs),
            max_receives: settings.worker.max_receives,
            recrawl_delay: Duration::from_secs(settings.worker.recrawl_delay_secs),
            heartbeat_interval: settings.heartbeat.interval(),
            heartbeat_extend: settings.heartbeat.extend_timeout(),
            crawl: CrawlConfig::from(&settings.crawl),
            bfs: BfsConfig::from(&settings.crawl),
            filter: UrlFilter::from_settings(&settings.crawl),
            streaming: settings.crawl.streaming,
            classifier_threads: settings.worker.classifier_threads,
        }
    }
}

/// 单个域名的爬取结果
#[derive(Debug, PartialEq, Eq)]
enum CrawlOutcome {
    /// 没有候选URL
    Empty,
    Completed,
    /// 观察到停机，`next` 为第一个未处理的URL
    Interrupted(Option<String>),
    /// 发现结果过少，留待重投
    Retained,
}

/// 单个商品URL的抓取结果
enum ScrapedUrl {
    /// 抓取失败或超时
    Failed,
    /// 页面中没有商品数据
    NoProduct,
    Unchanged { standard: bool },
    Changed(BatchItem),
}

impl ScrapedUrl {
    /// 商品是否来自结构化数据，未取到商品时为 `None`
    fn standard(&self) -> Option<bool> {
        match self {
            ScrapedUrl::Failed => None,
            ScrapedUrl::NoProduct => Some(false),
            ScrapedUrl::Unchanged { standard } => Some(*standard),
            ScrapedUrl::Changed(item) => Some(item.entry.standards_used),
        }
    }
}

/// 域名爬取处理器
///
/// 每条消息对应一个域名：解析任务、启动租约心跳、
/// 按模式执行发现或抓取，最后决定消息的唯一处置方式
pub struct DomainCrawlHandler {
    queue: Arc<dyn MessageQueue>,
    outbound: Arc<dyn MessageQueue>,
    dead_letter: Option<Arc<dyn MessageQueue>>,
    storage: Arc<dyn ShopRepository>,
    engine: Arc<dyn CrawlEngine>,
    classifier: Arc<dyn UrlClassifier>,
    extractor: Arc<dyn ProductExtractor>,
    sink: Arc<dyn ProductSink>,
    shutdown: CancellationToken,
    config: DomainWorkerConfig,
}

impl DomainCrawlHandler {
    /// 创建处理器
    ///
    /// 续爬任务默认发回入站队列，分类和提取使用内置实现，
    /// 分类并发数取自 `config.classifier_threads`
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        storage: Arc<dyn ShopRepository>,
        engine: Arc<dyn CrawlEngine>,
        sink: Arc<dyn ProductSink>,
        shutdown: CancellationToken,
        config: DomainWorkerConfig,
    ) -> Self {
        let classifier = BlockingClassifier::new(PatternUrlScorer, config.classifier_threads);
        Self {
            outbound: queue.clone(),
            queue,
            dead_letter: None,
            storage,
            engine,
            classifier: Arc::new(classifier),
            extractor: Arc::new(StructuredDataExtractor::new()),
            sink,
            shutdown,
            config,
        }
    }

    pub fn with_outbound(mut self, outbound: Arc<dyn MessageQueue>) -> Self {
        self.outbound = outbound;
        self
    }

    pub fn with_dead_letter(mut self, dead_letter: Option<Arc<dyn MessageQueue>>) -> Self {
        self.dead_letter = dead_letter;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ProductExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// 处理一条消息，`Err` 表示放弃本次处理，消息留待重投
    async fn process(&self, message: &QueueMessage) -> anyhow::Result<MessageDisposition> {
        if message.receive_count > self.config.max_receives {
            self.dead_letter(message).await?;
            return Ok(MessageDisposition::DeadLettered);
        }

        let job = match DomainJob::parse(&message.body) {
            Ok(job) => job,
            Err(e) => {
                warn!("Dropping message: {}", e);
                self.queue.delete(message).await?;
                return Ok(MessageDisposition::Dropped);
            }
        };
        Span::current().record("domain", job.domain.as_str());

        let heartbeat = VisibilityHeartbeat::start(
            self.queue.clone(),
            message.clone(),
            self.config.heartbeat_interval,
            self.config.heartbeat_extend,
        );

        let crawled = match self.config.mode {
            WorkerMode::Discover => self.discover(&job).await,
            WorkerMode::Scrape => self.scrape(&job).await,
        };
        let settled = match crawled {
            Ok(outcome) => self.settle(&job, outcome).await,
            Err(e) => Err(e),
        };

        let renewals = heartbeat.stop().await;
        debug!(renewals, "Heartbeat stopped");

        let disposition = settled?;
        if disposition.is_acknowledged() {
            self.queue.delete(message).await?;
        }
        Ok(disposition)
    }

    /// 转发到死信队列（若已配置）并删除原消息
    async fn dead_letter(&self, message: &QueueMessage) -> anyhow::Result<()> {
        warn!(
            receive_count = message.receive_count,
            "Message exceeded {} receives, dead-lettering", self.config.max_receives
        );
        if let Some(dead_letter) = &self.dead_letter {
            dead_letter.send(&message.body, Duration::ZERO).await?;
        }
        self.queue.delete(message).await?;
        Ok(())
    }

    /// 把爬取结果转换为消息处置，必要时发送续爬任务
    async fn settle(&self, job: &DomainJob, outcome: CrawlOutcome) -> anyhow::Result<MessageDisposition> {
        match outcome {
            CrawlOutcome::Empty => {
                info!("No candidate URLs, acknowledging");
                Ok(MessageDisposition::Completed)
            }
            CrawlOutcome::Retained => Ok(MessageDisposition::Retained),
            CrawlOutcome::Completed => {
                let continuation = DomainJob::new(job.domain.clone());
                self.outbound
                    .send(&continuation.to_body(), self.config.recrawl_delay)
                    .await?;
                info!("Domain completed, next run in {:?}", self.config.recrawl_delay);
                Ok(MessageDisposition::Completed)
            }
            CrawlOutcome::Interrupted(next) => {
                let continuation = DomainJob {
                    domain: job.domain.clone(),
                    next: next.clone(),
                };
                self.outbound
                    .send(&continuation.to_body(), Duration::ZERO)
                    .await?;
                info!("Domain interrupted, continuation queued at {:?}", next);
                Ok(MessageDisposition::Interrupted { next })
            }
        }
    }

    /// 抓取模式：遍历已知商品URL，提取、比较哈希、转发变化的商品
    async fn scrape(&self, job: &DomainJob) -> anyhow::Result<CrawlOutcome> {
        let urls = self
            .storage
            .get_product_urls(&job.domain, job.next.as_deref())
            .await?;
        if urls.is_empty() {
            return Ok(CrawlOutcome::Empty);
        }

        let started = Utc::now();
        info!("Scraping {} product URLs", urls.len());

        let batch_size = self.config.batch_size;
        let (tx, sender) =
            BatchSender::new(self.sink.clone(), self.storage.clone(), batch_size).spawn(batch_size);

        let domain = job.domain.as_str();
        let mut fetched = stream::iter(urls.iter().cloned())
            .map(|url| async move { self.scrape_url(domain, &url).await })
            .buffered(self.config.crawl.concurrency.max(1));

        let mut processed = 0;
        let mut scraped_pages = 0;
        let mut standard_pages = 0;
        let mut interrupted = false;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    interrupted = true;
                    break;
                }
                next = fetched.next() => next,
            };
            let Some(scraped) = next else {
                break;
            };
            processed += 1;
            if let Some(standard) = scraped.standard() {
                scraped_pages += 1;
                standard_pages += usize::from(standard);
            }
            if let ScrapedUrl::Changed(item) = scraped {
                if tx.send(item).await.is_err() {
                    // sender stopped on an error, reported below
                    break;
                }
            }
        }
        drop(fetched);
        drop(tx);

        let summary = sender
            .await
            .map_err(|e| anyhow!("Batch sender task failed: {}", e))??;
        info!(
            "Scraped {}/{} URLs, forwarded {} items",
            processed,
            urls.len(),
            summary.forwarded
        );

        if interrupted && processed < urls.len() {
            return Ok(CrawlOutcome::Interrupted(Some(urls[processed].clone())));
        }

        let mut metadata = ShopMetadata::new(domain);
        metadata.last_scraped_start = Some(started);
        metadata.last_scraped_end = Some(Utc::now());
        if scraped_pages > 0 {
            metadata.standards_used = Some(standard_pages > 0);
        }
        self.storage.update_shop_metadata(&metadata).await?;
        Ok(CrawlOutcome::Completed)
    }

    /// 抓取单个URL，只有哈希变化的商品需要转发
    async fn scrape_url(&self, domain: &str, url: &str) -> ScrapedUrl {
        let fetch = self.engine.fetch(url, &self.config.crawl);
        let result = match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => {
                counter!(URLS_FETCHED_TOTAL, "outcome" => "timeout").increment(1);
                warn!(%url, "Fetch timed out after {:?}", self.config.fetch_timeout);
                return ScrapedUrl::Failed;
            }
        };
        if !result.success {
            counter!(URLS_FETCHED_TOTAL, "outcome" => "error").increment(1);
            warn!(
                %url,
                "Fetch failed: {}",
                result.error_message.as_deref().unwrap_or("unknown error")
            );
            return ScrapedUrl::Failed;
        }
        counter!(URLS_FETCHED_TOTAL, "outcome" => "ok").increment(1);

        let Some(html) = result.html else {
            return ScrapedUrl::NoProduct;
        };
        let Some(product) = self.extractor.extract(&html, url).await else {
            debug!(%url, "No product data found");
            return ScrapedUrl::NoProduct;
        };

        let standard = product.source.is_standard();
        let hash = product.state_hash();
        match self.storage.get_url_hash(domain, url).await {
            Ok(Some(stored)) if stored == hash => {
                counter!(ITEMS_UNCHANGED_TOTAL).increment(1);
                debug!(%url, "Product unchanged");
                return ScrapedUrl::Unchanged { standard };
            }
            Ok(_) => {}
            Err(e) => warn!(%url, "Failed to read stored hash, treating as changed: {}", e),
        }

        ScrapedUrl::Changed(BatchItem {
            entry: UrlEntry::scraped(domain, url, hash, standard),
            product,
        })
    }

    /// 发现模式：从站点首页广度优先爬取，分类并写入全部URL
    async fn discover(&self, job: &DomainJob) -> anyhow::Result<CrawlOutcome> {
        let started = Utc::now();
        let start_url = job.start_url();
        let strategy = CycleSafeBfsStrategy::new(
            self.engine.clone(),
            self.config.bfs.clone(),
            self.config.crawl.clone(),
        )
        .with_filter(self.config.filter.clone())
        .with_cancellation(self.shutdown.clone());

        let domain = job.domain.as_str();
        let batch_size = self.config.batch_size;
        let (discovered, stats) = if self.config.streaming {
            let (tx, mut rx) = mpsc::channel::<CrawlResult>(batch_size);
            let store = async move {
                let mut discovered = 0;
                let mut chunk = Vec::with_capacity(batch_size);
                while let Some(result) = rx.recv().await {
                    if !result.success {
                        continue;
                    }
                    discovered += 1;
                    chunk.push(result.url);
                    if chunk.len() >= batch_size {
                        self.store_classified(domain, std::mem::take(&mut chunk)).await?;
                    }
                }
                if !chunk.is_empty() {
                    self.store_classified(domain, chunk).await?;
                }
                Ok::<usize, anyhow::Error>(discovered)
            };
            let (stats, stored) = tokio::join!(strategy.run_streaming(&start_url, tx), store);
            (stored?, stats)
        } else {
            let (results, stats) = strategy.run_with_stats(&start_url).await;
            let urls: Vec<String> = results
                .into_iter()
                .filter(|r| r.success)
                .map(|r| r.url)
                .collect();
            for chunk in urls.chunks(batch_size) {
                self.store_classified(domain, chunk.to_vec()).await?;
            }
            (urls.len(), stats)
        };

        info!(
            "Discovered {} URLs in {} levels ({} skipped)",
            discovered, stats.levels, stats.urls_skipped
        );

        if stats.cancelled {
            return Ok(CrawlOutcome::Interrupted(None));
        }
        if discovered <= 1 {
            warn!("Discovery produced {} URLs, leaving message for redelivery", discovered);
            return Ok(CrawlOutcome::Retained);
        }

        let mut metadata = ShopMetadata::new(domain);
        metadata.last_crawled_start = Some(started);
        metadata.last_crawled_end = Some(Utc::now());
        self.storage.update_shop_metadata(&metadata).await?;
        Ok(CrawlOutcome::Completed)
    }

    /// 分类一批URL并写入存储
    ///
    /// 分类失败只跳过这一批，存储失败向上传播
    async fn store_classified(&self, domain: &str, urls: Vec<String>) -> anyhow::Result<usize> {
        let classes = match self.classifier.classify_batch(&urls).await {
            Ok(classes) => classes,
            Err(e) => {
                warn!("Classification failed for {} URLs, skipping: {}", urls.len(), e);
                return Ok(0);
            }
        };

        let entries: Vec<UrlEntry> = urls
            .into_iter()
            .zip(classes)
            .map(|(url, class)| UrlEntry::discovered(domain, url, class.is_product))
            .collect();
        let products = entries.iter().filter(|e| e.is_product).count();

        self.storage.batch_write_url_entries(&entries).await?;
        debug!("Stored {} URLs ({} products)", entries.len(), products);
        Ok(entries.len())
    }
}

#[async_trait]
impl MessageHandler for DomainCrawlHandler {
    #[instrument(
        name = "domain_message",
        skip_all,
        fields(message_id = %message.message_id, domain = tracing::field::Empty)
    )]
    async fn handle(&self, message: QueueMessage) -> anyhow::Result<()> {
        match self.process(&message).await {
            Ok(disposition) => {
                counter!(MESSAGES_TOTAL, "disposition" => disposition.as_str()).increment(1);
                info!("Message {}", disposition.as_str());
                Ok(())
            }
            Err(e) => {
                let disposition = MessageDisposition::Abandoned;
                counter!(MESSAGES_TOTAL, "disposition" => disposition.as_str()).increment(1);
                error!("Message abandoned, left for redelivery: {:#}", e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[path = "domain_worker_test.rs"]
mod tests;
