// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含队列、工作器、心跳、抢占监视、爬取、存储、下游接口等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 消息队列配置
    pub queue: QueueSettings,
    /// 工作器配置
    pub worker: WorkerSettings,
    /// 租约心跳配置
    pub heartbeat: HeartbeatSettings,
    /// 抢占监视配置
    pub preemption: PreemptionSettings,
    /// 爬取配置
    pub crawl: CrawlSettings,
    /// 存储配置
    pub storage: StorageSettings,
    /// 下游接口配置
    pub sink: SinkSettings,
    /// 指标配置
    pub metrics: MetricsSettings,
    /// 日志配置
    pub logging: LoggingSettings,
}

/// 队列后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// Amazon SQS
    Sqs,
    /// 进程内队列（本地开发）
    Memory,
}

/// 消息队列配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// 后端类型
    pub backend: QueueBackend,
    /// 入站队列URL
    pub queue_url: Option<String>,
    /// 死信队列URL
    pub dead_letter_queue_url: Option<String>,
    /// 自定义端点 (可选，用于 LocalStack 等兼容服务)
    pub endpoint_url: Option<String>,
    /// 区域
    pub region: Option<String>,
    /// 队列默认可见性超时（秒）
    pub visibility_timeout_secs: u64,
    /// 长轮询等待时间（秒）
    pub wait_time_secs: u64,
    /// 单次拉取的最大消息数
    pub max_messages: usize,
    /// 关闭竞争时的封存租约（秒）
    pub embargo_secs: u64,
}

/// 工作模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerMode {
    /// 广度优先发现站点URL并分类
    Discover,
    /// 抓取已知的商品URL并提取商品数据
    Scrape,
}

/// 工作器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerSettings {
    /// 工作器数量
    pub count: usize,
    /// 工作模式
    pub mode: WorkerMode,
    /// 批处理大小
    pub batch_size: usize,
    /// 优雅关闭的排空超时（秒）
    pub drain_timeout_secs: u64,
    /// 单个URL的抓取超时（秒）
    pub fetch_timeout_secs: u64,
    /// 进入死信前允许的最大接收次数
    pub max_receives: u32,
    /// 续爬任务的延迟（秒）
    pub recrawl_delay_secs: u64,
    /// 分类器阻塞线程数
    pub classifier_threads: usize,
}

/// 租约心跳配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatSettings {
    /// 续约间隔（秒）
    pub interval_secs: u64,
    /// 每次续约的可见性超时（秒）
    pub extend_timeout_secs: u64,
}

/// 抢占监视配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct PreemptionSettings {
    /// 是否启用
    pub enabled: bool,
    /// 元数据服务地址
    pub base_url: String,
    /// 轮询间隔（秒）
    pub interval_secs: u64,
    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,
}

/// 爬取配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlSettings {
    /// 最大深度
    pub max_depth: usize,
    /// 最大页面数 (不设置则不限制)
    pub max_pages: Option<usize>,
    /// 是否跟随外部链接
    pub include_external: bool,
    /// 排除的文件扩展名
    pub exclude_extensions: Vec<String>,
    /// 排除的URL通配符模式
    pub exclude_patterns: Vec<String>,
    /// 单层并发抓取数
    pub concurrency: usize,
    /// User-Agent
    pub user_agent: String,
    /// HTTP请求超时（秒）
    pub request_timeout_secs: u64,
    /// 是否以流式模式执行广度优先爬取
    pub streaming: bool,
}

/// 存储后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Redis
    Redis,
    /// 进程内存储（本地开发）
    Memory,
}

/// 存储配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 存储类型
    pub backend: StorageBackend,
    /// Redis连接URL
    pub redis_url: Option<String>,
}

/// 下游接口配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SinkSettings {
    /// 商品批量提交地址 (不设置则只记录日志)
    pub api_url: Option<String>,
    /// 请求超时（秒）
    pub timeout_secs: u64,
    /// 最大重试次数
    pub max_retries: u32,
}

/// 指标配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    /// 是否启用Prometheus导出
    pub enabled: bool,
    /// 监听地址
    pub listen: String,
}

/// 日志配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// 是否输出JSON格式日志
    pub json: bool,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        Self::builder()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()
    }

    /// `HARVEST__SECTION__KEY` 形式的环境变量覆盖
    pub(crate) fn environment() -> Environment {
        Environment::with_prefix("HARVEST")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("crawl.exclude_extensions")
            .with_list_parse_key("crawl.exclude_patterns")
            .try_parsing(true)
    }

    /// 只包含默认值的配置构建器
    pub(crate) fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            // Queue defaults
            .set_default("queue.backend", "sqs")?
            .set_default("queue.visibility_timeout_secs", 600)?
            .set_default("queue.wait_time_secs", 20)?
            .set_default("queue.max_messages", 1)?
            .set_default("queue.embargo_secs", 120)?
            // Worker defaults
            .set_default("worker.count", 10)?
            .set_default("worker.mode", "scrape")?
            .set_default("worker.batch_size", 50)?
            .set_default("worker.drain_timeout_secs", 90)?
            .set_default("worker.fetch_timeout_secs", 60)?
            .set_default("worker.max_receives", 5)?
            .set_default("worker.recrawl_delay_secs", 900)?
            .set_default("worker.classifier_threads", 4)?
            // Heartbeat defaults
            .set_default("heartbeat.interval_secs", 300)?
            .set_default("heartbeat.extend_timeout_secs", 600)?
            // Preemption defaults
            .set_default("preemption.enabled", true)?
            .set_default("preemption.base_url", "http://169.254.169.254")?
            .set_default("preemption.interval_secs", 5)?
            .set_default("preemption.request_timeout_secs", 2)?
            // Crawl defaults
            .set_default("crawl.max_depth", 5)?
            .set_default("crawl.include_external", false)?
            .set_default(
                "crawl.exclude_extensions",
                vec!["jpg", "jpeg", "png", "gif", "svg", "webp", "pdf", "zip", "css", "js"],
            )?
            .set_default("crawl.exclude_patterns", Vec::<String>::new())?
            .set_default("crawl.concurrency", 8)?
            .set_default(
                "crawl.user_agent",
                "Mozilla/5.0 (compatible; harvestrs/0.1; +https://github.com/Kirky-X)",
            )?
            .set_default("crawl.request_timeout_secs", 30)?
            .set_default("crawl.streaming", true)?
            // Storage defaults
            .set_default("storage.backend", "redis")?
            .set_default("storage.redis_url", "redis://127.0.0.1:6379")?
            // Sink defaults
            .set_default("sink.timeout_secs", 10)?
            .set_default("sink.max_retries", 3)?
            // Metrics defaults
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen", "0.0.0.0:9000")?
            // Logging defaults
            .set_default("logging.json", false)
    }
}

impl QueueSettings {
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.wait_time_secs)
    }

    pub fn embargo(&self) -> Duration {
        Duration::from_secs(self.embargo_secs)
    }
}

impl HeartbeatSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn extend_timeout(&self) -> Duration {
        Duration::from_secs(self.extend_timeout_secs)
    }
}
