// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::CrawlSettings;
use crate::domain::models::crawl_result::CrawlResult;
use crate::engines::traits::{CrawlConfig, CrawlEngine};
use crate::utils::url_utils::normalize_url;
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// 广度优先配置
#[derive(Debug, Clone)]
pub struct BfsConfig {
    /// 最大深度，起始URL深度为0
    pub max_depth: usize,
    /// 最大抓取页数，`None` 表示不限
    pub max_pages: Option<usize>,
    /// 是否跟随外部链接
    pub include_external: bool,
}

impl Default for BfsConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_pages: None,
            include_external: false,
        }
    }
}

impl From<&CrawlSettings> for BfsConfig {
    fn from(settings: &CrawlSettings) -> Self {
        Self {
            max_depth: settings.max_depth,
            max_pages: settings.max_pages,
            include_external: settings.include_external,
        }
    }
}

/// URL排除过滤器
///
/// 扩展名和通配符模式均大小写不敏感，与深度无关
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    extensions: HashSet<String>,
    patterns: Vec<Regex>,
}

impl UrlFilter {
    pub fn new<E, P>(exclude_extensions: E, exclude_patterns: P) -> Self
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let extensions = exclude_extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        let patterns = exclude_patterns
            .into_iter()
            .filter_map(|p| glob_to_regex(p.as_ref()))
            .collect();

        Self {
            extensions,
            patterns,
        }
    }

    pub fn from_settings(settings: &CrawlSettings) -> Self {
        Self::new(&settings.exclude_extensions, &settings.exclude_patterns)
    }

    /// 扩展名是否被排除，取最后一个路径段中最后一个 `.` 之后的部分
    pub fn is_excluded_extension(&self, url: &Url) -> bool {
        if self.extensions.is_empty() {
            return false;
        }
        let last_segment = url.path().rsplit('/').next().unwrap_or_default();
        match last_segment.rsplit_once('.') {
            Some((_, ext)) => self.extensions.contains(&ext.to_ascii_lowercase()),
            None => false,
        }
    }

    /// 完整URL是否匹配任一排除模式
    pub fn is_excluded_pattern(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(url))
    }
}

/// 把 `*`/`?` 通配符模式转换为整串匹配的正则
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return None;
    }

    let mut expr = String::from("(?i)^");
    let mut buf = [0u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    expr.push('$');

    match Regex::new(&expr) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Ignoring exclude pattern {:?}: {}", pattern, e);
            None
        }
    }
}

/// 一次遍历的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BfsStats {
    /// 已发起的抓取数
    pub pages_crawled: usize,
    /// 被过滤掉的链接数
    pub urls_skipped: usize,
    /// 已完成的层数
    pub levels: usize,
    /// 是否因取消而提前结束
    pub cancelled: bool,
}

/// 单次遍历的私有状态，不在多次运行间共享
struct Traversal {
    visited: HashSet<String>,
    depths: HashMap<String, usize>,
    stats: BfsStats,
}

impl Traversal {
    fn seeded(start: &str) -> Self {
        let mut visited = HashSet::new();
        visited.insert(start.to_string());
        let mut depths = HashMap::new();
        depths.insert(start.to_string(), 0);
        Self {
            visited,
            depths,
            stats: BfsStats::default(),
        }
    }

    fn depth_of(&self, url: &str) -> usize {
        self.depths.get(url).copied().unwrap_or(0)
    }
}

type Level = Vec<(String, Option<String>)>;

/// 无环广度优先爬取策略
///
/// 每个规范化URL最多抓取一次；层与层严格按顺序执行，
/// 第N层的成功结果全部完成链接发现后才开始第N+1层
pub struct CycleSafeBfsStrategy<E> {
    engine: E,
    config: BfsConfig,
    filter: UrlFilter,
    crawl_config: CrawlConfig,
    cancel: CancellationToken,
}

impl<E: CrawlEngine> CycleSafeBfsStrategy<E> {
    pub fn new(engine: E, config: BfsConfig, crawl_config: CrawlConfig) -> Self {
        Self {
            engine,
            config,
            filter: UrlFilter::default(),
            crawl_config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_filter(mut self, filter: UrlFilter) -> Self {
        self.filter = filter;
        self
    }

    /// 注入取消信号，观察到后返回已收集的结果
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 判断URL在给定深度是否可以处理
    ///
    /// 纯函数：基础校验 + 扩展名排除 + 模式排除
    pub fn can_process_url(&self, url: &str, depth: usize) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return false;
        }
        if parsed.host_str().is_none() || depth > self.config.max_depth {
            return false;
        }
        !self.filter.is_excluded_extension(&parsed) && !self.filter.is_excluded_pattern(url)
    }

    /// 批量模式
    ///
    /// 每层一次多路抓取，返回全部结果
    pub async fn run(&self, start_url: &str) -> Vec<CrawlResult> {
        self.run_with_stats(start_url).await.0
    }

    pub async fn run_with_stats(&self, start_url: &str) -> (Vec<CrawlResult>, BfsStats) {
        let Some(start) = normalize_url(start_url, start_url) else {
            warn!("Invalid start URL: {}", start_url);
            return (Vec::new(), BfsStats::default());
        };

        let mut traversal = Traversal::seeded(&start);
        let mut current_level: Level = vec![(start, None)];
        let mut results = Vec::new();

        while !current_level.is_empty() {
            if self.cancel.is_cancelled() {
                traversal.stats.cancelled = true;
                break;
            }
            let level = self.take_budget(current_level, &mut traversal);
            if level.is_empty() {
                break;
            }

            let urls: Vec<String> = level.iter().map(|(url, _)| url.clone()).collect();
            let fetched = tokio::select! {
                fetched = self.engine.fetch_many(&urls, &self.crawl_config) => fetched,
                _ = self.cancel.cancelled() => {
                    traversal.stats.cancelled = true;
                    break;
                }
            };

            let parents: HashMap<&str, Option<String>> = level
                .iter()
                .map(|(url, parent)| (url.as_str(), parent.clone()))
                .collect();

            let mut next_level = Vec::new();
            for result in fetched {
                let depth = traversal.depth_of(&result.url);
                let parent = parents.get(result.url.as_str()).cloned().flatten();
                self.discover_links(&result, depth, &mut traversal, &mut next_level);
                results.push(result.with_metadata(depth, parent));
            }

            traversal.stats.levels += 1;
            debug!(
                "BFS level {} done: {} fetched, {} queued",
                traversal.stats.levels,
                urls.len(),
                next_level.len()
            );
            current_level = next_level;
        }

        info!(
            "BFS from {} finished: {} pages, {} skipped",
            start_url, traversal.stats.pages_crawled, traversal.stats.urls_skipped
        );
        (results, traversal.stats)
    }

    /// 流式模式
    ///
    /// 层内结果按完成顺序推送到 `tx`；接收端关闭时停止
    pub async fn run_streaming(&self, start_url: &str, tx: mpsc::Sender<CrawlResult>) -> BfsStats {
        let Some(start) = normalize_url(start_url, start_url) else {
            warn!("Invalid start URL: {}", start_url);
            return BfsStats::default();
        };

        let mut traversal = Traversal::seeded(&start);
        let mut current_level: Level = vec![(start, None)];
        let concurrency = self.crawl_config.concurrency.max(1);

        'levels: while !current_level.is_empty() {
            if self.cancel.is_cancelled() {
                traversal.stats.cancelled = true;
                break;
            }
            let level = self.take_budget(current_level, &mut traversal);
            if level.is_empty() {
                break;
            }

            let mut in_flight = stream::iter(level.into_iter())
                .map(|(url, parent)| async move {
                    let result = self.engine.fetch(&url, &self.crawl_config).await;
                    (result, parent)
                })
                .buffer_unordered(concurrency);

            let mut next_level = Vec::new();
            loop {
                let item = tokio::select! {
                    item = in_flight.next() => item,
                    _ = self.cancel.cancelled() => {
                        traversal.stats.cancelled = true;
                        break 'levels;
                    }
                };
                let Some((result, parent)) = item else {
                    break;
                };

                let depth = traversal.depth_of(&result.url);
                self.discover_links(&result, depth, &mut traversal, &mut next_level);
                if tx.send(result.with_metadata(depth, parent)).await.is_err() {
                    debug!("BFS stream receiver dropped, stopping");
                    break 'levels;
                }
            }

            traversal.stats.levels += 1;
            current_level = next_level;
        }

        traversal.stats
    }

    /// 按剩余页数预算截断当前层
    fn take_budget(&self, mut level: Level, traversal: &mut Traversal) -> Level {
        if let Some(max_pages) = self.config.max_pages {
            let remaining = max_pages.saturating_sub(traversal.stats.pages_crawled);
            level.truncate(remaining);
        }
        traversal.stats.pages_crawled += level.len();
        level
    }

    /// 从成功结果中发现下一层链接
    fn discover_links(
        &self,
        result: &CrawlResult,
        depth: usize,
        traversal: &mut Traversal,
        next_level: &mut Level,
    ) {
        if !result.success {
            return;
        }
        let next_depth = depth + 1;
        if next_depth > self.config.max_depth {
            return;
        }

        let external = if self.config.include_external {
            result.links.external.as_slice()
        } else {
            &[]
        };

        for link in result.links.internal.iter().chain(external) {
            let Some(normalized) = normalize_url(link, &result.url) else {
                continue;
            };
            // marked before the filter so a rejected URL is never re-examined
            if !traversal.visited.insert(normalized.clone()) {
                continue;
            }
            if !self.can_process_url(&normalized, next_depth) {
                traversal.stats.urls_skipped += 1;
                continue;
            }
            traversal.depths.insert(normalized.clone(), next_depth);
            next_level.push((normalized, Some(result.url.clone())));
        }
    }
}

#[cfg(test)]
#[path = "bfs_strategy_test.rs"]
mod tests;
