// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

/// 分类错误
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// 阻塞任务池不可用
    #[error("Classifier pool unavailable: {0}")]
    PoolClosed(String),
    /// 推理任务异常退出
    #[error("Classifier task failed: {0}")]
    TaskFailed(String),
}

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub is_product: bool,
    pub confidence: f32,
}

/// URL评分特质
///
/// 同步、CPU密集，只应在阻塞线程池中调用
pub trait UrlScorer: Send + Sync + 'static {
    fn score(&self, url: &str) -> Classification;
}

/// URL分类特质
#[async_trait]
pub trait UrlClassifier: Send + Sync {
    async fn classify(&self, url: &str) -> Result<Classification, ClassifierError>;

    async fn classify_batch(&self, urls: &[String]) -> Result<Vec<Classification>, ClassifierError>;
}

#[async_trait]
impl<T: UrlClassifier + ?Sized> UrlClassifier for Arc<T> {
    async fn classify(&self, url: &str) -> Result<Classification, ClassifierError> {
        (**self).classify(url).await
    }

    async fn classify_batch(&self, urls: &[String]) -> Result<Vec<Classification>, ClassifierError> {
        (**self).classify_batch(urls).await
    }
}

static PRODUCT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)/(products?|produkte?|items?|artikel|article|lots?|objekte?|angebot|dp|p)/[^/]+",
        r"(?i)[-_/]p[-_]?\d{3,}",
        r"(?i)/\d{4,}[-_][a-z0-9-]+(\.html?)?$",
        r"(?i)[a-z0-9-]+-\d{4,}(\.html?)?$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static LISTING_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)/(categor(y|ies)|kategorie|collections?|tags?|blog|news|search|suche|cart|warenkorb|checkout|account|login|impressum|imprint|agb|contact|kontakt)(/|$)",
        r"(?i)/page/\d+",
        r"(?i)[?&](page|sort|filter)=",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// 基于URL路径模式的评分器
#[derive(Debug, Default, Clone)]
pub struct PatternUrlScorer;

impl UrlScorer for PatternUrlScorer {
    fn score(&self, url: &str) -> Classification {
        let Ok(parsed) = Url::parse(url) else {
            return Classification {
                is_product: false,
                confidence: 1.0,
            };
        };
        let target = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };

        if LISTING_PATTERNS.iter().any(|p| p.is_match(&target)) {
            return Classification {
                is_product: false,
                confidence: 0.9,
            };
        }
        if PRODUCT_PATTERNS.iter().any(|p| p.is_match(&target)) {
            return Classification {
                is_product: true,
                confidence: 0.8,
            };
        }
        Classification {
            is_product: false,
            confidence: 0.5,
        }
    }
}

/// 把同步评分器放到有界阻塞线程池中执行
pub struct BlockingClassifier<S> {
    scorer: Arc<S>,
    permits: Arc<Semaphore>,
}

impl<S: UrlScorer> BlockingClassifier<S> {
    pub fn new(scorer: S, threads: usize) -> Self {
        Self {
            scorer: Arc::new(scorer),
            permits: Arc::new(Semaphore::new(threads.max(1))),
        }
    }

    async fn run_blocking<F, R>(&self, f: F) -> Result<R, ClassifierError>
    where
        F: FnOnce(&S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ClassifierError::PoolClosed(e.to_string()))?;

        let scorer = self.scorer.clone();
        tokio::task::spawn_blocking(move || f(&scorer))
            .await
            .map_err(|e| ClassifierError::TaskFailed(e.to_string()))
    }
}

#[async_trait]
impl<S: UrlScorer> UrlClassifier for BlockingClassifier<S> {
    async fn classify(&self, url: &str) -> Result<Classification, ClassifierError> {
        let url = url.to_string();
        self.run_blocking(move |scorer| scorer.score(&url)).await
    }

    async fn classify_batch(&self, urls: &[String]) -> Result<Vec<Classification>, ClassifierError> {
        let urls = urls.to_vec();
        self.run_blocking(move |scorer| urls.iter().map(|u| scorer.score(u)).collect())
            .await
    }
}
