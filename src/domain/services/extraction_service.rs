// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::product::{
    AvailabilityState, ExtractedProduct, ExtractionSource, LocalizedText, Price,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const UNKNOWN: &str = "UNKNOWN";

static JSON_LD_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).ok());
static META_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("meta").ok());

/// 商品提取特质
///
/// 从原始页面中提取一条商品记录，页面不是商品页时返回 `None`
#[async_trait]
pub trait ProductExtractor: Send + Sync {
    async fn extract(&self, html: &str, url: &str) -> Option<ExtractedProduct>;
}

#[async_trait]
impl<T: ProductExtractor + ?Sized> ProductExtractor for Arc<T> {
    async fn extract(&self, html: &str, url: &str) -> Option<ExtractedProduct> {
        (**self).extract(html, url).await
    }
}

/// 结构化数据提取器
///
/// 依次尝试 JSON-LD `Product` 和 OpenGraph 商品标签
#[derive(Debug, Default, Clone)]
pub struct StructuredDataExtractor;

impl StructuredDataExtractor {
    pub fn new() -> Self {
        Self
    }

    /// 同步提取，供异步接口和测试复用
    pub fn extract_sync(&self, html: &str, url: &str) -> Option<ExtractedProduct> {
        let document = Html::parse_document(html);
        extract_json_ld(&document, url).or_else(|| extract_open_graph(&document, url))
    }
}

#[async_trait]
impl ProductExtractor for StructuredDataExtractor {
    async fn extract(&self, html: &str, url: &str) -> Option<ExtractedProduct> {
        self.extract_sync(html, url)
    }
}

fn extract_json_ld(document: &Html, url: &str) -> Option<ExtractedProduct> {
    let selector = JSON_LD_SELECTOR.as_ref()?;

    let blocks: Vec<Value> = document
        .select(selector)
        .filter_map(|script| {
            let raw: String = script.text().collect();
            serde_json::from_str(raw.trim()).ok()
        })
        .collect();

    let mut products = Vec::new();
    for block in &blocks {
        collect_products(block, &mut products);
    }

    let product = products.into_iter().next()?;
    let offers = first_offer(product.get("offers"));

    let mut price = offers.and_then(|o| o.get("price")).and_then(scalar_string);
    let mut currency = offers
        .and_then(|o| o.get("priceCurrency"))
        .and_then(scalar_string);

    // a price without a currency is not trusted
    if price.is_some() && currency.is_none() {
        price = None;
    }
    if price.is_none() {
        let spec = offers
            .and_then(|o| o.get("priceSpecification"))
            .and_then(|s| match s {
                Value::Array(items) => items.first(),
                other => Some(other),
            });
        price = spec.and_then(|s| s.get("price")).and_then(scalar_string);
        currency = currency.or_else(|| {
            spec.and_then(|s| s.get("priceCurrency"))
                .and_then(scalar_string)
        });
    }

    let language = product
        .get("inLanguage")
        .and_then(scalar_string)
        .unwrap_or_else(|| UNKNOWN.to_string());

    let product_url = product
        .get("url")
        .and_then(scalar_string)
        .or_else(|| offers.and_then(|o| o.get("url")).and_then(scalar_string))
        .unwrap_or_else(|| url.to_string());

    let item_id = product
        .get("sku")
        .and_then(scalar_string)
        .or_else(|| product.get("productGroupID").and_then(scalar_string))
        .unwrap_or_else(|| product_url.clone());

    let availability = offers
        .and_then(|o| o.get("availability"))
        .and_then(scalar_string)
        .unwrap_or_default();

    Some(ExtractedProduct {
        shops_item_id: item_id,
        title: LocalizedText::new(text_or_unknown(product.get("name")), language.clone()),
        description: LocalizedText::new(text_or_unknown(product.get("description")), language),
        price: match price {
            Some(p) => Price::parse(&p, currency.as_deref()),
            None => Price {
                currency: currency.unwrap_or_else(|| UNKNOWN.to_string()),
                amount: None,
            },
        },
        state: AvailabilityState::from_raw(&availability),
        url: product_url,
        images: collect_images(product.get("image")),
        source: ExtractionSource::JsonLd,
    })
}

fn extract_open_graph(document: &Html, url: &str) -> Option<ExtractedProduct> {
    let selector = META_SELECTOR.as_ref()?;

    let mut og: HashMap<String, String> = HashMap::new();
    for meta in document.select(selector) {
        let element = meta.value();
        let key = element.attr("property").or_else(|| element.attr("name"));
        if let (Some(key), Some(content)) = (key, element.attr("content")) {
            og.entry(key.to_ascii_lowercase())
                .or_insert_with(|| content.trim().to_string());
        }
    }

    let get = |key: &str| og.get(key).filter(|v| !v.is_empty()).cloned();

    let og_type = get("og:type").unwrap_or_default().to_ascii_lowercase();
    if og_type != "product" && og_type != "article" {
        return None;
    }

    let price = get("product:price:amount").or_else(|| get("og:price:amount"));
    let currency = get("product:price:currency").or_else(|| get("og:price:currency"));
    let availability = get("product:availability")
        .or_else(|| get("og:availability"))
        .unwrap_or_default();
    let language = get("og:locale")
        .and_then(|l| l.split('_').next().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN.to_string());

    Some(ExtractedProduct {
        shops_item_id: url.to_string(),
        title: LocalizedText::new(
            get("og:title").unwrap_or_else(|| UNKNOWN.to_string()),
            language.clone(),
        ),
        description: LocalizedText::new(
            get("og:description").unwrap_or_else(|| UNKNOWN.to_string()),
            language,
        ),
        price: Price::parse(price.as_deref().unwrap_or("0"), currency.as_deref()),
        state: AvailabilityState::from_raw(&availability),
        url: get("og:url").unwrap_or_else(|| url.to_string()),
        images: get("og:image").into_iter().collect(),
        source: ExtractionSource::OpenGraph,
    })
}

/// 递归收集 `@type` 为 Product 的节点，支持数组和 `@graph`
fn collect_products<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| collect_products(v, out)),
        Value::Object(map) => {
            let is_product = ["@type", "type"].iter().any(|k| match map.get(*k) {
                Some(Value::String(t)) => is_product_type(t),
                Some(Value::Array(types)) => types
                    .iter()
                    .filter_map(Value::as_str)
                    .any(is_product_type),
                _ => false,
            });
            if is_product {
                out.push(value);
            }
            if let Some(graph) = map.get("@graph") {
                collect_products(graph, out);
            }
        }
        _ => {}
    }
}

fn is_product_type(t: &str) -> bool {
    let t = t.rsplit(['/', ':']).next().unwrap_or(t);
    t.eq_ignore_ascii_case("Product")
}

fn first_offer(offers: Option<&Value>) -> Option<&Value> {
    match offers? {
        Value::Array(items) => items.first(),
        Value::Object(_) => offers,
        _ => None,
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.first().and_then(scalar_string),
        _ => None,
    }
}

fn text_or_unknown(value: Option<&Value>) -> String {
    value
        .and_then(scalar_string)
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn collect_images(images: Option<&Value>) -> Vec<String> {
    let candidates: Vec<&Value> = match images {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
        None => Vec::new(),
    };

    let mut result: Vec<String> = Vec::new();
    for image in candidates {
        let found = match image {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => ["contentUrl", "url", "@id", "thumbnailUrl"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str).map(str::to_string)),
            _ => None,
        };
        if let Some(src) = found.filter(|s| !s.is_empty()) {
            if !result.contains(&src) {
                result.push(src);
            }
        }
    }
    result
}

#[cfg(test)]
#[path = "extraction_service_test.rs"]
mod tests;
