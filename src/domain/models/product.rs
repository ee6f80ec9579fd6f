// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 商品可售状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityState {
    Available,
    Listed,
    Reserved,
    Sold,
    Removed,
    #[default]
    Unknown,
}

impl AvailabilityState {
    /// 将原始库存描述映射为统一状态
    ///
    /// 支持 `https://schema.org/InStock`、`schema:InStock`、`instock` 等写法
    pub fn from_raw(raw: &str) -> Self {
        let key = raw
            .rsplit(['/', '#', ':'])
            .next()
            .unwrap_or_default()
            .trim()
            .replace([' ', '_', '-'], "")
            .to_ascii_uppercase();

        match key.as_str() {
            "INSTOCK" | "INSTOREONLY" | "ONLINEONLY" | "LIMITEDAVAILABILITY" | "MADETOORDER"
            | "PRESALE" => AvailabilityState::Available,
            "BACKORDER" | "PREORDER" => AvailabilityState::Listed,
            "RESERVED" => AvailabilityState::Reserved,
            "SOLDOUT" | "OUTOFSTOCK" => AvailabilityState::Sold,
            "DISCONTINUED" => AvailabilityState::Removed,
            _ => AvailabilityState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityState::Available => "AVAILABLE",
            AvailabilityState::Listed => "LISTED",
            AvailabilityState::Reserved => "RESERVED",
            AvailabilityState::Sold => "SOLD",
            AvailabilityState::Removed => "REMOVED",
            AvailabilityState::Unknown => "UNKNOWN",
        }
    }
}

/// 带语言标记的文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    pub text: String,
    pub language: String,
}

impl LocalizedText {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
        }
    }
}

/// 价格，金额以分为单位
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub currency: String,
    /// 无法解析时为 `None`
    pub amount: Option<i64>,
}

impl Price {
    /// 解析价格字符串为分
    ///
    /// 兼容欧式小数逗号，例如 `"12,50"` → 1250；第三位小数按四舍五入进位
    pub fn parse(raw: &str, currency: Option<&str>) -> Self {
        Self {
            currency: currency
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or("UNKNOWN")
                .to_string(),
            amount: parse_cents(raw),
        }
    }
}

fn parse_cents(raw: &str) -> Option<i64> {
    let cleaned = raw.trim().replace(' ', "").replace(',', ".");
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };

    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut fraction_digits = fraction.bytes().map(|b| i64::from(b - b'0'));
    let tenths = fraction_digits.next().unwrap_or(0);
    let hundredths = fraction_digits.next().unwrap_or(0);
    let round_up = fraction_digits.next().is_some_and(|d| d >= 5);

    let cents = whole
        .checked_mul(100)?
        .checked_add(tenths * 10 + hundredths + i64::from(round_up))?;
    Some(if negative { -cents } else { cents })
}

/// 商品数据的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExtractionSource {
    JsonLd,
    OpenGraph,
    /// 非结构化来源，例如自定义提取器的启发式规则
    #[default]
    Unstructured,
}

impl ExtractionSource {
    /// 是否来自结构化数据标准
    pub fn is_standard(&self) -> bool {
        !matches!(self, ExtractionSource::Unstructured)
    }
}

/// 提取出的商品记录，提交给下游目录接口
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedProduct {
    pub shops_item_id: String,
    pub title: LocalizedText,
    pub description: LocalizedText,
    pub price: Price,
    pub state: AvailabilityState,
    pub url: String,
    pub images: Vec<String>,
    /// 不提交给下游
    #[serde(skip)]
    pub source: ExtractionSource,
}

impl ExtractedProduct {
    /// 可观察状态哈希
    ///
    /// 只覆盖价格和库存状态，标题或描述的改动不会触发重新提交
    pub fn state_hash(&self) -> String {
        let amount = self
            .price
            .amount
            .map(|a| a.to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());

        let mut hasher = Sha256::new();
        hasher.update(self.price.currency.as_bytes());
        hasher.update(b"|");
        hasher.update(amount.as_bytes());
        hasher.update(b"|");
        hasher.update(self.state.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }
}
