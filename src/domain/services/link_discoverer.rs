// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_result::DiscoveredLinks;
use crate::utils::url_utils::{normalize_url, same_site};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;

static ANCHOR_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("a[href]").ok());

/// 链接发现器
///
/// 负责从HTML内容中提取链接并按站点划分
pub struct LinkDiscoverer;

impl LinkDiscoverer {
    /// 从HTML内容中提取规范化后的链接，保持页面中的出现顺序并去重
    pub fn extract_links(html_content: &str, base_url: &str) -> Vec<String> {
        let Some(selector) = ANCHOR_SELECTOR.as_ref() else {
            return Vec::new();
        };

        let document = Html::parse_document(html_content);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(selector) {
            if let Some(link) = element
                .value()
                .attr("href")
                .and_then(|href| normalize_url(href, base_url))
            {
                if seen.insert(link.clone()) {
                    links.push(link);
                }
            }
        }

        links
    }

    /// 提取链接并划分为站内和站外两组
    pub fn discover(html_content: &str, base_url: &str) -> DiscoveredLinks {
        let (internal, external) = Self::extract_links(html_content, base_url)
            .into_iter()
            .partition(|link| same_site(link, base_url));

        DiscoveredLinks { internal, external }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_links() {
        let html = r##"
            <html>
                <body>
                    <a href="https://example.com/page1">Page 1</a>
                    <a href="/page2">Page 2</a>
                    <a href="page3.html#top">Page 3</a>
                    <a href="#fragment">Fragment</a>
                    <a href="mailto:test@example.com">Email</a>
                    <a href="javascript:void(0)">JS</a>
                    <a href="/page2">Duplicate</a>
                </body>
            </html>
        "##;

        let links = LinkDiscoverer::extract_links(html, "https://example.com/");

        assert_eq!(
            links,
            vec![
                "https://example.com/page1",
                "https://example.com/page2",
                "https://example.com/page3.html",
            ]
        );
    }

    #[test]
    fn test_discover_splits_by_site() {
        let html = r#"
            <a href="/a">A</a>
            <a href="https://www.example.com/b">B</a>
            <a href="https://other.org/c">C</a>
        "#;

        let links = LinkDiscoverer::discover(html, "https://example.com/");

        assert_eq!(
            links.internal,
            vec!["https://example.com/a", "https://www.example.com/b"]
        );
        assert_eq!(links.external, vec!["https://other.org/c"]);
    }
}
