// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::product::{AvailabilityState, ExtractionSource};
use crate::domain::services::extraction_service::{ProductExtractor, StructuredDataExtractor};

const URL: &str = "https://shop.example/item/1";

#[tokio::test]
async fn test_extracts_json_ld_product() {
    let html = r#"
        <html><head>
        <script type="application/ld+json">
        {
            "@context": "https://schema.org",
            "@graph": [
                {"@type": "WebPage", "name": "ignored"},
                {
                    "@type": "Product",
                    "sku": "A-17",
                    "name": "Art Deco Vase",
                    "description": "  Glazed ceramic  ",
                    "inLanguage": "de",
                    "image": [{"contentUrl": "https://cdn/a.jpg"}, "https://cdn/a.jpg", "https://cdn/b.jpg"],
                    "offers": {
                        "@type": "Offer",
                        "price": "149.90",
                        "priceCurrency": "EUR",
                        "availability": "https://schema.org/InStock"
                    }
                }
            ]
        }
        </script>
        </head><body></body></html>
    "#;

    let product = StructuredDataExtractor::new()
        .extract(html, URL)
        .await
        .expect("product");

    assert_eq!(product.shops_item_id, "A-17");
    assert_eq!(product.title.text, "Art Deco Vase");
    assert_eq!(product.title.language, "de");
    assert_eq!(product.description.text, "Glazed ceramic");
    assert_eq!(product.price.currency, "EUR");
    assert_eq!(product.price.amount, Some(14990));
    assert_eq!(product.state, AvailabilityState::Available);
    assert_eq!(product.url, URL);
    assert_eq!(product.images, vec!["https://cdn/a.jpg", "https://cdn/b.jpg"]);
    assert_eq!(product.source, ExtractionSource::JsonLd);
}

#[test]
fn test_json_ld_falls_back_to_price_specification() {
    let html = r#"
        <script type="application/ld+json">
        {"@type": ["Product"], "name": "Clock",
         "offers": [{"price": 12, "availability": "SoldOut",
                     "priceSpecification": [{"price": "12,5", "priceCurrency": "CHF"}]}]}
        </script>
    "#;

    let product = StructuredDataExtractor::new().extract_sync(html, URL).unwrap();

    assert_eq!(product.price.currency, "CHF");
    assert_eq!(product.price.amount, Some(1250));
    assert_eq!(product.state, AvailabilityState::Sold);
    assert_eq!(product.shops_item_id, URL);
    assert_eq!(product.description.text, "UNKNOWN");
}

#[test]
fn test_extracts_open_graph_product() {
    let html = r#"
        <html><head>
            <meta property="og:type" content="product">
            <meta property="og:title" content="Silver Spoon">
            <meta property="og:locale" content="en_GB">
            <meta property="og:image" content="https://cdn/spoon.jpg">
            <meta property="product:price:amount" content="35,00">
            <meta property="product:price:currency" content="GBP">
            <meta property="product:availability" content="out of stock">
        </head></html>
    "#;

    let product = StructuredDataExtractor::new().extract_sync(html, URL).unwrap();

    assert_eq!(product.shops_item_id, URL);
    assert_eq!(product.title.language, "en");
    assert_eq!(product.price.amount, Some(3500));
    assert_eq!(product.state, AvailabilityState::Sold);
    assert_eq!(product.images, vec!["https://cdn/spoon.jpg"]);
    assert_eq!(product.source, ExtractionSource::OpenGraph);
}

#[test]
fn test_non_product_page_yields_nothing() {
    let html = r#"
        <meta property="og:type" content="website">
        <script type="application/ld+json">{"@type": "Organization"}</script>
        <script type="application/ld+json">not json</script>
    "#;

    assert!(StructuredDataExtractor::new().extract_sync(html, URL).is_none());
}
