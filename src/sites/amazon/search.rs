use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::core::model::ProductSummary;
use crate::utils::to_absolute_url;

use super::selectors::SiteSelectors;
use super::text_of;

/// 解析搜索结果页
///
/// 缺少 ASIN 的条目（广告位、占位块）直接跳过。
pub fn parse_search(html: &str, base: &Url) -> Vec<ProductSummary> {
    let doc = Html::parse_document(html);
    let sel = SiteSelectors::get();

    let products: Vec<ProductSummary> = doc
        .select(&sel.result_item)
        .filter_map(|el| parse_item(el, base, sel))
        .collect();

    info!("搜索页解析出 {} 个商品", products.len());
    products
}

fn parse_item(el: ElementRef, base: &Url, sel: &SiteSelectors) -> Option<ProductSummary> {
    let asin = el.value().attr("data-asin").map(str::trim).unwrap_or_default();
    if asin.is_empty() {
        debug!("跳过无 ASIN 的条目");
        return None;
    }

    let first_text = |s: &Selector| el.select(s).next().map(text_of);

    Some(ProductSummary {
        asin: asin.to_string(),
        title: first_text(&sel.result_title).unwrap_or_else(|| "Unknown Title".into()),
        url: el
            .select(&sel.result_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| to_absolute_url(base, href)),
        price: first_text(&sel.result_price).unwrap_or_else(|| "N/A".into()),
        rating: first_text(&sel.result_rating).unwrap_or_else(|| "N/A".into()),
        reviews: first_text(&sel.result_reviews).unwrap_or_else(|| "0".into()),
        image_url: el
            .select(&sel.result_image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::to_string),
    })
}
