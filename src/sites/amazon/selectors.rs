//! Amazon 选择器
//!
//! 预编译的 CSS 选择器

use std::sync::OnceLock;

use scraper::Selector;

/// 站点选择器集合
pub struct SiteSelectors {
    // 搜索结果页
    pub result_item: Selector,
    pub result_title: Selector,
    pub result_link: Selector,
    pub result_price: Selector,
    pub result_rating: Selector,
    pub result_reviews: Selector,
    pub result_image: Selector,

    // 详情页
    pub product_title: Selector,
    pub price: Selector,
    pub availability: Selector,
    pub rating: Selector,
    pub review_count: Selector,
    pub description: Selector,
    pub feature_bullets: Selector,
    pub alt_images: Selector,
    pub spec_rows: Selector,
    pub th: Selector,
    pub td: Selector,
    pub breadcrumbs: Selector,
}

static SELECTORS: OnceLock<SiteSelectors> = OnceLock::new();

impl SiteSelectors {
    /// 获取全局选择器实例
    pub fn get() -> &'static SiteSelectors {
        SELECTORS.get_or_init(|| SiteSelectors {
            result_item: Selector::parse("div[data-component-type='s-search-result']").unwrap(),
            result_title: Selector::parse("h2 a span").unwrap(),
            result_link: Selector::parse("h2 a").unwrap(),
            result_price: Selector::parse(".a-price .a-offscreen").unwrap(),
            result_rating: Selector::parse("i.a-icon-star-small").unwrap(),
            result_reviews: Selector::parse("span.a-size-base.s-underline-text").unwrap(),
            result_image: Selector::parse("img.s-image").unwrap(),

            product_title: Selector::parse("#productTitle").unwrap(),
            price: Selector::parse("#priceblock_ourprice, #priceblock_dealprice, .a-price .a-offscreen").unwrap(),
            availability: Selector::parse("#availability").unwrap(),
            rating: Selector::parse("#acrPopover").unwrap(),
            review_count: Selector::parse("#acrCustomerReviewText").unwrap(),
            description: Selector::parse("#productDescription").unwrap(),
            feature_bullets: Selector::parse("#feature-bullets ul li").unwrap(),
            alt_images: Selector::parse("#altImages li img").unwrap(),
            spec_rows: Selector::parse("#productDetails_techSpec_section_1 tr").unwrap(),
            th: Selector::parse("th").unwrap(),
            td: Selector::parse("td").unwrap(),
            breadcrumbs: Selector::parse("#wayfinding-breadcrumbs_feature_div ul li").unwrap(),
        })
    }
}
