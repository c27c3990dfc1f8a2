use scraper::{Html, Selector};
use tracing::info;

use crate::core::model::ProductDetail;

use super::selectors::SiteSelectors;
use super::text_of;

/// 缩略图尺寸标记替换为大图
fn full_size_image(src: &str) -> String {
    src.replace("._SS40_", "._SL1000_")
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// 解析商品详情页
///
/// 页面缺失的字段保持为空，不做占位填充。
pub fn parse_detail(html: &str, asin: &str) -> ProductDetail {
    let doc = Html::parse_document(html);
    let sel = SiteSelectors::get();
    let first_text = |s: &Selector| doc.select(s).next().map(text_of).and_then(non_empty);

    let mut detail = ProductDetail::new(asin);
    detail.title = first_text(&sel.product_title);
    detail.price = first_text(&sel.price);
    detail.availability = first_text(&sel.availability);
    detail.rating = doc
        .select(&sel.rating)
        .next()
        .map(|el| el.value().attr("title").unwrap_or("N/A").trim().to_string());
    detail.review_count = first_text(&sel.review_count);
    detail.description = first_text(&sel.description);

    detail.features = doc
        .select(&sel.feature_bullets)
        .map(text_of)
        .filter(|t| !t.is_empty())
        .collect();

    detail.images = doc
        .select(&sel.alt_images)
        .filter_map(|img| img.value().attr("src"))
        .filter(|src| !src.is_empty() && !src.contains("sprite"))
        .map(full_size_image)
        .collect();

    for row in doc.select(&sel.spec_rows) {
        let key = row.select(&sel.th).next().map(text_of);
        let value = row.select(&sel.td).next().map(text_of);
        if let (Some(k), Some(v)) = (key, value) {
            detail.specifications.insert(k, v);
        }
    }

    // 面包屑中的 `›` 仅为分隔符
    detail.categories = doc
        .select(&sel.breadcrumbs)
        .map(text_of)
        .filter(|t| !t.is_empty() && t != "›")
        .collect();

    info!("已解析商品 {} 的详情", asin);
    detail
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
  <div id="wayfinding-breadcrumbs_feature_div"><ul>
    <li><a>Electronics</a></li><li><span>›</span></li><li><a> Cables </a></li>
  </ul></div>
  <span id="productTitle">   Braided USB-C Cable, 2m   </span>
  <span class="a-price"><span class="a-offscreen">$9.99</span></span>
  <div id="availability"><span> In Stock </span></div>
  <span id="acrPopover" title="4.6 out of 5 stars"></span>
  <span id="acrCustomerReviewText">12,345 ratings</span>
  <div id="feature-bullets"><ul>
    <li><span>Fast charging</span></li>
    <li><span>Nylon braided</span></li>
  </ul></div>
  <div id="altImages"><ul>
    <li><img src="https://m.media-amazon.com/images/I/a._SS40_.jpg"></li>
    <li><img src="https://m.media-amazon.com/images/G/sprite-360.png"></li>
    <li><img src="https://m.media-amazon.com/images/I/b._SS40_.jpg"></li>
  </ul></div>
  <table id="productDetails_techSpec_section_1">
    <tr><th> Length </th><td> 2 Meters </td></tr>
    <tr><th>Connector</th><td>USB-C</td></tr>
    <tr><td>orphan value</td></tr>
  </table>
  <div id="productDescription"><p> Durable cable. </p></div>
</body></html>"#;

    #[test]
    fn all_fields_are_extracted() {
        let d = parse_detail(PAGE, "B0CABLE001");
        assert_eq!(d.asin, "B0CABLE001");
        assert_eq!(d.title.as_deref(), Some("Braided USB-C Cable, 2m"));
        assert_eq!(d.price.as_deref(), Some("$9.99"));
        assert_eq!(d.availability.as_deref(), Some("In Stock"));
        assert_eq!(d.rating.as_deref(), Some("4.6 out of 5 stars"));
        assert_eq!(d.review_count.as_deref(), Some("12,345 ratings"));
        assert_eq!(d.description.as_deref(), Some("Durable cable."));
        assert_eq!(d.features, vec!["Fast charging", "Nylon braided"]);
        assert_eq!(d.categories, vec!["Electronics", "Cables"]);
    }

    #[test]
    fn thumbnails_are_upscaled_and_sprites_dropped() {
        let d = parse_detail(PAGE, "B0CABLE001");
        assert_eq!(
            d.images,
            vec![
                "https://m.media-amazon.com/images/I/a._SL1000_.jpg",
                "https://m.media-amazon.com/images/I/b._SL1000_.jpg",
            ]
        );
    }

    #[test]
    fn specification_rows_need_both_cells() {
        let d = parse_detail(PAGE, "B0CABLE001");
        assert_eq!(d.specifications.len(), 2);
        assert_eq!(d.specifications["Length"], "2 Meters");
        assert_eq!(d.specifications.get_index(1).map(|(k, _)| k.as_str()), Some("Connector"));
    }

    #[test]
    fn unrelated_page_yields_bare_record() {
        let d = parse_detail("<html><body><p>Hello</p></body></html>", "B0X");
        assert!(d.is_bare());
    }
}
