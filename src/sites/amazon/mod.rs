//! Amazon 站点模块
//!
//! URL 构建与页面解析；取页由编排器负责。

mod detail;
mod search;
mod selectors;

use scraper::ElementRef;
use url::Url;

use crate::core::error::{Result, SpiderError};
use crate::core::model::{ProductDetail, ProductSummary};
use crate::interfaces::RecordExtractor;

pub use self::detail::parse_detail;
pub use self::search::parse_search;
pub use self::selectors::SiteSelectors;

/// 元素全部后代文本，去除首尾空白
pub(crate) fn text_of(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Amazon 站点实现
pub struct Amazon {
    base: Url,
}

impl Amazon {
    /// 按国别域名后缀创建 (com / co.uk / de ...)
    pub fn new(country: &str) -> Result<Self> {
        let country = country.trim().trim_start_matches('.');
        let base = Url::parse(&format!("https://www.amazon.{}", country))
            .map_err(|e| SpiderError::Parse(format!("无效的国别域名 '{}': {}", country, e)))?;
        Ok(Self { base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }
}

impl RecordExtractor for Amazon {
    fn id(&self) -> &str {
        "amazon"
    }

    fn search_url(&self, query: &str, page: u32, department: Option<&str>) -> Result<String> {
        let mut params: Vec<(&str, String)> = vec![("k", query.to_string())];
        if let Some(dept) = department.filter(|d| !d.is_empty()) {
            params.push(("i", dept.to_string()));
        }
        if page > 1 {
            params.push(("page", page.to_string()));
        }

        let qs = serde_urlencoded::to_string(&params)
            .map_err(|e| SpiderError::Parse(e.to_string()))?;
        let mut url = self.base.join("/s").map_err(|e| SpiderError::Parse(e.to_string()))?;
        url.set_query(Some(&qs));
        Ok(url.to_string())
    }

    fn detail_url(&self, id: &str) -> String {
        format!("{}/dp/{}", self.base.as_str().trim_end_matches('/'), id.trim())
    }

    fn extract_search(&self, html: &str) -> Vec<ProductSummary> {
        parse_search(html, &self.base)
    }

    fn extract_detail(&self, html: &str, id: &str) -> ProductDetail {
        parse_detail(html, id)
    }
}
