use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 搜索结果条目 (search-style record)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub asin: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub price: String,
    pub rating: String,
    pub reviews: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// 商品详情 (detail-style record)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub asin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// 规格表，保留页面原始顺序
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub specifications: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl ProductDetail {
    pub fn new(asin: impl Into<String>) -> Self {
        Self {
            asin: asin.into(),
            ..Default::default()
        }
    }

    /// 除 ASIN 外没有解析出任何字段
    pub fn is_bare(&self) -> bool {
        *self == Self::new(self.asin.clone())
    }
}
