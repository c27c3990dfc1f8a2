//! 记录提取接口
//!
//! 编排器之外的纯函数边界：输入已校验的 HTML 文本，输出领域记录。

use crate::core::error::Result;
use crate::core::model::{ProductDetail, ProductSummary};

pub trait RecordExtractor: Send + Sync {
    /// 站点唯一标识
    fn id(&self) -> &str;

    /// 搜索结果页 URL
    fn search_url(&self, query: &str, page: u32, department: Option<&str>) -> Result<String>;

    /// 商品详情页 URL
    fn detail_url(&self, id: &str) -> String;

    /// 搜索页 → 扁平记录列表
    fn extract_search(&self, html: &str) -> Vec<ProductSummary>;

    /// 详情页 → 单条结构化记录
    fn extract_detail(&self, html: &str, id: &str) -> ProductDetail;
}
