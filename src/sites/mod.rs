use std::collections::HashMap;

use crate::core::config::SiteConfig;
use crate::core::error::Result;
use crate::interfaces::RecordExtractor;

pub mod amazon;

// ============================================================================
// 站点注册表
// ============================================================================

type SiteFactory = Box<dyn Fn(&SiteConfig) -> Result<Box<dyn RecordExtractor>> + Send + Sync>;

pub struct SiteRegistry {
    factories: HashMap<String, SiteFactory>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register("amazon", |cfg| {
            Ok(Box::new(amazon::Amazon::new(&cfg.country)?) as Box<dyn RecordExtractor>)
        });
        registry
    }

    pub fn register<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(&SiteConfig) -> Result<Box<dyn RecordExtractor>> + Send + Sync + 'static,
    {
        self.factories.insert(id.to_string(), Box::new(factory));
    }

    /// 未注册的站点返回 `None`
    pub fn create(&self, id: &str, config: &SiteConfig) -> Option<Result<Box<dyn RecordExtractor>>> {
        self.factories.get(id).map(|f| f(config))
    }

    pub fn list(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amazon_is_registered() {
        let registry = SiteRegistry::new();
        assert_eq!(registry.list(), vec!["amazon"]);

        let cfg = SiteConfig { country: "de".into() };
        let site = registry.create("amazon", &cfg).unwrap().unwrap();
        assert_eq!(site.detail_url("B0X"), "https://www.amazon.de/dp/B0X");
        assert!(registry.create("ebay", &cfg).is_none());
    }
}
