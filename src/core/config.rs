//! 配置管理系统 (Configuration Management)
//!
//! 负责 `config.toml` 的反序列化及其层级结构映射，支持环境变量覆盖与默认值回退机制。

use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::core::error::{Result, SpiderError};

/// 全局应用配置
#[derive(Debug, Deserialize, Builder, Clone, Default)]
pub struct AppConfig {
    /// 重试与超时参数
    #[serde(default)]
    #[builder(default)]
    pub fetch: FetchConfig,

    /// 自动化浏览器 (Chromium) 相关配置
    #[serde(default)]
    #[builder(default)]
    pub browser: BrowserConfig,

    /// 身份素材来源 (代理 / UA / Cookie)
    #[serde(default)]
    #[builder(default)]
    pub identity: IdentityConfig,

    /// 目标站点参数
    #[serde(default)]
    #[builder(default)]
    pub site: SiteConfig,
}

/// 编排器重试参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct FetchConfig {
    /// 最大尝试轮数 (每轮遍历全部策略)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 基础退避时长 (秒)，第 n 轮失败后等待 n 倍
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    /// 单次策略调用的超时 (秒)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// 浏览器引擎配置
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct BrowserConfig {
    /// 是否启用浏览器策略
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 是否以无头模式 (Headless) 运行
    #[serde(default = "default_true")]
    pub headless: bool,
    /// 自定义可执行文件路径
    pub chrome_path: Option<String>,
    /// 导航后等待页面稳定的时长 (秒)
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// 疑似挑战页时追加等待的倍数
    #[serde(default = "default_challenge_wait_factor")]
    pub challenge_wait_factor: u32,
}

/// 身份素材配置
#[derive(Debug, Deserialize, Builder, Clone, Default)]
pub struct IdentityConfig {
    /// 是否启用代理轮换
    #[serde(default)]
    #[builder(default)]
    pub use_proxies: bool,
    /// 代理列表文件 (每行一个 URI)
    pub proxy_file: Option<PathBuf>,
    /// 外部 UA 池文件 (每行一个)
    pub user_agents_file: Option<PathBuf>,
    /// Cookie 持久化文件 (Netscape cookies.txt 格式)
    pub cookie_file: Option<PathBuf>,
}

/// 站点参数
#[derive(Debug, Deserialize, Builder, Clone)]
pub struct SiteConfig {
    /// 站点国别域名后缀 (com / co.uk / de ...)
    #[serde(default = "default_country")]
    pub country: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            chrome_path: None,
            settle_secs: default_settle_secs(),
            challenge_wait_factor: default_challenge_wait_factor(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            country: default_country(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_secs() -> u64 {
    5
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}
fn default_settle_secs() -> u64 {
    10
}
fn default_challenge_wait_factor() -> u32 {
    2
}
fn default_country() -> String {
    "com".to_string()
}

impl FetchConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_secs(self.base_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl BrowserConfig {
    pub fn settle_time(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

impl IdentityConfig {
    /// Cookie 文件路径，未配置时回退到平台数据目录
    pub fn cookie_path(&self) -> Option<PathBuf> {
        self.cookie_file.clone().or_else(|| {
            ProjectDirs::from("", "", "shopspider")
                .map(|dirs| dirs.data_dir().join("cookies.txt"))
        })
    }
}

impl AppConfig {
    /// 从文件系统及环境变量中加载并解析配置
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(config_path).required(false))
            .add_source(Environment::with_prefix("SHOPSPIDER").separator("__"))
            .build()
            .map_err(SpiderError::Config)?;

        settings.try_deserialize().map_err(SpiderError::Config)
    }
}
