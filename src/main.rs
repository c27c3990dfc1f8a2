//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化、依赖注入及系统生命周期管理。

mod core;
mod engine;
mod identity;
mod interfaces;
mod network;
mod sites;
mod ui;
mod utils;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use crate::core::config::AppConfig;
use crate::core::error::{FetchError, SpiderError};
use crate::core::event::create_event_channel;
use crate::engine::{FetchOrchestrator, ScrapeEngine};
use crate::identity::IdentityProvider;
use crate::interfaces::AcquisitionStrategy;
use crate::network::{
    BrowserStrategy, ChallengeClassifier, FingerprintProfile, FingerprintStrategy, PlainStrategy,
};
use crate::sites::SiteRegistry;
use crate::ui::{Ui, get_multi};

/// 进度条感知的日志写入器 (TUI-aware Log Writer)
///
/// 确保日志输出不会破坏终端进度条的渲染布局。
struct IndicatifWriter;

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let _ = get_multi().println(s.trim_end());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&self) -> Self::Writer {
        IndicatifWriter
    }
}

/// 命令行界面 (CLI)
#[derive(Parser)]
#[command(author, version, about = "Resilient storefront scraper", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 最大尝试轮数
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// 基础退避时长 (秒)
    #[arg(long, global = true)]
    delay: Option<u64>,

    /// 禁用浏览器策略
    #[arg(long, global = true)]
    no_browser: bool,

    /// 以有界面模式运行浏览器
    #[arg(long, global = true)]
    no_headless: bool,

    /// 启用代理轮换
    #[arg(long, global = true)]
    use_proxies: bool,

    /// 代理列表文件
    #[arg(long, global = true)]
    proxy_file: Option<PathBuf>,

    /// Cookie 持久化文件
    #[arg(long, global = true)]
    cookie_file: Option<PathBuf>,

    /// 站点国别域名后缀 (com / co.uk / de ...)
    #[arg(short, long, global = true)]
    country: Option<String>,

    /// 结果输出文件，缺省写到标准输出
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// 格式化 JSON 输出
    #[arg(long, global = true)]
    pretty: bool,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 搜索商品
    Search {
        /// 搜索关键词
        #[arg(short, long)]
        query: String,
        /// 结果页码
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        /// 商品分类 (department)
        #[arg(short, long)]
        department: Option<String>,
    },
    /// 抓取单个商品详情
    Product {
        /// 商品 ASIN
        #[arg(short, long)]
        asin: String,
    },
}

impl Cli {
    /// 命令行参数覆盖配置文件
    fn apply(&self, config: &mut AppConfig) {
        if let Some(retries) = self.retries {
            config.fetch.max_attempts = retries;
        }
        if let Some(delay) = self.delay {
            config.fetch.base_delay_secs = delay;
        }
        if self.no_browser {
            config.browser.enabled = false;
        }
        if self.no_headless {
            config.browser.headless = false;
        }
        if self.use_proxies {
            config.identity.use_proxies = true;
        }
        if let Some(ref path) = self.proxy_file {
            config.identity.proxy_file = Some(path.clone());
        }
        if let Some(ref path) = self.cookie_file {
            config.identity.cookie_file = Some(path.clone());
        }
        if let Some(ref country) = self.country {
            config.site.country = country.clone();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // 遥测层初始化 (Telemetry Layer Initialization)
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(IndicatifWriter)
        .with_target(false)
        .with_ansi(true)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if is_cancelled(&e) => {
            tracing::warn!("用户中断");
            ExitCode::from(130)
        }
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn is_cancelled(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<SpiderError>(),
        Some(SpiderError::Fetch(FetchError::Cancelled))
    )
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // 依赖项初始化与注入 (Dependency Injection)
    let mut config = AppConfig::load()?;
    cli.apply(&mut config);

    let identity = Arc::new(IdentityProvider::from_config(&config.identity).await?);
    let classifier = Arc::new(ChallengeClassifier::new());
    let timeout = config.fetch.request_timeout();

    let strategies: Vec<Arc<dyn AcquisitionStrategy>> = vec![
        Arc::new(BrowserStrategy::new(config.browser.clone(), classifier.clone())?),
        Arc::new(FingerprintStrategy::new(
            FingerprintProfile::GenericBrowser,
            identity.agents(),
            timeout,
        )),
        Arc::new(FingerprintStrategy::new(
            FingerprintProfile::Chrome96Tls,
            identity.agents(),
            timeout,
        )),
        Arc::new(PlainStrategy::new()),
    ];

    let registry = SiteRegistry::new();
    let site = registry
        .create("amazon", &config.site)
        .context("站点未注册")??;

    // 建立 UI 事件反馈链路 (Event feedback loop)
    let (event_sender, event_receiver) = create_event_channel();
    let ui_handle = Ui::run(event_receiver);

    // 信号处理与优雅退出 (Signal Handling)
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    let orchestrator = FetchOrchestrator::new(strategies, classifier, identity, timeout)?
        .with_events(event_sender)
        .with_cancel(cancel);
    let engine = ScrapeEngine::new(Arc::from(site), Arc::new(orchestrator), config.fetch.clone());

    let outcome = execute(&engine, &cli).await;

    // 任何退出路径都只关闭一次
    engine.orchestrator().shutdown().await;
    drop(engine);
    let _ = ui_handle.await;

    outcome
}

async fn execute(engine: &ScrapeEngine, cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Search {
            query,
            page,
            department,
        } => {
            let items = engine.search(query, *page, department.as_deref()).await?;
            if items.is_empty() {
                println!("No results found");
                return Ok(());
            }
            emit(&items, cli).await
        }
        Commands::Product { asin } => {
            let detail = engine.product(asin).await?;
            if detail.is_bare() {
                println!("No results found");
                return Ok(());
            }
            emit(&detail, cli).await
        }
    }
}

/// 输出 JSON 到文件或标准输出
async fn emit<T: Serialize>(value: &T, cli: &Cli) -> anyhow::Result<()> {
    let json = if cli.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    match cli.output {
        Some(ref path) => {
            utils::save_file(path, json.as_bytes())
                .await
                .with_context(|| format!("写入 {} 失败", path.display()))?;
            tracing::info!("结果已保存到 {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "shopspider",
            "--retries",
            "5",
            "--no-browser",
            "--use-proxies",
            "-c",
            "de",
            "search",
            "-q",
            "mug",
        ]);
        let mut config = AppConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.fetch.max_attempts, 5);
        assert_eq!(config.fetch.base_delay_secs, 5);
        assert!(!config.browser.enabled);
        assert!(config.identity.use_proxies);
        assert_eq!(config.site.country, "de");
        assert!(matches!(cli.command, Commands::Search { page: 1, .. }));
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::parse_from(["shopspider", "product", "-a", "B0X", "--pretty", "--delay", "2"]);
        assert!(cli.pretty);
        assert_eq!(cli.delay, Some(2));
    }

    #[test]
    fn cancellation_maps_to_interrupt() {
        let err = anyhow::Error::from(SpiderError::Fetch(FetchError::Cancelled));
        assert!(is_cancelled(&err));
        assert!(!is_cancelled(&anyhow::anyhow!("boom")));
    }
}
