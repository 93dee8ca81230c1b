//! Comic Spider：按章节批量下载漫画图片。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/路径等基础设施
//! - `network_parser`：HTTP 抓取、编码识别、URL 规范化
//! - `site`：站点适配（目录页 -> 章节 -> 页 -> 图片地址）
//! - `render`：无头浏览器渲染与元素截图
//! - `pipeline`：有界队列 + 解析/下载线程池 + 分阶段停机

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{info, warn};

mod base_system;
mod network_parser;
mod pipeline;
mod render;
mod site;

use base_system::config::{ConfigSpec, load_or_create_with_base};
use base_system::context::Config;
use base_system::logging::{LogOptions, LogSystem};
use network_parser::HttpFetcher;
use network_parser::network::FetchConfig;
use pipeline::{Coordinator, NetworkTransfer};
use render::CaptureOptions;
use render::chrome::ChromeLauncher;
use site::Site;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "comic-spider")]
#[command(about = "Concurrent comic crawler and downloader")]
struct Cli {
    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs）
    #[arg(long)]
    data_dir: Option<String>,

    /// 站点：kuku / manhuagui（覆盖配置文件）
    #[arg(long)]
    site: Option<String>,

    /// 漫画目录页地址（覆盖配置文件）
    #[arg(long)]
    url: Option<String>,

    /// 保存根目录（覆盖配置文件）
    #[arg(long)]
    save_path: Option<String>,

    /// 解析线程数
    #[arg(long)]
    producers: Option<usize>,

    /// 下载线程数
    #[arg(long)]
    consumers: Option<usize>,

    /// 下载任务队列容量
    #[arg(long)]
    queue_capacity: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("Comic Spider v{}", VERSION);
        return Ok(());
    }

    let data_dir = cli.data_dir.as_deref().map(Path::new);
    let _log = init_logging(cli.debug, data_dir)?;
    info!(target: "startup", "当前版本: v{}", VERSION);

    let mut config =
        load_or_create_with_base::<Config>(None, data_dir).map_err(|e| anyhow!(e.to_string()))?;
    apply_overrides(&mut config, &cli);
    config.validate().map_err(|e| anyhow!(e))?;

    if config.root_url.trim().is_empty() {
        warn!("未配置目录页地址，请使用 --url 或在 config.yml 中设置 root_url");
        return Ok(());
    }

    let site: Site = config.site.parse().map_err(|e: String| anyhow!(e))?;
    let fetcher = HttpFetcher::new(FetchConfig {
        request_timeout: config.request_timeout(),
        user_agent: config.user_agent.clone(),
    })
    .context("创建 HTTP 客户端失败")?;

    let capture = CaptureOptions {
        launch_attempts: config.render_launch_retries.max(1),
        element_timeout: config.render_timeout(),
        ..CaptureOptions::default()
    };
    let launcher = Arc::new(ChromeLauncher::new(config.chrome_executable()));
    let transfer = Arc::new(NetworkTransfer::new(fetcher.clone(), launcher, capture));
    let adapter = site.adapter(fetcher);

    let save_root: PathBuf = config.default_save_dir();
    std::fs::create_dir_all(&save_root)
        .with_context(|| format!("创建保存目录失败: {}", save_root.display()))?;
    info!("保存目录: {}", save_root.display());

    let coordinator = Coordinator::new(adapter, transfer, config.pipeline_options())?;
    let report = coordinator.process(config.root_url.trim(), &save_root)?;
    if report.jobs_failed > 0 || report.failed_entries > 0 {
        warn!(
            "部分内容下载失败：章节失败 {}，任务失败 {}，详见日志",
            report.failed_entries, report.jobs_failed
        );
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(site) = &cli.site {
        config.site = site.clone();
    }
    if let Some(url) = &cli.url {
        config.root_url = url.clone();
    }
    if let Some(path) = &cli.save_path {
        config.save_path = path.clone();
    }
    if let Some(n) = cli.producers {
        config.producer_workers = n;
    }
    if let Some(n) = cli.consumers {
        config.consumer_workers = n;
    }
    if let Some(n) = cli.queue_capacity {
        config.job_queue_capacity = n;
    }
}

fn init_logging(debug: bool, base_dir: Option<&Path>) -> Result<LogSystem> {
    let opts = LogOptions {
        debug,
        use_color: true,
        archive_on_exit: true,
        console: true,
    };
    LogSystem::init_with_base(opts, base_dir).map_err(|e| anyhow!(e))
}
