//! Bunkr 媒体下载器。
//!
//! 把相册页（/a/<id>）与单文件页（/f|v|i|d/<id>）链接解析成可直接下载的
//! 文件直链：检测并绕开被人机挑战拦截的域名、解码按小时换钥的混淆直链，
//! 再把解析出的文件交给下载层落盘。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/链接识别/文本抽取等基础设施
//! - `extractor`：解析核心（域名池、请求路由、解码器、相册流水线）
//! - `download`：直链下载与落盘

use anyhow::{Result, anyhow};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

mod base_system;
mod download;
mod extractor;

use base_system::config::{self, Config};
use base_system::link_parse::{self, LinkKind};
use base_system::logging::{LogOptions, LogSystem};
use download::downloader::FileDownloader;
use extractor::album::AlbumExtractor;
use extractor::domains::DomainPool;
use extractor::models::{ExtractError, FileDescriptor};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "bunkr-media-downloader")]
#[command(about = "Bunkr album/media link resolver and downloader")]
struct Cli {
    /// 相册或单文件页链接（可一次传入多个）
    urls: Vec<String>,

    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 接受任意 bunkr 顶级域名（覆盖配置文件）
    #[arg(long, default_value_t = false)]
    tlds: bool,

    /// 跳过相册开头的 N 个条目（覆盖配置文件）
    #[arg(long)]
    offset: Option<usize>,

    /// 仅解析并打印直链，不执行下载
    #[arg(long, default_value_t = false)]
    no_download: bool,

    /// 数据目录路径（用于存放 config.yml 和 logs 等文件）
    #[arg(long)]
    data_dir: Option<String>,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("Bunkr Media Downloader v{VERSION}");
        return Ok(());
    }

    let data_dir = cli.data_dir.as_deref().map(std::path::Path::new);
    let _log = LogSystem::init(
        LogOptions {
            debug: cli.debug,
            ..LogOptions::default()
        },
        data_dir,
    )
    .map_err(|e| anyhow!(e.to_string()))?;

    let mut config = config::load_or_create(data_dir).map_err(|e| anyhow!(e.to_string()))?;
    if cli.tlds {
        config.tlds = true;
    }
    if let Some(offset) = cli.offset {
        config.offset = offset;
    }

    if cli.urls.is_empty() {
        return Err(anyhow!("未提供任何链接，使用 --help 查看用法"));
    }

    // 域名池跨链接共享：本次运行内发现的挑战域名对后续相册同样生效
    let pool = Arc::new(DomainPool::new());
    let downloader = if cli.no_download {
        None
    } else {
        Some(FileDownloader::new(&config)?)
    };

    for input in &cli.urls {
        if let Err(err) = run_one(input, &pool, &config, downloader.as_ref()) {
            if err.is_fatal() {
                return Err(anyhow!("{err}；本次运行无法继续，请稍后重试或更换域名"));
            }
            error!("处理 '{input}' 失败: {err}");
        }
    }

    Ok(())
}

fn run_one(
    input: &str,
    pool: &Arc<DomainPool>,
    config: &Config,
    downloader: Option<&FileDownloader>,
) -> Result<(), ExtractError> {
    let Some(link) = link_parse::parse_link(input, config.tlds) else {
        warn!("无法识别的链接，跳过: {input}");
        return Ok(());
    };

    let extractor = AlbumExtractor::new(Arc::clone(pool), link.root, config)?;

    match link.kind {
        LinkKind::Album { id } => {
            let (files, meta) = extractor.fetch_album(&id)?;
            info!(
                "相册 '{}'（{}，{}）：共 {} 项",
                meta.album_name,
                meta.album_id,
                meta.album_size.as_deref().unwrap_or("未知大小"),
                meta.count
            );
            let mut resolved = 0usize;
            for item in files {
                // 单条失败已在迭代器内消化，这里只会遇到致命错误
                let file = item?;
                resolved += 1;
                handle_file(&file, downloader);
            }
            info!(
                "相册 '{}' 处理完成：{}/{} 项解析成功",
                meta.album_name, resolved, meta.count
            );
        }
        LinkKind::Media { path } => {
            let (files, _meta) = extractor.fetch_media(&path)?;
            if files.is_empty() {
                warn!("单文件链接未解析出任何结果: {input}");
            }
            for file in &files {
                handle_file(file, downloader);
            }
        }
    }
    Ok(())
}

fn handle_file(file: &FileDescriptor, downloader: Option<&FileDownloader>) {
    info!(
        "解析成功: {}（{}，{}）",
        file.name,
        file.size.as_deref().unwrap_or("未知大小"),
        file.date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "未知时间".to_string()),
    );
    match downloader {
        Some(dl) => {
            if let Err(err) = dl.download(file) {
                error!("'{}' 下载失败: {err}", file.name);
            }
        }
        None => println!("{}", file.url),
    }
}
