//! 直链下载与落盘。
//!
//! 消费解析核心产出的 FileDescriptor：带上描述里的请求头，依次尝试直链与
//! 备选地址；命中维护占位视频属于软拒绝，换下一个地址继续。
//! 先写 `.part` 再改名，避免留下半截文件顶替成品。

use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error, info};

use crate::base_system::config::Config;
use crate::extractor::models::FileDescriptor;

pub struct FileDownloader {
    client: Client,
    output_dir: PathBuf,
}

enum Attempt {
    Saved(PathBuf),
    Rejected,
}

impl FileDownloader {
    pub fn new(config: &Config) -> Result<Self> {
        // 下载走正常的自动重定向；整体超时不设上限，大文件按需慢慢拉
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            output_dir: PathBuf::from(&config.output_dir),
        })
    }

    /// 依次尝试直链与备选地址，第一个通过校验并落盘成功的地址胜出。
    pub fn download(&self, file: &FileDescriptor) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("创建输出目录 {} 失败", self.output_dir.display()))?;

        let name = if file.name.is_empty() {
            file.id.as_str()
        } else {
            file.name.as_str()
        };
        let file_name = safe_fs_name(name);

        for url in std::iter::once(&file.url).chain(file.fallback.iter()) {
            match self.try_download(url, file, &file_name) {
                Ok(Attempt::Saved(path)) => return Ok(path),
                Ok(Attempt::Rejected) => debug!("'{url}' 被下载校验拒绝，尝试下一个地址"),
                Err(err) => error!("下载 '{url}' 失败: {err}"),
            }
        }
        Err(anyhow!("'{file_name}' 的所有下载地址均失败"))
    }

    fn try_download(
        &self,
        url: &str,
        file: &FileDescriptor,
        file_name: &str,
    ) -> Result<Attempt> {
        let mut headers = HeaderMap::new();
        for (key, value) in &file.headers {
            if let (Ok(k), Ok(v)) = (key.parse::<HeaderName>(), HeaderValue::from_str(value)) {
                headers.insert(k, v);
            }
        }

        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()?
            .error_for_status()?;

        let final_url = response.url().to_string();
        let redirected = final_url != url;
        if !file.validate(&final_url, redirected) {
            return Ok(Attempt::Rejected);
        }

        let bar = match response.content_length() {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{msg} {bytes}/{total_bytes} [{bar:30}] {bytes_per_sec}",
                    )?
                    .progress_chars("=>-"),
                );
                bar
            }
            None => ProgressBar::new_spinner(),
        };
        bar.set_message(file_name.to_string());

        let part_path = self.output_dir.join(format!("{file_name}.part"));
        let target_path = self.output_dir.join(file_name);
        let mut out = File::create(&part_path)
            .with_context(|| format!("创建临时文件 {} 失败", part_path.display()))?;
        let mut reader = bar.wrap_read(response);
        io::copy(&mut reader, &mut out)?;
        drop(out);
        fs::rename(&part_path, &target_path)?;
        bar.finish_and_clear();

        info!("已保存 {}", target_path.display());
        Ok(Attempt::Saved(target_path))
    }
}

/// 清理文件名中的路径分隔符与平台受限字符。
pub(crate) fn safe_fs_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}
