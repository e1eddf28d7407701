//! 相册流水线。
//!
//! 相册页一次取回并切出全部条目区块，条目的实际解析（多次网络往返）
//! 推迟到迭代器消费时进行；配置的 offset 只是在区块层面向前跳，
//! 被跳过的条目不会产生任何网络请求。

use std::sync::Arc;

use tracing::error;

use crate::base_system::config::Config;
use crate::base_system::text_extract;

use super::domains::DomainPool;
use super::models::{AlbumMeta, ExtractError, FileDescriptor};
use super::resolver;
use super::router::RequestRouter;

pub struct AlbumExtractor {
    router: RequestRouter,
    offset: usize,
}

impl AlbumExtractor {
    pub fn new(
        pool: Arc<DomainPool>,
        root: impl Into<String>,
        config: &Config,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            router: RequestRouter::new(pool, root, config)?,
            offset: config.offset,
        })
    }

    /// 取相册页并切出条目区块；返回惰性文件序列与元数据。
    /// 元数据里的 `count` 是页面原始条目数，与 offset、单条失败无关。
    pub fn fetch_album(
        &self,
        album_id: &str,
    ) -> Result<(AlbumFiles<'_>, AlbumMeta), ExtractError> {
        let url = format!("{}/a/{}", self.router.root(), album_id);
        let page = self.router.get(&url)?.text()?;

        let title = text_extract::extr(&page, "property=\"og:title\" content=\"", "\"")
            .unwrap_or_default();
        // 站点会把标题二次转义
        let album_name = {
            let once = text_extract::unescape(title);
            text_extract::unescape(&once).into_owned()
        };
        let album_size = text_extract::extr(&page, "<span class=\"font-semibold\">(", ")")
            .map(str::to_string);

        let items: Vec<String> =
            text_extract::extract_iter(&page, "<div class=\"grid-images_box", "</a>")
                .map(str::to_string)
                .collect();

        let meta = AlbumMeta {
            album_id: album_id.to_string(),
            album_name,
            album_size,
            count: items.len(),
        };

        Ok((AlbumFiles::new(&self.router, items, self.offset), meta))
    }

    /// 单文件页作为退化的单条目相册：除致命错误外，任何解析失败都收敛为
    /// 空结果，一条死链不会越过流水线边界。
    pub fn fetch_media(
        &self,
        media_path: &str,
    ) -> Result<(Vec<FileDescriptor>, AlbumMeta), ExtractError> {
        let url = format!("{}{}", self.router.root(), media_path);
        match resolver::extract_file(&self.router, &url) {
            Ok(file) => Ok((
                vec![file],
                AlbumMeta {
                    count: 1,
                    ..AlbumMeta::default()
                },
            )),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                error!("单文件解析失败: {err}");
                Ok((Vec::new(), AlbumMeta::default()))
            }
        }
    }
}

/// 相册条目的惰性迭代器。每次 `next` 才对一个条目做网络解析。
pub struct AlbumFiles<'a> {
    router: &'a RequestRouter,
    items: std::iter::Skip<std::vec::IntoIter<String>>,
    fused: bool,
}

impl<'a> AlbumFiles<'a> {
    fn new(router: &'a RequestRouter, items: Vec<String>, offset: usize) -> Self {
        Self {
            router,
            items: items.into_iter().skip(offset),
            fused: false,
        }
    }

    fn resolve_item(&self, item: &str) -> Result<FileDescriptor, ExtractError> {
        let href = text_extract::extr(item, " href=\"", "\"")
            .ok_or(ExtractError::MissingField("href"))?;
        let href = text_extract::unescape(href);
        let url = if href.starts_with('/') {
            format!("{}{}", self.router.root(), href)
        } else {
            href.into_owned()
        };

        let mut file = resolver::extract_file(self.router, &url)?;

        // 条目区块的文本节点从后往前依次是：名称、大小、时间
        let info = text_extract::split_html(item);
        let n = info.len();
        if file.name.is_empty() && n >= 3 {
            file.name = info[n - 3].clone();
        }
        if n >= 2 {
            file.size = Some(info[n - 2].clone());
        }
        if let Some(last) = info.last() {
            file.date = text_extract::parse_datetime(last);
        }
        Ok(file)
    }
}

impl Iterator for AlbumFiles<'_> {
    type Item = Result<FileDescriptor, ExtractError>;

    /// 单条失败只记录并继续；唯有"所有域名均被挑战"会作为 Err 产出，
    /// 之后迭代器熔断不再产出任何条目。
    fn next(&mut self) -> Option<Self::Item> {
        if self.fused {
            return None;
        }
        loop {
            let item = self.items.next()?;
            match self.resolve_item(&item) {
                Ok(file) => return Some(Ok(file)),
                Err(err) if err.is_fatal() => {
                    self.fused = true;
                    return Some(Err(err));
                }
                Err(err) => error!("条目解析失败，跳过: {err}"),
            }
        }
    }
}
