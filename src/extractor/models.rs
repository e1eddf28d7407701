//! 解析产物的数据模型与错误类型。

use time::PrimitiveDateTime;
use tracing::warn;

use super::decoder::DecodeError;

/// 单个文件的直链描述，交给下载层消费后不再变更。
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// 解码后的直链
    pub url: String,
    /// 展示用文件名
    pub name: String,
    /// 媒体页 URL 最后一段路径，作为条目标识
    pub id: String,
    /// 页面声明的文件大小（如 "10.00 MB"）
    pub size: Option<String>,
    /// 页面声明的时间戳
    pub date: Option<PrimitiveDateTime>,
    /// 备选下载地址（可能为空）
    pub fallback: Vec<String>,
    /// 下载时必须携带的请求头
    pub headers: Vec<(String, String)>,
}

impl FileDescriptor {
    /// 下载后校验：仅当最终被重定向到维护占位视频时拒绝（软拒绝，不报错）。
    pub fn validate(&self, final_url: &str, redirected: bool) -> bool {
        if redirected && final_url.ends_with("/maintenance-vid.mp4") {
            warn!("文件服务器处于维护模式");
            return false;
        }
        true
    }
}

/// 相册元数据。`count` 是页面上的原始条目数，
/// 不随 offset 跳过或单条失败而减少。
#[derive(Debug, Clone, Default)]
pub struct AlbumMeta {
    pub album_id: String,
    pub album_name: String,
    pub album_size: Option<String>,
    pub count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// 致命：活跃域名池已被清空，本次运行无法再取回任何页面
    #[error("all hosting domains require solving a challenge")]
    AllDomainsChallenged,
    /// 非 403 的 HTTP 错误，原样向上传播
    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("url decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("missing file id on media page")]
    MissingFileId,
    #[error("missing expected field: {0}")]
    MissingField(&'static str),
}

impl ExtractError {
    /// 是否为必须穿透所有捕获点向上传播的致命错误。
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AllDomainsChallenged)
    }
}
