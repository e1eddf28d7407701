//! 单个媒体页到直链描述的解析。
//!
//! 流程：取媒体页 → 从页内锚点拿内部文件 id → POST 站点内部解析接口
//! → 解码返回的混淆直链 → HEAD 探活（只告警不阻断）→ 组装描述。

use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde::Deserialize;
use tracing::{error, warn};

use crate::base_system::text_extract;

use super::decoder;
use super::models::{ExtractError, FileDescriptor};
use super::router::RequestRouter;

/// 内部解析接口所在的源，同时是 CDN 要求的 Referer。
pub(crate) const API_REFERER: &str = "https://get.bunkrr.su";

/// 解析接口的响应：混淆直链 + 派生密钥用的时间戳。
#[derive(Debug, Deserialize)]
struct ApiResponse {
    url: String,
    timestamp: i64,
}

pub(crate) fn extract_file(
    router: &RequestRouter,
    page_url: &str,
) -> Result<FileDescriptor, ExtractError> {
    let response = router.get(page_url)?;
    let final_page_url = response.url().to_string();
    let page = response.text()?;

    let marker = format!("href=\"{API_REFERER}/file/");
    let data_id = text_extract::extr(&page, &marker, "\"")
        .filter(|id| !id.is_empty())
        .ok_or(ExtractError::MissingFileId)?;

    let api_url = format!("{API_REFERER}/api/vs");
    let api_response = router.post_json(&api_url, &serde_json::json!({ "id": data_id }))?;
    let result: ApiResponse = api_response.json()?;

    let file_url = match decoder::decrypt_url(&result.url, result.timestamp) {
        Ok(url) => url,
        Err(err) => {
            error!("直链解码失败: {err}");
            return Err(err.into());
        }
    };

    probe_file_url(router, &file_url)?;

    let file_name = text_extract::extr(&page, "property=\"og:title\" content=\"", "\"")
        .filter(|name| !name.is_empty())
        .or_else(|| text_extract::extr(&page, "<title>", " | Bunkr<"))
        .unwrap_or_default();
    let canonical = text_extract::extr(&page, "property=\"og:url\" content=\"", "\"")
        .filter(|url| !url.is_empty());

    Ok(FileDescriptor {
        url: text_extract::unescape(&file_url).into_owned(),
        name: text_extract::unescape(file_name).into_owned(),
        id: page_url.rsplit('/').next().unwrap_or_default().to_string(),
        size: None,
        date: None,
        fallback: canonical.map(|url| vec![url.to_string()]).unwrap_or_default(),
        headers: vec![("Referer".to_string(), final_page_url)],
    })
}

/// HEAD 探活。可用性可能是瞬时问题且重试属于下载层，
/// 所以除致命错误外一律只记警告。
fn probe_file_url(router: &RequestRouter, file_url: &str) -> Result<(), ExtractError> {
    let mut headers = HeaderMap::new();
    headers.insert(REFERER, HeaderValue::from_static(API_REFERER));
    match router.head(file_url, headers) {
        Ok(probe) if probe.status().as_u16() != 200 => {
            warn!("CDN 直链探活失败 (HTTP {})", probe.status().as_u16());
        }
        Ok(_) => {}
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => warn!("CDN 直链探活失败: {err}"),
    }
    Ok(())
}
