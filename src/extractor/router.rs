//! 弹性请求路由。
//!
//! 禁用自动重定向，自己跟完整条重定向链；凡是指向已知挑战域名的重定向
//! 或 403 响应都按人机挑战处理：把当前域名移出轮换并换一个活跃域名重试。
//! 每次发现挑战都会永久缩小活跃集合，循环必然终止（成功或池空致命）。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, LOCATION, USER_AGENT};
use reqwest::{Method, redirect};
use serde_json::Value;
use tracing::debug;

use crate::base_system::config::Config;

use super::domains::DomainPool;
use super::models::ExtractError;

pub struct RequestRouter {
    client: Client,
    pool: Arc<DomainPool>,
    root: Mutex<String>,
}

impl RequestRouter {
    pub fn new(
        pool: Arc<DomainPool>,
        root: impl Into<String>,
        config: &Config,
    ) -> Result<Self, ExtractError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );

        let client = Client::builder()
            .default_headers(headers)
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            pool,
            root: Mutex::new(root.into()),
        })
    }

    /// 当前生效的站点根。相对路径重定向、相册条目的相对 href 都基于它拼接；
    /// 回退换域后随之更新。
    pub fn root(&self) -> String {
        self.root.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn set_root(&self, new_root: &str) {
        if let Ok(mut root) = self.root.lock() {
            *root = new_root.to_string();
        }
    }

    pub fn get(&self, url: &str) -> Result<Response, ExtractError> {
        self.send_routed(Method::GET, url, None, None)
    }

    pub fn head(&self, url: &str, headers: HeaderMap) -> Result<Response, ExtractError> {
        self.send_routed(Method::HEAD, url, Some(headers), None)
    }

    pub fn post_json(&self, url: &str, body: &Value) -> Result<Response, ExtractError> {
        self.send_routed(Method::POST, url, None, Some(body))
    }

    /// 核心循环：<300 直接返回；3xx 手动跟随；403 与指向挑战域名的重定向
    /// 触发换域重试；其余 HTTP 错误不重试，原样向上传播。
    fn send_routed(
        &self,
        method: Method,
        url: &str,
        headers: Option<HeaderMap>,
        json: Option<&Value>,
    ) -> Result<Response, ExtractError> {
        let mut url = url.to_string();
        loop {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(h) = &headers {
                request = request.headers(h.clone());
            }
            if let Some(body) = json {
                request = request.json(body);
            }
            let response = request.send()?;

            let status = response.status();
            if status.as_u16() < 300 {
                return Ok(response);
            }

            let (root, path) = if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or(ExtractError::MissingField("Location"))?
                    .to_string();

                if location.starts_with('/') {
                    // 相对跳转：同域重试，不消耗回退域名
                    url = format!("{}{}", self.root(), location);
                    continue;
                }

                let (root, path) = split_url(&location);
                if !self.pool.is_challenged(host_of(&root)) {
                    // 普通跨域重定向，直接跟随
                    url = location;
                    continue;
                }
                debug!("重定向指向已知挑战域名 '{}'", root);
                (root, path)
            } else if status.as_u16() == 403 {
                let (root, path) = split_url(&url);
                debug!("'{}' 返回 403，按人机挑战处理", root);
                (root, path)
            } else {
                return Err(ExtractError::HttpStatus {
                    status: status.as_u16(),
                    url,
                });
            };

            self.pool.mark_challenged(host_of(&root))?;

            let fallback = self.pool.pick_fallback()?;
            let new_root = format!("https://{fallback}");
            debug!("尝试以 '{}' 作为回退域名", new_root);
            self.set_root(&new_root);
            url = format!("{new_root}{path}");
        }
    }
}

/// 把绝对 URL 拆成（根，路径）。无路径时路径为空串。
fn split_url(url: &str) -> (String, String) {
    let host_start = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[host_start..].find('/') {
        Some(i) => (
            url[..host_start + i].to_string(),
            url[host_start + i..].to_string(),
        ),
        None => (url.to_string(), String::new()),
    }
}

/// 取根 URL 中的主机名部分（挑战集合以主机名为键）。
fn host_of(root: &str) -> &str {
    root.rsplit_once("//").map_or(root, |(_, host)| host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn serve(responses: Vec<String>) -> (String, thread::JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let mut served = 0usize;
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    break;
                };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
                served += 1;
            }
            served
        });
        (format!("http://{addr}"), handle)
    }

    fn ok_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
    }

    fn redirect_response(location: &str) -> String {
        format!(
            "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )
    }

    fn status_response(status: u16, reason: &str) -> String {
        format!("HTTP/1.1 {status} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
    }

    fn test_config() -> Config {
        Config {
            request_timeout_secs: 5,
            ..Config::default()
        }
    }

    fn host_only(root_url: &str) -> String {
        root_url.trim_start_matches("http://").to_string()
    }

    #[test]
    fn path_only_redirect_stays_on_current_root() {
        let (root, handle) = serve(vec![redirect_response("/new/path"), ok_response("ok")]);
        let pool = Arc::new(DomainPool::new());
        let router = RequestRouter::new(pool, root.clone(), &test_config()).unwrap();

        let response = router.get(&format!("{root}/old/path")).unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.url().as_str(), format!("{root}/new/path"));
        // 两次请求都打到同一个根，没有触发回退
        assert_eq!(handle.join().unwrap(), 2);
        assert_eq!(router.root(), root);
    }

    #[test]
    fn absolute_redirect_to_unchallenged_host_is_followed() {
        let (target_root, target_handle) = serve(vec![ok_response("payload")]);
        let (root, handle) = serve(vec![redirect_response(&format!("{target_root}/file"))]);
        let pool = Arc::new(DomainPool::new());
        let router = RequestRouter::new(pool, root.clone(), &test_config()).unwrap();

        let response = router.get(&format!("{root}/start")).unwrap();
        assert_eq!(response.status().as_u16(), 200);
        assert!(response.url().as_str().starts_with(&target_root));
        assert_eq!(handle.join().unwrap(), 1);
        assert_eq!(target_handle.join().unwrap(), 1);
    }

    #[test]
    fn non_challenge_http_error_propagates_unchanged() {
        let (root, handle) = serve(vec![status_response(500, "Internal Server Error")]);
        let pool = Arc::new(DomainPool::new());
        let router = RequestRouter::new(pool, root.clone(), &test_config()).unwrap();

        let err = router.get(&format!("{root}/x")).unwrap_err();
        match err {
            ExtractError::HttpStatus { status, .. } => assert_eq!(status, 500),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn challenge_with_single_domain_pool_is_fatal() {
        let (root, handle) = serve(vec![status_response(403, "Forbidden")]);
        let host = host_only(&root);
        let pool = Arc::new(DomainPool::with_domains(vec![host.clone()]));
        let router =
            RequestRouter::new(Arc::clone(&pool), root.clone(), &test_config()).unwrap();

        let err = router.get(&format!("{root}/x")).unwrap_err();
        assert!(err.is_fatal());
        assert!(pool.is_challenged(&host));
        // 池已清空：只有最初那一次请求，不会再打向任何被挑战域名
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn redirect_to_challenged_host_rotates_to_fallback() {
        let gate_host = "127.0.0.1:9".to_string();
        let fallback_host = "127.0.0.1:19".to_string();
        let (root, handle) = serve(vec![redirect_response(&format!(
            "http://{gate_host}/denied"
        ))]);
        let pool = Arc::new(DomainPool::with_domains(vec![
            gate_host.clone(),
            fallback_host.clone(),
        ]));
        pool.mark_challenged(&gate_host).unwrap();
        let router =
            RequestRouter::new(Arc::clone(&pool), root.clone(), &test_config()).unwrap();

        // 回退域名端口上没有任何服务：走到回退重写后以传输错误收场，
        // 这正说明挑战分支选择了新域名而不是继续跟随跳转
        let err = router.get(&format!("{root}/start")).unwrap_err();
        assert!(matches!(err, ExtractError::Network(_)));
        assert_eq!(router.root(), format!("https://{fallback_host}"));
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn split_url_separates_root_and_path() {
        assert_eq!(
            split_url("https://bunkr.si/a/abc?x=1"),
            ("https://bunkr.si".to_string(), "/a/abc?x=1".to_string())
        );
        assert_eq!(
            split_url("https://bunkr.si"),
            ("https://bunkr.si".to_string(), String::new())
        );
    }

    #[test]
    fn host_of_strips_scheme() {
        assert_eq!(host_of("https://bunkr.si"), "bunkr.si");
        assert_eq!(host_of("bunkr.si"), "bunkr.si");
    }
}
