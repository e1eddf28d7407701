//! 域名池：活跃 / 被挑战 / 旧域名三态管理。
//!
//! 池在进程内共享（Arc 注入，不做隐式单例），挑战发现对同一次运行里的
//! 后续相册持续生效；域名只会从活跃转入被挑战，进程内不会复活。

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use super::models::ExtractError;

pub(crate) const DOMAINS: &[&str] = &[
    "bunkr.ac",
    "bunkr.ci",
    "bunkr.cr",
    "bunkr.fi",
    "bunkr.ph",
    "bunkr.pk",
    "bunkr.ps",
    "bunkr.si",
    "bunkr.sk",
    "bunkr.ws",
    "bunkr.black",
    "bunkr.red",
    "bunkr.media",
    "bunkr.site",
];

/// 仅作为显式解析目标，从不参与回退轮换。
pub(crate) const LEGACY_DOMAINS: &[&str] = &[
    "bunkr.ax",
    "bunkr.cat",
    "bunkr.ru",
    "bunkrr.ru",
    "bunkr.su",
    "bunkrr.su",
    "bunkr.la",
    "bunkr.is",
    "bunkr.to",
];

pub(crate) fn is_legacy(host: &str) -> bool {
    LEGACY_DOMAINS.contains(&host)
}

#[derive(Debug)]
pub struct DomainPool {
    inner: Mutex<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    active: Vec<String>,
    challenged: HashSet<String>,
}

impl DomainPool {
    pub fn new() -> Self {
        Self::with_domains(DOMAINS.iter().map(|d| (*d).to_string()))
    }

    pub fn with_domains<I>(domains: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            inner: Mutex::new(PoolInner {
                active: domains.into_iter().collect(),
                challenged: HashSet::new(),
            }),
        }
    }

    /// 随机挑选一个仍然活跃的域名；池空时返回致命错误。
    pub fn pick_fallback(&self) -> Result<String, ExtractError> {
        let Ok(inner) = self.inner.lock() else {
            return Err(ExtractError::AllDomainsChallenged);
        };
        if inner.active.is_empty() {
            return Err(ExtractError::AllDomainsChallenged);
        }
        Ok(inner.active[pick_index(inner.active.len())].clone())
    }

    /// 将域名标记为被挑战并移出活跃轮换（幂等）。
    /// 当活跃列表因此清空时返回致命错误而不是留下一个不可用的池。
    pub fn mark_challenged(&self, host: &str) -> Result<(), ExtractError> {
        let Ok(mut inner) = self.inner.lock() else {
            return Err(ExtractError::AllDomainsChallenged);
        };
        if inner.challenged.insert(host.to_string()) {
            debug!("已将 '{}' 记入挑战域名", host);
        }
        if let Some(pos) = inner.active.iter().position(|d| d == host) {
            inner.active.remove(pos);
            if inner.active.is_empty() {
                return Err(ExtractError::AllDomainsChallenged);
            }
        }
        Ok(())
    }

    pub fn is_challenged(&self, host: &str) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.challenged.contains(host))
            .unwrap_or(false)
    }
}

impl Default for DomainPool {
    fn default() -> Self {
        Self::new()
    }
}

// 轻量随机：用时钟纳秒取模（避免引入 rand 依赖）
fn pick_index(len: usize) -> usize {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    (nanos % len as u64) as usize
}
