//! 相册/媒体链接识别与根域名规范化。

use std::sync::OnceLock;

use regex::Regex;

use crate::extractor::domains;

/// 旧域名与 `bunkr:` 显式覆盖之外的默认站点根。
pub const DEFAULT_ROOT: &str = "https://bunkr.si";

// 两种主机写法：`bunkr:` 前缀显式指定任意主机，或常规域名（可带 app. 前缀）。
// 常规域名默认只接受内置 TLD 列表，开启 tlds 后放宽为任意 TLD。
const HOST_ANY: &str = r"(?:bunkr:(?:https?://)?([^/?#]+)|(?:https?://)?(?:app\.)?(bunkr+\.\w+))";
const HOST_KNOWN: &str = r"(?:bunkr:(?:https?://)?([^/?#]+)|(?:https?://)?(?:app\.)?(bunkr+\.(?:s[kiu]|c[ir]|fi|p[hks]|ru|la|is|to|a[cx]|black|cat|media|red|site|ws|org)))";

fn re_album(tlds: bool) -> &'static Regex {
    static ANY: OnceLock<Regex> = OnceLock::new();
    static KNOWN: OnceLock<Regex> = OnceLock::new();
    if tlds {
        ANY.get_or_init(|| {
            Regex::new(&format!("^{HOST_ANY}/a/([^/?#]+)")).expect("compile RE_ALBUM_ANY")
        })
    } else {
        KNOWN.get_or_init(|| {
            Regex::new(&format!("^{HOST_KNOWN}/a/([^/?#]+)")).expect("compile RE_ALBUM_KNOWN")
        })
    }
}

fn re_media(tlds: bool) -> &'static Regex {
    static ANY: OnceLock<Regex> = OnceLock::new();
    static KNOWN: OnceLock<Regex> = OnceLock::new();
    if tlds {
        ANY.get_or_init(|| {
            Regex::new(&format!("^{HOST_ANY}(/[fvid]/[^/?#]+)")).expect("compile RE_MEDIA_ANY")
        })
    } else {
        KNOWN.get_or_init(|| {
            Regex::new(&format!("^{HOST_KNOWN}(/[fvid]/[^/?#]+)"))
                .expect("compile RE_MEDIA_KNOWN")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    /// 相册页 `/a/<id>`
    Album { id: String },
    /// 单文件页 `/f|v|i|d/<id>`，保留完整路径
    Media { path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
    pub root: String,
    pub kind: LinkKind,
}

/// 识别输入链接。旧域名解析成功但根保持默认域名；
/// `bunkr:` 前缀可以显式指定任意主机。
pub fn parse_link(input: &str, tlds: bool) -> Option<ParsedLink> {
    let input = input.trim();

    if let Some(caps) = re_album(tlds).captures(input) {
        return Some(ParsedLink {
            root: root_from(&caps),
            kind: LinkKind::Album {
                id: caps.get(3)?.as_str().to_string(),
            },
        });
    }

    if let Some(caps) = re_media(tlds).captures(input) {
        return Some(ParsedLink {
            root: root_from(&caps),
            kind: LinkKind::Media {
                path: caps.get(3)?.as_str().to_string(),
            },
        });
    }

    None
}

fn root_from(caps: &regex::Captures<'_>) -> String {
    let domain = caps
        .get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default();
    if domains::is_legacy(domain) {
        DEFAULT_ROOT.to_string()
    } else {
        format!("https://{domain}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_album_url() {
        let link = parse_link("https://bunkr.si/a/abc123", false).unwrap();
        assert_eq!(link.root, "https://bunkr.si");
        assert_eq!(
            link.kind,
            LinkKind::Album {
                id: "abc123".to_string()
            }
        );
    }

    #[test]
    fn parses_media_urls_of_every_shape() {
        for shape in ["f", "v", "i", "d"] {
            let input = format!("https://bunkr.black/{shape}/xyz");
            let link = parse_link(&input, false).unwrap();
            assert_eq!(link.root, "https://bunkr.black");
            assert_eq!(
                link.kind,
                LinkKind::Media {
                    path: format!("/{shape}/xyz")
                }
            );
        }
    }

    #[test]
    fn accepts_schemeless_and_app_prefixed_urls() {
        assert!(parse_link("bunkr.si/a/abc", false).is_some());
        let link = parse_link("https://app.bunkr.si/a/abc", false).unwrap();
        assert_eq!(link.root, "https://bunkr.si");
    }

    #[test]
    fn legacy_domain_parses_but_keeps_default_root() {
        let link = parse_link("https://bunkr.ru/a/abc", false).unwrap();
        assert_eq!(link.root, DEFAULT_ROOT);
    }

    #[test]
    fn explicit_override_scheme_accepts_any_host() {
        let link = parse_link("bunkr:https://mirror.example.org/a/abc", false).unwrap();
        assert_eq!(link.root, "https://mirror.example.org");
        assert_eq!(
            link.kind,
            LinkKind::Album {
                id: "abc".to_string()
            }
        );
    }

    #[test]
    fn unknown_tld_requires_the_tlds_flag() {
        assert!(parse_link("https://bunkr.xyz/a/abc", false).is_none());
        assert!(parse_link("https://bunkr.xyz/a/abc", true).is_some());
    }

    #[test]
    fn rejects_unrelated_urls() {
        assert!(parse_link("https://example.com/a/abc", false).is_none());
        assert!(parse_link("https://bunkr.si/about", false).is_none());
        assert!(parse_link("", false).is_none());
    }
}
