//! 页面文本抽取工具。
//!
//! 站点页面结构简单且标记稳定，这里用轻量子串抽取替代完整 DOM 解析：
//! 定位标记之间的子串、迭代抽取重复区块、基础实体解码、去标签切分文本节点。

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use time::PrimitiveDateTime;
use time::macros::format_description;

fn re_all_tags() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?is)<[^>]+>").expect("compile RE_ALL_TAGS"))
}

/// 抽取 `before` 与 `after` 之间的第一段子串。找不到任一标记时返回 None。
pub(crate) fn extr<'a>(text: &'a str, before: &str, after: &str) -> Option<&'a str> {
    let start = text.find(before)? + before.len();
    let end = text[start..].find(after)? + start;
    Some(&text[start..end])
}

/// 迭代抽取所有位于 `begin` 之后、`end` 之前的片段（不含边界本身）。
pub(crate) fn extract_iter<'a>(text: &'a str, begin: &'a str, end: &'a str) -> ExtractIter<'a> {
    ExtractIter {
        hay: text,
        begin,
        end,
        pos: 0,
    }
}

pub(crate) struct ExtractIter<'a> {
    hay: &'a str,
    begin: &'a str,
    end: &'a str,
    pos: usize,
}

impl<'a> Iterator for ExtractIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let rest = self.hay.get(self.pos..)?;
        let start = rest.find(self.begin)? + self.begin.len();
        let stop = rest[start..].find(self.end)? + start;
        self.pos += stop + self.end.len();
        Some(&rest[start..stop])
    }
}

/// 解码常见 HTML 实体。未包含实体时原样借用返回。
pub(crate) fn unescape(s: &str) -> Cow<'_, str> {
    if !(s.contains("&amp;")
        || s.contains("&lt;")
        || s.contains("&gt;")
        || s.contains("&quot;")
        || s.contains("&#34;")
        || s.contains("&#39;")
        || s.contains("&#x27;")
        || s.contains("&#x22;")
        || s.contains("&nbsp;"))
    {
        return Cow::Borrowed(s);
    }

    Cow::Owned(
        s.replace("&nbsp;", " ")
            .replace("&quot;", "\"")
            .replace("&#34;", "\"")
            .replace("&#x22;", "\"")
            .replace("&#39;", "'")
            .replace("&#x27;", "'")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&"),
    )
}

/// 去除全部标签，按文本节点切分并解码实体，丢弃空白节点。
pub(crate) fn split_html(html: &str) -> Vec<String> {
    re_all_tags()
        .split(html)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| unescape(s).into_owned())
        .collect()
}

/// 解析站点条目里固定的 `HH:MM:SS DD/MM/YYYY` 时间格式。
pub(crate) fn parse_datetime(s: &str) -> Option<PrimitiveDateTime> {
    let format = format_description!("[hour]:[minute]:[second] [day]/[month]/[year]");
    PrimitiveDateTime::parse(s.trim(), format).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    #[test]
    fn extr_returns_substring_between_markers() {
        let page = r#"<meta property="og:title" content="My Album" />"#;
        assert_eq!(
            extr(page, r#"property="og:title" content=""#, "\""),
            Some("My Album")
        );
    }

    #[test]
    fn extr_returns_none_when_marker_missing() {
        assert_eq!(extr("<html></html>", "<title>", "</title>"), None);
    }

    #[test]
    fn extr_finds_internal_file_id_anchor() {
        let page = r#"<a class="btn" href="https://get.bunkrr.su/file/123abc">Download</a>"#;
        assert_eq!(
            extr(page, r#"href="https://get.bunkrr.su/file/"#, "\""),
            Some("123abc")
        );
    }

    #[test]
    fn extract_iter_yields_every_block() {
        let page = "x<div class=\"grid-images_box\"><a href=\"/f/a\">a</a>\
                    y<div class=\"grid-images_box\"><a href=\"/f/b\">b</a>z";
        let blocks: Vec<&str> =
            extract_iter(page, "<div class=\"grid-images_box", "</a>").collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("/f/a"));
        assert!(blocks[1].contains("/f/b"));
    }

    #[test]
    fn unescape_decodes_basic_entities() {
        assert_eq!(unescape("a &amp; b &lt;c&gt;"), "a & b <c>");
        assert_eq!(unescape("plain"), "plain");
    }

    #[test]
    fn split_html_keeps_text_nodes_in_order() {
        let block = "\"><a href=\"/f/x\"><img src=\"/t.png\"><p>video.mp4</p>\
                     <p>10.00 MB</p><p>12:00:00 01/02/2024</p>";
        let info = split_html(block);
        assert_eq!(info, vec!["video.mp4", "10.00 MB", "12:00:00 01/02/2024"]);
    }

    #[test]
    fn parse_datetime_accepts_site_format() {
        let parsed = parse_datetime("23:59:09 31/12/2023").unwrap();
        assert_eq!(parsed.year(), 2023);
        assert_eq!(parsed.month(), Month::December);
        assert_eq!(parsed.day(), 31);
        assert_eq!(parsed.hour(), 23);
        assert_eq!(parsed.second(), 9);
    }

    #[test]
    fn parse_datetime_rejects_other_formats() {
        assert!(parse_datetime("2023-12-31 23:59:09").is_none());
        assert!(parse_datetime("").is_none());
    }
}
