//! 页面字符集嗅探与宽松解码。

use std::sync::OnceLock;

use encoding_rs::GBK;
use regex::bytes::Regex;

/// 只扫描响应开头这一段；`<meta charset>` 总在 `<head>` 内。
const SNIFF_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Gbk,
}

fn charset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // 只认 <meta> 中的声明
        Regex::new(r#"(?i)<\s*meta\s[^>]*?charset\s*=\s*["']?([A-Za-z0-9_\-]+)"#)
            .expect("static charset regex")
    })
}

pub fn detect_charset(raw: &[u8]) -> Charset {
    let head = &raw[..raw.len().min(SNIFF_BYTES)];
    let Some(caps) = charset_re().captures(head) else {
        return Charset::Utf8;
    };
    let name = String::from_utf8_lossy(&caps[1]).to_ascii_lowercase();
    if name.contains("gbk") || name.contains("gb2312") {
        Charset::Gbk
    } else {
        Charset::Utf8
    }
}

/// 按嗅探结果解码；非法字节替换为 U+FFFD，不会失败。
pub fn decode_html(raw: &[u8]) -> String {
    match detect_charset(raw) {
        Charset::Gbk => {
            let (text, _had_errors) = GBK.decode_without_bom_handling(raw);
            text.into_owned()
        }
        Charset::Utf8 => String::from_utf8_lossy(raw).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gbk_meta_is_detected() {
        let html = br#"<html><head><meta http-equiv="Content-Type" content="text/html; charset=gbk"></head>"#;
        assert_eq!(detect_charset(html), Charset::Gbk);
        assert_eq!(detect_charset(b"<meta charset=\"GB2312\">"), Charset::Gbk);
    }

    #[test]
    fn charset_on_script_or_link_does_not_shadow_meta() {
        let html = br#"<script src="/a.js" charset="utf-8"></script><link rel="stylesheet" href="/b.css" charset="utf-8"><meta http-equiv="Content-Type" content="text/html; charset=gbk">"#;
        assert_eq!(detect_charset(html), Charset::Gbk);
        assert_eq!(
            detect_charset(br#"<script charset="gbk"></script><meta charset="utf-8">"#),
            Charset::Utf8
        );
    }

    #[test]
    fn missing_or_other_charset_defaults_to_utf8() {
        assert_eq!(detect_charset(b"<html><body>hi</body></html>"), Charset::Utf8);
        assert_eq!(detect_charset(b"<meta charset=\"utf-8\">"), Charset::Utf8);
        assert_eq!(detect_charset(b""), Charset::Utf8);
    }

    #[test]
    fn declaration_past_sniff_window_is_ignored() {
        let mut raw = vec![b' '; SNIFF_BYTES];
        raw.extend_from_slice(b"<meta charset=gbk>");
        assert_eq!(detect_charset(&raw), Charset::Utf8);
    }

    #[test]
    fn gbk_bytes_decode_to_chinese() {
        let mut raw = b"<meta charset=gbk><title>".to_vec();
        // "漫画" in GBK
        raw.extend_from_slice(&[0xC2, 0xFE, 0xBB, 0xAD]);
        raw.extend_from_slice(b"</title>");
        assert!(decode_html(&raw).contains("漫画"));
    }

    #[test]
    fn malformed_utf8_is_replaced_not_fatal() {
        let raw = [b'o', b'k', 0xFF, 0xFE, b'!'];
        let text = decode_html(&raw);
        assert!(text.starts_with("ok"));
        assert!(text.ends_with('!'));
        assert!(text.contains('\u{FFFD}'));
    }
}
