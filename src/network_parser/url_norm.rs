//! URL 规范化：仅对含非 ASCII 字符的路径段做百分号编码。

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// 与常见 `quote()` 行为一致：保留字母数字与 `-._~`。
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// 拆出 scheme://authority、path、?query#fragment 三段，只改写 path。
pub fn standardize_url(url: &str) -> String {
    let (prefix, rest) = match url.find("://") {
        Some(pos) => {
            let after = pos + 3;
            let path_start = url[after..]
                .find(['/', '?', '#'])
                .map(|p| after + p)
                .unwrap_or(url.len());
            url.split_at(path_start)
        }
        None => ("", url),
    };

    let path_end = rest.find(['?', '#']).unwrap_or(rest.len());
    let (path, tail) = rest.split_at(path_end);

    let path = path
        .split('/')
        .map(|segment| {
            if segment.is_ascii() {
                segment.to_string()
            } else {
                utf8_percent_encode(segment, SEGMENT).to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/");

    format!("{prefix}{path}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_url_is_unchanged() {
        let url = "http://comic.kukudm.com/comiclist/2274/index.htm?a=1#top";
        assert_eq!(standardize_url(url), url);
    }

    #[test]
    fn non_ascii_segment_is_percent_encoded() {
        let url = "https://i.hamreus.com/ps1/c/第72回/01.jpg.webp?cid=214050&md5=SONG#p=1";
        assert_eq!(
            standardize_url(url),
            "https://i.hamreus.com/ps1/c/%E7%AC%AC72%E5%9B%9E/01.jpg.webp?cid=214050&md5=SONG#p=1"
        );
    }

    #[test]
    fn only_non_ascii_segments_change() {
        let url = "http://host/a b/漫画 1.jpg";
        assert_eq!(
            standardize_url(url),
            "http://host/a b/%E6%BC%AB%E7%94%BB%201.jpg"
        );
    }

    #[test]
    fn host_only_and_relative_inputs() {
        assert_eq!(standardize_url("http://host"), "http://host");
        assert_eq!(standardize_url("http://host?q=漫"), "http://host?q=漫");
        assert_eq!(standardize_url("/漫/x"), "/%E6%BC%AB/x");
    }
}
