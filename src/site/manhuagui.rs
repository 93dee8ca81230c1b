//! www.manhuagui.com
//!
//! 图片由前端脚本解密后才加载，只能用无头浏览器渲染页面再截取 `#mangaFile`。
//! 翻页通过锚点 `#p=N` 完成。

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{EntryInfo, ExtractError, SiteAdapter, join_url};
use crate::network_parser::HttpFetcher;
use crate::pipeline::job::Job;

pub const IMAGE_ELEMENT_ID: &str = "mangaFile";

pub struct ManhuaguiAdapter {
    fetcher: HttpFetcher,
}

impl ManhuaguiAdapter {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

fn selector(css: &'static str, cell: &'static OnceLock<Selector>) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).expect("static selector"))
}

fn chapter_link_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    selector("ul a.status0", &SEL)
}

fn chapter_list_selectors() -> [&'static Selector; 2] {
    static PRIMARY: OnceLock<Selector> = OnceLock::new();
    static FALLBACK: OnceLock<Selector> = OnceLock::new();
    [
        selector("#chapter-list-1", &PRIMARY),
        selector("#chapter-list-0", &FALLBACK),
    ]
}

fn title_block_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    selector("div.w980.title > div:nth-of-type(2)", &SEL)
}

fn comic_title_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    selector("h1 > a", &SEL)
}

fn chapter_title_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    selector("h2", &SEL)
}

fn pager_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    selector("span", &SEL)
}

fn page_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 分页提示 `(/18)`，当前页号由脚本填充，静态页面里可能为空
    RE.get_or_init(|| Regex::new(r"\(\s*\d*\s*/\s*(\d+)\s*\)").expect("static regex"))
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

pub(crate) fn parse_entry_links(html: &str, root: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let Some(list) = chapter_list_selectors()
        .into_iter()
        .find_map(|sel| doc.select(sel).next())
    else {
        return Vec::new();
    };

    list.select(chapter_link_selector())
        .filter_map(|a| a.value().attr("href"))
        .map(|href| join_url(root, href))
        .collect()
}

pub(crate) fn parse_entry_info(html: &str) -> Option<EntryInfo> {
    let doc = Html::parse_document(html);
    let block = doc.select(title_block_selector()).next()?;

    let title = block.select(comic_title_selector()).next().map(text_of)?;
    let chapter = block.select(chapter_title_selector()).next().map(text_of)?;
    let page_count = block
        .select(pager_selector())
        .find_map(|span| {
            page_count_re()
                .captures(&text_of(span))
                .and_then(|caps| caps.get(1)?.as_str().parse::<usize>().ok())
        })?;

    Some(EntryInfo {
        name: format!("{} {}", title, chapter),
        page_count,
    })
}

pub(crate) fn page_urls(entry: &str, page_count: usize) -> Vec<String> {
    (1..=page_count).map(|i| format!("{entry}#p={i}")).collect()
}

impl SiteAdapter for ManhuaguiAdapter {
    fn name(&self) -> &'static str {
        "manhuagui"
    }

    fn list_entries(&self, root: &str) -> Result<Vec<String>, ExtractError> {
        let html = self.fetcher.fetch_html(root)?;
        let entries = parse_entry_links(&html, root);
        if entries.is_empty() {
            return Err(ExtractError::missing("chapter list", root));
        }
        Ok(entries)
    }

    fn describe_entry(&self, entry: &str) -> Result<EntryInfo, ExtractError> {
        let html = self.fetcher.fetch_html(entry)?;
        parse_entry_info(&html).ok_or_else(|| ExtractError::missing("page count element", entry))
    }

    fn list_pages(&self, entry: &str, page_count: usize) -> Result<Vec<String>, ExtractError> {
        Ok(page_urls(entry, page_count))
    }

    fn resolve_asset_location(&self, page: &str) -> Result<String, ExtractError> {
        // 由渲染任务直接打开页面截图
        Ok(page.to_string())
    }

    fn file_extension_for(&self, _asset: &str) -> String {
        ".png".to_string()
    }

    fn build_job(&self, destination: PathBuf, asset: String) -> Job {
        Job::capture(destination, asset, IMAGE_ELEMENT_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network_parser::network::FetchConfig;
    use crate::pipeline::job::JobKind;

    const COMIC_HTML: &str = r#"
        <html><body>
        <div id="chapter-list-1" class="chapter-list">
          <ul>
            <li><a href="/comic/14857/214050.html" class="status0">第72回</a></li>
            <li><a href="/comic/14857/214049.html" class="status0">第71回</a></li>
          </ul>
          <ul>
            <li><a href="/comic/14857/100.html" class="status1">已读</a></li>
          </ul>
        </div>
        </body></html>"#;

    const CHAPTER_HTML: &str = r#"
        <html><body>
        <div class="w980 title">
          <div>logo</div>
          <div>
            <h1><a href="/comic/14857/">粗点心战争</a></h1>
            <h2>第72回</h2>
            <span>(<span id="page">1</span>/18)</span>
          </div>
        </div>
        </body></html>"#;

    #[test]
    fn chapter_links_are_absolute() {
        let links = parse_entry_links(COMIC_HTML, "https://www.manhuagui.com/comic/14857/");
        assert_eq!(
            links,
            vec![
                "https://www.manhuagui.com/comic/14857/214050.html",
                "https://www.manhuagui.com/comic/14857/214049.html",
            ]
        );
    }

    #[test]
    fn falls_back_to_second_chapter_list() {
        let html = COMIC_HTML.replace("chapter-list-1", "chapter-list-0");
        assert_eq!(parse_entry_links(&html, "https://www.manhuagui.com/").len(), 2);
        assert!(parse_entry_links("<html></html>", "https://www.manhuagui.com/").is_empty());
    }

    #[test]
    fn entry_name_combines_comic_and_chapter() {
        let info = parse_entry_info(CHAPTER_HTML).unwrap();
        assert_eq!(info.name, "粗点心战争 第72回");
        assert_eq!(info.page_count, 18);
    }

    #[test]
    fn pages_use_anchor_navigation() {
        assert_eq!(
            page_urls("https://www.manhuagui.com/comic/14857/214050.html", 2),
            vec![
                "https://www.manhuagui.com/comic/14857/214050.html#p=1",
                "https://www.manhuagui.com/comic/14857/214050.html#p=2",
            ]
        );
    }

    #[test]
    fn jobs_are_rendered_captures() {
        let adapter = ManhuaguiAdapter::new(HttpFetcher::new(FetchConfig::default()).unwrap());
        let job = adapter.build_job(PathBuf::from("/c/0000.png"), "https://x#p=1".into());
        assert_eq!(
            job.kind(),
            &JobKind::RenderedCapture {
                element_id: IMAGE_ELEMENT_ID.to_string()
            }
        );
        assert_eq!(adapter.file_extension_for("https://x#p=1"), ".png");
    }
}
