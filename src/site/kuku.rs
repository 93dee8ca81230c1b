//! comic.kukudm.com
//!
//! 章节页形如 `.../comiclist/2274/52364/1.htm`，同目录下按 `N.htm` 翻页；
//! 图片地址藏在页面脚本 `document.write(...)` 里，需要拼上图片服务器前缀。

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};

use super::{EntryInfo, ExtractError, SiteAdapter, join_url, url_path_extension};
use crate::network_parser::HttpFetcher;
use crate::pipeline::job::Job;

const IMAGE_HOST: &str = "http://n5.1whour.com/";

pub struct KukuAdapter {
    fetcher: HttpFetcher,
}

impl KukuAdapter {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self { fetcher }
    }
}

fn entry_link_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("#comiclistn dd a").expect("static selector"))
}

fn title_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("title").expect("static selector"))
}

fn page_count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 破刃之剑_Vol_1 | 共82页 | 当前第1页 | 跳转至第
    RE.get_or_init(|| Regex::new(r"共\s*(\d+)\s*页").expect("static regex"))
}

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"document\.write\(.*?\)").expect("static regex"))
}

fn image_path_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\+\s*"(.*?\.jpg)"#).expect("static regex"))
}

pub(crate) fn parse_entry_links(html: &str, root: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(entry_link_selector())
        // 每个章节有多条线路，只取标着 ① 的那一条
        .filter(|a| a.text().collect::<String>().trim() == "①")
        .filter_map(|a| a.value().attr("href"))
        .map(|href| join_url(root, href))
        .collect()
}

pub(crate) fn parse_entry_info(html: &str) -> Option<EntryInfo> {
    let doc = Html::parse_document(html);
    let name = doc
        .select(title_selector())
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())?;
    let page_count = page_count_re()
        .captures(html)?
        .get(1)?
        .as_str()
        .parse::<usize>()
        .ok()?;
    Some(EntryInfo { name, page_count })
}

pub(crate) fn page_urls(first_page: &str, page_count: usize) -> Vec<String> {
    let prefix = match first_page.rfind('/') {
        Some(pos) => &first_page[..=pos],
        None => "",
    };
    (1..=page_count)
        .map(|i| format!("{prefix}{i}.htm"))
        .collect()
}

pub(crate) fn parse_image_url(html: &str) -> Option<String> {
    let script = script_re().find(html)?.as_str();
    let path = image_path_re().captures(script)?.get(1)?.as_str();
    Some(format!("{IMAGE_HOST}{path}"))
}

impl SiteAdapter for KukuAdapter {
    fn name(&self) -> &'static str {
        "kuku"
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
        parse_entry_info(&html).ok_or_else(|| ExtractError::missing("title / page count", entry))
    }

    fn list_pages(&self, entry: &str, page_count: usize) -> Result<Vec<String>, ExtractError> {
        Ok(page_urls(entry, page_count))
    }

    fn resolve_asset_location(&self, page: &str) -> Result<String, ExtractError> {
        let html = self.fetcher.fetch_html(page)?;
        parse_image_url(&html).ok_or_else(|| ExtractError::missing("image script", page))
    }

    fn file_extension_for(&self, asset: &str) -> String {
        url_path_extension(asset).unwrap_or_else(|| ".jpg".to_string())
    }

    fn build_job(&self, destination: PathBuf, asset: String) -> Job {
        Job::fetch(destination, asset)
    }
}
