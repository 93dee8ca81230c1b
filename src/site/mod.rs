//! 站点适配层：把具体站点的页面结构与下载流水线隔离开。
//!
//! 流水线只依赖 `SiteAdapter`；每个站点一个实现，启动时按配置选择。

pub mod kuku;
pub mod manhuagui;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::network_parser::{FetchError, HttpFetcher};
use crate::pipeline::job::Job;

pub use kuku::KukuAdapter;
pub use manhuagui::ManhuaguiAdapter;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{what} not found in {url}")]
    Missing { what: &'static str, url: String },
}

impl ExtractError {
    pub(crate) fn missing(what: &'static str, url: &str) -> Self {
        Self::Missing {
            what,
            url: url.to_string(),
        }
    }
}

/// 章节内的一页：序号决定输出文件名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub location: String,
}

/// 章节的显示名与页数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub page_count: usize,
}

/// 站点能力集合。实现不得持有跨调用的可变状态，会被多个解析线程并发调用。
pub trait SiteAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// 目录页 -> 有序章节地址列表。
    fn list_entries(&self, root: &str) -> Result<Vec<String>, ExtractError>;

    fn describe_entry(&self, entry: &str) -> Result<EntryInfo, ExtractError>;

    /// 返回顺序即文件序号顺序。
    fn list_pages(&self, entry: &str, page_count: usize) -> Result<Vec<String>, ExtractError>;

    fn resolve_asset_location(&self, page: &str) -> Result<String, ExtractError>;

    /// 含 `.`，例如 `.jpg`。
    fn file_extension_for(&self, asset: &str) -> String;

    fn build_job(&self, destination: PathBuf, asset: String) -> Job;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Kuku,
    Manhuagui,
}

impl FromStr for Site {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kuku" | "kukudm" => Ok(Site::Kuku),
            "manhuagui" => Ok(Site::Manhuagui),
            other => Err(format!("unknown site: {other} (expected kuku or manhuagui)")),
        }
    }
}

impl Site {
    pub fn adapter(self, fetcher: HttpFetcher) -> Arc<dyn SiteAdapter> {
        match self {
            Site::Kuku => Arc::new(KukuAdapter::new(fetcher)),
            Site::Manhuagui => Arc::new(ManhuaguiAdapter::new(fetcher)),
        }
    }
}

/// 取 URL 路径部分的扩展名（含 `.`），忽略查询串与锚点。
pub(crate) fn url_path_extension(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_owned(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_owned(),
    };
    let file = path.rsplit('/').next().unwrap_or(&path);
    Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
}

/// 按基准地址解析相对链接。
pub(crate) fn join_url(base: &str, href: &str) -> String {
    url::Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_names_parse() {
        assert_eq!("kuku".parse::<Site>().unwrap(), Site::Kuku);
        assert_eq!(" ManHuaGui ".parse::<Site>().unwrap(), Site::Manhuagui);
        assert!("hanhan".parse::<Site>().is_err());
    }

    #[test]
    fn extension_ignores_query_and_fragment() {
        assert_eq!(
            url_path_extension("http://n5.1whour.com/newkuku/2016/01.jpg").as_deref(),
            Some(".jpg")
        );
        assert_eq!(
            url_path_extension("https://i.hamreus.com/a/01.jpg.webp?cid=1#x").as_deref(),
            Some(".webp")
        );
        assert_eq!(url_path_extension("http://host/dir/"), None);
        assert_eq!(url_path_extension("http://host.com"), None);
        assert_eq!(url_path_extension("http://host.com?f=a.png"), None);
        assert_eq!(url_path_extension("images/02.png?v=3").as_deref(), Some(".png"));
    }

    #[test]
    fn relative_links_are_joined() {
        assert_eq!(
            join_url("https://www.manhuagui.com/comic/14857/", "/comic/14857/214050.html"),
            "https://www.manhuagui.com/comic/14857/214050.html"
        );
        assert_eq!(join_url("not a url", "/x"), "/x");
    }
}
