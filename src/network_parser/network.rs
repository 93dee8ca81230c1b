use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use tracing::{debug, warn};

use super::charset::decode_html;
use super::url_norm::standardize_url;
use crate::base_system::context::DEFAULT_USER_AGENT;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("empty url")]
    EmptyUrl,
    #[error("url is not plain ascii: {0}")]
    Encoding(String),
    #[error("http status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// 阻塞式抓取客户端，可在多个工作线程间共享（`Client` 内部自带连接池）。
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, reqwest::Error> {
        // reqwest 未启用 gzip 解码，要求 identity 以便直接落盘
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or(HeaderValue::from_static("Mozilla/5.0")),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// 获取原始字节。
    ///
    /// URL 含非 ASCII 字符视为编码失败：规范化后再请求一次，不再继续重试。
    pub fn fetch_raw(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(FetchError::EmptyUrl);
        }

        match self.fetch_ascii(url) {
            Err(FetchError::Encoding(_)) => {
                let normalized = standardize_url(url);
                warn!("URL 编码失败，规范化后重试: {} -> {}", url, normalized);
                self.fetch_ascii(&normalized).inspect_err(|e| {
                    warn!("规范化后仍然失败: {} ({})", normalized, e);
                })
            }
            other => other,
        }
    }

    /// 获取页面并按 `charset` 声明解码。
    pub fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let raw = self.fetch_raw(url)?;
        Ok(decode_html(&raw))
    }

    fn fetch_ascii(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        // 查询串交给 reqwest 处理，这里只要求路径部分是 ASCII
        let path_part = url.split(['?', '#']).next().unwrap_or(url);
        if !path_part.is_ascii() {
            return Err(FetchError::Encoding(url.to_string()));
        }

        debug!("GET {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}
