//! 网络抓取：HTTP 请求、字符集识别与 URL 规范化。
//!
//! 子模块：
//! - `network`   — 阻塞式 HTTP 客户端（固定 UA、编码失败时规范化重试一次）
//! - `charset`   — 从响应头部字节嗅探 `charset=` 并宽松解码
//! - `url_norm`  — 对含非 ASCII 的路径段做百分号编码

pub mod charset;
pub mod network;
pub mod url_norm;

pub use network::{FetchError, HttpFetcher};
