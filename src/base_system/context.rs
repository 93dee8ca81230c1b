//! 全局配置结构（Config）与默认值。
//!
//! 该模块同时提供生成 `config.yml` 的字段元信息。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{ConfigSpec, FieldMeta};
use crate::pipeline::coordinator::PipelineOptions;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/66.0.3359.181 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // 站点配置
    #[serde(default = "default_site")]
    pub site: String,
    #[serde(default)]
    pub root_url: String,

    // 路径配置
    #[serde(default)]
    pub save_path: String,

    // 并发配置
    #[serde(default = "default_producer_workers")]
    pub producer_workers: usize,
    #[serde(default = "default_consumer_workers")]
    pub consumer_workers: usize,
    #[serde(default = "default_job_queue_capacity")]
    pub job_queue_capacity: usize,

    // 网络配置
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // 浏览器渲染配置
    #[serde(default)]
    pub chrome_path: String,
    #[serde(default = "default_render_timeout")]
    pub render_timeout: u64,
    #[serde(default = "default_render_launch_retries")]
    pub render_launch_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: default_site(),
            root_url: String::new(),
            save_path: String::new(),
            producer_workers: default_producer_workers(),
            consumer_workers: default_consumer_workers(),
            job_queue_capacity: default_job_queue_capacity(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            chrome_path: String::new(),
            render_timeout: default_render_timeout(),
            render_launch_retries: default_render_launch_retries(),
        }
    }
}

impl ConfigSpec for Config {
    const FILE_NAME: &'static str = "config.yml";

    fn fields() -> &'static [FieldMeta] {
        static FIELDS: [FieldMeta; 11] = [
            FieldMeta {
                name: "site",
                description: "目标站点, 可选: [kuku, manhuagui]",
            },
            FieldMeta {
                name: "root_url",
                description: "漫画目录页地址（章节列表所在页面）",
            },
            FieldMeta {
                name: "save_path",
                description: "保存路径（留空为 当前目录/comics）",
            },
            FieldMeta {
                name: "producer_workers",
                description: "解析章节的线程数",
            },
            FieldMeta {
                name: "consumer_workers",
                description: "下载图片的线程数",
            },
            FieldMeta {
                name: "job_queue_capacity",
                description: "下载任务队列容量（队列满时解析线程阻塞等待）",
            },
            FieldMeta {
                name: "request_timeout",
                description: "请求超时时间（秒）",
            },
            FieldMeta {
                name: "user_agent",
                description: "请求使用的 User-Agent",
            },
            FieldMeta {
                name: "chrome_path",
                description: "Chrome/Chromium 可执行文件路径（留空自动查找）",
            },
            FieldMeta {
                name: "render_timeout",
                description: "渲染页面时等待图片元素出现的超时时间（秒）",
            },
            FieldMeta {
                name: "render_launch_retries",
                description: "浏览器启动失败时的最大尝试次数",
            },
        ];
        &FIELDS
    }

    fn validate(&self) -> Result<(), String> {
        self.pipeline_options()
            .validate()
            .map_err(|err| err.to_string())
    }
}

impl Config {
    pub fn default_save_dir(&self) -> PathBuf {
        if self.save_path.trim().is_empty() {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join("comics")
        } else {
            PathBuf::from(&self.save_path)
        }
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            producer_workers: self.producer_workers,
            consumer_workers: self.consumer_workers,
            job_queue_capacity: self.job_queue_capacity,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout.max(1))
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout.max(1))
    }

    pub fn chrome_executable(&self) -> Option<PathBuf> {
        let trimmed = self.chrome_path.trim();
        (!trimmed.is_empty()).then(|| PathBuf::from(trimmed))
    }
}

/// 生成可在各平台安全使用的目录/文件名。
pub fn safe_fs_name(name: &str, replacement: &str, max_len: usize) -> String {
    let mut cleaned: String = name
        .trim()
        .chars()
        .map(|ch| match ch {
            ':' => '：',
            '"' => '＂',
            '<' => '《',
            '>' => '》',
            '/' | '\\' => '、',
            '|' => '｜',
            '?' => '？',
            '*' => '＊',
            c if (c as u32) < 32 => replacement.chars().next().unwrap_or('_'),
            _ => ch,
        })
        .collect();

    while cleaned.ends_with(' ') || cleaned.ends_with('.') {
        cleaned.pop();
    }

    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    if RESERVED.contains(&cleaned.to_uppercase().as_str()) {
        cleaned = format!("_{}", cleaned);
    }

    if cleaned.len() > max_len {
        // 避免在多字节 UTF-8 字符（如中文）中间截断导致 panic
        let mut end = max_len;
        while !cleaned.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        cleaned.truncate(end);
        while cleaned.ends_with(' ') || cleaned.ends_with('.') {
            cleaned.pop();
        }
    }

    if cleaned.is_empty() {
        cleaned.push_str("unnamed");
    }

    cleaned
}

fn default_site() -> String {
    "manhuagui".to_string()
}

fn default_producer_workers() -> usize {
    5
}

fn default_consumer_workers() -> usize {
    18
}

fn default_job_queue_capacity() -> usize {
    200
}

fn default_request_timeout() -> u64 {
    15
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_render_timeout() -> u64 {
    60
}

fn default_render_launch_retries() -> u32 {
    5
}
