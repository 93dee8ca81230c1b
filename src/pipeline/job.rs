//! 下载任务：一条任务对应一个目标文件。
//!
//! 两种变体：直接 HTTP 抓取写盘；无头浏览器渲染后截取指定元素。
//! 具体传输由 `Transfer` 实现，任务本身只携带不可变的描述信息。

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::network_parser::{FetchError, HttpFetcher};
use crate::render::{self, CaptureOptions, RenderError, RendererLauncher};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job has no source url")]
    EmptySource,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("write {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    SimpleFetch,
    RenderedCapture { element_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    source: String,
    destination: PathBuf,
    kind: JobKind,
}

impl Job {
    pub fn fetch(destination: PathBuf, source: String) -> Self {
        Self {
            source,
            destination,
            kind: JobKind::SimpleFetch,
        }
    }

    pub fn capture(destination: PathBuf, source: String, element_id: impl Into<String>) -> Self {
        Self {
            source,
            destination,
            kind: JobKind::RenderedCapture {
                element_id: element_id.into(),
            },
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn kind(&self) -> &JobKind {
        &self.kind
    }

    /// `章节目录 -> 文件名`，用于日志。
    pub fn label(&self) -> String {
        let title = self
            .destination
            .parent()
            .and_then(Path::file_name)
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = self
            .destination
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{title} -> {name}")
    }

    pub fn execute(&self, transfer: &dyn Transfer) -> Result<(), JobError> {
        if self.source.trim().is_empty() {
            return Err(JobError::EmptySource);
        }
        match &self.kind {
            JobKind::SimpleFetch => transfer.fetch(&self.source, &self.destination),
            JobKind::RenderedCapture { element_id } => {
                transfer.capture(&self.source, &self.destination, element_id)
            }
        }
    }
}

/// 任务的实际执行方式；消费者线程共享同一个实例。
pub trait Transfer: Send + Sync {
    fn fetch(&self, source: &str, destination: &Path) -> Result<(), JobError>;

    fn capture(&self, source: &str, destination: &Path, element_id: &str)
    -> Result<(), JobError>;
}

pub struct NetworkTransfer {
    fetcher: HttpFetcher,
    launcher: Arc<dyn RendererLauncher>,
    capture: CaptureOptions,
}

impl NetworkTransfer {
    pub fn new(
        fetcher: HttpFetcher,
        launcher: Arc<dyn RendererLauncher>,
        capture: CaptureOptions,
    ) -> Self {
        Self {
            fetcher,
            launcher,
            capture,
        }
    }
}

impl Transfer for NetworkTransfer {
    fn fetch(&self, source: &str, destination: &Path) -> Result<(), JobError> {
        // 抓取失败时不写任何文件
        let bytes = self.fetcher.fetch_raw(source)?;
        fs::write(destination, bytes).map_err(|source| JobError::Io {
            path: destination.to_path_buf(),
            source,
        })
    }

    fn capture(
        &self,
        source: &str,
        destination: &Path,
        element_id: &str,
    ) -> Result<(), JobError> {
        render::capture_element(
            self.launcher.as_ref(),
            &self.capture,
            source,
            element_id,
            destination,
        )?;
        Ok(())
    }
}
