//! 解析线程：从章节队列取章节，展开为下载任务放入任务队列。

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::job::Job;
use super::work_queue::{QueueError, QueueItem, WorkQueue};
use crate::base_system::entry_paths::{ensure_entry_dir, page_file_name};
use crate::site::{ExtractError, Page, SiteAdapter};

#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("entry reports no pages")]
    NoPages,
    #[error("create entry dir failed: {0}")]
    CreateDir(#[source] io::Error),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProducerStats {
    pub entries: usize,
    pub failed_entries: usize,
    pub jobs: usize,
}

pub struct ProducerContext {
    pub adapter: Arc<dyn SiteAdapter>,
    pub entries: Arc<WorkQueue<String>>,
    pub jobs: Arc<WorkQueue<Job>>,
    pub save_root: PathBuf,
}

pub fn run_producer(ctx: ProducerContext) -> ProducerStats {
    let mut stats = ProducerStats::default();
    loop {
        let entry = match ctx.entries.get() {
            Ok(QueueItem::Work(entry)) => entry,
            Ok(QueueItem::Stop) => break,
            Err(e) => {
                warn!("章节队列不可用，解析线程退出: {}", e);
                break;
            }
        };

        let mut produced = 0usize;
        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| expand_entry(&ctx, &entry, &mut produced)));
        stats.entries += 1;
        stats.jobs += produced;
        match outcome {
            Ok(Ok(())) => debug!("章节解析完成: {} ({} 个任务)", entry, produced),
            Ok(Err(e)) => {
                stats.failed_entries += 1;
                warn!("章节解析失败: {} ({})", entry, e);
            }
            Err(_) => {
                stats.failed_entries += 1;
                error!("章节解析时发生 panic: {}", entry);
            }
        }

        // 失败的章节同样要标记完成，否则 drain 永远等不到
        if let Err(e) = ctx.entries.mark_done() {
            error!("章节队列计数异常: {}", e);
        }
    }
    stats
}

/// 章节 -> 页列表 -> 每页一个任务。页序号与 `list_pages` 返回顺序一致。
fn expand_entry(ctx: &ProducerContext, entry: &str, produced: &mut usize) -> Result<(), EntryError> {
    let adapter = ctx.adapter.as_ref();

    let info = adapter.describe_entry(entry)?;
    if info.page_count == 0 {
        return Err(EntryError::NoPages);
    }
    let locations = adapter.list_pages(entry, info.page_count)?;
    if locations.is_empty() {
        return Err(EntryError::NoPages);
    }

    info!("开始下载: {} (共 {} 页)", info.name, locations.len());

    let dir = ensure_entry_dir(&ctx.save_root, &info.name).map_err(EntryError::CreateDir)?;

    let pages = locations
        .into_iter()
        .enumerate()
        .map(|(index, location)| Page { index, location });
    for page in pages {
        let asset = match adapter.resolve_asset_location(&page.location) {
            Ok(asset) if !asset.trim().is_empty() => asset,
            Ok(_) => {
                warn!("第 {} 页图片地址为空: {}", page.index, page.location);
                continue;
            }
            Err(e) => {
                warn!("第 {} 页图片地址解析失败: {} ({})", page.index, page.location, e);
                continue;
            }
        };

        let ext = adapter.file_extension_for(&asset);
        let destination = dir.join(page_file_name(page.index, &ext));
        info!("加入下载队列: {}", asset);

        ctx.jobs.put(adapter.build_job(destination, asset))?;
        *produced += 1;
    }
    Ok(())
}
