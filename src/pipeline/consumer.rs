//! 下载线程：从任务队列取任务执行，单个任务的失败不影响循环。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::job::{Job, Transfer};
use super::work_queue::{QueueItem, WorkQueue};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerStats {
    pub succeeded: usize,
    pub failed: usize,
}

pub fn run_consumer(jobs: Arc<WorkQueue<Job>>, transfer: Arc<dyn Transfer>) -> ConsumerStats {
    let mut stats = ConsumerStats::default();
    loop {
        let job = match jobs.get() {
            Ok(QueueItem::Work(job)) => job,
            Ok(QueueItem::Stop) => break,
            Err(e) => {
                warn!("任务队列不可用，下载线程退出: {}", e);
                break;
            }
        };

        debug!(
            "执行任务: {:?} {} -> {}",
            job.kind(),
            job.source(),
            job.destination().display()
        );
        match panic::catch_unwind(AssertUnwindSafe(|| job.execute(transfer.as_ref()))) {
            Ok(Ok(())) => {
                stats.succeeded += 1;
                info!("下载完成: {}", job.label());
            }
            Ok(Err(e)) => {
                stats.failed += 1;
                warn!("下载失败: {} <- {} ({})", job.label(), job.source(), e);
            }
            Err(_) => {
                stats.failed += 1;
                error!("下载时发生 panic: {} <- {}", job.label(), job.source());
            }
        }

        if let Err(e) = jobs.mark_done() {
            error!("任务队列计数异常: {}", e);
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::job::JobError;
    use crate::render::RenderError;
    use std::fs;
    use std::path::{Path, PathBuf};

    /// 源地址含 `fail` 的任务返回错误，含 `panic` 的任务直接 panic。
    struct ScriptedTransfer;

    impl Transfer for ScriptedTransfer {
        fn fetch(&self, source: &str, destination: &Path) -> Result<(), JobError> {
            if source.contains("panic") {
                panic!("scripted panic for {source}");
            }
            if source.contains("fail") {
                return Err(JobError::EmptySource);
            }
            fs::write(destination, source.as_bytes()).map_err(|source| JobError::Io {
                path: destination.to_path_buf(),
                source,
            })
        }

        fn capture(&self, _: &str, _: &Path, element_id: &str) -> Result<(), JobError> {
            Err(RenderError::ElementTimeout {
                element_id: element_id.to_string(),
                timeout: std::time::Duration::ZERO,
            }
            .into())
        }
    }

    #[test]
    fn failures_and_panics_do_not_stop_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(WorkQueue::new(8).unwrap());
        let sources = ["ok-1", "fail-2", "panic-3", "ok-4"];
        for (i, src) in sources.iter().enumerate() {
            let dest: PathBuf = dir.path().join(format!("{i:04}.jpg"));
            queue.put(Job::fetch(dest, src.to_string())).unwrap();
        }
        queue
            .put(Job::capture(dir.path().join("0004.png"), "x".into(), "mangaFile"))
            .unwrap();
        queue.put_stop().unwrap();

        let stats = run_consumer(Arc::clone(&queue), Arc::new(ScriptedTransfer));
        assert_eq!(
            stats,
            ConsumerStats {
                succeeded: 2,
                failed: 3
            }
        );
        assert_eq!(queue.outstanding(), 0);
        assert!(dir.path().join("0000.jpg").exists());
        assert!(!dir.path().join("0001.jpg").exists());
        assert!(dir.path().join("0003.jpg").exists());
    }
}
