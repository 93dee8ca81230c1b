//! 流水线编排。
//!
//! 阶段严格按顺序推进：
//! 1. 列出章节并全部放入章节队列
//! 2. 启动解析线程池与下载线程池
//! 3. 章节队列 drain -> 发送 P 个停止信号 -> join 解析线程
//! 4. 任务队列 drain -> 发送 C 个停止信号 -> join 下载线程
//!
//! 第 3 步必须 join 之后才能开始第 4 步：章节队列排空只说明每个章节都被取走了，
//! 仍在处理中的解析线程可能还在往任务队列里放任务。

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::consumer::{ConsumerStats, run_consumer};
use super::job::{Job, Transfer};
use super::producer::{ProducerContext, ProducerStats, run_producer};
use super::work_queue::{QueueError, WorkQueue};
use crate::site::SiteAdapter;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline options: {0}")]
    InvalidOptions(String),
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        role: &'static str,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub producer_workers: usize,
    pub consumer_workers: usize,
    pub job_queue_capacity: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            producer_workers: 5,
            consumer_workers: 18,
            job_queue_capacity: 200,
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.producer_workers == 0 {
            return Err(PipelineError::InvalidOptions(
                "producer_workers must be positive".to_string(),
            ));
        }
        if self.consumer_workers == 0 {
            return Err(PipelineError::InvalidOptions(
                "consumer_workers must be positive".to_string(),
            ));
        }
        if self.job_queue_capacity == 0 {
            return Err(PipelineError::InvalidOptions(
                "job_queue_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub entries: usize,
    pub failed_entries: usize,
    pub jobs_created: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
}

pub struct Coordinator {
    adapter: Arc<dyn SiteAdapter>,
    transfer: Arc<dyn Transfer>,
    options: PipelineOptions,
}

impl Coordinator {
    /// 配置非法时直接失败，不会启动任何线程。
    pub fn new(
        adapter: Arc<dyn SiteAdapter>,
        transfer: Arc<dyn Transfer>,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        options.validate()?;
        Ok(Self {
            adapter,
            transfer,
            options,
        })
    }

    pub fn process(&self, root: &str, save_root: &Path) -> Result<RunReport, PipelineError> {
        let entries = match self.adapter.list_entries(root) {
            Ok(entries) if !entries.is_empty() => entries,
            Ok(_) => {
                warn!("章节列表为空: {}", root);
                return Ok(RunReport::default());
            }
            Err(e) => {
                error!("获取章节列表失败: {} ({})", root, e);
                return Ok(RunReport::default());
            }
        };
        info!("[{}] 共 {} 个章节", self.adapter.name(), entries.len());

        let job_queue = Arc::new(WorkQueue::<Job>::new(self.options.job_queue_capacity)?);
        let entry_queue = Arc::new(WorkQueue::<String>::new(entries.len())?);
        for entry in entries {
            entry_queue.put(entry)?;
        }
        debug!(
            "章节队列 {}/{}，任务队列容量 {}",
            entry_queue.len(),
            entry_queue.capacity(),
            job_queue.capacity()
        );

        let mut producers = Vec::with_capacity(self.options.producer_workers);
        let mut consumers = Vec::with_capacity(self.options.consumer_workers);
        let spawned = spawn_pool("producer", self.options.producer_workers, &mut producers, || {
            let ctx = ProducerContext {
                adapter: Arc::clone(&self.adapter),
                entries: Arc::clone(&entry_queue),
                jobs: Arc::clone(&job_queue),
                save_root: save_root.to_path_buf(),
            };
            move || run_producer(ctx)
        })
        .and_then(|_| {
            spawn_pool("consumer", self.options.consumer_workers, &mut consumers, || {
                let jobs = Arc::clone(&job_queue);
                let transfer = Arc::clone(&self.transfer);
                move || run_consumer(jobs, transfer)
            })
        });

        if let Err(e) = spawned {
            // 已启动的线程通过关闭队列唤醒并退出
            error!("启动工作线程失败: {}", e);
            entry_queue.close();
            job_queue.close();
            join_all("producer", producers);
            join_all("consumer", consumers);
            return Err(e);
        }

        entry_queue.drain()?;
        for _ in 0..self.options.producer_workers {
            entry_queue.put_stop()?;
        }
        let producer_stats = join_all("producer", producers);
        if job_queue.is_empty() {
            info!("章节解析完成，等待 {} 个进行中的下载", job_queue.outstanding());
        } else {
            info!(
                "章节解析完成，剩余下载任务 {} (排队 {})",
                job_queue.outstanding(),
                job_queue.len()
            );
        }

        job_queue.drain()?;
        for _ in 0..self.options.consumer_workers {
            job_queue.put_stop()?;
        }
        let consumer_stats = join_all("consumer", consumers);

        let report = summarize(&producer_stats, &consumer_stats);
        info!(
            "全部任务完成: 章节 {} (失败 {}), 任务 {}, 成功 {}, 失败 {}",
            report.entries,
            report.failed_entries,
            report.jobs_created,
            report.jobs_succeeded,
            report.jobs_failed
        );
        Ok(report)
    }
}

fn spawn_pool<S, F>(
    role: &'static str,
    count: usize,
    handles: &mut Vec<JoinHandle<S>>,
    mut make: impl FnMut() -> F,
) -> Result<(), PipelineError>
where
    F: FnOnce() -> S + Send + 'static,
    S: Send + 'static,
{
    for i in 0..count {
        let handle = thread::Builder::new()
            .name(format!("{role}-{i}"))
            .spawn(make())
            .map_err(|source| PipelineError::Spawn { role, source })?;
        handles.push(handle);
    }
    Ok(())
}

fn join_all<S: Default>(role: &str, handles: Vec<JoinHandle<S>>) -> Vec<S> {
    handles
        .into_iter()
        .map(|h| {
            h.join().unwrap_or_else(|_| {
                error!("{} 线程异常退出", role);
                S::default()
            })
        })
        .collect()
}

fn summarize(producers: &[ProducerStats], consumers: &[ConsumerStats]) -> RunReport {
    let mut report = RunReport::default();
    for p in producers {
        report.entries += p.entries;
        report.failed_entries += p.failed_entries;
        report.jobs_created += p.jobs;
    }
    for c in consumers {
        report.jobs_succeeded += c.succeeded;
        report.jobs_failed += c.failed;
    }
    report
}
