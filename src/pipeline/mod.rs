//! 抓取-下载流水线。
//!
//! 子模块：
//! - `work_queue`   — 有界阻塞队列（背压 + drain 屏障 + 停止信号）
//! - `job`          — 下载任务及其两种执行方式
//! - `producer`     — 解析线程：章节 -> 页 -> 下载任务
//! - `consumer`     — 下载线程：执行任务
//! - `coordinator`  — 建队列、起线程池、分阶段排空与停机

pub mod consumer;
pub mod coordinator;
pub mod job;
pub mod producer;
pub mod work_queue;

pub use coordinator::Coordinator;
pub use job::NetworkTransfer;
