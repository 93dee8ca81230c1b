//! 有界工作队列：阻塞 put/get + 未完成计数 + drain 屏障。
//!
//! 队列元素由 `crossbeam_channel::bounded` 承载，容量即背压上限；
//! 未完成计数单独由 `Mutex + Condvar` 维护：`put` 时 +1，消费者处理完调用
//! `mark_done` 时 -1，`drain` 阻塞到计数归零。停止信号不计入未完成计数。

use std::sync::{Condvar, Mutex, MutexGuard};

use crossbeam_channel::{self as channel, Receiver, Sender};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue capacity must be positive")]
    ZeroCapacity,
    #[error("queue has been closed")]
    Closed,
    #[error("mark_done called more times than items were put")]
    DoneUnderflow,
}

/// 出队结果：真实任务或停止信号，按结构区分而不是按值比较。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueItem<T> {
    Work(T),
    Stop,
}

#[derive(Debug, Default)]
struct State {
    outstanding: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct WorkQueue<T> {
    tx: Sender<QueueItem<T>>,
    rx: Receiver<QueueItem<T>>,
    capacity: usize,
    state: Mutex<State>,
    all_done: Condvar,
    // 关闭时丢弃发送端，阻塞中的 put/get 通过 select 立刻醒来
    close_tx: Mutex<Option<Sender<()>>>,
    close_rx: Receiver<()>,
}

impl<T> WorkQueue<T> {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        let (tx, rx) = channel::bounded(capacity);
        let (close_tx, close_rx) = channel::bounded(0);
        Ok(Self {
            tx,
            rx,
            capacity,
            state: Mutex::new(State::default()),
            all_done: Condvar::new(),
            close_tx: Mutex::new(Some(close_tx)),
            close_rx,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 当前在队列中排队（尚未被取走）的元素数。
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// 已 put 但尚未 `mark_done` 的任务数。
    pub fn outstanding(&self) -> usize {
        self.lock_state().outstanding
    }

    /// 入队一个任务；队列满时阻塞。
    pub fn put(&self, item: T) -> Result<(), QueueError> {
        {
            let mut state = self.lock_state();
            if state.closed {
                return Err(QueueError::Closed);
            }
            // 先计数再入队：drain 不会在 put 进行中误判为已清空
            state.outstanding += 1;
        }

        if self.send(QueueItem::Work(item)).is_err() {
            let mut state = self.lock_state();
            state.outstanding -= 1;
            if state.outstanding == 0 {
                self.all_done.notify_all();
            }
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    /// 入队一个停止信号；每个信号恰好让一个工作线程退出。
    pub fn put_stop(&self) -> Result<(), QueueError> {
        if self.lock_state().closed {
            return Err(QueueError::Closed);
        }
        self.send(QueueItem::Stop)
    }

    /// 出队；队列空时阻塞。不改变未完成计数。
    pub fn get(&self) -> Result<QueueItem<T>, QueueError> {
        channel::select! {
            recv(self.rx) -> item => item.map_err(|_| QueueError::Closed),
            recv(self.close_rx) -> _ => Err(QueueError::Closed),
        }
    }

    /// 消费者处理完一个任务（无论成败）后调用。
    pub fn mark_done(&self) -> Result<(), QueueError> {
        let mut state = self.lock_state();
        if state.outstanding == 0 {
            return Err(QueueError::DoneUnderflow);
        }
        state.outstanding -= 1;
        if state.outstanding == 0 {
            self.all_done.notify_all();
        }
        Ok(())
    }

    /// 阻塞直到未完成计数归零。
    pub fn drain(&self) -> Result<(), QueueError> {
        let mut state = self.lock_state();
        while state.outstanding > 0 && !state.closed {
            state = self
                .all_done
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        if state.outstanding > 0 {
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    /// 永久关闭：唤醒所有阻塞中的 put/get/drain。正常流程不会用到。
    pub fn close(&self) {
        {
            let mut state = self.lock_state();
            state.closed = true;
            self.all_done.notify_all();
        }
        if let Ok(mut close_tx) = self.close_tx.lock() {
            close_tx.take();
        }
    }

    fn send(&self, item: QueueItem<T>) -> Result<(), QueueError> {
        channel::select! {
            send(self.tx, item) -> res => res.map_err(|_| QueueError::Closed),
            recv(self.close_rx) -> _ => Err(QueueError::Closed),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        // 计数只做加减，poison 后内容仍然可信
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            WorkQueue::<u32>::new(0).unwrap_err(),
            QueueError::ZeroCapacity
        );
    }

    #[test]
    fn fifo_order_and_outstanding_count() {
        let q = WorkQueue::new(4).unwrap();
        q.put(1).unwrap();
        q.put(2).unwrap();
        q.put(3).unwrap();
        assert_eq!(q.len(), 3);
        assert_eq!(q.outstanding(), 3);

        assert_eq!(q.get().unwrap(), QueueItem::Work(1));
        assert_eq!(q.get().unwrap(), QueueItem::Work(2));
        // get 不改变未完成计数
        assert_eq!(q.outstanding(), 3);

        q.mark_done().unwrap();
        assert_eq!(q.outstanding(), 2);
        assert_eq!(q.get().unwrap(), QueueItem::Work(3));
    }

    #[test]
    fn mark_done_never_goes_negative() {
        let q = WorkQueue::new(1).unwrap();
        assert_eq!(q.mark_done().unwrap_err(), QueueError::DoneUnderflow);
        q.put("a").unwrap();
        q.mark_done().unwrap();
        assert_eq!(q.mark_done().unwrap_err(), QueueError::DoneUnderflow);
        assert_eq!(q.outstanding(), 0);
    }

    #[test]
    fn drain_on_empty_queue_returns_immediately() {
        let q = WorkQueue::<u8>::new(2).unwrap();
        q.drain().unwrap();
    }

    #[test]
    fn stop_signal_is_not_counted() {
        let q = WorkQueue::<u8>::new(2).unwrap();
        q.put_stop().unwrap();
        assert_eq!(q.outstanding(), 0);
        assert_eq!(q.get().unwrap(), QueueItem::Stop);
        q.drain().unwrap();
    }

    #[test]
    fn put_blocks_while_full_until_get() {
        let q = Arc::new(WorkQueue::new(2).unwrap());
        q.put(1).unwrap();
        q.put(2).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let handle = {
            let q = Arc::clone(&q);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                q.put(3).unwrap();
                done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(100));
        assert!(!done.load(Ordering::SeqCst));
        assert!(q.len() <= q.capacity());

        assert_eq!(q.get().unwrap(), QueueItem::Work(1));
        handle.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn drain_waits_for_every_mark_done() {
        let q = Arc::new(WorkQueue::new(8).unwrap());
        for i in 0..5 {
            q.put(i).unwrap();
        }

        let processed = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::new();
        for _ in 0..3 {
            let q = Arc::clone(&q);
            let processed = Arc::clone(&processed);
            workers.push(thread::spawn(move || {
                while let Ok(QueueItem::Work(_)) = q.get() {
                    thread::sleep(Duration::from_millis(20));
                    processed.fetch_add(1, Ordering::SeqCst);
                    q.mark_done().unwrap();
                }
            }));
        }

        q.drain().unwrap();
        assert_eq!(processed.load(Ordering::SeqCst), 5);
        assert_eq!(q.outstanding(), 0);

        for _ in 0..3 {
            q.put_stop().unwrap();
        }
        for w in workers {
            w.join().unwrap();
        }
    }

    #[test]
    fn each_worker_observes_exactly_one_stop() {
        let q = Arc::new(WorkQueue::<u32>::new(4).unwrap());
        let stops = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::new();
        for _ in 0..4 {
            let q = Arc::clone(&q);
            let stops = Arc::clone(&stops);
            workers.push(thread::spawn(move || {
                loop {
                    match q.get() {
                        Ok(QueueItem::Work(_)) => {
                            let _ = q.mark_done();
                        }
                        Ok(QueueItem::Stop) => {
                            stops.fetch_add(1, Ordering::SeqCst);
                            break;
                        }
                        Err(_) => break,
                    }
                }
            }));
        }

        for _ in 0..4 {
            q.put_stop().unwrap();
        }
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(stops.load(Ordering::SeqCst), 4);
        assert!(q.is_empty());
    }

    #[test]
    fn close_wakes_blocked_calls() {
        let q = Arc::new(WorkQueue::<u32>::new(1).unwrap());
        q.put(1).unwrap();

        let blocked_put = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.put(2))
        };
        let blocked_drain = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.drain())
        };

        thread::sleep(Duration::from_millis(50));
        q.close();

        assert_eq!(blocked_put.join().unwrap(), Err(QueueError::Closed));
        assert_eq!(blocked_drain.join().unwrap(), Err(QueueError::Closed));
        assert_eq!(q.put(3), Err(QueueError::Closed));
        assert_eq!(q.outstanding(), 1);
    }
}
