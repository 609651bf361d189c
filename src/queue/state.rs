use std::collections::VecDeque;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::types::PendingFile;

/// 队列核心状态（进程内唯一）
///
/// 持有待下载队列、单飞标志、最近到达时刻与静默期监视任务句柄。
/// 所有字段只能在外层互斥锁内访问；到达事件与下载循环会并发触碰这里
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    /// 待下载文件，队尾入队、队头出队
    pending: VecDeque<PendingFile>,
    /// 是否有下载循环正在执行
    draining: bool,
    /// 最近一次文件到达时刻
    last_arrival: Option<Instant>,
    /// 静默期监视任务句柄，至多存在一个
    monitor: Option<JoinHandle<()>>,
}

impl QueueState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 新文件到达：追加到队尾并刷新到达时刻
    pub(crate) fn push_arrival(&mut self, file: PendingFile) {
        self.pending.push_back(file);
        self.last_arrival = Some(Instant::now());
    }

    /// 重试入队：只追加到队尾，不刷新到达时刻
    pub(crate) fn push_retry(&mut self, file: PendingFile) {
        self.pending.push_back(file);
    }

    pub(crate) fn pop_front(&mut self) -> Option<PendingFile> {
        self.pending.pop_front()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// 距最近一次到达经过的时间；队列从未收到过文件时为 None
    pub(crate) fn elapsed_since_last_arrival(&self) -> Option<Duration> {
        self.last_arrival.map(|at| at.elapsed())
    }

    /// 尝试占用下载循环的单飞标志，已有循环在跑则返回 false
    pub(crate) fn try_begin_drain(&mut self) -> bool {
        if self.draining {
            return false;
        }
        self.draining = true;
        true
    }

    pub(crate) fn end_drain(&mut self) {
        self.draining = false;
    }

    pub(crate) fn is_draining(&self) -> bool {
        self.draining
    }

    /// 监视任务是否存活
    pub(crate) fn monitor_active(&self) -> bool {
        self.monitor.as_ref().map_or(false, |handle| !handle.is_finished())
    }

    pub(crate) fn set_monitor(&mut self, handle: JoinHandle<()>) {
        self.monitor = Some(handle);
    }

    pub(crate) fn clear_monitor(&mut self) {
        self.monitor = None;
    }

    /// 取出监视任务句柄（关闭时等待其退出）
    pub(crate) fn take_monitor(&mut self) -> Option<JoinHandle<()>> {
        self.monitor.take()
    }
}
