//! 去抖下载队列
//!
//! 群文件上传往往成批出现，这里先把文件收进队列，等一段静默期确认
//! 这一批上传结束后，再由单飞的下载循环逐个拉取

pub mod retry;
pub mod types;

mod dispatcher;
mod monitor;
mod state;
mod worker;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::fetcher::Fetcher;

pub use retry::{RetryLedger, RetryPolicy};
pub use types::{AttemptOutcome, PendingFile, SubmitOutcome};

use state::QueueState;

/// 队列运行参数（由配置提炼，启动后不变）
///
/// 所有等待区间均为闭区间秒数，配置加载时已校验 min <= max
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// 最后一个文件到达后的最小静默时间（秒）
    pub min_wait_after_last_file: u64,
    /// 最后一个文件到达后的最大静默时间（秒）
    pub max_wait_after_last_file: u64,
    /// 每个文件下载前的最小等待时间（秒）
    pub min_wait_before_download: u64,
    /// 每个文件下载前的最大等待时间（秒）
    pub max_wait_before_download: u64,
    /// 静默期检查间隔（秒）
    pub check_interval: u64,
    /// 重试策略
    pub retry: RetryPolicy,
    /// 群号黑名单
    pub group_blacklist: HashSet<i64>,
}

/// 队列当前状况（供状态接口展示）
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    /// 等待下载的文件数
    pub pending: usize,
    /// 是否有下载循环在执行
    pub draining: bool,
    /// 仍在重试中的文件数
    pub retrying: usize,
}

struct QueueInner {
    /// 队列核心状态，所有变更都在这把锁内完成
    state: Mutex<QueueState>,
    /// 重试账本（只在下载循环内访问）
    retry: Mutex<RetryLedger>,
    /// 下载执行器
    fetcher: Arc<dyn Fetcher>,
    /// 运行参数
    config: QueueConfig,
    /// 关闭信号
    shutdown: CancellationToken,
}

/// 下载队列
///
/// 克隆代价低廉，内部状态共享
#[derive(Clone)]
pub struct DownloadQueue {
    inner: Arc<QueueInner>,
}

impl DownloadQueue {
    pub fn new(config: QueueConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::new()),
                retry: Mutex::new(RetryLedger::new()),
                fetcher,
                config,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state.lock();
        QueueStats {
            pending: state.len(),
            draining: state.is_draining(),
            retrying: self.inner.retry.lock().len(),
        }
    }

    /// 发出关闭信号并等待监视任务退出
    ///
    /// 正在下载的文件会下载完当前这一个，之后不再开始新的下载
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let handle = self.inner.state.lock().take_monitor();
        if let Some(handle) = handle {
            info!("等待下载队列收尾...");
            let _ = handle.await;
        }
        info!("下载队列已关闭");
    }
}
