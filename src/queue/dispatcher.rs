//! 入队路径：事件校验、黑名单过滤、入队并确保监视任务存在

use tracing::{info, warn};

use super::state::QueueState;
use super::types::{PendingFile, SubmitOutcome};
use super::DownloadQueue;

impl DownloadQueue {
    /// 提交一个新到达的群文件
    ///
    /// 黑名单内的群直接丢弃（`Blocked`，不算错误）；字段不合法的事件
    /// 在入队边界被拒绝。入队成功后刷新最近到达时刻，并在没有监视
    /// 任务存活时拉起一个。判断与拉起都在状态锁内完成，不会出现第二个
    pub fn submit(&self, file: PendingFile) -> SubmitOutcome {
        if let Err(reason) = file.validate() {
            warn!(
                "拒绝不合法的文件事件: {} (群: {}, 文件ID: {:?})",
                reason, file.group_id, file.file_id
            );
            return SubmitOutcome::Invalid(reason);
        }

        if self.inner.config.group_blacklist.contains(&file.group_id) {
            info!("该群号在黑名单内: {}", file.group_id);
            return SubmitOutcome::Blocked;
        }

        info!(
            "检测到新文件: {} (大小: {} bytes) 来自群: {}",
            file.file_name, file.file_size, file.group_id
        );

        let mut state = self.inner.state.lock();
        state.push_arrival(file);
        self.ensure_monitor(&mut state);

        SubmitOutcome::Queued
    }

    /// 监视任务不存在或已结束时拉起一个新的
    ///
    /// 调用方必须持有状态锁
    fn ensure_monitor(&self, state: &mut QueueState) {
        if state.monitor_active() {
            return;
        }
        let queue = self.clone();
        state.set_monitor(tokio::spawn(async move {
            queue.run_monitor().await;
        }));
    }
}
