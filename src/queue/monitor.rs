//! 静默期监视
//!
//! 成批上传的文件到达间隔很短，监视任务盯住最近到达时刻，等到队列
//! 静默足够久才放行下载循环，避免下载和上传穿插进行

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::DownloadQueue;

impl DownloadQueue {
    /// 监视循环
    ///
    /// 每 check_interval 秒检查一次：每次检查都重新抽取一个
    /// [min, max] 内的随机静默阈值，再与距最近到达的时间比较。
    /// 阈值逐次重抽而非开局定死，等待时长因此被随机平滑
    ///
    /// 退出条件（退出前都会在锁内清掉自己的句柄）：
    /// - 队列在等待期间被清空
    /// - 触发了一次下载且收尾后队列为空
    /// - 收到关闭信号
    pub(crate) async fn run_monitor(&self) {
        debug!("静默期监视任务启动");
        let config = &self.inner.config;

        loop {
            // 等待静默期
            loop {
                if self.inner.shutdown.is_cancelled() {
                    self.inner.state.lock().clear_monitor();
                    debug!("收到关闭信号，监视任务退出");
                    return;
                }

                let elapsed = {
                    let mut state = self.inner.state.lock();
                    if state.is_empty() {
                        state.clear_monitor();
                        debug!("队列已空，监视任务退出");
                        return;
                    }
                    state.elapsed_since_last_arrival()
                };

                let threshold = Duration::from_secs(rand::thread_rng().gen_range(
                    config.min_wait_after_last_file..=config.max_wait_after_last_file,
                ));

                if matches!(elapsed, Some(elapsed) if elapsed >= threshold) {
                    debug!("静默期已满（阈值 {:?}），开始下载", threshold);
                    break;
                }

                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(config.check_interval)) => {}
                    _ = self.inner.shutdown.cancelled() => {
                        self.inner.state.lock().clear_monitor();
                        debug!("收到关闭信号，监视任务退出");
                        return;
                    }
                }
            }

            self.drain().await;

            // 下载收尾和新文件到达之间存在窗口：锁内复查队列，发现
            // 新文件则继续守望，否则这里就是监视任务的终点
            {
                let mut state = self.inner.state.lock();
                if state.is_empty() {
                    state.clear_monitor();
                    debug!("本批文件处理完毕，监视任务退出");
                    return;
                }
                debug!("下载期间有新文件到达，继续监视");
            }
        }
    }
}
