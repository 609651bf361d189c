//! 下载循环
//!
//! 单飞执行：同一时刻至多一个循环在跑。循环逐个弹出队头文件，
//! 随机等待后交给下载执行器，失败按重试策略折算，重试文件回到队尾

use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, error, info};

use super::types::{AttemptOutcome, PendingFile};
use super::QueueInner;
use crate::fetcher::FetchError;

/// 单飞标志守卫
///
/// 下载循环无论以何种方式退出（包括 panic 展开），标志都会被放回
struct DrainGuard<'a> {
    inner: &'a QueueInner,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.inner.state.lock().end_drain();
    }
}

impl super::DownloadQueue {
    /// 排空队列
    ///
    /// 已有循环在执行或已收到关闭信号时直接返回。单个文件的失败
    /// 不会中断循环，循环只在队列清空（或关闭）时结束
    pub(crate) async fn drain(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }

        if !self.inner.state.lock().try_begin_drain() {
            debug!("已有下载循环在执行，本次触发忽略");
            return;
        }
        let _guard = DrainGuard {
            inner: &*self.inner,
        };

        let config = &self.inner.config;
        loop {
            let Some(file) = self.inner.state.lock().pop_front() else {
                break;
            };

            // 每个文件都重新抽取一次下载前等待
            let wait = rand::thread_rng().gen_range(
                config.min_wait_before_download..=config.max_wait_before_download,
            );
            info!("等待{}秒后开始下载: {}", wait, file.file_name);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(wait)) => {}
                _ = self.inner.shutdown.cancelled() => {
                    info!("收到关闭信号，下载循环停止");
                    return;
                }
            }

            let result = self.inner.fetcher.fetch(&file).await;
            self.settle_attempt(&file, result);

            if self.inner.shutdown.is_cancelled() {
                info!("收到关闭信号，下载循环停止");
                return;
            }
        }
    }

    /// 把单次下载结果折算进重试账本，需要重试时放回队尾
    fn settle_attempt(&self, file: &PendingFile, result: Result<PathBuf, FetchError>) {
        let success = match &result {
            Ok(path) => {
                info!("文件下载成功: {} -> {:?}", file.file_name, path);
                true
            }
            Err(e) => {
                error!("文件下载失败: {} ({})", file.file_name, e);
                false
            }
        };

        let outcome = self
            .inner
            .retry
            .lock()
            .assess(&file.key(), success, self.inner.config.retry);

        match outcome {
            AttemptOutcome::Success => {}
            AttemptOutcome::RetryableFailure(count) => {
                info!("准备重试下载文件 {}，第{}次重试", file.file_name, count);
                self.inner.state.lock().push_retry(file.clone());
            }
            AttemptOutcome::PermanentFailure(count) => {
                if self.inner.config.retry.enabled {
                    error!(
                        "文件 {} 已失败 {} 次，达到最大重试次数，不再重试",
                        file.file_name, count
                    );
                } else {
                    error!("文件 {} 下载失败且未开启重试，放弃", file.file_name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::Fetcher;
    use crate::queue::{DownloadQueue, QueueConfig, RetryPolicy};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::collections::HashSet;
    use std::sync::Arc;

    /// 按脚本决定成败的下载器：key 先失败指定次数，之后成功
    struct ScriptedFetcher {
        fail_remaining: Mutex<HashMap<String, u32>>,
        attempts: Mutex<Vec<String>>,
        /// 每次下载前的真实等待，用于制造并发窗口
        delay: Duration,
    }

    impl ScriptedFetcher {
        fn new(failures: &[(&str, u32)]) -> Arc<Self> {
            Self::with_delay(failures, Duration::ZERO)
        }

        fn with_delay(failures: &[(&str, u32)], delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                fail_remaining: Mutex::new(
                    failures
                        .iter()
                        .map(|(k, n)| (k.to_string(), *n))
                        .collect(),
                ),
                attempts: Mutex::new(Vec::new()),
                delay,
            })
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().clone()
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, file: &PendingFile) -> Result<PathBuf, FetchError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let key = file.key();
            self.attempts.lock().push(key.clone());

            let mut remaining = self.fail_remaining.lock();
            match remaining.get_mut(&key) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    Err(FetchError::Transfer("连接被重置".to_string()))
                }
                _ => Ok(PathBuf::from(&file.file_name)),
            }
        }
    }

    fn config(retry: RetryPolicy) -> QueueConfig {
        QueueConfig {
            min_wait_after_last_file: 15,
            max_wait_after_last_file: 30,
            min_wait_before_download: 0,
            max_wait_before_download: 0,
            check_interval: 60,
            retry,
            group_blacklist: HashSet::new(),
        }
    }

    const RETRY_2: RetryPolicy = RetryPolicy {
        enabled: true,
        max_retries: 2,
    };
    const NO_RETRY: RetryPolicy = RetryPolicy {
        enabled: false,
        max_retries: 0,
    };

    fn file(id: &str) -> PendingFile {
        PendingFile::new(100, id.to_string(), format!("{}.zip", id), 0, 102)
    }

    /// 绕过监视任务，直接往队列里塞文件
    fn push(queue: &DownloadQueue, f: PendingFile) {
        queue.inner.state.lock().push_arrival(f);
    }

    #[tokio::test]
    async fn test_drain_processes_in_fifo_order() {
        let fetcher = ScriptedFetcher::new(&[]);
        let queue = DownloadQueue::new(config(NO_RETRY), fetcher.clone());

        push(&queue, file("f1"));
        push(&queue, file("f2"));
        push(&queue, file("f3"));
        queue.drain().await;

        assert_eq!(fetcher.attempts(), vec!["100_f1", "100_f2", "100_f3"]);
        assert!(queue.inner.state.lock().is_empty());
        assert!(!queue.inner.state.lock().is_draining());
    }

    #[tokio::test]
    async fn test_failed_item_retried_after_pending_items() {
        // f1 失败一次：重试排在 f2 之后
        let fetcher = ScriptedFetcher::new(&[("100_f1", 1)]);
        let queue = DownloadQueue::new(config(RETRY_2), fetcher.clone());

        push(&queue, file("f1"));
        push(&queue, file("f2"));
        queue.drain().await;

        assert_eq!(fetcher.attempts(), vec!["100_f1", "100_f2", "100_f1"]);
        // 最终成功，账本应当干净
        assert!(queue.inner.retry.lock().is_empty());
    }

    #[tokio::test]
    async fn test_retry_cap_then_permanent_drop() {
        // 一直失败：1 次首发 + 2 次重试 = 3 次尝试，之后彻底消失
        let fetcher = ScriptedFetcher::new(&[("100_f1", u32::MAX)]);
        let queue = DownloadQueue::new(config(RETRY_2), fetcher.clone());

        push(&queue, file("f1"));
        queue.drain().await;

        assert_eq!(fetcher.attempts().len(), 3);
        assert!(queue.inner.state.lock().is_empty());
        assert!(queue.inner.retry.lock().is_empty());
    }

    #[tokio::test]
    async fn test_retry_disabled_single_attempt() {
        let fetcher = ScriptedFetcher::new(&[("100_f1", u32::MAX)]);
        let queue = DownloadQueue::new(config(NO_RETRY), fetcher.clone());

        push(&queue, file("f1"));
        push(&queue, file("f2"));
        queue.drain().await;

        assert_eq!(fetcher.attempts(), vec!["100_f1", "100_f2"]);
        assert!(queue.inner.retry.lock().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drain_is_single_flight() {
        let fetcher = ScriptedFetcher::with_delay(&[], Duration::from_millis(20));
        let queue = DownloadQueue::new(config(NO_RETRY), fetcher.clone());

        push(&queue, file("f1"));
        push(&queue, file("f2"));

        // 两个并发触发，只有一个循环真正执行
        let q1 = queue.clone();
        let q2 = queue.clone();
        tokio::join!(q1.drain(), q2.drain());

        let attempts = fetcher.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts, vec!["100_f1", "100_f2"]);
    }

    #[tokio::test]
    async fn test_success_after_failure_is_fresh_round() {
        let fetcher = ScriptedFetcher::new(&[("100_f1", 1)]);
        let queue = DownloadQueue::new(config(RETRY_2), fetcher.clone());

        push(&queue, file("f1"));
        queue.drain().await;
        assert!(queue.inner.retry.lock().is_empty());

        // 成功之后同名文件再次上传，重新从零计数
        push(&queue, file("f1"));
        queue.drain().await;
        assert_eq!(fetcher.attempts().len(), 3);
        assert!(queue.inner.retry.lock().is_empty());
    }

    #[tokio::test]
    async fn test_no_drain_after_shutdown() {
        let fetcher = ScriptedFetcher::new(&[]);
        let queue = DownloadQueue::new(config(NO_RETRY), fetcher.clone());

        push(&queue, file("f1"));
        queue.shutdown().await;
        queue.drain().await;

        assert!(fetcher.attempts().is_empty());
        // 队列内容原样保留（进程退出后不落盘，属预期行为）
        assert_eq!(queue.inner.state.lock().len(), 1);
    }
}
