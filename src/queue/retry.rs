use std::collections::HashMap;

use super::types::AttemptOutcome;

/// 重试策略（来自配置，启动后不再变化）
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 失败后是否重新入队
    pub enabled: bool,
    /// 最大重试次数（不含首次下载）
    pub max_retries: u32,
}

/// 重试账本
///
/// 记录每个文件 key 的连续失败次数：
/// - 成功后记录清除
/// - 失败次数只增不减，直到超过上限被永久丢弃（记录一并删除）
///
/// 仅在单飞的下载循环内访问，无并发要求
#[derive(Debug, Default)]
pub struct RetryLedger {
    counts: HashMap<String, u32>,
}

impl RetryLedger {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    /// 记录一次失败，返回该 key 当前的连续失败次数
    pub fn record_failure(&mut self, key: &str) -> u32 {
        let count = self.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// 清除失败记录（下载成功后调用）
    pub fn clear(&mut self, key: &str) {
        self.counts.remove(key);
    }

    /// 失败次数是否已超过上限
    pub fn is_exhausted(&self, key: &str, max_retries: u32) -> bool {
        self.counts.get(key).map_or(false, |count| *count > max_retries)
    }

    /// 当前仍在重试中的文件数
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// 根据本次下载结果与重试策略折算结论
    ///
    /// 永久失败时记录会被删除：该文件不会再入队，留着记录没有意义。
    /// 未开启重试时失败即永久失败，账本不记账（与重试开启时的语义一致：
    /// 同一个 key 之后再次上传仍是全新的一次下载）
    pub fn assess(&mut self, key: &str, success: bool, policy: RetryPolicy) -> AttemptOutcome {
        if success {
            self.clear(key);
            return AttemptOutcome::Success;
        }

        if !policy.enabled {
            self.counts.remove(key);
            return AttemptOutcome::PermanentFailure(1);
        }

        let count = self.record_failure(key);
        if self.is_exhausted(key, policy.max_retries) {
            self.counts.remove(key);
            AttemptOutcome::PermanentFailure(count)
        } else {
            AttemptOutcome::RetryableFailure(count)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const POLICY: RetryPolicy = RetryPolicy {
        enabled: true,
        max_retries: 2,
    };

    #[test]
    fn test_record_and_clear() {
        let mut ledger = RetryLedger::new();
        assert_eq!(ledger.record_failure("100_f1"), 1);
        assert_eq!(ledger.record_failure("100_f1"), 2);
        assert_eq!(ledger.record_failure("100_f2"), 1);

        ledger.clear("100_f1");
        assert!(!ledger.is_exhausted("100_f1", 0));
        // 再次失败从 1 重新计数
        assert_eq!(ledger.record_failure("100_f1"), 1);
    }

    #[test]
    fn test_retry_cap_total_attempts() {
        // max_retries=2 时总共允许 3 次尝试（1 次首发 + 2 次重试）
        let mut ledger = RetryLedger::new();
        assert_eq!(
            ledger.assess("100_f1", false, POLICY),
            AttemptOutcome::RetryableFailure(1)
        );
        assert_eq!(
            ledger.assess("100_f1", false, POLICY),
            AttemptOutcome::RetryableFailure(2)
        );
        assert_eq!(
            ledger.assess("100_f1", false, POLICY),
            AttemptOutcome::PermanentFailure(3)
        );
        // 永久失败后账本内不残留记录
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_success_clears_record() {
        let mut ledger = RetryLedger::new();
        ledger.assess("100_f1", false, POLICY);
        assert_eq!(ledger.len(), 1);

        assert_eq!(ledger.assess("100_f1", true, POLICY), AttemptOutcome::Success);
        assert!(ledger.is_empty());

        // 成功之后同一个 key 是全新的一轮
        assert_eq!(
            ledger.assess("100_f1", false, POLICY),
            AttemptOutcome::RetryableFailure(1)
        );
    }

    #[test]
    fn test_disabled_policy_drops_immediately() {
        let mut ledger = RetryLedger::new();
        let policy = RetryPolicy {
            enabled: false,
            max_retries: 3,
        };
        assert_eq!(
            ledger.assess("100_f1", false, policy),
            AttemptOutcome::PermanentFailure(1)
        );
        assert!(ledger.is_empty());
    }

    proptest! {
        /// 任意长度的连续失败序列中，可重试结论最多出现 max_retries 次，
        /// 且一旦给出永久失败，账本里不再有该 key
        #[test]
        fn prop_retryable_bounded_by_max(failures in 1usize..32, max_retries in 0u32..6) {
            let policy = RetryPolicy { enabled: true, max_retries };
            let mut ledger = RetryLedger::new();
            let mut retryable = 0u32;
            let mut dropped = false;

            for _ in 0..failures {
                if dropped {
                    // 永久失败后文件不会再入队，也就不会再有后续尝试
                    break;
                }
                match ledger.assess("k", false, policy) {
                    AttemptOutcome::RetryableFailure(_) => retryable += 1,
                    AttemptOutcome::PermanentFailure(_) => dropped = true,
                    AttemptOutcome::Success => unreachable!(),
                }
            }

            prop_assert!(retryable <= max_retries);
            if dropped {
                prop_assert!(ledger.is_empty());
            }
        }
    }
}
