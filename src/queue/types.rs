use std::time::Instant;

/// 待下载的群文件
///
/// 由群文件上传事件在入队边界处构造，字段均来自事件本身
#[derive(Debug, Clone)]
pub struct PendingFile {
    /// 来源群号
    pub group_id: i64,
    /// 群文件 ID
    pub file_id: String,
    /// 文件名（落盘时直接作为文件名使用）
    pub file_name: String,
    /// 文件大小（字节，仅用于日志展示）
    pub file_size: u64,
    /// 群文件总线 ID（获取下载链接时需要）
    pub busid: i64,
    /// 入队时刻
    pub queued_at: Instant,
}

impl PendingFile {
    pub fn new(group_id: i64, file_id: String, file_name: String, file_size: u64, busid: i64) -> Self {
        Self {
            group_id,
            file_id,
            file_name,
            file_size,
            busid,
            queued_at: Instant::now(),
        }
    }

    /// 文件的逻辑标识：群号 + 文件 ID
    ///
    /// 同一个 key 在重试时会重新入队，但不会同时在队列中出现两次
    pub fn key(&self) -> String {
        format!("{}_{}", self.group_id, self.file_id)
    }

    /// 入队前的字段校验
    ///
    /// 文件名会直接拼接到下载目录下，不允许携带路径成分
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.file_id.is_empty() {
            return Err("文件 ID 为空");
        }
        if self.file_name.is_empty() {
            return Err("文件名为空");
        }
        if self.file_name.contains('/') || self.file_name.contains('\\') || self.file_name == ".." {
            return Err("文件名包含路径成分");
        }
        Ok(())
    }
}

/// 入队结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 已加入队列
    Queued,
    /// 来源群在黑名单内，直接丢弃（不算错误）
    Blocked,
    /// 事件字段不合法，拒绝入队
    Invalid(&'static str),
}

/// 单次下载尝试的结论，由重试账本根据下载结果与重试策略折算
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 下载成功，失败记录（如有）已清除
    Success,
    /// 可重试失败，文件将重新追加到队尾；附带当前重试次数
    RetryableFailure(u32),
    /// 永久失败，不再重试；附带累计失败次数
    PermanentFailure(u32),
}
