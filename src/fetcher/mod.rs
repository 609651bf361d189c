//! 文件下载执行器
//!
//! 先通过外部解析器把群文件换成可下载的 URL，再流式写入下载目录

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::queue::PendingFile;

/// 下载超时（秒）
const DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// 单次下载失败的分类
///
/// 两类失败对下载循环而言都是可重试失败，区分只为日志可读
#[derive(Debug, Error)]
pub enum FetchError {
    /// 未能取得下载链接（API 出错或没有返回 URL）
    #[error("获取下载链接失败: {0}")]
    Resolution(String),
    /// 传输失败（非成功状态码、网络错误或写盘失败）
    #[error("文件传输失败: {0}")]
    Transfer(String),
}

/// 下载链接解析器
///
/// 由外部 API 将 (群号, 文件 ID, busid) 解析为下载 URL。
/// 返回 Ok(None) 表示对端没有给出链接，按一次失败处理而非异常
#[async_trait]
pub trait FileUrlResolver: Send + Sync {
    async fn resolve(
        &self,
        group_id: i64,
        file_id: &str,
        busid: i64,
    ) -> anyhow::Result<Option<String>>;
}

/// 下载执行器接口，便于在测试中替换掉真实网络
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// 下载单个文件，成功返回落盘路径
    async fn fetch(&self, file: &PendingFile) -> Result<PathBuf, FetchError>;
}

/// 基于 reqwest 的下载执行器
pub struct HttpFetcher {
    /// HTTP 客户端
    client: Client,
    /// 下载链接解析器
    resolver: Arc<dyn FileUrlResolver>,
    /// 下载目录（启动时已完成可写性校验）
    download_dir: PathBuf,
}

impl HttpFetcher {
    pub fn new(resolver: Arc<dyn FileUrlResolver>, download_dir: PathBuf) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .expect("Failed to build download HTTP client");

        Self {
            client,
            resolver,
            download_dir,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, file: &PendingFile) -> Result<PathBuf, FetchError> {
        // 1. 解析下载链接
        let url = self
            .resolver
            .resolve(file.group_id, &file.file_id, file.busid)
            .await
            .map_err(|e| FetchError::Resolution(e.to_string()))?
            .ok_or_else(|| FetchError::Resolution("对端未返回下载链接".to_string()))?;

        // 2. 发起请求并检查状态码
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Transfer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transfer(format!("HTTP 状态码 {}", status)));
        }

        // 3. 流式写入目标文件（同名文件直接覆盖）
        let save_path = self.download_dir.join(&file.file_name);
        let mut dest = File::create(&save_path)
            .await
            .map_err(|e| FetchError::Transfer(format!("创建文件失败: {}", e)))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::Transfer(e.to_string()))?;
            dest.write_all(&chunk)
                .await
                .map_err(|e| FetchError::Transfer(format!("写入文件失败: {}", e)))?;
        }
        dest.flush()
            .await
            .map_err(|e| FetchError::Transfer(format!("写入文件失败: {}", e)))?;

        info!("文件已保存到: {:?}", save_path);
        Ok(save_path)
    }
}
