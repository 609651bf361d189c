// 配置管理模块

pub mod storage;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs;

use crate::queue::{QueueConfig, RetryPolicy};

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 上报接收服务配置
    #[serde(default)]
    pub server: ServerConfig,
    /// OneBot API 配置
    #[serde(default)]
    pub onebot: OneBotConfig,
    /// 下载配置
    #[serde(default)]
    pub downloader: DownloaderConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 上报接收服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8321
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// OneBot API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneBotConfig {
    /// API 根地址
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// 访问令牌，留空表示不鉴权
    #[serde(default)]
    pub access_token: String,
}

fn default_api_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

impl Default for OneBotConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            access_token: String::new(),
        }
    }
}

impl OneBotConfig {
    /// 生效的访问令牌（空串视为未配置）
    pub fn token(&self) -> Option<String> {
        if self.access_token.is_empty() {
            None
        } else {
            Some(self.access_token.clone())
        }
    }
}

/// 下载配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// 文件下载目录
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// 最后一个文件上传后等待的最小时间（秒）
    #[serde(default = "default_min_wait_after_last_file")]
    pub min_wait_after_last_file: u64,
    /// 最后一个文件上传后等待的最大时间（秒）
    #[serde(default = "default_max_wait_after_last_file")]
    pub max_wait_after_last_file: u64,
    /// 文件开始下载前的最小等待时间（秒）
    #[serde(default = "default_min_wait_before_download")]
    pub min_wait_before_download: u64,
    /// 文件开始下载前的最大等待时间（秒）
    #[serde(default = "default_max_wait_before_download")]
    pub max_wait_before_download: u64,
    /// 检查队列的时间间隔（秒）
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    /// 是否在下载失败时重新加入队列
    #[serde(default)]
    pub retry_failed: bool,
    /// 失败重试的最大次数
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// QQ 群黑名单，名单内的群不会自动下载
    #[serde(default)]
    pub group_blacklist: HashSet<i64>,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_min_wait_after_last_file() -> u64 {
    15
}

fn default_max_wait_after_last_file() -> u64 {
    30
}

fn default_min_wait_before_download() -> u64 {
    10
}

fn default_max_wait_before_download() -> u64 {
    60
}

fn default_check_interval() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            min_wait_after_last_file: default_min_wait_after_last_file(),
            max_wait_after_last_file: default_max_wait_after_last_file(),
            min_wait_before_download: default_min_wait_before_download(),
            max_wait_before_download: default_max_wait_before_download(),
            check_interval: default_check_interval(),
            retry_failed: false,
            max_retries: default_max_retries(),
            group_blacklist: HashSet::new(),
        }
    }
}

impl DownloaderConfig {
    /// 校验等待区间是否合法
    ///
    /// 队列运行时用闭区间抽随机数，min 必须不大于 max
    pub fn validate(&self) -> Result<()> {
        if self.min_wait_after_last_file > self.max_wait_after_last_file {
            anyhow::bail!(
                "静默等待区间无效: min({}) > max({})",
                self.min_wait_after_last_file,
                self.max_wait_after_last_file
            );
        }
        if self.min_wait_before_download > self.max_wait_before_download {
            anyhow::bail!(
                "下载前等待区间无效: min({}) > max({})",
                self.min_wait_before_download,
                self.max_wait_before_download
            );
        }
        if self.check_interval == 0 {
            anyhow::bail!("检查队列间隔不能为 0");
        }
        Ok(())
    }

    /// 转换为队列运行参数
    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            min_wait_after_last_file: self.min_wait_after_last_file,
            max_wait_after_last_file: self.max_wait_after_last_file,
            min_wait_before_download: self.min_wait_before_download,
            max_wait_before_download: self.max_wait_before_download,
            check_interval: self.check_interval,
            retry: RetryPolicy {
                enabled: self.retry_failed,
                max_retries: self.max_retries,
            },
            group_blacklist: self.group_blacklist.clone(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;
        config
            .downloader
            .validate()
            .context("配置文件中的下载参数校验失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        tracing::info!("配置已保存: {}", path);
        Ok(())
    }

    /// 加载或创建默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {}", e);
                let default_config = Self::default();

                // 首次启动时落一份默认配置，方便用户修改
                if let Err(e) = default_config.save_to_file(path).await {
                    tracing::error!("保存默认配置失败: {}", e);
                }

                default_config
            }
        }
    }
}
