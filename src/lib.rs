// QQ 群文件自动下载服务核心库
// 群里有文件上传时自动排队下载到本地目录

// 配置管理模块
pub mod config;

// 日志模块
pub mod logging;

// OneBot 对接模块
pub mod onebot;

// 去抖下载队列模块
pub mod queue;

// 文件下载执行模块
pub mod fetcher;

// Web服务器模块（接收事件上报）
pub mod server;

// 导出常用类型
pub use config::AppConfig;
pub use fetcher::{FetchError, Fetcher, FileUrlResolver, HttpFetcher};
pub use onebot::OneBotClient;
pub use queue::{DownloadQueue, PendingFile, QueueStats, SubmitOutcome};
pub use server::AppState;
