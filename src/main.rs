use anyhow::Result;
use qqgroup_file_downloader::{
    config::{storage, AppConfig, LogConfig},
    logging, server, AppState, DownloadQueue, HttpFetcher, OneBotClient,
};
use std::sync::Arc;
use tracing::info;

/// 配置文件路径
const CONFIG_PATH: &str = "config/app.toml";

/// 加载日志配置
///
/// 日志系统要先于完整配置初始化，这里只从配置文件里抠出 [log] 一节，
/// 失败时返回默认配置
async fn load_log_config() -> LogConfig {
    if let Ok(content) = tokio::fs::read_to_string(CONFIG_PATH).await {
        if let Ok(config) = toml::from_str::<toml::Value>(&content) {
            if let Some(log_table) = config.get("log") {
                if let Ok(log_config) = log_table.clone().try_into::<LogConfig>() {
                    return log_config;
                }
            }
        }
    }

    LogConfig::default()
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = load_log_config().await;
    let _log_guard = logging::init_logging(&log_config);

    let config = AppConfig::load_or_default(CONFIG_PATH).await;

    // 准备下载目录（不可写时自动退回临时目录）
    let download_dir = storage::prepare_download_dir(&config.downloader.download_dir)?;

    info!("群文件下载服务已启动");
    info!(
        "配置参数: 最后文件等待时间范围 {}-{}秒",
        config.downloader.min_wait_after_last_file, config.downloader.max_wait_after_last_file
    );
    info!(
        "配置参数: 下载前等待时间范围 {}-{}秒",
        config.downloader.min_wait_before_download, config.downloader.max_wait_before_download
    );
    info!(
        "配置参数: 失败重试 {}，最大重试次数 {}",
        if config.downloader.retry_failed { "开启" } else { "关闭" },
        config.downloader.max_retries
    );
    info!("配置参数: 检查队列间隔 {}秒", config.downloader.check_interval);
    info!("配置参数: QQ群黑名单 {:?}", config.downloader.group_blacklist);
    info!("下载目录: {:?}", download_dir);

    // 组装下载链路: OneBot 解析器 -> 下载执行器 -> 去抖队列
    let resolver = Arc::new(OneBotClient::new(
        config.onebot.api_url.clone(),
        config.onebot.token(),
    ));
    let fetcher = Arc::new(HttpFetcher::new(resolver, download_dir));
    let queue = DownloadQueue::new(config.downloader.queue_config(), fetcher);

    let app = server::build_router(AppState::new(queue.clone()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("上报接收服务启动在: http://{}/onebot", addr);
    info!("队列状态: http://{}/status", addr);
    info!("健康检查: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始优雅关闭...");
        }
    }

    queue.shutdown().await;
    info!("应用已安全退出");

    Ok(())
}
