//! Web服务器模块（接收 OneBot 事件上报）

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::onebot::ReportEvent;
use crate::queue::{DownloadQueue, QueueStats};

/// 服务共享状态
#[derive(Clone)]
pub struct AppState {
    pub queue: DownloadQueue,
    /// 服务启动时间 (Unix timestamp)
    pub started_at: i64,
}

impl AppState {
    pub fn new(queue: DownloadQueue) -> Self {
        Self {
            queue,
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// 健康检查响应
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    service: String,
}

/// 服务状态响应
#[derive(Debug, Serialize)]
struct StatusResponse {
    /// 服务启动时间 (Unix timestamp)
    started_at: i64,
    #[serde(flatten)]
    queue: QueueStats,
}

/// 组装路由
pub fn build_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new().layer(TraceLayer::new_for_http());

    Router::new()
        .route("/onebot", post(receive_event))
        .route("/health", get(health_check))
        .route("/status", get(queue_status))
        .layer(middleware)
        .with_state(state)
}

/// POST /onebot
/// OneBot HTTP 上报入口
///
/// 上报端会推送全部事件，这里只消费群文件上传通知，其余一概忽略。
/// 无论处理结果如何都返回 204，上报协议不关心响应体
async fn receive_event(
    State(state): State<AppState>,
    Json(event): Json<ReportEvent>,
) -> StatusCode {
    if let Some(file) = event.into_pending_file() {
        // 黑名单与字段校验都在队列入口处完成并记录日志
        let _ = state.queue.submit(file);
    }
    StatusCode::NO_CONTENT
}

/// GET /health
/// 健康检查
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "qqgroup-file-downloader".to_string(),
    })
}

/// GET /status
/// 查看队列现状
async fn queue_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        started_at: state.started_at,
        queue: state.queue.stats(),
    })
}
