//! OneBot HTTP API 客户端
//!
//! 目前只用到 get_group_file_url 一个动作：把群文件换成下载链接

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fetcher::FileUrlResolver;

/// API 请求超时（秒）
const API_TIMEOUT_SECS: u64 = 30;

/// OneBot API 客户端
#[derive(Debug, Clone)]
pub struct OneBotClient {
    /// HTTP 客户端
    client: Client,
    /// API 根地址，如 http://127.0.0.1:3000
    api_url: String,
    /// 访问令牌（可选，附带在 Authorization 头）
    access_token: Option<String>,
}

/// get_group_file_url 的请求参数
#[derive(Debug, Serialize)]
struct GroupFileUrlParams<'a> {
    group_id: i64,
    file_id: &'a str,
    busid: i64,
}

/// OneBot API 响应包络
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    status: Option<String>,
    retcode: i64,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
struct FileUrlData {
    #[serde(default)]
    url: Option<String>,
}

impl OneBotClient {
    pub fn new(api_url: impl Into<String>, access_token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(API_TIMEOUT_SECS))
            .build()
            .expect("Failed to build OneBot API client");

        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            access_token,
        }
    }
}

#[async_trait]
impl FileUrlResolver for OneBotClient {
    async fn resolve(
        &self,
        group_id: i64,
        file_id: &str,
        busid: i64,
    ) -> Result<Option<String>> {
        let endpoint = format!("{}/get_group_file_url", self.api_url);
        let mut request = self.client.post(&endpoint).json(&GroupFileUrlParams {
            group_id,
            file_id,
            busid,
        });
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.context("请求 OneBot API 失败")?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("OneBot API 返回状态码 {}", status);
        }

        let envelope: ApiEnvelope<FileUrlData> =
            response.json().await.context("解析 OneBot API 响应失败")?;
        if envelope.retcode != 0 {
            anyhow::bail!(
                "OneBot API 调用失败: retcode={}, status={:?}",
                envelope.retcode,
                envelope.status
            );
        }

        let url = envelope
            .data
            .and_then(|data| data.url)
            .filter(|url| !url.is_empty());
        debug!(
            "获取群文件下载链接: 群={}, 文件={}, 结果={}",
            group_id,
            file_id,
            if url.is_some() { "有链接" } else { "无链接" }
        );
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::json;

    #[test]
    fn test_envelope_parsing() {
        let ok: ApiEnvelope<FileUrlData> = serde_json::from_str(
            r#"{"status":"ok","retcode":0,"data":{"url":"http://example.com/a.zip"}}"#,
        )
        .unwrap();
        assert_eq!(ok.retcode, 0);
        assert_eq!(ok.data.unwrap().url.unwrap(), "http://example.com/a.zip");

        // 无 url 字段
        let empty: ApiEnvelope<FileUrlData> =
            serde_json::from_str(r#"{"status":"ok","retcode":0,"data":{}}"#).unwrap();
        assert!(empty.data.unwrap().url.is_none());

        let failed: ApiEnvelope<FileUrlData> =
            serde_json::from_str(r#"{"status":"failed","retcode":1400}"#).unwrap();
        assert_eq!(failed.retcode, 1400);
        assert!(failed.data.is_none());
    }

    /// 起一个假的 OneBot API 服务
    async fn spawn_api(reply: serde_json::Value) -> String {
        let app = Router::new().route(
            "/get_group_file_url",
            post(move || async move { Json(reply) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_resolve_returns_url() {
        let base = spawn_api(json!({
            "status": "ok",
            "retcode": 0,
            "data": { "url": "http://cdn.example.com/a.zip" }
        }))
        .await;

        let client = OneBotClient::new(base, None);
        let url = client.resolve(100, "f1", 102).await.unwrap();
        assert_eq!(url.unwrap(), "http://cdn.example.com/a.zip");
    }

    #[tokio::test]
    async fn test_resolve_missing_url_is_none() {
        let base = spawn_api(json!({ "status": "ok", "retcode": 0, "data": {} })).await;

        let client = OneBotClient::new(base, None);
        assert!(client.resolve(100, "f1", 102).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_api_failure_is_error() {
        let base = spawn_api(json!({ "status": "failed", "retcode": 1400 })).await;

        let client = OneBotClient::new(base, None);
        assert!(client.resolve(100, "f1", 102).await.is_err());
    }
}
