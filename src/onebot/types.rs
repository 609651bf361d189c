use serde::Deserialize;

use crate::queue::PendingFile;

/// OneBot v11 上报事件
///
/// 上报端会把所有事件都推过来，这里只关心群文件上传通知，
/// 字段一律放宽成可选，其余事件在路由层直接忽略
#[derive(Debug, Clone, Deserialize)]
pub struct ReportEvent {
    #[serde(default)]
    pub post_type: Option<String>,
    #[serde(default)]
    pub notice_type: Option<String>,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub file: Option<GroupUploadFile>,
}

/// 群文件上传通知里的文件信息
#[derive(Debug, Clone, Deserialize)]
pub struct GroupUploadFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub busid: i64,
}

impl ReportEvent {
    /// 是否为群文件上传通知
    pub fn is_group_upload(&self) -> bool {
        self.post_type.as_deref() == Some("notice")
            && self.notice_type.as_deref() == Some("group_upload")
    }

    /// 转成待下载文件；事件类型不符或缺少字段时返回 None
    pub fn into_pending_file(self) -> Option<PendingFile> {
        if !self.is_group_upload() {
            return None;
        }
        let group_id = self.group_id?;
        let file = self.file?;
        Some(PendingFile::new(
            group_id, file.id, file.name, file.size, file.busid,
        ))
    }
}
