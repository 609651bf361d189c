// OneBot 对接模块

pub mod client;
pub mod types;

pub use client::OneBotClient;
pub use types::{GroupUploadFile, ReportEvent};
