//! 下载目录准备
//!
//! 启动时把配置的下载目录建好并确认真的可写；不可写时退回系统
//! 临时目录下的专属子目录，只有连备选目录都不可写才算启动失败

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// 可写性探测文件名
const WRITE_PROBE: &str = ".write_test";

/// 备选目录名（挂在系统临时目录下）
const FALLBACK_DIR_NAME: &str = "qqgroup-file-downloader";

/// 准备下载目录，返回最终生效的路径
pub fn prepare_download_dir(configured: &Path) -> Result<PathBuf> {
    match ensure_writable(configured) {
        Ok(()) => {
            info!("下载目录已准备就绪: {:?}", configured);
            Ok(configured.to_path_buf())
        }
        Err(e) => {
            let fallback = std::env::temp_dir().join(FALLBACK_DIR_NAME);
            warn!(
                "下载目录不可用: {:?} ({}), 尝试备选下载目录: {:?}",
                configured, e, fallback
            );
            ensure_writable(&fallback)
                .with_context(|| format!("备选下载目录也不可写: {:?}", fallback))?;
            info!("已切换到备选下载目录: {:?}", fallback);
            Ok(fallback)
        }
    }
}

/// 创建目录并写入探测文件确认可写
fn ensure_writable(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("创建目录失败: {:?}", dir))?;

    let probe = dir.join(WRITE_PROBE);
    fs::write(&probe, b"test").with_context(|| format!("目录没有写权限: {:?}", dir))?;
    let _ = fs::remove_file(&probe);
    Ok(())
}
