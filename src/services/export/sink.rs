use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::ExportError;

/// 文档保存目标
pub trait DocumentSink {
    /// 保存完成（数据已落盘）后才返回保存位置
    fn save(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> impl Future<Output = Result<PathBuf, ExportError>> + Send;
}

/// 写入本地目录
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DocumentSink for FileSink {
    async fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
        let path = self.dir.join(file_name);
        let save_failed = |source| ExportError::SaveFailed {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir).await.map_err(save_failed)?;
        let mut file = tokio::fs::File::create(&path).await.map_err(save_failed)?;
        file.write_all(bytes).await.map_err(save_failed)?;
        file.sync_all().await.map_err(save_failed)?;

        debug!("文件已落盘: {} ({} 字节)", path.display(), bytes.len());
        Ok(path)
    }
}
