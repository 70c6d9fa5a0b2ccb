use std::path::PathBuf;

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 题库相关错误
    #[error("题库错误: {0}")]
    Catalog(#[from] CatalogError),
    /// 组卷草稿存储错误
    #[error("草稿存储错误: {0}")]
    Store(#[from] StoreError),
    /// 渲染错误
    #[error("渲染错误: {0}")]
    Render(#[from] RenderError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 导出错误
    #[error("导出错误: {0}")]
    Export(#[from] ExportError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 题库加载错误
#[derive(Debug, Error)]
pub enum CatalogError {
    /// 读取文件失败
    #[error("读取文件失败 ({}): {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({}): {source}", .path.display())]
    TomlParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// 题目不存在
    #[error("题目不存在: {id}")]
    QuestionNotFound { id: String },
    /// 资料不存在
    #[error("资料不存在: {id}")]
    ResourceNotFound { id: String },
    /// 题目 ID 重复
    #[error("题目ID重复: {id}")]
    DuplicateId { id: String },
    /// 题目数据不合法
    #[error("题目 {id} 数据不合法: {reason}")]
    InvalidQuestion { id: String, reason: String },
}

/// 组卷草稿存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 读取草稿失败
    #[error("读取草稿失败 ({}): {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 写入草稿失败
    #[error("写入草稿失败 ({}): {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 删除草稿失败
    #[error("删除草稿失败 ({}): {source}", .path.display())]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 草稿内容损坏
    #[error("草稿内容无法解析 ({}): {source}", .path.display())]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// 序列化失败
    #[error("草稿序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 草稿名称不合法
    #[error("草稿名称不合法: '{name}'")]
    InvalidDraftName { name: String },
    /// 草稿已存在
    #[error("草稿已存在: {name}")]
    DraftExists { name: String },
    /// 草稿不存在
    #[error("草稿不存在: {name}")]
    DraftNotFound { name: String },
}

/// 模板渲染错误
#[derive(Debug, Error)]
pub enum RenderError {
    /// 模板执行失败
    #[error("模板 {template} 渲染失败: {source}")]
    Template {
        template: &'static str,
        #[source]
        source: minijinja::Error,
    },
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动无头浏览器失败: {source}")]
    LaunchFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 创建页面失败
    #[error("创建页面失败: {source}")]
    PageCreationFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 执行脚本或 CDP 命令失败
    #[error("执行浏览器命令失败: {source}")]
    ScriptExecutionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 浏览器配置失败
    #[error("浏览器配置失败: {message}")]
    ConfigurationFailed { message: String },
}

/// 导出流程错误
#[derive(Debug, Error)]
pub enum ExportError {
    /// 试卷中没有题目
    #[error("试卷中还没有题目")]
    EmptySelection,
    /// 已有导出任务在进行中
    #[error("已有导出任务正在进行")]
    AlreadyExporting,
    /// 版面渲染失败
    #[error("版面渲染失败: {0}")]
    Render(#[from] RenderError),
    /// 栅格化失败
    #[error("栅格化失败: {0}")]
    Rasterize(String),
    /// 位图无法解码
    #[error("位图无法解码: {0}")]
    Bitmap(#[from] image::ImageError),
    /// 位图尺寸不合法
    #[error("位图尺寸不合法: {width}x{height}")]
    InvalidBitmap { width: u32, height: u32 },
    /// 打包文档失败
    #[error("生成文档失败: {0}")]
    Package(String),
    /// 保存文件失败
    #[error("保存文件失败 ({}): {source}", .path.display())]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// 面向用户的提示文字
    pub fn user_message(&self) -> String {
        match self {
            ExportError::EmptySelection => {
                "Add at least one question to the paper before exporting.".to_string()
            }
            ExportError::AlreadyExporting => {
                "An export is already in progress. Please wait for it to finish.".to_string()
            }
            ExportError::SaveFailed { path, .. } => {
                format!("Could not save the paper to {}.", path.display())
            }
            other => format!("Failed to generate the PDF: {}", other),
        }
    }
}

impl From<BrowserError> for ExportError {
    fn from(err: BrowserError) -> Self {
        ExportError::Rasterize(err.to_string())
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({}): {source}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({}): {source}", .path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
