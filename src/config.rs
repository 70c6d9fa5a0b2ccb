use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigError;
use crate::services::export::{PaginationMode, A4_WIDTH_PT};
use crate::services::render::PAGE_WIDTH_PX;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 题库 TOML 文件目录
    pub catalog_folder: PathBuf,
    /// 当前用户档案
    pub viewer_profile: PathBuf,
    /// 组卷草稿目录
    pub drafts_dir: PathBuf,
    /// 导出文件目录
    pub output_dir: PathBuf,
    /// 浏览器调试端口；设置后连接已运行的浏览器，否则自动启动无头浏览器
    pub browser_debug_port: Option<u16>,
    /// 浏览器可执行文件
    pub chrome_executable: Option<PathBuf>,
    /// 打印版页宽（像素）
    pub page_width_px: u32,
    /// 截图过采样倍数
    pub device_scale_factor: f64,
    /// 导出页宽（pt）
    pub export_page_width_pt: f64,
    pub pagination: PaginationMode,
    /// KaTeX 资源地址
    pub math_assets_url: String,
    /// 等待公式渲染的最长时间（毫秒）
    pub math_wait_ms: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 会话日志文件
    pub output_log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_folder: PathBuf::from("catalog"),
            viewer_profile: PathBuf::from("viewer.toml"),
            drafts_dir: PathBuf::from("drafts"),
            output_dir: PathBuf::from("output"),
            browser_debug_port: None,
            chrome_executable: None,
            page_width_px: PAGE_WIDTH_PX,
            device_scale_factor: 2.0,
            export_page_width_pt: A4_WIDTH_PT,
            pagination: PaginationMode::SingleImage,
            math_assets_url: "https://cdn.jsdelivr.net/npm/katex@0.16.11/dist".to_string(),
            math_wait_ms: 3000,
            verbose_logging: false,
            output_log_file: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn parse_pagination(value: &str) -> Option<PaginationMode> {
    match value.trim().to_lowercase().as_str() {
        "single" => Some(PaginationMode::SingleImage),
        "paged" => Some(PaginationMode::Paged),
        _ => None,
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().map(PathBuf::from)
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            catalog_folder: env_path("CATALOG_FOLDER").unwrap_or(default.catalog_folder),
            viewer_profile: env_path("VIEWER_PROFILE").unwrap_or(default.viewer_profile),
            drafts_dir: env_path("DRAFTS_DIR").unwrap_or(default.drafts_dir),
            output_dir: env_path("OUTPUT_DIR").unwrap_or(default.output_dir),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").or(default.browser_debug_port),
            chrome_executable: env_path("CHROME_EXECUTABLE").or(default.chrome_executable),
            page_width_px: env_parse("PAGE_WIDTH_PX").unwrap_or(default.page_width_px),
            device_scale_factor: env_parse("DEVICE_SCALE_FACTOR")
                .unwrap_or(default.device_scale_factor),
            export_page_width_pt: env_parse("EXPORT_PAGE_WIDTH_PT")
                .unwrap_or(default.export_page_width_pt),
            pagination: std::env::var("PAGINATION")
                .ok()
                .and_then(|v| parse_pagination(&v))
                .unwrap_or(default.pagination),
            math_assets_url: std::env::var("MATH_ASSETS_URL").unwrap_or(default.math_assets_url),
            math_wait_ms: env_parse("MATH_WAIT_MS").unwrap_or(default.math_wait_ms),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            output_log_file: env_path("OUTPUT_LOG_FILE").or(default.output_log_file),
        }
    }

    /// 从 TOML 文件读取，缺少的字段使用默认值
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("已读取配置文件: {}", path.display());
        Ok(config)
    }
}
