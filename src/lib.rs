//! # Paper Builder
//!
//! 按用户权限浏览题库，挑选题目组成试卷并导出 PDF
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动或连接无头浏览器
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//!
//! ### ② 数据层（Models）
//! - `models/` - 题目、资料、用户权限、试卷抬头
//! - `models/loaders` - 题库 TOML 加载、批量文本解析
//!
//! ### ③ 业务能力层（Services）
//! - `visibility` - 可见性判断（权限层 + 展示层）
//! - `catalog` - 题库快照推送，可见集合自动重算
//! - `selection` - 有序去重的组卷草稿，先落盘再更新内存
//! - `render` - 打印版 / 交互列表两套版面，共用公式标记
//! - `export` - 栅格化 → 分页 → 打包 → 保存
//!
//! ### ④ 编排层（Orchestration）
//! - `cli` - 命令行参数
//! - `app` - 按命令串起各层
//!
//! ## 模块结构

pub mod app;
pub mod browser;
pub mod cli;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{Question, Resource, Subject, Viewer};
pub use services::{
    CatalogStore, CatalogView, ExportPipeline, Notice, PaperRenderer, SelectionStore,
};
