//! 编排层：把配置、题库、用户、草稿和导出流程串起来，按命令分发

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chromiumoxide::{Browser, Page};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::browser;
use crate::cli::{
    AdminAction, Cli, Command, DraftsAction, FilterArgs, MoveArgs, PaginationArg, ParseArgs,
};
use crate::config::Config;
use crate::error::{BrowserError, ExportError, StoreError};
use crate::infrastructure::JsExecutor;
use crate::models::loaders::{parse_bulk_questions, BulkDefaults};
use crate::models::{
    load_catalog_folder, load_viewer_profile, CatalogFile, LetterCase, Subject, Viewer,
};
use crate::services::catalog::{
    admin_listing, AdminFacets, CatalogStore, CatalogView, VisibleCatalog,
};
use crate::services::export::{
    ChromePdfPackager, ChromeRasterizer, ExportPipeline, FileSink, PaginationMode,
};
use crate::services::notice::Notice;
use crate::services::render::{question_text, render_selection_text, PaperRenderer};
use crate::services::selection::{list_drafts, DraftBackend, FsDraftBackend, SelectionStore};
use crate::services::visibility::DisplayFilter;
use crate::utils::logging::{append_log_line, init_log_file, log_startup, truncate_text};

/// 应用主结构
pub struct App {
    config: Config,
    catalog: CatalogStore,
    viewer_tx: watch::Sender<Viewer>,
    view: CatalogView,
    drafts: Arc<dyn DraftBackend>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        if let Some(log_file) = &config.output_log_file {
            init_log_file(log_file)
                .with_context(|| format!("无法创建日志文件 {}", log_file.display()))?;
        }

        // 题库或用户档案不可用时降级为空列表，不中断程序
        let file = load_catalog_folder(&config.catalog_folder)
            .await
            .unwrap_or_else(|e| {
                warn!("⚠️ 加载题库失败，使用空题库: {}", e);
                CatalogFile::default()
            });
        let catalog = CatalogStore::from_file(file);

        let viewer = match load_viewer_profile(&config.viewer_profile).await {
            Ok(profile) => profile.into_viewer(),
            Err(e) => {
                warn!("⚠️ 加载用户档案失败，按无权限处理: {}", e);
                Viewer::without_access()
            }
        };
        info!(
            "👤 当前用户: {:?}, 授权科目 {} 个",
            viewer.entitlement.role,
            viewer.entitlement.allowed_subjects.len()
        );

        let (viewer_tx, viewer_rx) = watch::channel(viewer);
        let view = CatalogView::spawn(catalog.subscribe(), viewer_rx);
        let drafts: Arc<dyn DraftBackend> = Arc::new(FsDraftBackend::new(&config.drafts_dir));

        Ok(Self {
            config,
            catalog,
            viewer_tx,
            view,
            drafts,
        })
    }

    /// 替换当前用户（权限变化后可见集合会自动重算）
    pub fn update_viewer(&self, viewer: Viewer) {
        self.viewer_tx.send_replace(viewer);
    }

    /// 运行命令
    pub async fn run(&self, cli: Cli) -> Result<()> {
        log_startup(cli.command_name(), &cli.draft);
        let draft = cli.draft.as_str();

        match cli.command {
            Command::List(filter) => self.list(draft, &filter),
            Command::Resources => self.resources(),
            Command::Show { id } => self.show(&id),
            Command::Add { ids } => self.add(draft, &ids),
            Command::Remove { ids } => self.remove(draft, &ids),
            Command::Clear => self.clear(draft),
            Command::Move(args) => self.move_entry(draft, &args),
            Command::Meta { institute, title } => self.meta(draft, institute, title),
            Command::Preview { filter, html } => {
                self.preview(draft, &filter, html.as_deref()).await
            }
            Command::Export { filter, pagination } => {
                self.export(draft, &filter, pagination).await
            }
            Command::Drafts { action } => self.drafts(action),
            Command::Admin { action } => self.admin(action).await,
        }
    }

    fn visible(&self) -> Arc<VisibleCatalog> {
        self.view.current()
    }

    fn open_draft(&self, name: &str) -> Result<SelectionStore> {
        SelectionStore::open(self.drafts.clone(), name)
            .with_context(|| format!("无法打开草稿 '{}'", name))
    }

    /// 打印提示并写入会话日志
    fn announce(&self, notice: &Notice) {
        println!("{}", notice);
        if notice.is_failure() {
            warn!("{}", notice);
        } else {
            info!("{}", notice);
        }
        if let Some(log_file) = &self.config.output_log_file {
            if let Err(e) = append_log_line(log_file, &notice.to_string()) {
                warn!("⚠️ 写入日志文件失败: {}", e);
            }
        }
    }

    fn list(&self, draft: &str, args: &FilterArgs) -> Result<()> {
        let visible = self.visible();
        if visible.access_denied {
            println!("Your subscription does not include access to the question bank.");
            return Ok(());
        }

        let store = self.open_draft(draft)?;
        let filter = display_filter(&visible, args);
        let questions = filter.apply(&visible.questions);
        if questions.is_empty() {
            println!("No questions available.");
            return Ok(());
        }

        let chapters = filter.available_chapters(&visible.questions);
        if !chapters.is_empty() {
            println!("Chapters: {}\n", chapters.join(", "));
        }
        for (idx, question) in questions.iter().enumerate() {
            let marker = if store.draft().contains(&question.id) {
                "[x]"
            } else {
                "[ ]"
            };
            println!(
                "{} ({}) {}",
                marker,
                question.id,
                question_text(idx + 1, question, LetterCase::Upper)
            );
        }
        Ok(())
    }

    fn resources(&self) -> Result<()> {
        let visible = self.visible();
        if visible.resources.is_empty() {
            println!("No resources available.");
            return Ok(());
        }
        for resource in &visible.resources {
            println!(
                "[{}] {} - {}",
                resource.subject.label(),
                resource.title,
                resource.download_url
            );
            if !resource.description.is_empty() {
                println!("    {}", resource.description);
            }
        }
        Ok(())
    }

    fn show(&self, id: &str) -> Result<()> {
        let visible = self.visible();
        let Some(question) = visible.question(id) else {
            bail!("题目不存在或当前用户不可见: {}", id);
        };
        println!("{}", question_text(1, question, LetterCase::Upper));
        println!("Answer: {}", question.answer_label());
        Ok(())
    }

    fn add(&self, draft: &str, ids: &[String]) -> Result<()> {
        let visible = self.visible();
        let mut store = self.open_draft(draft)?;
        for id in ids {
            let Some(question) = visible.question(id) else {
                self.announce(&Notice::failure(format!("Question {} is not available", id)));
                continue;
            };
            match store.add(question) {
                Ok(change) => {
                    info!("➕ {}: {}", id, truncate_text(&question.content, 40));
                    if let Some(notice) = change.notice() {
                        self.announce(&notice);
                    }
                }
                Err(e) => self.announce(&save_failure(&e)),
            }
        }
        Ok(())
    }

    /// 已选题目即使之后不可见也可以移除
    fn remove(&self, draft: &str, ids: &[String]) -> Result<()> {
        let mut store = self.open_draft(draft)?;
        for id in ids {
            match store.remove(id) {
                Ok(change) => {
                    if let Some(notice) = change.notice() {
                        self.announce(&notice);
                    }
                }
                Err(e) => self.announce(&save_failure(&e)),
            }
        }
        Ok(())
    }

    fn clear(&self, draft: &str) -> Result<()> {
        let mut store = self.open_draft(draft)?;
        let count = store.len();
        match store.clear() {
            Ok(()) => self.announce(&Notice::success(format!(
                "Removed {} questions from the paper",
                count
            ))),
            Err(e) => self.announce(&save_failure(&e)),
        }
        Ok(())
    }

    fn move_entry(&self, draft: &str, args: &MoveArgs) -> Result<()> {
        let mut store = self.open_draft(draft)?;
        if args.from == 0 || args.from > store.len() {
            bail!("位置 {} 超出范围 (1-{})", args.from, store.len());
        }
        let from = args.from - 1;
        let change = if args.up {
            store.move_up(from)?
        } else if args.down {
            store.move_down(from)?
        } else {
            let to = args.to.unwrap_or(args.from).max(1) - 1;
            store.reorder(from, to)?
        };
        info!("↕️ {:?}", change);
        println!("{}", render_selection_text(store.draft(), &[]));
        Ok(())
    }

    fn meta(&self, draft: &str, institute: Option<String>, title: Option<String>) -> Result<()> {
        let mut store = self.open_draft(draft)?;
        let mut metadata = store.draft().metadata.clone();
        if let Some(institute) = institute {
            metadata.institute_name = institute;
        }
        if let Some(title) = title {
            metadata.exam_title = title;
        }
        store.set_metadata(metadata)?;
        let metadata = &store.draft().metadata;
        println!("Institute: {}\nTitle: {}", metadata.institute_name, metadata.exam_title);
        Ok(())
    }

    async fn preview(&self, draft: &str, args: &FilterArgs, html: Option<&Path>) -> Result<()> {
        let visible = self.visible();
        let store = self.open_draft(draft)?;
        let subjects = display_subjects(&visible, args);
        println!("{}", render_selection_text(store.draft(), &subjects));

        if let Some(path) = html {
            let renderer = self.renderer()?;
            let page = renderer.render_screen_html(store.draft(), &subjects)?;
            tokio::fs::write(path, page)
                .await
                .with_context(|| format!("无法写入 {}", path.display()))?;
            info!("💾 交互列表已写入: {}", path.display());
        }
        Ok(())
    }

    async fn export(
        &self,
        draft: &str,
        args: &FilterArgs,
        pagination: Option<PaginationArg>,
    ) -> Result<()> {
        let visible = self.visible();
        let store = self.open_draft(draft)?;
        if store.is_empty() {
            self.announce(&Notice::failure(ExportError::EmptySelection.user_message()));
            return Ok(());
        }

        let pagination = match pagination {
            Some(PaginationArg::Single) => PaginationMode::SingleImage,
            Some(PaginationArg::Paged) => PaginationMode::Paged,
            None => self.config.pagination,
        };

        let (_browser, page) = match self.open_browser().await {
            Ok(session) => session,
            Err(e) => {
                self.announce(&Notice::failure(ExportError::from(e).user_message()));
                return Ok(());
            }
        };
        let pipeline = ExportPipeline::new(
            self.renderer()?,
            ChromeRasterizer::new(
                JsExecutor::new(page.clone()),
                self.config.device_scale_factor,
                Duration::from_millis(self.config.math_wait_ms),
            ),
            ChromePdfPackager::new(page),
            FileSink::new(&self.config.output_dir),
            self.config.export_page_width_pt,
            pagination,
        );

        let subjects = display_subjects(&visible, args);
        let notice = pipeline.export_notice(store.draft(), &subjects).await;
        self.announce(&notice);
        Ok(())
    }

    fn drafts(&self, action: DraftsAction) -> Result<()> {
        match action {
            DraftsAction::List => {
                let names = list_drafts(self.drafts.as_ref())?;
                if names.is_empty() {
                    println!("No saved drafts.");
                }
                for name in names {
                    let store = self.open_draft(&name)?;
                    let draft = store.draft();
                    println!(
                        "{} - {} questions, updated {}",
                        name,
                        draft.len(),
                        draft.updated_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
            DraftsAction::New { name } => {
                SelectionStore::create(self.drafts.clone(), &name)?;
                println!("Created draft '{}'", name);
            }
            DraftsAction::Discard { name } => {
                let store = self.open_draft(&name)?;
                if !store.discard()? {
                    return Err(StoreError::DraftNotFound { name }.into());
                }
                println!("Discarded draft '{}'", name);
            }
        }
        Ok(())
    }

    async fn admin(&self, action: AdminAction) -> Result<()> {
        if !self.viewer_tx.borrow().entitlement.is_admin() {
            bail!("只有管理员可以使用该命令");
        }
        match action {
            AdminAction::List {
                search,
                subject,
                user,
            } => {
                let facets = AdminFacets {
                    search: search.unwrap_or_default(),
                    subject: subject.as_deref().map(Subject::parse),
                    user,
                };
                let snapshot = self.catalog.snapshot();
                let questions = admin_listing(&snapshot, &facets);
                println!("{} of {} questions", questions.len(), snapshot.questions.len());
                for (idx, question) in questions.iter().enumerate() {
                    let assigned = question.assigned_to.as_deref().unwrap_or("everyone");
                    println!("({}) -> {}", question.id, assigned);
                    println!("{}", question_text(idx + 1, question, LetterCase::Upper));
                }
                Ok(())
            }
            AdminAction::Parse(args) => self.import_bulk(&args).await,
        }
    }

    async fn import_bulk(&self, args: &ParseArgs) -> Result<()> {
        let raw = tokio::fs::read_to_string(&args.file)
            .await
            .with_context(|| format!("无法读取 {}", args.file.display()))?;
        let defaults = BulkDefaults {
            id_prefix: args.prefix.clone(),
            subject: Subject::parse(&args.subject),
            chapter: args.chapter.trim().to_string(),
            difficulty: args.difficulty.into(),
        };
        let report = parse_bulk_questions(&raw, &defaults);
        for skipped in &report.skipped {
            println!("Skipped block {}: {}", skipped.block, skipped.reason);
        }
        println!("Parsed {} questions", report.questions.len());
        if args.dry_run || report.questions.is_empty() {
            return Ok(());
        }

        let count = self.catalog.insert_questions(report.questions.clone())?;
        let path = import_file_path(&self.config.catalog_folder, &args.prefix);
        let file = CatalogFile {
            questions: report.questions,
            resources: Vec::new(),
        };
        let content = toml::to_string(&file).context("题目序列化失败")?;
        tokio::fs::create_dir_all(&self.config.catalog_folder).await?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("无法写入 {}", path.display()))?;
        self.announce(&Notice::success(format!(
            "Imported {} questions into {}",
            count,
            path.display()
        )));
        Ok(())
    }

    fn renderer(&self) -> Result<PaperRenderer> {
        let renderer = PaperRenderer::new(
            self.config.page_width_px,
            self.config.math_assets_url.as_str(),
        )?;
        Ok(renderer)
    }

    async fn open_browser(&self) -> Result<(Browser, Page), BrowserError> {
        match self.config.browser_debug_port {
            Some(port) => browser::connect_to_browser_and_page(port).await,
            None => {
                browser::launch_headless_browser(self.config.chrome_executable.as_deref()).await
            }
        }
    }
}

fn save_failure(error: &StoreError) -> Notice {
    Notice::failure(format!("Could not save the paper: {}", error))
}

fn display_filter(visible: &VisibleCatalog, args: &FilterArgs) -> DisplayFilter {
    let mut filter = DisplayFilter::new(&visible.entitlement);
    filter.select_subjects(args.subjects.iter().map(|s| Subject::parse(s)));
    filter.select_chapters(args.chapters.iter().cloned());
    if let Some(query) = &args.query {
        filter.set_query(query.as_str());
    }
    filter
}

/// 抬头科目行使用的科目
fn display_subjects(visible: &VisibleCatalog, args: &FilterArgs) -> Vec<Subject> {
    display_filter(visible, args).active_subjects(&visible.available_subjects())
}

fn import_file_path(folder: &Path, prefix: &str) -> PathBuf {
    folder.join(format!(
        "{}-{}.toml",
        prefix,
        chrono::Utc::now().format("%Y%m%d%H%M%S")
    ))
}
