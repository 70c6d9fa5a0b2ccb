//! 题库订阅与可见集合 - 业务能力层
//!
//! - [`CatalogStore`]：题库的进程内实现，每次写入都会推送新的快照
//! - [`CatalogView`]：订阅题库和用户权限，任一变化都会用同一对（快照, 用户）
//!   完整重算可见集合后一次性发布，不会出现新旧数据混用的中间状态
//! - [`admin_listing`]：管理员视图，不经过可见性过滤

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::CatalogError;
use crate::models::{CatalogFile, Entitlement, Question, Resource, Subject, Viewer};
use crate::services::visibility::{is_question_visible, is_resource_visible};

/// 题库快照（按插入顺序）
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub version: u64,
    pub questions: Vec<Question>,
    pub resources: Vec<Resource>,
}

impl CatalogSnapshot {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// 题库存储
///
/// 多个管理员可以同时写入；写入串行执行，订阅方只会看到完整的快照
pub struct CatalogStore {
    tx: watch::Sender<Arc<CatalogSnapshot>>,
    writer: Mutex<()>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::with_snapshot(CatalogSnapshot::default())
    }

    /// 用加载好的文件初始化，重复 ID 只保留第一条
    pub fn from_file(file: CatalogFile) -> Self {
        let mut snapshot = CatalogSnapshot::default();
        for question in file.questions {
            if snapshot.question(&question.id).is_some() {
                warn!("⚠️ 忽略重复的题目ID: {}", question.id);
                continue;
            }
            snapshot.questions.push(question);
        }
        for resource in file.resources {
            if snapshot.resources.iter().any(|r| r.id == resource.id) {
                warn!("⚠️ 忽略重复的资料ID: {}", resource.id);
                continue;
            }
            snapshot.resources.push(resource);
        }
        info!(
            "📚 题库初始化完成: {} 道题目, {} 份资料",
            snapshot.questions.len(),
            snapshot.resources.len()
        );

        Self::with_snapshot(snapshot)
    }

    fn with_snapshot(snapshot: CatalogSnapshot) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(snapshot));
        Self {
            tx,
            writer: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogSnapshot>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.tx.borrow().clone()
    }

    /// 新增题目
    pub fn insert_question(&self, question: Question) -> Result<(), CatalogError> {
        self.insert_questions(vec![question]).map(|_| ())
    }

    /// 批量新增题目（全部成功或全部不生效）
    pub fn insert_questions(&self, questions: Vec<Question>) -> Result<usize, CatalogError> {
        self.publish(|snapshot| {
            for (idx, question) in questions.iter().enumerate() {
                question
                    .validate()
                    .map_err(|reason| CatalogError::InvalidQuestion {
                        id: question.id.clone(),
                        reason,
                    })?;
                let duplicated = snapshot.question(&question.id).is_some()
                    || questions[..idx].iter().any(|q| q.id == question.id);
                if duplicated {
                    return Err(CatalogError::DuplicateId {
                        id: question.id.clone(),
                    });
                }
            }
            let count = questions.len();
            let now = Utc::now();
            snapshot.questions.extend(questions.into_iter().map(|mut q| {
                q.created_at.get_or_insert(now);
                q
            }));
            Ok(count)
        })
    }

    /// 修改题目的指派对象
    pub fn assign_question(
        &self,
        id: &str,
        assigned_to: Option<String>,
    ) -> Result<(), CatalogError> {
        self.publish(|snapshot| {
            let question = snapshot
                .questions
                .iter_mut()
                .find(|q| q.id == id)
                .ok_or_else(|| CatalogError::QuestionNotFound { id: id.to_string() })?;
            question.assigned_to = assigned_to;
            Ok(())
        })
    }

    pub fn delete_question(&self, id: &str) -> Result<(), CatalogError> {
        self.publish(|snapshot| {
            let before = snapshot.questions.len();
            snapshot.questions.retain(|q| q.id != id);
            if snapshot.questions.len() == before {
                return Err(CatalogError::QuestionNotFound { id: id.to_string() });
            }
            Ok(())
        })
    }

    pub fn insert_resource(&self, resource: Resource) -> Result<(), CatalogError> {
        self.publish(|snapshot| {
            if snapshot.resources.iter().any(|r| r.id == resource.id) {
                return Err(CatalogError::DuplicateId { id: resource.id });
            }
            let mut resource = resource;
            resource.uploaded_at.get_or_insert_with(Utc::now);
            snapshot.resources.push(resource);
            Ok(())
        })
    }

    pub fn delete_resource(&self, id: &str) -> Result<(), CatalogError> {
        self.publish(|snapshot| {
            let before = snapshot.resources.len();
            snapshot.resources.retain(|r| r.id != id);
            if snapshot.resources.len() == before {
                return Err(CatalogError::ResourceNotFound { id: id.to_string() });
            }
            Ok(())
        })
    }

    /// 在快照副本上执行修改，成功后版本号加一并推送
    fn publish<T>(
        &self,
        change: impl FnOnce(&mut CatalogSnapshot) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let mut next = CatalogSnapshot::clone(&current);
        let value = change(&mut next)?;
        next.version = current.version + 1;
        debug!("题库版本更新: {} -> {}", current.version, next.version);
        self.tx.send_replace(Arc::new(next));
        Ok(value)
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

/// 当前用户的可见集合
#[derive(Debug, Clone)]
pub struct VisibleCatalog {
    pub catalog_version: u64,
    pub entitlement: Entitlement,
    /// 订阅已失效，显示为空
    pub access_denied: bool,
    pub questions: Vec<Question>,
    pub resources: Vec<Resource>,
}

impl VisibleCatalog {
    /// 用一对（快照, 用户）完整计算可见集合
    pub fn compute(snapshot: &CatalogSnapshot, viewer: &Viewer, now: DateTime<Utc>) -> Self {
        let entitlement = viewer.entitlement.clone();

        if !entitlement.has_catalog_access(now) {
            debug!("用户没有题库访问权限，可见集合为空");
            return Self {
                catalog_version: snapshot.version,
                entitlement,
                access_denied: true,
                questions: Vec::new(),
                resources: Vec::new(),
            };
        }

        // 管理员不走可见性过滤
        let (questions, resources) = if entitlement.is_admin() {
            (snapshot.questions.clone(), snapshot.resources.clone())
        } else {
            (
                snapshot
                    .questions
                    .iter()
                    .filter(|q| is_question_visible(q, viewer))
                    .cloned()
                    .collect(),
                snapshot
                    .resources
                    .iter()
                    .filter(|r| is_resource_visible(r, viewer))
                    .cloned()
                    .collect(),
            )
        };

        Self {
            catalog_version: snapshot.version,
            entitlement,
            access_denied: false,
            questions,
            resources,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty() && self.resources.is_empty()
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// 可选科目：普通用户为授权科目，管理员为题库中出现过的科目
    pub fn available_subjects(&self) -> Vec<Subject> {
        if !self.entitlement.is_admin() {
            return self.entitlement.allowed_subjects.clone();
        }
        let mut subjects: Vec<Subject> = Vec::new();
        for question in &self.questions {
            if !subjects.contains(&question.subject) {
                subjects.push(question.subject.clone());
            }
        }
        subjects
    }
}

/// 可见集合订阅
///
/// drop 时结束后台任务，离开页面后不会再处理旧快照
pub struct CatalogView {
    rx: watch::Receiver<Arc<VisibleCatalog>>,
    task: JoinHandle<()>,
}

impl CatalogView {
    pub fn spawn(
        mut catalog_rx: watch::Receiver<Arc<CatalogSnapshot>>,
        mut viewer_rx: watch::Receiver<Viewer>,
    ) -> Self {
        let initial = {
            let snapshot = catalog_rx.borrow_and_update().clone();
            let viewer = viewer_rx.borrow_and_update().clone();
            VisibleCatalog::compute(&snapshot, &viewer, Utc::now())
        };
        let (tx, rx) = watch::channel(Arc::new(initial));

        // 一路推送关闭后沿用它的最后一个值，两路都关闭才退出
        let task = tokio::spawn(async move {
            let mut catalog_open = true;
            let mut viewer_open = true;
            loop {
                let changed = tokio::select! {
                    changed = catalog_rx.changed(), if catalog_open => {
                        if changed.is_err() {
                            debug!("题库推送已关闭，沿用最后的快照");
                            catalog_open = false;
                        }
                        changed.is_ok()
                    }
                    changed = viewer_rx.changed(), if viewer_open => {
                        if changed.is_err() {
                            debug!("用户信息推送已关闭，沿用最后的权限");
                            viewer_open = false;
                        }
                        changed.is_ok()
                    }
                    else => break,
                };
                if !changed {
                    continue;
                }

                let snapshot = catalog_rx.borrow_and_update().clone();
                let viewer = viewer_rx.borrow_and_update().clone();
                let visible = VisibleCatalog::compute(&snapshot, &viewer, Utc::now());
                debug!(
                    "可见集合重算完成: 题库版本 {}, {} 道题目",
                    visible.catalog_version,
                    visible.questions.len()
                );

                if tx.send(Arc::new(visible)).is_err() {
                    break;
                }
            }
        });

        Self { rx, task }
    }

    pub fn current(&self) -> Arc<VisibleCatalog> {
        self.rx.borrow().clone()
    }

    /// 等待下一次可见集合更新；订阅结束时返回 `None`
    pub async fn next(&mut self) -> Option<Arc<VisibleCatalog>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

impl Drop for CatalogView {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 管理员列表的筛选条件
#[derive(Debug, Clone, Default)]
pub struct AdminFacets {
    pub search: String,
    pub subject: Option<Subject>,
    /// 只看指派给某个用户的题目
    pub user: Option<String>,
}

/// 管理员视图：完整题库，只按筛选条件过滤
pub fn admin_listing<'a>(snapshot: &'a CatalogSnapshot, facets: &AdminFacets) -> Vec<&'a Question> {
    let search = facets.search.trim().to_lowercase();
    snapshot
        .questions
        .iter()
        .filter(|q| {
            facets
                .subject
                .as_ref()
                .map_or(true, |s| s.key() == q.subject.key())
        })
        .filter(|q| {
            facets
                .user
                .as_deref()
                .map_or(true, |user| q.assigned_to.as_deref() == Some(user))
        })
        .filter(|q| {
            search.is_empty()
                || q.content.to_lowercase().contains(&search)
                || q.chapter.to_lowercase().contains(&search)
                || q.id.to_lowercase().contains(&search)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Answer, Difficulty, QuestionKind, Role, SubscriptionStatus, ViewerIdentity,
    };
    use std::time::Duration;

    fn question(id: &str, subject: Subject) -> Question {
        Question {
            id: id.to_string(),
            subject,
            chapter: "Calculus".to_string(),
            difficulty: Difficulty::Easy,
            kind: QuestionKind::Integer,
            content: format!("content {}", id),
            options: vec![],
            correct_answer: Answer::Text("0".to_string()),
            assigned_to: None,
            created_at: None,
        }
    }

    fn student(subjects: Vec<Subject>) -> Viewer {
        Viewer {
            identity: ViewerIdentity::resolve("user-42", None, Some("s@x.org")),
            entitlement: Entitlement {
                role: Role::Student,
                subscription_status: SubscriptionStatus::Active,
                subscription_expiry: None,
                allowed_subjects: subjects,
                allowed_chapters: vec![],
            },
        }
    }

    async fn next_update(view: &mut CatalogView) -> Arc<VisibleCatalog> {
        tokio::time::timeout(Duration::from_secs(2), view.next())
            .await
            .expect("可见集合应在超时前更新")
            .expect("订阅不应结束")
    }

    #[test]
    fn test_insert_bumps_version_and_rejects_duplicates() {
        let store = CatalogStore::new();
        store.insert_question(question("q1", Subject::Maths)).unwrap();
        assert_eq!(store.snapshot().version, 1);
        assert!(store.snapshot().questions[0].created_at.is_some());

        let err = store
            .insert_question(question("q1", Subject::Maths))
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId { .. }));
        assert_eq!(store.snapshot().version, 1);
    }

    #[test]
    fn test_batch_insert_is_all_or_nothing() {
        let store = CatalogStore::new();
        let mut bad = question("q2", Subject::Maths);
        bad.kind = QuestionKind::Mcq;

        let err = store
            .insert_questions(vec![question("q1", Subject::Maths), bad])
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidQuestion { .. }));
        assert!(store.snapshot().questions.is_empty());
    }

    #[test]
    fn test_from_file_keeps_first_duplicate() {
        let store = CatalogStore::from_file(CatalogFile {
            questions: vec![question("q1", Subject::Maths), question("q1", Subject::Physics)],
            resources: vec![],
        });
        let snapshot = store.snapshot();
        assert_eq!(snapshot.questions.len(), 1);
        assert_eq!(snapshot.questions[0].subject, Subject::Maths);
    }

    #[tokio::test]
    async fn test_view_recomputes_on_catalog_change() {
        let store = CatalogStore::new();
        store.insert_question(question("q1", Subject::Maths)).unwrap();
        let (_viewer_tx, viewer_rx) = watch::channel(student(vec![Subject::Maths]));

        let mut view = CatalogView::spawn(store.subscribe(), viewer_rx);
        assert_eq!(view.current().questions.len(), 1);

        // 管理员把题目指派给别人，当前用户应立刻看不到
        store
            .assign_question("q1", Some("user-99".to_string()))
            .unwrap();
        let visible = next_update(&mut view).await;
        assert_eq!(visible.catalog_version, 2);
        assert!(visible.questions.is_empty());

        store
            .assign_question("q1", Some("s@x.org".to_string()))
            .unwrap();
        assert_eq!(next_update(&mut view).await.questions.len(), 1);
    }

    #[tokio::test]
    async fn test_view_recomputes_on_entitlement_change() {
        let store = CatalogStore::new();
        store
            .insert_questions(vec![
                question("m1", Subject::Maths),
                question("p1", Subject::Physics),
            ])
            .unwrap();
        let (viewer_tx, viewer_rx) = watch::channel(student(vec![Subject::Maths]));
        let mut view = CatalogView::spawn(store.subscribe(), viewer_rx);
        assert_eq!(view.current().questions[0].id, "m1");

        viewer_tx.send(student(vec![Subject::Physics])).unwrap();
        let visible = next_update(&mut view).await;
        assert_eq!(visible.entitlement.allowed_subjects, vec![Subject::Physics]);
        let ids: Vec<&str> = visible.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["p1"]);
    }

    #[tokio::test]
    async fn test_expired_subscription_yields_empty_state() {
        let store = CatalogStore::new();
        store.insert_question(question("m1", Subject::Maths)).unwrap();
        let mut viewer = student(vec![Subject::Maths]);
        viewer.entitlement.subscription_status = SubscriptionStatus::Expired;
        let (_tx, rx) = watch::channel(viewer);

        let view = CatalogView::spawn(store.subscribe(), rx);
        let visible = view.current();
        assert!(visible.access_denied);
        assert!(visible.is_empty());
    }

    #[tokio::test]
    async fn test_dropping_view_stops_updates() {
        let store = CatalogStore::new();
        let (_tx, rx) = watch::channel(student(vec![Subject::Maths]));
        let view = CatalogView::spawn(store.subscribe(), rx);
        let updates = view.rx.clone();
        drop(view);
        tokio::task::yield_now().await;

        store.insert_question(question("m1", Subject::Maths)).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(updates.borrow().questions.is_empty());
    }

    #[tokio::test]
    async fn test_view_keeps_following_catalog_after_viewer_sender_drops() {
        let store = CatalogStore::new();
        let (viewer_tx, viewer_rx) = watch::channel(student(vec![Subject::Maths]));
        drop(viewer_tx);
        let mut view = CatalogView::spawn(store.subscribe(), viewer_rx);
        tokio::task::yield_now().await;

        store.insert_question(question("m1", Subject::Maths)).unwrap();
        let visible = next_update(&mut view).await;
        assert_eq!(visible.questions.len(), 1);

        store
            .assign_question("m1", Some("user-99".to_string()))
            .unwrap();
        assert!(next_update(&mut view).await.questions.is_empty());
    }

    #[tokio::test]
    async fn test_view_ends_when_both_inputs_close() {
        let store = CatalogStore::new();
        let (viewer_tx, viewer_rx) = watch::channel(student(vec![Subject::Maths]));
        let mut view = CatalogView::spawn(store.subscribe(), viewer_rx);

        drop(viewer_tx);
        drop(store);
        let ended = tokio::time::timeout(Duration::from_secs(2), view.next())
            .await
            .expect("后台任务应在超时前退出");
        assert!(ended.is_none());
    }

    #[tokio::test]
    async fn test_deleted_question_leaves_view() {
        let store = CatalogStore::new();
        store
            .insert_questions(vec![
                question("m1", Subject::Maths),
                question("m2", Subject::Maths),
            ])
            .unwrap();
        let (_viewer_tx, viewer_rx) = watch::channel(student(vec![Subject::Maths]));
        let mut view = CatalogView::spawn(store.subscribe(), viewer_rx);

        store.delete_question("m1").unwrap();
        let visible = next_update(&mut view).await;
        let ids: Vec<&str> = visible.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["m2"]);

        let err = store.delete_question("m1").unwrap_err();
        assert!(matches!(err, CatalogError::QuestionNotFound { .. }));
        assert_eq!(store.snapshot().version, 2);
    }

    #[tokio::test]
    async fn test_resources_follow_assignment_and_deletion() {
        let store = CatalogStore::new();
        let (_viewer_tx, viewer_rx) = watch::channel(student(vec![Subject::Maths]));
        let mut view = CatalogView::spawn(store.subscribe(), viewer_rx);

        let resource = |id: &str, assigned_to: Option<&str>| Resource {
            id: id.to_string(),
            title: format!("sheet {}", id),
            description: String::new(),
            subject: Subject::Maths,
            download_url: format!("https://example.com/{}.pdf", id),
            assigned_to: assigned_to.map(str::to_string),
            uploaded_at: None,
        };

        store.insert_resource(resource("mine", Some("s@x.org"))).unwrap();
        let visible = next_update(&mut view).await;
        assert_eq!(visible.resources.len(), 1);
        assert!(store.snapshot().resources[0].uploaded_at.is_some());

        store.insert_resource(resource("theirs", Some("user-99"))).unwrap();
        let visible = next_update(&mut view).await;
        assert_eq!(visible.resources.len(), 1);
        assert_eq!(visible.resources[0].id, "mine");

        let err = store.insert_resource(resource("mine", None)).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId { .. }));

        store.delete_resource("mine").unwrap();
        assert!(next_update(&mut view).await.resources.is_empty());
        assert!(matches!(
            store.delete_resource("mine").unwrap_err(),
            CatalogError::ResourceNotFound { .. }
        ));
    }

    #[test]
    fn test_admin_listing_ignores_visibility() {
        let mut assigned = question("p1", Subject::Physics);
        assigned.assigned_to = Some("user-7".to_string());
        let store = CatalogStore::from_file(CatalogFile {
            questions: vec![question("m1", Subject::Maths), assigned],
            resources: vec![],
        });
        let snapshot = store.snapshot();

        assert_eq!(admin_listing(&snapshot, &AdminFacets::default()).len(), 2);

        let facets = AdminFacets {
            user: Some("user-7".to_string()),
            ..Default::default()
        };
        assert_eq!(admin_listing(&snapshot, &facets)[0].id, "p1");

        let facets = AdminFacets {
            subject: Some(Subject::Maths),
            search: "CONTENT".to_string(),
            ..Default::default()
        };
        assert_eq!(admin_listing(&snapshot, &facets)[0].id, "m1");
    }

    #[test]
    fn test_available_subjects_for_admin_come_from_catalog() {
        let store = CatalogStore::from_file(CatalogFile {
            questions: vec![
                question("p1", Subject::Physics),
                question("m1", Subject::Maths),
                question("p2", Subject::Physics),
            ],
            resources: vec![],
        });
        let snapshot = store.snapshot();

        let mut admin = student(vec![]);
        admin.entitlement.role = Role::Admin;
        let visible = VisibleCatalog::compute(&snapshot, &admin, Utc::now());
        assert_eq!(visible.available_subjects(), vec![Subject::Physics, Subject::Maths]);

        let maths_student = student(vec![Subject::Maths]);
        let visible = VisibleCatalog::compute(&snapshot, &maths_student, Utc::now());
        assert_eq!(visible.available_subjects(), vec![Subject::Maths]);
        assert_eq!(visible.questions.len(), 1);
    }
}
