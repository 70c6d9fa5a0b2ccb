//! 可见性过滤 - 业务能力层
//!
//! 两层判断：
//! - 权限层：科目、章节、指派，纯函数，决定"能不能看"
//! - 展示层：[`DisplayFilter`] 的科目/章节多选和搜索词，决定"当前想看什么"
//!
//! 展示层只会在权限层结果上再做交集，不会放宽权限。

use std::collections::BTreeSet;

use tracing::debug;

use crate::models::{Entitlement, Question, Resource, Subject, Viewer, ViewerIdentity};

/// 题目对当前用户是否可见（权限层）
///
/// 数据不合法的题目一律隐藏
pub fn is_question_visible(question: &Question, viewer: &Viewer) -> bool {
    if let Err(reason) = question.validate() {
        debug!("隐藏不合法的题目 {}: {}", question.id, reason);
        return false;
    }

    let entitlement = &viewer.entitlement;
    entitlement.allows_subject(&question.subject)
        && entitlement.allows_chapter(&question.chapter)
        && is_assigned_to(question.assigned_to.as_deref(), &viewer.identity)
}

/// 资料对当前用户是否可见（权限层，不看章节）
pub fn is_resource_visible(resource: &Resource, viewer: &Viewer) -> bool {
    if !resource.is_well_formed() {
        debug!("隐藏不合法的资料 {}", resource.id);
        return false;
    }

    viewer.entitlement.allows_subject(&resource.subject)
        && is_assigned_to(resource.assigned_to.as_deref(), &viewer.identity)
}

fn is_assigned_to(assigned_to: Option<&str>, identity: &ViewerIdentity) -> bool {
    match assigned_to.map(str::trim) {
        None | Some("") => true,
        Some(reference) => identity.matches(reference),
    }
}

/// 展示层过滤条件
///
/// - `subjects`: `None` 表示全部已授权科目
/// - `chapters`: `None` 表示不限章节
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayFilter {
    subjects: Option<BTreeSet<Subject>>,
    chapters: Option<BTreeSet<String>>,
    query: String,
    synced_subjects: Vec<Subject>,
}

impl DisplayFilter {
    pub fn new(entitlement: &Entitlement) -> Self {
        Self {
            synced_subjects: entitlement.allowed_subjects.clone(),
            ..Default::default()
        }
    }

    /// 选择要显示的科目（空集合恢复为全部）
    pub fn select_subjects(&mut self, subjects: impl IntoIterator<Item = Subject>) {
        let selected: BTreeSet<Subject> = subjects.into_iter().collect();
        self.subjects = if selected.is_empty() {
            None
        } else {
            Some(selected)
        };
    }

    /// 选择要显示的章节（空集合恢复为不限）
    pub fn select_chapters(&mut self, chapters: impl IntoIterator<Item = String>) {
        let selected: BTreeSet<String> = chapters
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        self.chapters = if selected.is_empty() {
            None
        } else {
            Some(selected)
        };
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into().trim().to_lowercase();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// 权限中的科目发生变化时重置科目和章节筛选
    ///
    /// 可选章节只从当前可见科目中计算，旧的章节筛选不再成立。返回是否发生了重置。
    pub fn sync_entitlement(&mut self, entitlement: &Entitlement) -> bool {
        if self.synced_subjects == entitlement.allowed_subjects {
            return false;
        }
        debug!(
            "授权科目变化 {:?} -> {:?}，重置科目/章节筛选",
            self.synced_subjects, entitlement.allowed_subjects
        );
        self.synced_subjects = entitlement.allowed_subjects.clone();
        self.subjects = None;
        self.chapters = None;
        true
    }

    /// 当前生效的显示科目（与可选科目取交集，保持可选科目的顺序）
    pub fn active_subjects(&self, available: &[Subject]) -> Vec<Subject> {
        available
            .iter()
            .filter(|s| self.subject_selected(s))
            .cloned()
            .collect()
    }

    fn subject_selected(&self, subject: &Subject) -> bool {
        self.subjects
            .as_ref()
            .map_or(true, |selected| selected.iter().any(|s| s.key() == subject.key()))
    }

    /// 展示层判断（不含权限）
    pub fn matches(&self, question: &Question) -> bool {
        if !self.subject_selected(&question.subject) {
            return false;
        }
        if let Some(chapters) = &self.chapters {
            if !chapters.contains(question.chapter.trim()) {
                return false;
            }
        }
        if !self.query.is_empty() {
            let q = self.query.as_str();
            return question.content.to_lowercase().contains(q)
                || question.subject.key().contains(q)
                || question.chapter.to_lowercase().contains(q);
        }
        true
    }

    /// 在已可见的题目上应用展示层过滤
    pub fn apply<'a>(&self, visible: &'a [Question]) -> Vec<&'a Question> {
        visible.iter().filter(|q| self.matches(q)).collect()
    }

    /// 当前显示科目下可选的章节
    pub fn available_chapters(&self, visible: &[Question]) -> Vec<String> {
        visible
            .iter()
            .filter(|q| self.subject_selected(&q.subject))
            .map(|q| q.chapter.trim().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
