//! 当前用户的身份与权限
//!
//! 身份别名在加载时一次性归并为 [`ViewerIdentity`]，过滤时不再逐个比较。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::subject::Subject;

/// 角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Professor,
    Student,
    Institute,
}

/// 订阅状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Trial,
    Expired,
    Cancelled,
}

/// 用户身份
///
/// 题目的 `assigned_to` 可能写的是内部 ID、档案 ID 或邮箱，三者任一命中即视为同一用户
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerIdentity {
    aliases: BTreeSet<String>,
}

impl ViewerIdentity {
    pub fn resolve(internal_id: &str, profile_id: Option<&str>, email: Option<&str>) -> Self {
        let aliases = std::iter::once(Some(internal_id))
            .chain([profile_id, email])
            .flatten()
            .map(str::trim)
            .filter(|alias| !alias.is_empty())
            .map(str::to_string)
            .collect();
        Self { aliases }
    }

    /// 判断指派引用是否指向当前用户
    pub fn matches(&self, reference: &str) -> bool {
        self.aliases.contains(reference.trim())
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(String::as_str)
    }
}

/// 用户权限
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entitlement {
    pub role: Role,
    pub subscription_status: SubscriptionStatus,
    pub subscription_expiry: Option<DateTime<Utc>>,
    /// 允许访问的科目（非管理员不为空）
    pub allowed_subjects: Vec<Subject>,
    /// 允许访问的章节；为空或包含 "all" 表示不限章节
    pub allowed_chapters: Vec<String>,
}

impl Entitlement {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn chapters_unrestricted(&self) -> bool {
        self.allowed_chapters.is_empty()
            || self
                .allowed_chapters
                .iter()
                .any(|chapter| chapter.trim().eq_ignore_ascii_case("all"))
    }

    pub fn allows_subject(&self, subject: &Subject) -> bool {
        self.allowed_subjects
            .iter()
            .any(|allowed| allowed.key() == subject.key())
    }

    pub fn allows_chapter(&self, chapter: &str) -> bool {
        self.chapters_unrestricted()
            || self
                .allowed_chapters
                .iter()
                .any(|allowed| allowed.trim() == chapter.trim())
    }

    /// 订阅是否允许浏览题库
    pub fn has_catalog_access(&self, now: DateTime<Utc>) -> bool {
        if self.is_admin() {
            return true;
        }
        let status_ok = matches!(
            self.subscription_status,
            SubscriptionStatus::Active | SubscriptionStatus::Trial
        );
        let not_expired = self.subscription_expiry.map_or(true, |expiry| expiry > now);
        status_ok && not_expired && !self.allowed_subjects.is_empty()
    }
}

/// 当前用户（身份 + 权限）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub identity: ViewerIdentity,
    pub entitlement: Entitlement,
}

impl Viewer {
    /// 用户信息不可用时的占位用户，看到的是空题库
    pub fn without_access() -> Self {
        Self {
            identity: ViewerIdentity::default(),
            entitlement: Entitlement {
                role: Role::Student,
                subscription_status: SubscriptionStatus::Expired,
                subscription_expiry: None,
                allowed_subjects: Vec::new(),
                allowed_chapters: Vec::new(),
            },
        }
    }
}

/// 用户档案文件（viewer.toml）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewerProfile {
    pub id: String,
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub subscription_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub allowed_subjects: Vec<String>,
    #[serde(default)]
    pub allowed_chapters: Vec<String>,
}

impl ViewerProfile {
    /// 归并身份别名，得到过滤用的 Viewer
    pub fn into_viewer(self) -> Viewer {
        let identity =
            ViewerIdentity::resolve(&self.id, self.profile_id.as_deref(), self.email.as_deref());
        let mut allowed_subjects: Vec<Subject> = Vec::new();
        for subject in self.allowed_subjects.iter().map(|s| Subject::parse(s)) {
            if !subject.is_blank() && !allowed_subjects.contains(&subject) {
                allowed_subjects.push(subject);
            }
        }
        Viewer {
            identity,
            entitlement: Entitlement {
                role: self.role,
                subscription_status: self.subscription_status,
                subscription_expiry: self.subscription_expiry,
                allowed_subjects,
                allowed_chapters: self.allowed_chapters,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entitlement(chapters: &[&str]) -> Entitlement {
        Entitlement {
            role: Role::Student,
            subscription_status: SubscriptionStatus::Active,
            subscription_expiry: None,
            allowed_subjects: vec![Subject::Maths],
            allowed_chapters: chapters.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_identity_matches_any_alias() {
        let identity = ViewerIdentity::resolve("user-42", Some("profile-7"), Some("a@b.com"));
        assert!(identity.matches("user-42"));
        assert!(identity.matches("profile-7"));
        assert!(identity.matches("a@b.com"));
        assert!(!identity.matches("user-43"));
    }

    #[test]
    fn test_identity_ignores_blank_aliases() {
        let identity = ViewerIdentity::resolve("user-1", Some(""), None);
        assert_eq!(identity.aliases().count(), 1);
        assert!(!identity.matches(""));
    }

    #[test]
    fn test_empty_chapters_means_unrestricted() {
        assert!(entitlement(&[]).chapters_unrestricted());
        assert!(entitlement(&["All"]).chapters_unrestricted());
        assert!(!entitlement(&["Calculus"]).chapters_unrestricted());
        assert!(entitlement(&["Calculus"]).allows_chapter("Calculus"));
        assert!(!entitlement(&["Calculus"]).allows_chapter("Algebra"));
    }

    #[test]
    fn test_catalog_access_requires_live_subscription() {
        let now = Utc::now();
        let mut e = entitlement(&[]);
        assert!(e.has_catalog_access(now));

        e.subscription_expiry = Some(now - Duration::days(1));
        assert!(!e.has_catalog_access(now));

        e.subscription_expiry = Some(now + Duration::days(30));
        e.subscription_status = SubscriptionStatus::Cancelled;
        assert!(!e.has_catalog_access(now));

        e.role = Role::Admin;
        assert!(e.has_catalog_access(now));
    }

    #[test]
    fn test_placeholder_viewer_has_no_access() {
        let viewer = Viewer::without_access();
        assert!(!viewer.entitlement.has_catalog_access(Utc::now()));
        assert_eq!(viewer.identity.aliases().count(), 0);
    }

    #[test]
    fn test_profile_normalizes_subjects() {
        let profile: ViewerProfile = toml::from_str(
            r#"
            id = "user-42"
            email = "student@example.com"
            role = "student"
            allowed_subjects = ["MATHS", "physics", "math"]
            "#,
        )
        .unwrap();
        let viewer = profile.into_viewer();
        assert_eq!(
            viewer.entitlement.allowed_subjects,
            vec![Subject::Maths, Subject::Physics]
        );
        assert!(viewer.identity.matches("student@example.com"));
    }
}
