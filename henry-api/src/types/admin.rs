//! Admin dashboard types

use chrono::NaiveDate;
use henry_core::{PrincipalId, Role, Timestamp};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::types::UpdateUserRequest;

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_users: i64,
    pub active_users: i64,
    pub admin_users: i64,
    pub new_users_30_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_conversations: i64,
    pub conversations_30_days: i64,
    pub archived_conversations: i64,
    pub avg_messages_per_conversation: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageStats {
    pub total_messages: i64,
    pub messages_30_days: i64,
    pub user_messages: i64,
    pub assistant_messages: i64,
    pub avg_tokens_per_message: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_usage_events: i64,
    pub total_tokens: i64,
    pub total_cost: f64,
    pub usage_events_30_days: i64,
    pub cost_30_days: f64,
}

/// Usage of a single model over the last 30 days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model_used: String,
    pub usage_count: i64,
    pub total_tokens: i64,
    pub total_cost: f64,
}

/// Activity on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub active_users: i64,
    pub total_events: i64,
}

/// Response body of `GET /api/admin/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    pub generated_at: Timestamp,
    pub users: UserStats,
    pub conversations: ConversationStats,
    pub messages: MessageStats,
    pub usage: UsageStats,
    pub top_models: Vec<ModelUsage>,
    pub recent_activity: Vec<DailyActivity>,
}

// ============================================================================
// USER LISTING
// ============================================================================

/// Query parameters for `GET /api/admin/users` and `GET /api/users`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
    /// Exact role match.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Clamped page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
}

impl ListUsersQuery {
    /// Page is at least 1; limit is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn window(&self) -> PageWindow {
        self.window_or(DEFAULT_PAGE_SIZE)
    }

    /// Like [`Self::window`] with a different default limit.
    pub fn window_or(&self, default_limit: i64) -> PageWindow {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
        PageWindow {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }

    /// `ILIKE` pattern for the search term, with wildcards escaped.
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{}%", escaped))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUserSummary {
    pub id: PrincipalId,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: bool,
    pub created_at: Timestamp,
    pub updated_at: Option<Timestamp>,
    pub conversation_count: i64,
    pub total_cost: Option<f64>,
    pub last_activity: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub pages: i64,
}

impl Pagination {
    pub fn new(window: PageWindow, total: i64) -> Self {
        let pages = if total <= 0 {
            0
        } else {
            (total + window.limit - 1) / window.limit
        };
        Self {
            page: window.page,
            limit: window.limit,
            total,
            pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUsersResponse {
    pub users: Vec<AdminUserSummary>,
    pub pagination: Pagination,
}

/// Request body of `PUT /api/admin/users/:id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUpdateUserRequest {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl From<AdminUpdateUserRequest> for UpdateUserRequest {
    fn from(req: AdminUpdateUserRequest) -> Self {
        Self {
            role: req.role,
            is_active: req.is_active,
            ..Self::default()
        }
    }
}

// ============================================================================
// SYSTEM HEALTH
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDatabaseHealth {
    pub connected: bool,
    pub current_time: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorCounts {
    pub last_hour: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub requests_last_hour: i64,
}

/// Response body of `GET /api/admin/system-health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: String,
    pub timestamp: Timestamp,
    pub database: SystemDatabaseHealth,
    pub errors: ErrorCounts,
    pub performance: PerformanceMetrics,
}
