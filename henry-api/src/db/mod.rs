//! Database Access Module
//!
//! This module provides the shared PostgreSQL pool (through the
//! [`ConnectionManager`]) and the queries issued by route handlers.
//!
//! Every query is parameterized. Handlers pass the effective principal for
//! data scoping and the caller for audit records; this module never reads
//! identity headers itself.

pub mod config;
pub mod manager;
pub mod postgres;

pub use config::DbConfig;
pub use manager::{
    ConnectionError, ConnectionManager, ConnectionPhase, PoolBackend, RetryPolicy, Sleeper,
    TokioSleeper,
};
pub use postgres::PgPoolBackend;

use async_trait::async_trait;
use henry_core::{DirectoryError, Principal, PrincipalDirectory, PrincipalId, Role};
use std::sync::Arc;
use tokio_postgres::Row;

use crate::error::{ApiError, ApiResult};
use crate::types::*;

// ============================================================================
// DATABASE CLIENT WRAPPER
// ============================================================================

/// Database client that wraps the connection manager and provides
/// high-level operations for route handlers.
#[derive(Clone)]
pub struct DbClient {
    manager: Arc<ConnectionManager<PgPoolBackend>>,
}

impl DbClient {
    /// Create a new database client around an existing manager.
    pub fn new(manager: Arc<ConnectionManager<PgPoolBackend>>) -> Self {
        Self { manager }
    }

    /// Create a new database client from configuration. No connection is
    /// opened until the pool is first acquired.
    pub fn from_config(config: &DbConfig) -> Self {
        let backend = PgPoolBackend::new(config.clone());
        Self::new(Arc::new(ConnectionManager::new(
            backend,
            config.retry_policy(),
        )))
    }

    pub fn manager(&self) -> &Arc<ConnectionManager<PgPoolBackend>> {
        &self.manager
    }

    /// Build the pool now. Used at startup so exhaustion aborts the process.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.manager.acquire_pool().await.map(|_| ())
    }

    /// Get a connection from the shared pool.
    async fn get_conn(&self) -> ApiResult<deadpool_postgres::Object> {
        let pool = self.manager.acquire_pool().await?;
        pool.get().await.map_err(ApiError::from)
    }

    /// Get a connection from a pool that just passed a probe.
    async fn get_healthy_conn(&self) -> ApiResult<deadpool_postgres::Object> {
        let pool = self.manager.get_healthy_connection().await?;
        pool.get().await.map_err(ApiError::from)
    }

    // ========================================================================
    // HEALTH
    // ========================================================================

    /// Current database time, through the plain pool.
    pub async fn server_time(&self) -> ApiResult<henry_core::Timestamp> {
        let conn = self.get_conn().await?;
        let row = conn.query_one("SELECT now() AS now", &[]).await?;
        Ok(row.try_get("now")?)
    }

    /// Server time and version, through a health-checked pool.
    pub async fn health_snapshot(&self) -> ApiResult<DatabaseSnapshot> {
        let conn = self.get_healthy_conn().await?;
        let row = conn
            .query_one("SELECT now() AS server_time, version() AS version", &[])
            .await?;
        Ok(DatabaseSnapshot {
            server_time: row.try_get("server_time")?,
            version: row.try_get("version")?,
        })
    }

    /// Connection details, through a health-checked pool.
    pub async fn database_details(&self) -> ApiResult<DatabaseDetails> {
        let conn = self.get_healthy_conn().await?;
        let row = conn
            .query_one(
                "SELECT now() AS server_time, current_database() AS database_name, \
                 host(inet_server_addr()) AS server_name, version() AS version",
                &[],
            )
            .await?;
        Ok(DatabaseDetails {
            server_time: row.try_get("server_time")?,
            database_name: row.try_get("database_name")?,
            server_name: row.try_get("server_name")?,
            version: row.try_get("version")?,
        })
    }

    // ========================================================================
    // PRINCIPAL OPERATIONS
    // ========================================================================

    /// Look up a principal by id regardless of active status.
    pub async fn principal_get(&self, id: PrincipalId) -> ApiResult<Option<Principal>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                "SELECT id, email, full_name, role, is_active FROM users WHERE id = $1",
                &[&id],
            )
            .await?;
        row.map(|r| principal_from_row(&r)).transpose()
    }

    // ========================================================================
    // USER OPERATIONS
    // ========================================================================

    /// Profile with conversation count, total cost and last activity.
    pub async fn user_profile(&self, id: PrincipalId) -> ApiResult<Option<UserProfile>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                r#"
                SELECT
                    u.id, u.email, u.full_name, u.role, u.is_active, u.created_at, u.updated_at,
                    (SELECT COUNT(*) FROM conversations c WHERE c.user_id = u.id)
                        AS conversation_count,
                    (SELECT SUM(ut.cost_estimate)::float8 FROM usage_tracking ut
                        WHERE ut.user_id = u.id) AS total_cost_estimate,
                    (SELECT MAX(ut.created_at) FROM usage_tracking ut
                        WHERE ut.user_id = u.id) AS last_activity
                FROM users u
                WHERE u.id = $1
                "#,
                &[&id],
            )
            .await?;

        row.map(|r| -> ApiResult<UserProfile> {
            Ok(UserProfile {
                id: r.try_get("id")?,
                email: r.try_get("email")?,
                full_name: r.try_get("full_name")?,
                role: role_from_row(&r)?,
                is_active: r.try_get("is_active")?,
                created_at: r.try_get("created_at")?,
                updated_at: r.try_get("updated_at")?,
                conversation_count: r.try_get("conversation_count")?,
                total_cost_estimate: r.try_get("total_cost_estimate")?,
                last_activity: r.try_get("last_activity")?,
            })
        })
        .transpose()
    }

    /// Whether another user already owns this email.
    pub async fn user_email_taken(&self, email: &str, except: PrincipalId) -> ApiResult<bool> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND id <> $2) AS taken",
                &[&email, &except],
            )
            .await?;
        Ok(row.try_get("taken")?)
    }

    /// Update name and email; absent fields keep their value. Returns false
    /// when no such user exists.
    pub async fn user_update_profile(
        &self,
        id: PrincipalId,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> ApiResult<bool> {
        let conn = self.get_conn().await?;
        let updated = conn
            .execute(
                r#"
                UPDATE users
                SET full_name = COALESCE($2, full_name),
                    email = COALESCE($3, email),
                    updated_at = now()
                WHERE id = $1
                "#,
                &[&id, &full_name, &email],
            )
            .await?;
        Ok(updated > 0)
    }

    /// Whether any user, active or not, owns this email.
    pub async fn user_email_exists(&self, email: &str) -> ApiResult<bool> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1) AS taken",
                &[&email],
            )
            .await?;
        Ok(row.try_get("taken")?)
    }

    /// Insert an active user together with default preferences.
    pub async fn user_create(&self, user: &NewUser) -> ApiResult<PrincipalId> {
        let mut conn = self.get_conn().await?;
        let id = PrincipalId::new_v4();
        let role = user.role.as_str();

        let tx = conn.transaction().await?;
        tx.execute(
            r#"
            INSERT INTO users (id, azure_id, email, full_name, role, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, true, now(), now())
            "#,
            &[&id, &user.azure_id, &user.email, &user.full_name, &role],
        )
        .await?;
        tx.execute(
            r#"
            INSERT INTO user_preferences
                (user_id, theme, language, timezone, notification_email,
                 notification_push, ai_model_preference, created_at, updated_at)
            VALUES ($1, $2, $3, $4, true, true, $5, now(), now())
            "#,
            &[
                &id,
                &DEFAULT_THEME,
                &DEFAULT_LANGUAGE,
                &DEFAULT_TIMEZONE,
                &DEFAULT_AI_MODEL,
            ],
        )
        .await?;
        tx.commit().await?;

        Ok(id)
    }

    /// Soft delete. Returns false when no such user exists.
    pub async fn user_deactivate(&self, id: PrincipalId) -> ApiResult<bool> {
        let conn = self.get_conn().await?;
        let updated = conn
            .execute(
                "UPDATE users SET is_active = false, updated_at = now() WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(updated > 0)
    }

    // ========================================================================
    // PREFERENCE OPERATIONS
    // ========================================================================

    pub async fn preferences_get(&self, user_id: PrincipalId) -> ApiResult<Option<Preferences>> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                r#"
                SELECT theme, language, timezone, notification_email, notification_push,
                       ai_model_preference, created_at, updated_at
                FROM user_preferences
                WHERE user_id = $1
                "#,
                &[&user_id],
            )
            .await?;
        row.map(|r| preferences_from_row(&r)).transpose()
    }

    /// Insert default preferences, or return the row a concurrent request
    /// inserted first.
    pub async fn preferences_create_default(&self, user_id: PrincipalId) -> ApiResult<Preferences> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                r#"
                INSERT INTO user_preferences
                    (user_id, theme, language, timezone, notification_email,
                     notification_push, ai_model_preference, created_at, updated_at)
                VALUES ($1, $2, $3, $4, true, true, $5, now(), now())
                ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
                RETURNING theme, language, timezone, notification_email, notification_push,
                          ai_model_preference, created_at, updated_at
                "#,
                &[
                    &user_id,
                    &DEFAULT_THEME,
                    &DEFAULT_LANGUAGE,
                    &DEFAULT_TIMEZONE,
                    &DEFAULT_AI_MODEL,
                ],
            )
            .await?;
        preferences_from_row(&row)
    }

    /// Partial upsert: missing fields keep the stored value, or take the
    /// default when the row is new.
    pub async fn preferences_upsert(
        &self,
        user_id: PrincipalId,
        req: &UpdatePreferencesRequest,
    ) -> ApiResult<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            r#"
            INSERT INTO user_preferences
                (user_id, theme, language, timezone, notification_email,
                 notification_push, ai_model_preference, created_at, updated_at)
            VALUES (
                $1,
                COALESCE($2, $8),
                COALESCE($3, $9),
                COALESCE($4, $10),
                COALESCE($5, true),
                COALESCE($6, true),
                COALESCE($7, $11),
                now(),
                now()
            )
            ON CONFLICT (user_id) DO UPDATE SET
                theme = COALESCE($2, user_preferences.theme),
                language = COALESCE($3, user_preferences.language),
                timezone = COALESCE($4, user_preferences.timezone),
                notification_email = COALESCE($5, user_preferences.notification_email),
                notification_push = COALESCE($6, user_preferences.notification_push),
                ai_model_preference = COALESCE($7, user_preferences.ai_model_preference),
                updated_at = now()
            "#,
            &[
                &user_id,
                &req.theme,
                &req.language,
                &req.timezone,
                &req.notification_email,
                &req.notification_push,
                &req.ai_model_preference,
                &DEFAULT_THEME,
                &DEFAULT_LANGUAGE,
                &DEFAULT_TIMEZONE,
                &DEFAULT_AI_MODEL,
            ],
        )
        .await?;
        Ok(())
    }

    // ========================================================================
    // ADMIN OPERATIONS
    // ========================================================================

    /// System-wide aggregates for the admin dashboard.
    pub async fn admin_stats(&self) -> ApiResult<AdminStats> {
        let conn = self.get_conn().await?;

        let users = conn
            .query_one(
                r#"
                SELECT
                    COUNT(*) AS total_users,
                    COUNT(*) FILTER (WHERE is_active) AS active_users,
                    COUNT(*) FILTER (WHERE role = 'admin') AS admin_users,
                    COUNT(*) FILTER (WHERE created_at >= now() - interval '30 days')
                        AS new_users_30_days
                FROM users
                "#,
                &[],
            )
            .await?;

        let conversations = conn
            .query_one(
                r#"
                SELECT
                    COUNT(*) AS total_conversations,
                    COUNT(*) FILTER (WHERE c.created_at >= now() - interval '30 days')
                        AS conversations_30_days,
                    COUNT(*) FILTER (WHERE c.is_archived) AS archived_conversations,
                    AVG(c.message_count)::float8 AS avg_messages_per_conversation
                FROM (
                    SELECT conv.created_at, conv.is_archived, COUNT(m.id) AS message_count
                    FROM conversations conv
                    LEFT JOIN messages m ON m.conversation_id = conv.id
                    GROUP BY conv.id, conv.created_at, conv.is_archived
                ) c
                "#,
                &[],
            )
            .await?;

        let messages = conn
            .query_one(
                r#"
                SELECT
                    COUNT(*) AS total_messages,
                    COUNT(*) FILTER (WHERE created_at >= now() - interval '30 days')
                        AS messages_30_days,
                    COUNT(*) FILTER (WHERE role = 'user') AS user_messages,
                    COUNT(*) FILTER (WHERE role = 'assistant') AS assistant_messages,
                    AVG(tokens_used)::float8 AS avg_tokens_per_message
                FROM messages
                "#,
                &[],
            )
            .await?;

        let usage = conn
            .query_one(
                r#"
                SELECT
                    COUNT(*) AS total_usage_events,
                    COALESCE(SUM(tokens_used), 0)::int8 AS total_tokens,
                    COALESCE(SUM(cost_estimate), 0)::float8 AS total_cost,
                    COUNT(*) FILTER (WHERE created_at >= now() - interval '30 days')
                        AS usage_events_30_days,
                    COALESCE(SUM(cost_estimate)
                        FILTER (WHERE created_at >= now() - interval '30 days'), 0)::float8
                        AS cost_30_days
                FROM usage_tracking
                "#,
                &[],
            )
            .await?;

        let top_models = conn
            .query(
                r#"
                SELECT
                    model_used,
                    COUNT(*) AS usage_count,
                    COALESCE(SUM(tokens_used), 0)::int8 AS total_tokens,
                    COALESCE(SUM(cost_estimate), 0)::float8 AS total_cost
                FROM usage_tracking
                WHERE model_used IS NOT NULL
                  AND created_at >= now() - interval '30 days'
                GROUP BY model_used
                ORDER BY usage_count DESC
                LIMIT 5
                "#,
                &[],
            )
            .await?;

        let recent_activity = conn
            .query(
                r#"
                SELECT
                    created_at::date AS date,
                    COUNT(DISTINCT user_id) AS active_users,
                    COUNT(*) AS total_events
                FROM usage_tracking
                WHERE created_at >= now() - interval '7 days'
                GROUP BY created_at::date
                ORDER BY date DESC
                "#,
                &[],
            )
            .await?;

        Ok(AdminStats {
            generated_at: chrono::Utc::now(),
            users: UserStats {
                total_users: users.try_get("total_users")?,
                active_users: users.try_get("active_users")?,
                admin_users: users.try_get("admin_users")?,
                new_users_30_days: users.try_get("new_users_30_days")?,
            },
            conversations: ConversationStats {
                total_conversations: conversations.try_get("total_conversations")?,
                conversations_30_days: conversations.try_get("conversations_30_days")?,
                archived_conversations: conversations.try_get("archived_conversations")?,
                avg_messages_per_conversation: conversations
                    .try_get("avg_messages_per_conversation")?,
            },
            messages: MessageStats {
                total_messages: messages.try_get("total_messages")?,
                messages_30_days: messages.try_get("messages_30_days")?,
                user_messages: messages.try_get("user_messages")?,
                assistant_messages: messages.try_get("assistant_messages")?,
                avg_tokens_per_message: messages.try_get("avg_tokens_per_message")?,
            },
            usage: UsageStats {
                total_usage_events: usage.try_get("total_usage_events")?,
                total_tokens: usage.try_get("total_tokens")?,
                total_cost: usage.try_get("total_cost")?,
                usage_events_30_days: usage.try_get("usage_events_30_days")?,
                cost_30_days: usage.try_get("cost_30_days")?,
            },
            top_models: top_models
                .iter()
                .map(|r| -> ApiResult<ModelUsage> {
                    Ok(ModelUsage {
                        model_used: r.try_get("model_used")?,
                        usage_count: r.try_get("usage_count")?,
                        total_tokens: r.try_get("total_tokens")?,
                        total_cost: r.try_get("total_cost")?,
                    })
                })
                .collect::<ApiResult<Vec<_>>>()?,
            recent_activity: recent_activity
                .iter()
                .map(|r| -> ApiResult<DailyActivity> {
                    Ok(DailyActivity {
                        date: r.try_get("date")?,
                        active_users: r.try_get("active_users")?,
                        total_events: r.try_get("total_events")?,
                    })
                })
                .collect::<ApiResult<Vec<_>>>()?,
        })
    }

    /// One page of users, newest first, with the total matching count.
    pub async fn admin_list_users(
        &self,
        query: &ListUsersQuery,
        window: PageWindow,
    ) -> ApiResult<(Vec<AdminUserSummary>, i64)> {
        let conn = self.get_conn().await?;
        let pattern = query.search_pattern();
        let role: Option<&str> = query.role.as_ref().map(Role::as_str);

        let rows = conn
            .query(
                r#"
                SELECT
                    u.id, u.email, u.full_name, u.role, u.is_active, u.created_at, u.updated_at,
                    (SELECT COUNT(*) FROM conversations c WHERE c.user_id = u.id)
                        AS conversation_count,
                    (SELECT SUM(ut.cost_estimate)::float8 FROM usage_tracking ut
                        WHERE ut.user_id = u.id) AS total_cost,
                    (SELECT MAX(ut.created_at) FROM usage_tracking ut
                        WHERE ut.user_id = u.id) AS last_activity
                FROM users u
                WHERE ($1::text IS NULL OR u.email ILIKE $1 OR u.full_name ILIKE $1)
                  AND ($4::text IS NULL OR u.role = $4)
                  AND ($5::bool IS NULL OR u.is_active = $5)
                ORDER BY u.created_at DESC
                LIMIT $2 OFFSET $3
                "#,
                &[&pattern, &window.limit, &window.offset, &role, &query.is_active],
            )
            .await?;

        let total_row = conn
            .query_one(
                r#"
                SELECT COUNT(*) AS total FROM users u
                WHERE ($1::text IS NULL OR u.email ILIKE $1 OR u.full_name ILIKE $1)
                  AND ($2::text IS NULL OR u.role = $2)
                  AND ($3::bool IS NULL OR u.is_active = $3)
                "#,
                &[&pattern, &role, &query.is_active],
            )
            .await?;
        let total: i64 = total_row.try_get("total")?;

        let users = rows
            .iter()
            .map(|r| -> ApiResult<AdminUserSummary> {
                Ok(AdminUserSummary {
                    id: r.try_get("id")?,
                    email: r.try_get("email")?,
                    full_name: r.try_get("full_name")?,
                    role: role_from_row(r)?,
                    is_active: r.try_get("is_active")?,
                    created_at: r.try_get("created_at")?,
                    updated_at: r.try_get("updated_at")?,
                    conversation_count: r.try_get("conversation_count")?,
                    total_cost: r.try_get("total_cost")?,
                    last_activity: r.try_get("last_activity")?,
                })
            })
            .collect::<ApiResult<Vec<_>>>()?;

        Ok((users, total))
    }

    /// Update email, name, role and active flag; absent fields keep their
    /// value. Returns false when no such user exists.
    pub async fn admin_update_user(
        &self,
        id: PrincipalId,
        req: &UpdateUserRequest,
    ) -> ApiResult<bool> {
        let conn = self.get_conn().await?;
        let role: Option<&str> = req.role.as_ref().map(Role::as_str);
        let updated = conn
            .execute(
                r#"
                UPDATE users
                SET email = COALESCE($2, email),
                    full_name = COALESCE($3, full_name),
                    role = COALESCE($4, role),
                    is_active = COALESCE($5, is_active),
                    updated_at = now()
                WHERE id = $1
                "#,
                &[
                    &id,
                    &req.normalized_email(),
                    &req.full_name,
                    &role,
                    &req.is_active,
                ],
            )
            .await?;
        Ok(updated > 0)
    }

    /// Database time plus usage error and request counts for the last hour.
    pub async fn system_health(&self) -> ApiResult<SystemHealth> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                r#"
                SELECT
                    now() AS db_time,
                    COUNT(*) FILTER (WHERE metadata::text ILIKE '%error%') AS error_count,
                    COUNT(*) AS requests_last_hour
                FROM usage_tracking
                WHERE created_at >= now() - interval '1 hour'
                "#,
                &[],
            )
            .await?;

        Ok(SystemHealth {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now(),
            database: SystemDatabaseHealth {
                connected: true,
                current_time: row.try_get("db_time")?,
            },
            errors: ErrorCounts {
                last_hour: row.try_get("error_count")?,
            },
            performance: PerformanceMetrics {
                requests_last_hour: row.try_get("requests_last_hour")?,
            },
        })
    }
}

#[async_trait]
impl PrincipalDirectory for DbClient {
    async fn find_principal(&self, id: PrincipalId) -> Result<Option<Principal>, DirectoryError> {
        self.principal_get(id)
            .await
            .map_err(|e| DirectoryError::backend(e.message))
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn role_from_row(row: &Row) -> ApiResult<Option<Role>> {
    let role: Option<String> = row.try_get("role")?;
    Ok(role.map(Role::from))
}

fn principal_from_row(row: &Row) -> ApiResult<Principal> {
    Ok(Principal {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        role: role_from_row(row)?,
        is_active: row.try_get("is_active")?,
    })
}

fn preferences_from_row(row: &Row) -> ApiResult<Preferences> {
    Ok(Preferences {
        theme: row.try_get("theme")?,
        language: row.try_get("language")?,
        timezone: row.try_get("timezone")?,
        notification_email: row.try_get("notification_email")?,
        notification_push: row.try_get("notification_push")?,
        ai_model_preference: row.try_get("ai_model_preference")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
