//! Postgres repository implementation using Diesel.
//!
//! This module implements the repository traits against a Postgres database
//! using the `events`, `users`, and `event_invitees` tables.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Connection health monitoring
//! - Automatic migration execution
//! - Pass-scoped transactions via a guard bound to a pooled connection
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task;

use crate::api::{Event, EventId, EventStatus, NewEvent, NewUser, User, UserId};
use crate::db::repository::{
    ErrorContext, EventRepository, RepositoryError, RepositoryResult, RepositoryTransaction,
    TransactionalRepository, UserRepository,
};

mod models;
mod schema;

use models::*;
use schema::*;

type PgPool = Pool<ConnectionManager<PgConnection>>;
type PgPooledConn = PooledConnection<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
    /// - `PG_POOL_MAX`: Maximum pool size (default: 10)
    /// - `PG_POOL_MIN`: Minimum pool size (default: 1)
    /// - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
    /// - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
    /// - `PG_MAX_RETRIES`: Maximum retry attempts (default: 3)
    /// - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let max_pool_size = std::env::var("PG_POOL_MAX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let min_pool_size = std::env::var("PG_POOL_MIN")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);

        let connection_timeout_sec = std::env::var("PG_CONN_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let idle_timeout_sec = std::env::var("PG_IDLE_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(600);

        let max_retries = std::env::var("PG_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let retry_delay_ms = std::env::var("PG_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(100);

        Ok(Self {
            database_url,
            max_pool_size,
            min_pool_size,
            connection_timeout_sec,
            idle_timeout_sec,
            max_retries,
            retry_delay_ms,
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of connections currently in use
    pub connections_in_use: u32,
    /// Number of idle connections
    pub idle_connections: u32,
    /// Total number of connections in the pool
    pub total_connections: u32,
    /// Maximum pool size
    pub max_size: u32,
    /// Total successful queries executed
    pub total_queries: u64,
    /// Total failed queries
    pub failed_queries: u64,
    /// Total retried operations
    pub retried_operations: u64,
}

/// Diesel-backed repository for Postgres.
///
/// This repository implementation provides:
/// - Connection pooling with configurable limits
/// - Automatic retry for transient failures
/// - Health monitoring and statistics
/// - Automatic schema migrations
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    // Metrics counters
    total_queries: std::sync::Arc<AtomicU64>,
    failed_queries: std::sync::Arc<AtomicU64>,
    retried_operations: std::sync::Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    ///
    /// # Arguments
    /// * `config` - Database configuration
    ///
    /// # Returns
    /// * `Ok(PostgresRepository)` on success
    /// * `Err(RepositoryError)` if connection or migration fails
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true) // Validate connections before use
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        // Run migrations once during initialization
        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        Ok(Self {
            pool,
            config,
            total_queries: std::sync::Arc::new(AtomicU64::new(0)),
            failed_queries: std::sync::Arc::new(AtomicU64::new(0)),
            retried_operations: std::sync::Arc::new(AtomicU64::new(0)),
        })
    }

    /// Run pending database migrations.
    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;
        Ok(())
    }

    /// Execute a database operation with automatic retry for transient failures.
    ///
    /// This method will retry the operation up to `max_retries` times if a
    /// retryable error occurs (connection errors, timeouts, serialization
    /// failures).
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2; // Exponential backoff
                }

                // Get connection
                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1))
                                .retryable(),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                // Execute the operation
                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Get pool health statistics.
    ///
    /// Returns current pool state and query statistics for monitoring.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }
}

// ==================== Sync query helpers ====================
// Shared between the pooled repository methods and the transaction guard,
// which both ultimately run against a `&mut PgConnection`.

fn row_to_event(row: EventRow, invitees: Vec<User>) -> RepositoryResult<Event> {
    let status = row
        .status
        .parse::<EventStatus>()
        .map_err(RepositoryError::internal)?;

    Ok(Event {
        id: EventId::new(row.id),
        title: row.title,
        description: row.description,
        status,
        start_time: row.start_time,
        end_time: row.end_time,
        created_at: row.created_at,
        updated_at: row.updated_at,
        invitees,
    })
}

fn load_invitees(conn: &mut PgConnection, event_id: i64) -> RepositoryResult<Vec<User>> {
    let rows: Vec<UserRow> = event_invitees::table
        .inner_join(users::table)
        .filter(event_invitees::event_id.eq(event_id))
        .select(UserRow::as_select())
        .order(users::id.asc())
        .load(conn)?;

    Ok(rows.into_iter().map(UserRow::into_user).collect())
}

fn get_event_impl(conn: &mut PgConnection, event_id: i64) -> RepositoryResult<Event> {
    let row = events::table
        .find(event_id)
        .select(EventRow::as_select())
        .first::<EventRow>(conn)
        .optional()?
        .ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Event {} not found", event_id),
                ErrorContext::new("get_event")
                    .with_entity("event")
                    .with_entity_id(event_id),
            )
        })?;

    let invitees = load_invitees(conn, event_id)?;
    row_to_event(row, invitees)
}

fn fetch_all_events_impl(conn: &mut PgConnection) -> RepositoryResult<Vec<Event>> {
    let rows: Vec<EventRow> = events::table
        .select(EventRow::as_select())
        .order(events::id.asc())
        .load(conn)?;

    let links: Vec<(i64, UserRow)> = event_invitees::table
        .inner_join(users::table)
        .select((event_invitees::event_id, UserRow::as_select()))
        .order((event_invitees::event_id.asc(), users::id.asc()))
        .load(conn)?;

    let mut invitees_by_event: HashMap<i64, Vec<User>> = HashMap::new();
    for (event_id, user) in links {
        invitees_by_event
            .entry(event_id)
            .or_default()
            .push(user.into_user());
    }

    rows.into_iter()
        .map(|row| {
            let invitees = invitees_by_event.remove(&row.id).unwrap_or_default();
            row_to_event(row, invitees)
        })
        .collect()
}

fn store_event_impl(conn: &mut PgConnection, event: &NewEvent) -> RepositoryResult<Event> {
    conn.transaction(|conn| {
        let new_row = NewEventRow {
            title: event.title.clone(),
            description: event.description.clone(),
            status: event.status.as_str().to_string(),
            start_time: event.start_time,
            end_time: event.end_time,
        };

        let row: EventRow = diesel::insert_into(events::table)
            .values(&new_row)
            .returning(EventRow::as_returning())
            .get_result(conn)?;

        // Link only invitees that actually exist; duplicates collapse.
        let mut seen = HashSet::new();
        let requested: Vec<i64> = event
            .invitee_ids
            .iter()
            .map(|id| id.value())
            .filter(|id| seen.insert(*id))
            .collect();

        let existing: HashSet<i64> = users::table
            .filter(users::id.eq_any(&requested))
            .select(users::id)
            .load::<i64>(conn)?
            .into_iter()
            .collect();

        let links: Vec<EventInviteeRow> = requested
            .into_iter()
            .filter(|id| existing.contains(id))
            .map(|user_id| EventInviteeRow {
                event_id: row.id,
                user_id,
            })
            .collect();

        if !links.is_empty() {
            diesel::insert_into(event_invitees::table)
                .values(&links)
                .execute(conn)?;
        }

        let invitees = load_invitees(conn, row.id)?;
        row_to_event(row, invitees)
    })
}

fn delete_event_impl(conn: &mut PgConnection, event_id: i64) -> RepositoryResult<()> {
    conn.transaction(|conn| {
        let found = events::table
            .find(event_id)
            .select(events::id)
            .first::<i64>(conn)
            .optional()?;

        if found.is_none() {
            return Err(RepositoryError::not_found_with_context(
                format!("Event {} not found", event_id),
                ErrorContext::new("delete_event")
                    .with_entity("event")
                    .with_entity_id(event_id),
            ));
        }

        // Detach from invitees before removing the event row.
        diesel::delete(event_invitees::table.filter(event_invitees::event_id.eq(event_id)))
            .execute(conn)?;
        diesel::delete(events::table.find(event_id)).execute(conn)?;

        Ok(())
    })
}

fn store_user_impl(conn: &mut PgConnection, user: &NewUser) -> RepositoryResult<User> {
    conn.transaction(|conn| {
        let row: UserRow = diesel::insert_into(users::table)
            .values(&NewUserRow {
                name: user.name.clone(),
            })
            .returning(UserRow::as_returning())
            .get_result(conn)?;

        let mut seen = HashSet::new();
        let requested: Vec<i64> = user
            .event_ids
            .iter()
            .map(|id| id.value())
            .filter(|id| seen.insert(*id))
            .collect();

        let existing: Vec<i64> = events::table
            .filter(events::id.eq_any(&requested))
            .select(events::id)
            .load::<i64>(conn)?;

        let links: Vec<EventInviteeRow> = existing
            .into_iter()
            .map(|event_id| EventInviteeRow {
                event_id,
                user_id: row.id,
            })
            .collect();

        if !links.is_empty() {
            diesel::insert_into(event_invitees::table)
                .values(&links)
                .execute(conn)?;
        }

        Ok(row.into_user())
    })
}

fn get_user_impl(conn: &mut PgConnection, user_id: i64) -> RepositoryResult<User> {
    users::table
        .find(user_id)
        .select(UserRow::as_select())
        .first::<UserRow>(conn)
        .optional()?
        .map(UserRow::into_user)
        .ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("User {} not found", user_id),
                ErrorContext::new("get_user")
                    .with_entity("user")
                    .with_entity_id(user_id),
            )
        })
}

fn fetch_users_by_ids_impl(
    conn: &mut PgConnection,
    user_ids: &[UserId],
) -> RepositoryResult<Vec<User>> {
    let mut seen = HashSet::new();
    let requested: Vec<i64> = user_ids
        .iter()
        .map(|id| id.value())
        .filter(|id| seen.insert(*id))
        .collect();

    let rows: Vec<UserRow> = users::table
        .filter(users::id.eq_any(&requested))
        .select(UserRow::as_select())
        .order(users::id.asc())
        .load(conn)?;

    Ok(rows.into_iter().map(UserRow::into_user).collect())
}

// ==================== Repository trait implementations ====================

#[async_trait]
impl EventRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1")
                .execute(conn)
                .map(|_| true)
                .map_err(RepositoryError::from)
        })
        .await
    }

    async fn fetch_all_events(&self) -> RepositoryResult<Vec<Event>> {
        self.with_conn(fetch_all_events_impl).await
    }

    async fn get_event(&self, event_id: EventId) -> RepositoryResult<Event> {
        self.with_conn(move |conn| get_event_impl(conn, event_id.value()))
            .await
    }

    async fn store_event(&self, event: &NewEvent) -> RepositoryResult<Event> {
        let event = event.clone();
        self.with_conn(move |conn| store_event_impl(conn, &event))
            .await
    }
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn store_user(&self, user: &NewUser) -> RepositoryResult<User> {
        let user = user.clone();
        self.with_conn(move |conn| store_user_impl(conn, &user))
            .await
    }

    async fn get_user(&self, user_id: UserId) -> RepositoryResult<User> {
        self.with_conn(move |conn| get_user_impl(conn, user_id.value()))
            .await
    }

    async fn fetch_users_by_ids(&self, user_ids: &[UserId]) -> RepositoryResult<Vec<User>> {
        let user_ids = user_ids.to_vec();
        self.with_conn(move |conn| fetch_users_by_ids_impl(conn, &user_ids))
            .await
    }
}

// ==================== Transaction guard ====================

/// Transaction scope bound to one pooled connection.
///
/// The connection moves in and out of `spawn_blocking` for each operation;
/// dropping the guard without committing rolls the transaction back before
/// the connection returns to the pool.
pub struct PostgresTransaction {
    conn: Option<PgPooledConn>,
    done: bool,
}

impl PostgresTransaction {
    async fn with_tx_conn<T, F>(&mut self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static,
    {
        let mut conn = self
            .conn
            .take()
            .ok_or_else(|| RepositoryError::transaction("Transaction already finished"))?;

        let (conn, result) = task::spawn_blocking(move || {
            let result = f(&mut conn);
            (conn, result)
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?;

        self.conn = Some(conn);
        result
    }
}

#[async_trait]
impl RepositoryTransaction for PostgresTransaction {
    async fn get_event(&mut self, event_id: EventId) -> RepositoryResult<Event> {
        self.with_tx_conn(move |conn| get_event_impl(conn, event_id.value()))
            .await
    }

    async fn fetch_users_by_ids(&mut self, user_ids: &[UserId]) -> RepositoryResult<Vec<User>> {
        let user_ids = user_ids.to_vec();
        self.with_tx_conn(move |conn| fetch_users_by_ids_impl(conn, &user_ids))
            .await
    }

    async fn save_event(&mut self, event: &NewEvent) -> RepositoryResult<Event> {
        let event = event.clone();
        self.with_tx_conn(move |conn| store_event_impl(conn, &event))
            .await
    }

    async fn delete_event(&mut self, event_id: EventId) -> RepositoryResult<()> {
        self.with_tx_conn(move |conn| delete_event_impl(conn, event_id.value()))
            .await
    }

    async fn commit(mut self: Box<Self>) -> RepositoryResult<()> {
        let result = self
            .with_tx_conn(|conn| {
                if let Err(commit_err) = AnsiTransactionManager::commit_transaction(conn) {
                    let _ = AnsiTransactionManager::rollback_transaction(conn);
                    return Err(RepositoryError::transaction(format!(
                        "Commit failed: {}",
                        commit_err
                    )));
                }
                Ok(())
            })
            .await;
        self.done = true;
        result
    }

    async fn rollback(mut self: Box<Self>) -> RepositoryResult<()> {
        let result = self
            .with_tx_conn(|conn| {
                AnsiTransactionManager::rollback_transaction(conn).map_err(|e| {
                    RepositoryError::transaction(format!("Rollback failed: {}", e))
                })
            })
            .await;
        self.done = true;
        result
    }
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = AnsiTransactionManager::rollback_transaction(&mut *conn) {
                log::warn!("Failed to roll back abandoned transaction: {}", e);
            }
        }
    }
}

#[async_trait]
impl TransactionalRepository for PostgresRepository {
    async fn begin_transaction(&self) -> RepositoryResult<Box<dyn RepositoryTransaction>> {
        let pool = self.pool.clone();

        let conn = task::spawn_blocking(move || -> RepositoryResult<PgPooledConn> {
            let mut conn = pool.get().map_err(RepositoryError::from)?;
            AnsiTransactionManager::begin_transaction(&mut *conn).map_err(|e| {
                RepositoryError::transaction(format!("Failed to begin transaction: {}", e))
            })?;
            Ok(conn)
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })??;

        Ok(Box::new(PostgresTransaction {
            conn: Some(conn),
            done: false,
        }))
    }
}
