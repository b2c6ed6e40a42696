use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::RunQueryDsl;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde::Serialize;

use crate::error::{AgentDeskError, Result};

mod schema;
use schema::{chat_logs, users};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Owner of chat logs written by unattended and HTTP runs.
pub const SYSTEM_USER_ID: i32 = 1;

type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
type SqlitePool = Pool<SqliteAsyncConn>;
type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

#[derive(Debug, Clone, PartialEq, Serialize, Queryable)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub profile_picture: String,
    pub is_ai_user: bool,
    pub persona_json: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Queryable)]
pub struct ChatLogEntry {
    pub id: i32,
    pub user_id: i32,
    pub message: String,
    pub is_ai_response: bool,
    pub created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUser<'a> {
    id: i32,
    name: &'a str,
    email: &'a str,
    profile_picture: &'a str,
    is_ai_user: bool,
    persona_json: &'a str,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = chat_logs)]
struct NewChatLog<'a> {
    user_id: i32,
    message: &'a str,
    is_ai_response: bool,
    created_at: i64,
}

pub struct ChatLogStore {
    pool: SqlitePool,
}

impl ChatLogStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let sqlite_path = sqlite_path.as_ref();
        ensure_parent_dir(sqlite_path)?;
        run_migrations(sqlite_path).await?;

        let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(sqlite_path);
        let pool: SqlitePool = Pool::builder()
            .build(manager)
            .await
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Inserts the "System" user if it does not exist yet.
    pub async fn ensure_default_user(&self) -> Result<User> {
        let mut conn = self.conn().await?;
        let system = NewUser {
            id: SYSTEM_USER_ID,
            name: "System",
            email: "system@agent-desk.local",
            profile_picture: "",
            is_ai_user: false,
            persona_json: "{}",
            created_at: now_ts(),
        };
        diesel::insert_or_ignore_into(users::table)
            .values(&system)
            .execute(&mut conn)
            .await
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))?;

        users::table
            .find(SYSTEM_USER_ID)
            .first::<User>(&mut conn)
            .await
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))
    }

    pub async fn user(&self, user_id: i32) -> Result<Option<User>> {
        let mut conn = self.conn().await?;
        users::table
            .find(user_id)
            .first::<User>(&mut conn)
            .await
            .optional()
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))
    }

    pub async fn record_message(
        &self,
        user_id: i32,
        message: &str,
        is_ai_response: bool,
    ) -> Result<ChatLogEntry> {
        let mut conn = self.conn().await?;
        let new = NewChatLog {
            user_id,
            message,
            is_ai_response,
            created_at: now_ts(),
        };
        diesel::insert_into(chat_logs::table)
            .values(&new)
            .execute(&mut conn)
            .await
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))?;

        chat_logs::table
            .filter(chat_logs::user_id.eq(user_id))
            .order(chat_logs::id.desc())
            .first::<ChatLogEntry>(&mut conn)
            .await
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))
    }

    /// Newest first. A `limit` of zero returns everything.
    pub async fn history(&self, user_id: i32, limit: usize) -> Result<Vec<ChatLogEntry>> {
        let mut conn = self.conn().await?;
        let mut query = chat_logs::table
            .filter(chat_logs::user_id.eq(user_id))
            .into_boxed();
        if limit > 0 {
            query = query.limit(limit as i64);
        }
        query
            .order(chat_logs::id.desc())
            .load::<ChatLogEntry>(&mut conn)
            .await
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        self.pool
            .get()
            .await
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))
    }
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| AgentDeskError::Runtime(e.to_string()))?;
    }
    Ok(())
}

async fn run_migrations(database_url: &str) -> Result<()> {
    let database_url = database_url.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = SqliteConnection::establish(&database_url)
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| AgentDeskError::Runtime(e.to_string()))?;
        Ok::<_, AgentDeskError>(())
    })
    .await
    .map_err(|e| AgentDeskError::Runtime(e.to_string()))??;
    Ok(())
}
