use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::{repo::CredentialStore, repo_types::Account},
    config::AppConfig,
    error::{AppError, AppResult},
    users::{
        repo::UserDirectory,
        repo_types::{NewUser, Role, User, UserRow, UserStatus},
    },
};

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("connect to database")?;
    migrate(&db).await?;
    Ok(db)
}

/// Applies `migrations/`. Startup aborts if this fails.
pub async fn migrate(db: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(db)
        .await
        .context("run migrations")?;
    info!("migrations applied");
    Ok(())
}

/// Postgres-backed user directory and credential store.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_user(row: UserRow) -> AppResult<User> {
    User::try_from(row).map_err(|e| AppError::Infrastructure(e.context("corrupt users row")))
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, nickname, role, status, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, nickname, role, status, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        row.map(into_user).transpose()
    }

    async fn exists_by_email(&self, email: &str) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar(r#"SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)"#)
                .bind(email)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }

    async fn create(&self, new: NewUser) -> AppResult<User> {
        if new.accounts.is_empty() {
            return Err(AppError::InvalidInput(
                "a user needs at least one account".into(),
            ));
        }

        let mut tx = self.db.begin().await?;
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, email, nickname, role, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, nickname, role, status, created_at
            "#,
        )
        .bind(new.id)
        .bind(&new.email)
        .bind(&new.nickname)
        .bind(new.role.as_str())
        .bind(new.status.as_str())
        .fetch_one(&mut *tx)
        .await?;

        for account in &new.accounts {
            sqlx::query(
                r#"
                INSERT INTO accounts (user_id, provider, provider_id, password_hash)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(new.id)
            .bind(&account.provider)
            .bind(&account.provider_id)
            .bind(account.password_hash.as_deref())
            .execute(&mut *tx)
            .await?;
        }
        // Dropping `tx` on an early return rolls the user back.
        tx.commit().await?;

        debug!(user_id = %new.id, accounts = new.accounts.len(), "user persisted");
        into_user(row)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET role = $2
            WHERE id = $1
            RETURNING id, email, nickname, role, status, created_at
            "#,
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(AppError::user_not_found)?;
        into_user(row)
    }

    async fn set_status(&self, id: Uuid, status: UserStatus) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users SET status = $2
            WHERE id = $1
            RETURNING id, email, nickname, role, status, created_at
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(AppError::user_not_found)?;
        into_user(row)
    }
}

#[derive(sqlx::FromRow)]
struct AccountUserRow {
    #[sqlx(flatten)]
    account: Account,
    email: String,
    nickname: String,
    role: String,
    status: String,
    created_at: time::OffsetDateTime,
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_with_user(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> AppResult<Option<(Account, User)>> {
        let row = sqlx::query_as::<_, AccountUserRow>(
            r#"
            SELECT a.id, a.user_id, a.provider, a.provider_id, a.password_hash,
                   u.email, u.nickname, u.role, u.status, u.created_at
            FROM accounts a
            JOIN users u ON u.id = a.user_id
            WHERE a.provider = $1 AND a.provider_id = $2
            "#,
        )
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user = into_user(UserRow {
            id: row.account.user_id,
            email: row.email,
            nickname: row.nickname,
            role: row.role,
            status: row.status,
            created_at: row.created_at,
        })?;
        Ok(Some((row.account, user)))
    }
}
