//! Accounts on PostgreSQL

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use super::UserStore;
use crate::{
    error::{AppError, AppResult},
    models::user::{NewUserAccount, UserAccount},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UsersRepository {
    async fn insert(&self, account: NewUserAccount) -> AppResult<UserAccount> {
        let result = sqlx::query_as::<_, UserAccount>(
            r#"
            INSERT INTO user_accounts (username, password_hash, role, display_name)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(account.role)
        .bind(&account.display_name)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(
                format!("Username '{}' already exists", account.username),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_id(&self, id: i64) -> AppResult<Option<UserAccount>> {
        let user = sqlx::query_as::<_, UserAccount>("SELECT * FROM user_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn get_by_username(&self, username: &str) -> AppResult<Option<UserAccount>> {
        let user =
            sqlx::query_as::<_, UserAccount>("SELECT * FROM user_accounts WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
