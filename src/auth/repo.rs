use anyhow::Context;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::auth::{acl::Role, repo_types::User};

impl User {
    /// Find a user by username.
    pub async fn find_by_username(db: &SqlitePool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role, token
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(db)
        .await
        .context("find user by username")?;
        Ok(user)
    }

    pub async fn find_by_id(db: &SqlitePool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role, token
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    /// Create a new user with hashed password.
    ///
    /// Returns `None` when the username is already taken.
    pub async fn create(
        db: &SqlitePool,
        username: &str,
        password_hash: &str,
        role: Role,
    ) -> anyhow::Result<Option<User>> {
        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, username, password_hash, role)
            VALUES (?, ?, ?, ?)
            RETURNING id, username, password_hash, role, token
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(db)
        .await;

        match inserted {
            Ok(user) => Ok(Some(user)),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Ok(None),
            Err(e) => Err(e).context("insert user"),
        }
    }

    /// Replace the stored bearer token.
    pub async fn set_token(db: &SqlitePool, id: Uuid, token: &str) -> anyhow::Result<()> {
        let done = sqlx::query("UPDATE users SET token = ? WHERE id = ?")
            .bind(token)
            .bind(id)
            .execute(db)
            .await
            .context("store user token")?;
        anyhow::ensure!(done.rows_affected() == 1, "user {id} vanished while storing token");
        Ok(())
    }
}
