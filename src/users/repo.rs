use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, PublicUser, User, UserChanges};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("email already exists")]
    EmailTaken,
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::EmailTaken,
            _ => RepoError::Database(err),
        }
    }
}

/// Persistence boundary for user records. Every call is a single-row,
/// atomic statement; email uniqueness is enforced by storage and surfaces
/// as [`RepoError::EmailTaken`].
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn insert(&self, user: NewUser) -> Result<User, RepoError>;
    /// Returns `None` when no row has this id.
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, RepoError>;
    async fn list(&self) -> Result<Vec<PublicUser>, RepoError>;
}

const USER_COLUMNS: &str =
    "id, name, age, email, password_hash, phone_num, course, city, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, RepoError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, age, email, password_hash, phone_num, course, city)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.name)
        .bind(user.age)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.phone_num)
        .bind(user.course)
        .bind(user.city)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name          = COALESCE($2, name),
                age           = COALESCE($3, age),
                email         = COALESCE($4, email),
                password_hash = COALESCE($5, password_hash),
                phone_num     = COALESCE($6, phone_num),
                course        = COALESCE($7, course),
                city          = COALESCE($8, city),
                updated_at    = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.age)
        .bind(changes.email)
        .bind(changes.password_hash)
        .bind(changes.phone_num)
        .bind(changes.course)
        .bind(changes.city)
        .fetch_optional(&self.db)
        .await?;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepoError> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<PublicUser>, RepoError> {
        let rows = sqlx::query_as::<_, PublicUser>(
            r#"
            SELECT id, name, age, email, phone_num, course, city, created_at, updated_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
