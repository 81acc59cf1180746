use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::password::HashedPassword;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub email: String,
    pub password_hash: HashedPassword, // Argon2 hash, never exposed in JSON
    pub phone_num: String,
    pub course: String,
    pub city: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Public part of the user returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub age: i32,
    pub email: String,
    pub phone_num: String,
    pub course: String,
    pub city: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            age: u.age,
            email: u.email.clone(),
            phone_num: u.phone_num.clone(),
            course: u.course.clone(),
            city: u.city.clone(),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Row to insert; the id and timestamps come from storage.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub age: i32,
    pub email: String,
    pub password_hash: HashedPassword,
    pub phone_num: String,
    pub course: String,
    pub city: String,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub email: Option<String>,
    pub password_hash: Option<HashedPassword>,
    pub phone_num: Option<String>,
    pub course: Option<String>,
    pub city: Option<String>,
}
