use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::repo_types::PublicUser;

// Request bodies keep raw JSON values so that a wrong-typed field becomes
// one entry in the validation error list instead of a rejected body.
// Keys that are not fields land in `unknown`.

/// Request body for registration.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: Option<Value>,
    pub age: Option<Value>,
    pub email: Option<Value>,
    pub password: Option<Value>,
    pub phone_num: Option<Value>,
    pub course: Option<Value>,
    pub city: Option<Value>,
    #[serde(flatten)]
    pub unknown: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<Value>,
    pub password: Option<Value>,
    #[serde(flatten)]
    pub unknown: Map<String, Value>,
}

/// Partial profile update, shared by the self and admin routes.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<Value>,
    pub age: Option<Value>,
    pub email: Option<Value>,
    pub phone_num: Option<Value>,
    pub course: Option<Value>,
    pub city: Option<Value>,
    #[serde(flatten)]
    pub unknown: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<Value>,
    pub new_password: Option<Value>,
}

/// Success envelope: `{ success: true, message, ...payload }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, payload: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            payload,
        }
    }
}

impl ApiResponse<Empty> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::ok(message, Empty {})
    }
}

#[derive(Debug, Serialize)]
pub struct Empty {}

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct LoginPayload {
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UsersPayload {
    pub users: Vec<PublicUser>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedPayload {
    pub deleted_user_id: Uuid,
}
