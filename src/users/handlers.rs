use axum::{
    extract::{FromRequest, Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        ApiResponse, ChangePasswordRequest, DeletedPayload, Empty, LoginPayload, LoginRequest,
        SignupRequest, UpdateUserRequest, UserPayload, UsersPayload,
    },
    services::AccountService,
};
use crate::{
    auth::extractors::CurrentUser,
    errors::{AppError, AppResult},
    state::AppState,
};

/// `Json` whose rejections render through [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

/// Routes that expect [`CurrentUser`] to be attached by the auth gate.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/account", axum::routing::delete(delete_account))
        .route("/change-password", put(change_password))
        .route("/users", get(list_users))
        .route("/users/:id", put(update_user).delete(delete_user))
}

fn parse_user_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid user ID".into()))
}

#[instrument(skip(accounts, payload))]
pub async fn signup(
    State(accounts): State<AccountService>,
    AppJson(payload): AppJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserPayload>>)> {
    let user = accounts.signup(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("User registered successfully", UserPayload { user })),
    ))
}

#[instrument(skip(accounts, payload))]
pub async fn login(
    State(accounts): State<AccountService>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginPayload>>> {
    let (user, token) = accounts.login(payload).await?;
    Ok(Json(ApiResponse::ok("Login successful", LoginPayload { user, token })))
}

#[instrument(skip_all)]
pub async fn get_profile(
    State(accounts): State<AccountService>,
    CurrentUser(current): CurrentUser,
) -> Json<ApiResponse<UserPayload>> {
    let user = accounts.profile(&current);
    Json(ApiResponse::ok("User profile retrieved successfully", UserPayload { user }))
}

#[instrument(skip_all)]
pub async fn update_profile(
    State(accounts): State<AccountService>,
    CurrentUser(current): CurrentUser,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<UserPayload>>> {
    let user = accounts.update_profile(&current, payload).await?;
    Ok(Json(ApiResponse::ok("Profile updated successfully", UserPayload { user })))
}

#[instrument(skip_all)]
pub async fn delete_account(
    State(accounts): State<AccountService>,
    CurrentUser(current): CurrentUser,
) -> AppResult<Json<ApiResponse<Empty>>> {
    accounts.delete_account(&current).await?;
    Ok(Json(ApiResponse::message("Account deleted successfully")))
}

#[instrument(skip_all)]
pub async fn change_password(
    State(accounts): State<AccountService>,
    CurrentUser(current): CurrentUser,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<Empty>>> {
    accounts.change_password(&current, payload).await?;
    Ok(Json(ApiResponse::message("Password updated successfully")))
}

#[instrument(skip_all)]
pub async fn list_users(
    State(accounts): State<AccountService>,
    CurrentUser(_): CurrentUser,
) -> AppResult<Json<ApiResponse<UsersPayload>>> {
    let users = accounts.list_users().await?;
    let count = users.len();
    Ok(Json(ApiResponse::ok(
        "Users retrieved successfully",
        UsersPayload { users, count },
    )))
}

#[instrument(skip(accounts, payload, _current))]
pub async fn update_user(
    State(accounts): State<AccountService>,
    CurrentUser(_current): CurrentUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<UserPayload>>> {
    let id = parse_user_id(&id)?;
    let user = accounts.update_user(id, payload).await?;
    Ok(Json(ApiResponse::ok("User updated successfully", UserPayload { user })))
}

#[instrument(skip(accounts, current))]
pub async fn delete_user(
    State(accounts): State<AccountService>,
    CurrentUser(current): CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<DeletedPayload>>> {
    let id = parse_user_id(&id)?;
    let deleted_user_id = accounts.delete_user(&current, id).await?;
    Ok(Json(ApiResponse::ok(
        "User deleted successfully",
        DeletedPayload { deleted_user_id },
    )))
}
