use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{ChangePasswordRequest, LoginRequest, SignupRequest, UpdateUserRequest},
    repo::{RepoError, UserRepository},
    repo_types::{NewUser, PublicUser, User, UserChanges},
    validation::{self, UpdateInput},
};
use crate::{
    auth::{jwt::JwtKeys, password::CredentialStore},
    errors::{AppError, AppResult},
    state::AppState,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";
const EMAIL_TAKEN: &str = "Email is already taken";

/// Signup, login, profile and admin operations over the user repository.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    passwords: CredentialStore,
    keys: JwtKeys,
}

impl FromRef<AppState> for AccountService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.passwords.clone(),
            JwtKeys::from_ref(state),
        )
    }
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepository>, passwords: CredentialStore, keys: JwtKeys) -> Self {
        Self {
            users,
            passwords,
            keys,
        }
    }

    pub async fn signup(&self, req: SignupRequest) -> AppResult<PublicUser> {
        let input = validation::validate_signup(req).map_err(AppError::Validation)?;

        if self.users.find_by_email(&input.email).await?.is_some() {
            warn!(email = %input.email, "email already registered");
            return Err(AppError::Conflict("User with this email already exists".into()));
        }

        let password_hash = self.passwords.hash(input.password).await?;

        // A concurrent signup can slip past the pre-check; the unique
        // constraint turns that into EmailTaken -> Conflict.
        let user = self
            .users
            .insert(NewUser {
                name: input.name,
                age: input.age,
                email: input.email,
                password_hash,
                phone_num: input.phone_num,
                course: input.course,
                city: input.city,
            })
            .await?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(PublicUser::from(&user))
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<(PublicUser, String)> {
        let input = validation::validate_login(req).map_err(AppError::Validation)?;

        let Some(user) = self.users.find_by_email(&input.email).await? else {
            // Same argon2 cost as a real check, so response time does not
            // reveal whether the email is registered.
            self.passwords.verify_dummy(input.password).await?;
            warn!(email = %input.email, "login unknown email");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        };

        if !self.passwords.verify(input.password, &user.password_hash).await? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
        }

        let token = self.keys.sign(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok((PublicUser::from(&user), token))
    }

    pub fn profile(&self, current: &User) -> PublicUser {
        PublicUser::from(current)
    }

    pub async fn update_profile(&self, current: &User, req: UpdateUserRequest) -> AppResult<PublicUser> {
        let input = validation::validate_update(req).map_err(AppError::Validation)?;
        let user = self.apply_update(current, input).await?;
        info!(user_id = %user.id, "profile updated");
        Ok(user)
    }

    /// Administrative update of any user. Any authenticated caller may use it.
    pub async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> AppResult<PublicUser> {
        let input = validation::validate_update(req).map_err(AppError::Validation)?;
        let target = self
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        let user = self.apply_update(&target, input).await?;
        info!(user_id = %user.id, "user updated");
        Ok(user)
    }

    async fn apply_update(&self, target: &User, input: UpdateInput) -> AppResult<PublicUser> {
        if let Some(email) = input.email.as_deref().filter(|e| *e != target.email) {
            if let Some(existing) = self.users.find_by_email(email).await? {
                if existing.id != target.id {
                    warn!(user_id = %target.id, email = %email, "email already taken");
                    return Err(AppError::Conflict(EMAIL_TAKEN.into()));
                }
            }
        }

        let changes = UserChanges {
            name: input.name,
            age: input.age,
            email: input.email,
            password_hash: None,
            phone_num: input.phone_num,
            course: input.course,
            city: input.city,
        };
        let updated = match self.users.update(target.id, changes).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(AppError::NotFound("User not found".into())),
            Err(RepoError::EmailTaken) => return Err(AppError::Conflict(EMAIL_TAKEN.into())),
            Err(e) => return Err(e.into()),
        };
        Ok(PublicUser::from(&updated))
    }

    pub async fn change_password(&self, current: &User, req: ChangePasswordRequest) -> AppResult<()> {
        let input = validation::validate_change_password(req).map_err(AppError::Validation)?;

        let user = self
            .users
            .find_by_id(current.id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        if !self.passwords.verify(input.old_password, &user.password_hash).await? {
            warn!(user_id = %user.id, "change password with wrong old password");
            return Err(AppError::BadRequest("Old password is incorrect".into()));
        }

        let password_hash = self.passwords.hash(input.new_password).await?;
        let changes = UserChanges {
            password_hash: Some(password_hash),
            ..Default::default()
        };
        self.users
            .update(user.id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        info!(user_id = %user.id, "password changed");
        Ok(())
    }

    /// Administrative delete. Callers cannot remove themselves here.
    pub async fn delete_user(&self, caller: &User, id: Uuid) -> AppResult<Uuid> {
        if self.users.find_by_id(id).await?.is_none() {
            return Err(AppError::NotFound("User not found".into()));
        }
        if caller.id == id {
            warn!(user_id = %id, "self delete through admin route");
            return Err(AppError::BadRequest("You cannot delete your own account".into()));
        }
        if !self.users.delete(id).await? {
            return Err(AppError::NotFound("User not found".into()));
        }
        info!(user_id = %id, deleted_by = %caller.id, "user deleted");
        Ok(id)
    }

    pub async fn delete_account(&self, current: &User) -> AppResult<()> {
        self.users.delete(current.id).await?;
        info!(user_id = %current.id, "account deleted");
        Ok(())
    }

    pub async fn list_users(&self) -> AppResult<Vec<PublicUser>> {
        Ok(self.users.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::password::test_store, config::JwtConfig, users::memory::InMemoryUserRepository,
    };

    fn service() -> (AccountService, Arc<InMemoryUserRepository>) {
        let repo = Arc::new(InMemoryUserRepository::default());
        let keys = JwtKeys::from(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_seconds: 3600,
        });
        (AccountService::new(repo.clone(), test_store(), keys), repo)
    }

    fn signup_req(email: &str) -> SignupRequest {
        SignupRequest {
            name: Some("Ann".into()),
            age: Some(30.into()),
            email: Some(email.into()),
            password: Some("secret1".into()),
            phone_num: Some("1234567890".into()),
            course: Some("CS".into()),
            city: Some("NY".into()),
            ..Default::default()
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    async fn stored(repo: &InMemoryUserRepository, id: Uuid) -> User {
        repo.find_by_id(id).await.unwrap().expect("user exists")
    }

    #[tokio::test]
    async fn signup_then_login() {
        let (svc, repo) = service();
        let user = svc.signup(signup_req("a@x.com")).await.expect("signup");
        assert_eq!(user.email, "a@x.com");

        let row = stored(&repo, user.id).await;
        assert_ne!(row.password_hash.as_str(), "secret1");

        let (logged_in, token) = svc.login(login_req("a@x.com", "secret1")).await.expect("login");
        assert_eq!(logged_in.id, user.id);
        assert_eq!(svc.keys.verify(&token), Ok(user.id));
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts() {
        let (svc, _) = service();
        svc.signup(signup_req("a@x.com")).await.expect("first signup");
        let err = svc.signup(signup_req("A@X.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn concurrent_signups_with_same_email_admit_one() {
        let (svc, repo) = service();
        let (a, b) = tokio::join!(
            svc.signup(signup_req("race@x.com")),
            svc.signup(signup_req("race@x.com"))
        );
        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::Conflict(_)))));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn login_failures_share_one_message() {
        let (svc, _) = service();
        svc.signup(signup_req("a@x.com")).await.unwrap();

        let unknown = svc.login(login_req("b@x.com", "secret1")).await.unwrap_err();
        let wrong = svc.login(login_req("a@x.com", "secret2")).await.unwrap_err();
        for err in [unknown, wrong] {
            match err {
                AppError::Unauthorized(msg) => assert_eq!(msg, INVALID_CREDENTIALS),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn update_profile_keeps_other_fields() {
        let (svc, repo) = service();
        let user = svc.signup(signup_req("a@x.com")).await.unwrap();
        let current = stored(&repo, user.id).await;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let updated = svc
            .update_profile(
                &current,
                UpdateUserRequest {
                    city: Some("LA".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.city, "LA");
        assert_eq!(updated.name, user.name);
        assert_eq!(updated.email, user.email);
        assert!(updated.updated_at > user.updated_at);
        assert_eq!(stored(&repo, user.id).await.password_hash, current.password_hash);
    }

    #[tokio::test]
    async fn update_email_to_taken_address_conflicts() {
        let (svc, repo) = service();
        svc.signup(signup_req("a@x.com")).await.unwrap();
        let b = svc.signup(signup_req("b@x.com")).await.unwrap();
        let current = stored(&repo, b.id).await;

        let err = svc
            .update_profile(
                &current,
                UpdateUserRequest {
                    email: Some("a@x.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == EMAIL_TAKEN));

        // Re-submitting one's own email is not a conflict.
        svc.update_profile(
            &current,
            UpdateUserRequest {
                email: Some("b@x.com".into()),
                ..Default::default()
            },
        )
        .await
        .expect("own email");
    }

    #[tokio::test]
    async fn admin_update_unknown_user_is_not_found() {
        let (svc, _) = service();
        let err = svc
            .update_user(
                Uuid::new_v4(),
                UpdateUserRequest {
                    name: Some("Bob".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn change_password_with_wrong_old_leaves_hash() {
        let (svc, repo) = service();
        let user = svc.signup(signup_req("a@x.com")).await.unwrap();
        let current = stored(&repo, user.id).await;

        let err = svc
            .change_password(
                &current,
                ChangePasswordRequest {
                    old_password: Some("nope-nope".into()),
                    new_password: Some("secret2".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Old password is incorrect"));
        assert_eq!(stored(&repo, user.id).await.password_hash, current.password_hash);
    }

    #[tokio::test]
    async fn change_password_rehashes_new_value() {
        let (svc, repo) = service();
        let user = svc.signup(signup_req("a@x.com")).await.unwrap();
        let current = stored(&repo, user.id).await;

        svc.change_password(
            &current,
            ChangePasswordRequest {
                old_password: Some("secret1".into()),
                new_password: Some("secret2".into()),
            },
        )
        .await
        .expect("change password");

        let row = stored(&repo, user.id).await;
        assert_ne!(row.password_hash.as_str(), "secret2");
        assert!(svc.login(login_req("a@x.com", "secret2")).await.is_ok());
        assert!(svc.login(login_req("a@x.com", "secret1")).await.is_err());
    }

    #[tokio::test]
    async fn admin_delete_of_self_is_refused() {
        let (svc, repo) = service();
        let user = svc.signup(signup_req("a@x.com")).await.unwrap();
        let current = stored(&repo, user.id).await;

        let err = svc.delete_user(&current, user.id).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn admin_delete_removes_other_user() {
        let (svc, repo) = service();
        let a = svc.signup(signup_req("a@x.com")).await.unwrap();
        let b = svc.signup(signup_req("b@x.com")).await.unwrap();
        let caller = stored(&repo, a.id).await;

        assert_eq!(svc.delete_user(&caller, b.id).await.unwrap(), b.id);
        assert_eq!(repo.len(), 1);

        let err = svc.delete_user(&caller, b.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_account_and_list() {
        let (svc, repo) = service();
        let a = svc.signup(signup_req("a@x.com")).await.unwrap();
        svc.signup(signup_req("b@x.com")).await.unwrap();
        assert_eq!(svc.list_users().await.unwrap().len(), 2);

        let current = stored(&repo, a.id).await;
        svc.delete_account(&current).await.unwrap();
        let users = svc.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "b@x.com");
    }
}
