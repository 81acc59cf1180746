//! In-process [`UserRepository`] used by the service and router tests.

use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    repo::{RepoError, UserRepository},
    repo_types::{NewUser, PublicUser, User, UserChanges},
};

#[derive(Default)]
pub struct InMemoryUserRepository {
    rows: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    fn email_taken(rows: &HashMap<Uuid, User>, email: &str, except: Option<Uuid>) -> bool {
        rows.values()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.values().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, RepoError> {
        let mut rows = self.rows.lock().unwrap();
        if Self::email_taken(&rows, &user.email, None) {
            return Err(RepoError::EmailTaken);
        }
        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            age: user.age,
            email: user.email,
            password_hash: user.password_hash,
            phone_num: user.phone_num,
            course: user.course,
            city: user.city,
            created_at: now,
            updated_at: now,
        };
        rows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, RepoError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(email) = &changes.email {
            if Self::email_taken(&rows, email, Some(id)) {
                return Err(RepoError::EmailTaken);
            }
        }
        let Some(user) = rows.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(v) = changes.name {
            user.name = v;
        }
        if let Some(v) = changes.age {
            user.age = v;
        }
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.password_hash {
            user.password_hash = v;
        }
        if let Some(v) = changes.phone_num {
            user.phone_num = v;
        }
        if let Some(v) = changes.course {
            user.course = v;
        }
        if let Some(v) = changes.city {
            user.city = v;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, RepoError> {
        Ok(self.rows.lock().unwrap().remove(&id).is_some())
    }

    async fn list(&self) -> Result<Vec<PublicUser>, RepoError> {
        let rows = self.rows.lock().unwrap();
        let mut users: Vec<PublicUser> = rows.values().map(PublicUser::from).collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }
}
