use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::models::user::{Role, User};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("This email address is already in use")]
    EmailTaken,
}

/// Boundary to the user-record store. The auth core only ever needs these
/// lookups; persistence itself lives behind the implementation.
pub trait UserDirectory: Send + Sync {
    fn find_by_email(&self, email: &str) -> Option<User>;
    fn find_by_id(&self, id: Uuid) -> Option<User>;
    fn create(&self, email: &str, password_hash: String, role: Role) -> Result<User, DirectoryError>;
    fn mark_verified(&self, id: Uuid) -> bool;
    fn set_password(&self, id: Uuid, password_hash: String) -> bool;
    fn list(&self) -> Vec<User>;
    fn delete(&self, id: Uuid) -> bool;
}

/// Process-local directory, used by the `api` binary and the tests.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_by_email(&self, email: &str) -> Option<User> {
        let email = normalize(email);
        self.users.read().values().find(|u| u.email == email).cloned()
    }

    fn find_by_id(&self, id: Uuid) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    fn create(&self, email: &str, password_hash: String, role: Role) -> Result<User, DirectoryError> {
        let email = normalize(email);
        let mut users = self.users.write();
        if users.values().any(|u| u.email == email) {
            return Err(DirectoryError::EmailTaken);
        }
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash,
            role,
            verified: false,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    fn mark_verified(&self, id: Uuid) -> bool {
        match self.users.write().get_mut(&id) {
            Some(u) => {
                u.verified = true;
                true
            }
            None => false,
        }
    }

    fn set_password(&self, id: Uuid, password_hash: String) -> bool {
        match self.users.write().get_mut(&id) {
            Some(u) => {
                u.password_hash = password_hash;
                true
            }
            None => false,
        }
    }

    fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.read().values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        users
    }

    fn delete(&self, id: Uuid) -> bool {
        self.users.write().remove(&id).is_some()
    }
}
