use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::models::User;

#[derive(Debug, Default, Clone)]
pub struct UserDirectory {
    users: HashMap<String, User>,
}

impl UserDirectory {
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn insert(&mut self, user: User) -> Result<()> {
        if self.contains(&user.username) {
            return Err(EngineError::duplicate("username", user.username));
        }
        self.users.insert(user.username.clone(), user);
        Ok(())
    }

    pub fn remove(&mut self, username: &str) -> Option<User> {
        self.users.remove(username)
    }

    /// Returns `None` for an unknown username and for a wrong password
    /// alike, so callers cannot tell which one failed.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&User> {
        let user = self.users.get(username)?;
        credentials_match(user.password.as_bytes(), password.as_bytes()).then_some(user)
    }

    /// Users ordered by username.
    pub fn sorted(&self) -> Vec<&User> {
        let mut users: Vec<&User> = self.users.values().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }
}

/// Compares in time independent of where the bytes differ. A length
/// mismatch returns early, so the stored password's length is not hidden.
fn credentials_match(stored: &[u8], supplied: &[u8]) -> bool {
    if stored.len() != supplied.len() {
        return false;
    }
    stored
        .iter()
        .zip(supplied)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn directory() -> UserDirectory {
        let mut users = UserDirectory::default();
        users
            .insert(User {
                username: "placement".to_string(),
                password: "office123".to_string(),
                role: Role::Placement,
            })
            .unwrap();
        users
            .insert(User {
                username: "21-1234".to_string(),
                password: "pass".to_string(),
                role: Role::Student,
            })
            .unwrap();
        users
    }

    #[test]
    fn authenticates_exact_credentials() {
        let users = directory();
        let user = users.authenticate("placement", "office123").unwrap();
        assert_eq!(user.role, Role::Placement);
    }

    #[test]
    fn unknown_user_and_wrong_password_look_the_same() {
        let users = directory();
        assert_eq!(users.authenticate("unknown", "x"), None);
        assert_eq!(users.authenticate("placement", "wrong_password"), None);
        assert_eq!(users.authenticate("placement", "office12"), None);
    }

    #[test]
    fn credential_compare_needs_equal_length_and_bytes() {
        assert!(credentials_match(b"office123", b"office123"));
        assert!(!credentials_match(b"office123", b"office124"));
        assert!(!credentials_match(b"office123", b"office1234"));
        assert!(!credentials_match(b"", b"x"));
        assert!(credentials_match(b"", b""));
    }

    #[test]
    fn rejects_duplicate_username() {
        let mut users = directory();
        let err = users
            .insert(User {
                username: "placement".to_string(),
                password: "other".to_string(),
                role: Role::Exam,
            })
            .unwrap_err();
        assert!(err.to_string().starts_with("duplicate"));
        assert_eq!(users.len(), 2);
    }

    #[test]
    fn sorted_lists_by_username() {
        let users = directory();
        let names: Vec<&str> = users.sorted().iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["21-1234", "placement"]);
    }
}
