//! People records as stored in the `users` blob.

use serde::{Deserialize, Serialize};

/// Numeric record identifier.
pub type UserId = u64;

/// A stored person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: String,
    pub ip_address: String,
}

/// Fields supplied by a caller when creating or replacing a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: String,
    pub ip_address: String,
}

impl NewUser {
    /// Field names in the order callers are told about them.
    pub const FIELDS: [&'static str; 5] =
        ["first_name", "last_name", "email", "gender", "ip_address"];

    pub fn with_id(self, id: UserId) -> User {
        User {
            id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            gender: self.gender,
            ip_address: self.ip_address,
        }
    }
}

/// Serialized shape of the store value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPool {
    #[serde(default)]
    pub users: Vec<User>,
}

impl UserPool {
    pub fn find(&self, id: UserId) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    /// Next id: one past the highest in use, so ids stay unique after
    /// deletions.
    pub fn next_id(&self) -> UserId {
        self.users.iter().map(|user| user.id).max().unwrap_or(0) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: UserId) -> User {
        NewUser {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            gender: "Female".into(),
            ip_address: "10.0.0.1".into(),
        }
        .with_id(id)
    }

    #[test]
    fn test_next_id_empty_pool() {
        assert_eq!(UserPool::default().next_id(), 1);
    }

    #[test]
    fn test_next_id_skips_past_gaps() {
        let pool = UserPool {
            users: vec![user(1), user(5), user(3)],
        };
        assert_eq!(pool.next_id(), 6);
    }

    #[test]
    fn test_pool_missing_users_field() {
        let pool: UserPool = serde_json::from_str("{}").unwrap();
        assert!(pool.users.is_empty());
    }
}
