use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user about to be inserted; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Fields to overwrite on an existing user. `None` leaves the column as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    /// Applies the changes in place and reports whether anything differed.
    pub fn apply_to(self, user: &mut User) -> bool {
        let mut changed = false;
        if let Some(name) = self.name {
            changed |= user.name != name;
            user.name = name;
        }
        if let Some(email) = self.email {
            changed |= user.email != email;
            user.email = email;
        }
        if let Some(hash) = self.password_hash {
            changed |= user.password_hash != hash;
            user.password_hash = hash;
        }
        changed
    }
}
