use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::clock::Millis;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub age: Option<i64>,
    pub verified: bool,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    #[serde(skip_serializing)]
    pub recovery_token: Option<String>,
    pub recovery_issued_at: Option<Millis>,
    pub recovery_expires_at: Option<Millis>,
    pub login_count: i64,
    pub created_at: Option<String>,
}

/// Fields needed to insert a user; the repository fills in the defaults.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub age: Option<i64>,
    pub verification_token: Option<String>,
}

/// What a client is allowed to see about an account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "conteo")]
    pub login_count: i64,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            login_count: user.login_count,
        }
    }
}
