use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::roles::Role;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub account_verified: bool,
    pub verification_code: Option<i32>,
    pub verification_code_expire: Option<OffsetDateTime>,
    pub reset_password_token: Option<String>, // sha256 hex of the mailed token
    pub reset_password_expire: Option<OffsetDateTime>,
    pub avatar_public_id: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Everything needed to insert a user in one statement.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub account_verified: bool,
    pub verification_code: Option<i32>,
    pub verification_code_expire: Option<OffsetDateTime>,
    pub avatar: Option<Avatar>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Avatar {
    pub public_id: String,
    pub url: String,
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub account_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Avatar>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        let avatar = match (&u.avatar_public_id, &u.avatar_url) {
            (Some(public_id), Some(url)) => Some(Avatar {
                public_id: public_id.clone(),
                url: url.clone(),
            }),
            _ => None,
        };
        Self {
            id: u.id,
            name: u.name.clone(),
            email: u.email.clone(),
            role: u.role,
            account_verified: u.account_verified,
            avatar,
            created_at: u.created_at,
        }
    }
}

impl User {
    pub fn otp_expired_at(&self, now: OffsetDateTime) -> bool {
        match self.verification_code_expire {
            Some(expire) => now > expire,
            None => true,
        }
    }
}
