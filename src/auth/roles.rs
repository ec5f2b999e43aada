use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of account roles, stored as the `user_role` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role")]
pub enum Role {
    User,
    Admin,
}

/// What a role may do. Routes ask for a capability, never for a role name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageBooks,
    ManageUsers,
}

impl Role {
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Role::User => &[],
            Role::Admin => &[Capability::ManageBooks, Capability::ManageUsers],
        }
    }

    pub fn can(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => f.write_str("User"),
            Role::Admin => f.write_str("Admin"),
        }
    }
}

/// Compile-time authorization policy used by [`crate::auth::extractors::Authorized`].
pub trait Policy: Send + Sync + 'static {
    const CAPABILITY: Capability;
}

pub struct ManageBooks;
impl Policy for ManageBooks {
    const CAPABILITY: Capability = Capability::ManageBooks;
}

pub struct ManageUsers;
impl Policy for ManageUsers {
    const CAPABILITY: Capability = Capability::ManageUsers;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_every_capability() {
        for cap in [Capability::ManageBooks, Capability::ManageUsers] {
            assert!(Role::Admin.can(cap));
        }
    }

    #[test]
    fn user_holds_no_capability() {
        assert!(Role::User.capabilities().is_empty());
        assert!(!Role::User.can(Capability::ManageBooks));
        assert!(!Role::User.can(Capability::ManageUsers));
    }

    #[test]
    fn role_serializes_as_name() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"Admin\"");
        assert_eq!(Role::User.to_string(), "User");
    }
}
