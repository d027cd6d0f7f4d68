//! Roles and request principals.
//!
//! Authorization is a pure function over an explicit role lattice; there is
//! no framework-managed authority translation. Each role implies the roles
//! below it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    Editor,
    Publisher,
    SiteAdmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Editor => "editor",
            Role::Publisher => "publisher",
            Role::SiteAdmin => "site_admin",
        }
    }

    /// All roles this role implies, including itself.
    pub fn closure(self) -> &'static [Role] {
        match self {
            Role::Guest => &[Role::Guest],
            Role::Editor => &[Role::Editor, Role::Guest],
            Role::Publisher => &[Role::Publisher, Role::Editor, Role::Guest],
            Role::SiteAdmin => &[
                Role::SiteAdmin,
                Role::Publisher,
                Role::Editor,
                Role::Guest,
            ],
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "guest" => Ok(Role::Guest),
            "editor" => Ok(Role::Editor),
            "publisher" => Ok(Role::Publisher),
            "site_admin" => Ok(Role::SiteAdmin),
            _ => Err(()),
        }
    }
}

/// Expand a set of granted roles to everything they imply.
pub fn resolve_role_closure(granted: &[Role]) -> HashSet<Role> {
    granted
        .iter()
        .flat_map(|role| role.closure().iter().copied())
        .collect()
}

/// An authenticated caller together with the closure of their roles.
#[derive(Debug, Clone)]
pub struct Principal {
    user: User,
    roles: HashSet<Role>,
}

impl Principal {
    pub fn new(user: User, granted: &[Role]) -> Self {
        Self {
            user,
            roles: resolve_role_closure(granted),
        }
    }

    /// The unauthenticated visitor.
    pub fn anonymous() -> Self {
        Self::new(User::new("anonymous"), &[Role::Guest])
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.login() == "anonymous"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_is_transitive() {
        let roles = resolve_role_closure(&[Role::Publisher]);
        assert!(roles.contains(&Role::Publisher));
        assert!(roles.contains(&Role::Editor));
        assert!(roles.contains(&Role::Guest));
        assert!(!roles.contains(&Role::SiteAdmin));
    }

    #[test]
    fn principal_checks_implied_roles() {
        let principal = Principal::new(User::new("admin"), &[Role::SiteAdmin]);
        assert!(principal.has_role(Role::Editor));

        let guest = Principal::anonymous();
        assert!(guest.has_role(Role::Guest));
        assert!(!guest.has_role(Role::Editor));
    }
}
