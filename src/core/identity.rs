//! Session identity supplied by the external authentication collaborator.
//!
//! The portal never authenticates anyone itself; it trusts the `{id, email, name, role}`
//! tuple handed over by the auth gateway and uses the role to gate vendor actions.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Role of the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A student placing and tracking their own orders
    User,
    /// The counter operator; sees every order and drives fulfillment
    Vendor,
}

impl Role {
    /// Lowercase wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Vendor => "vendor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "vendor" => Ok(Self::Vendor),
            other => Err(Error::validation(format!("unknown role '{other}'"))),
        }
    }
}

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Stable user id
    pub id: String,
    /// Contact email, copied onto orders
    pub email: String,
    /// Display name
    pub name: String,
    /// Role deciding which tracker operations are available
    pub role: Role,
}

impl SessionUser {
    /// Builds a student session.
    pub fn user(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            role: Role::User,
        }
    }

    /// Builds a vendor session.
    pub fn vendor(id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            role: Role::Vendor,
        }
    }

    /// `true` for the counter operator.
    #[must_use]
    pub fn is_vendor(&self) -> bool {
        self.role == Role::Vendor
    }

    /// Fails with [`Error::Forbidden`] unless the caller is a vendor.
    pub fn require_vendor(&self, action: &str) -> Result<()> {
        if self.is_vendor() {
            Ok(())
        } else {
            Err(Error::Forbidden {
                role: self.role,
                action: action.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert!(matches!("vendor".parse::<Role>(), Ok(Role::Vendor)));
        assert!(matches!(" USER ".parse::<Role>(), Ok(Role::User)));
        assert!(matches!(
            "admin".parse::<Role>(),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_require_vendor() {
        let student = SessionUser::user("u1", "a@campus.edu", "Asha");
        let vendor = SessionUser::vendor("v1", "desk@campus.edu", "Print Desk");

        assert!(vendor.require_vendor("mark orders printed").is_ok());
        assert!(matches!(
            student.require_vendor("mark orders printed"),
            Err(Error::Forbidden {
                role: Role::User,
                ..
            })
        ));
    }
}
