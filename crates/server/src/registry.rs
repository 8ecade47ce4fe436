//! Credential registry.
//!
//! Holds the two synthetic identities the mock can sign in as, each bound to a
//! static access/refresh token pair, and the growing map of authorization codes
//! minted during role selection.

use crate::config::{ConfigError, OAuthConfig};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// A synthetic identity the mock can impersonate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Instructor,
    Student,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 2] = [Role::Instructor, Role::Student];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Instructor => "instructor",
            Role::Student => "student",
        }
    }

    /// Email and login id reported for this role.
    pub fn contact(self) -> &'static str {
        match self {
            Role::Instructor => "instructor@school.edu",
            Role::Student => "student@school.edu",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Instructor => "Instructor",
            Role::Student => "Student",
        }
    }

    pub fn default_id(self) -> i64 {
        match self {
            Role::Instructor => 101,
            Role::Student => 202,
        }
    }

    pub fn default_name(self) -> &'static str {
        match self {
            Role::Instructor => "Test Instructor",
            Role::Student => "Test Student",
        }
    }

    pub fn default_refresh_token(self) -> &'static str {
        match self {
            Role::Instructor => "refresh-token-instructor-67890",
            Role::Student => "refresh-token-student-fghij",
        }
    }

    /// Environment variable that supplies this role's access token.
    pub fn access_token_env(self) -> &'static str {
        match self {
            Role::Instructor => "OAUTH_INSTRUCTOR_ACCESS_TOKEN",
            Role::Student => "OAUTH_STUDENT_ACCESS_TOKEN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instructor" => Ok(Role::Instructor),
            "student" => Ok(Role::Student),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// User record returned in token responses and by `/api/v1/users/self`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub login_id: String,
}

struct RoleCredentials {
    id: i64,
    name: String,
    access_token: String,
    refresh_token: String,
}

impl RoleCredentials {
    fn from_config(role: Role, config: &OAuthConfig) -> Result<Self, ConfigError> {
        let cfg = config.role(role);

        let access_token = cfg
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingAccessToken(role))?;

        let refresh_token = cfg
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| role.default_refresh_token().to_string());

        Ok(Self {
            id: cfg.id.unwrap_or_else(|| role.default_id()),
            name: cfg
                .name
                .clone()
                .unwrap_or_else(|| role.default_name().to_string()),
            access_token,
            refresh_token,
        })
    }
}

/// Process-lifetime credential state shared by every request.
///
/// Role credentials are fixed at construction. Authorization codes are only
/// ever added: resolving a code does not consume it.
pub struct CredentialRegistry {
    instructor: RoleCredentials,
    student: RoleCredentials,
    by_access_token: HashMap<String, Role>,
    codes: DashMap<String, String>,
}

impl fmt::Debug for CredentialRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRegistry")
            .field("instructor_id", &self.instructor.id)
            .field("student_id", &self.student.id)
            .field("issued_codes", &self.codes.len())
            .finish_non_exhaustive()
    }
}

impl CredentialRegistry {
    /// Builds the registry, failing if either role lacks an access token.
    pub fn from_config(config: &OAuthConfig) -> Result<Self, ConfigError> {
        let instructor = RoleCredentials::from_config(Role::Instructor, config)?;
        let student = RoleCredentials::from_config(Role::Student, config)?;

        // Instructor wins if both roles were configured with the same token.
        let mut by_access_token = HashMap::new();
        by_access_token
            .entry(instructor.access_token.clone())
            .or_insert(Role::Instructor);
        by_access_token
            .entry(student.access_token.clone())
            .or_insert(Role::Student);

        Ok(Self {
            instructor,
            student,
            by_access_token,
            codes: DashMap::new(),
        })
    }

    fn credentials(&self, role: Role) -> &RoleCredentials {
        match role {
            Role::Instructor => &self.instructor,
            Role::Student => &self.student,
        }
    }

    /// Mints a fresh authorization code bound to `role`.
    ///
    /// `role` is not checked against the known set; a code for an unknown role
    /// is stored and fails later when its profile is looked up.
    pub fn issue_code(&self, role: &str) -> String {
        loop {
            let code = uuid::Uuid::new_v4().to_string();
            if let Entry::Vacant(slot) = self.codes.entry(code.clone()) {
                slot.insert(role.to_string());
                return code;
            }
        }
    }

    pub fn resolve_code(&self, code: &str) -> Option<String> {
        self.codes.get(code).map(|role| role.value().clone())
    }

    pub fn issued_codes(&self) -> usize {
        self.codes.len()
    }

    pub fn profile_for(&self, role: &str) -> Option<UserProfile> {
        let role: Role = role.parse().ok()?;
        let creds = self.credentials(role);
        Some(UserProfile {
            id: creds.id,
            name: creds.name.clone(),
            email: role.contact().to_string(),
            login_id: role.contact().to_string(),
        })
    }

    pub fn access_token_for(&self, role: Role) -> &str {
        &self.credentials(role).access_token
    }

    pub fn refresh_token_for(&self, role: Role) -> &str {
        &self.credentials(role).refresh_token
    }

    pub fn role_for_access_token(&self, token: Option<&str>) -> Option<Role> {
        self.by_access_token.get(token?).copied()
    }
}
