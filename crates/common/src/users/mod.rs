//! User accounts as seen by the admin console
//!
//! Sign-up, login and credentials live in the account service; this crate
//! only manages the directory entries and their roles.

use crate::auth::Role;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Body of the admin "add user" call
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AddUserRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 64, message = "Username must be 1-64 characters"))]
    pub username: String,

    #[serde(default)]
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,

    #[serde(default)]
    pub role: Option<String>,
}

/// Body of the admin "update user" call; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 64, message = "Username must be 1-64 characters"))]
    pub username: Option<String>,

    #[validate(email(message = "A valid email address is required"))]
    pub email: Option<String>,

    pub role: Option<String>,
}

/// A validated user ready to insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: Role,
}

impl NewUser {
    pub fn from_request(request: AddUserRequest) -> Result<Self> {
        let request = AddUserRequest {
            username: request.username.trim().to_string(),
            email: normalize_email(&request.email),
            role: request.role,
        };
        request.validate()?;

        Ok(Self {
            role: request.role.as_deref().map(parse_role).transpose()?.unwrap_or(Role::User),
            username: request.username,
            email: request.email,
        })
    }
}

/// Validated changes to a user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl UserPatch {
    pub fn from_request(request: UpdateUserRequest) -> Result<Self> {
        let request = UpdateUserRequest {
            username: request.username.map(|u| u.trim().to_string()),
            email: request.email.as_deref().map(normalize_email),
            role: request.role,
        };
        request.validate()?;

        Ok(Self {
            role: request.role.as_deref().map(parse_role).transpose()?,
            username: request.username,
            email: request.email,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.role.is_none()
    }

    pub fn apply(&self, user: &mut User) {
        if let Some(ref username) = self.username {
            user.username = username.clone();
        }
        if let Some(ref email) = self.email {
            user.email = email.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
    }

    /// Whether applying this patch takes the admin role away from `user`
    pub fn demotes(&self, user: &User) -> bool {
        user.role == Role::Admin && matches!(self.role, Some(Role::User))
    }
}

/// Query parameters of the admin user suggestions
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserSuggestionQuery {
    #[serde(default)]
    pub query: String,

    #[serde(default = "default_suggestion_limit")]
    #[validate(range(min = 1, max = 50, message = "limit must be between 1 and 50"))]
    pub limit: u64,
}

fn default_suggestion_limit() -> u64 {
    7
}

/// Shortest search term that yields suggestions
pub const MIN_SUGGESTION_QUERY: usize = 2;

/// A user suggestion for the admin search box
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSuggestion {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserSuggestion {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

/// One page of the admin user listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    pub users: Vec<User>,
    pub current_page: u64,
    pub total_pages: u64,
    pub total_users: u64,
}

/// Reporter fields shown next to a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn parse_role(raw: &str) -> Result<Role> {
    match raw.trim() {
        "admin" => Ok(Role::Admin),
        "user" => Ok(Role::User),
        _ => Err(AppError::validation("Invalid role. Must be one of: user, admin")),
    }
}

/// Username or e-mail already belongs to another user
pub fn duplicate_user() -> AppError {
    AppError::validation("Email or Username already exists.")
}

/// Removing or demoting the only remaining admin
pub fn last_admin() -> AppError {
    AppError::forbidden("Cannot remove the last admin account.")
}

/// Whether `needle` (lowercase) occurs in the username or e-mail
pub fn matches_search(user: &User, needle: &str) -> bool {
    user.username.to_lowercase().contains(needle) || user.email.to_lowercase().contains(needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> User {
        User {
            id: "a1".into(),
            username: "editor".into(),
            email: "editor@example.com".into(),
            role: Role::Admin,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_new_user_defaults_and_normalizes() {
        let user = NewUser::from_request(AddUserRequest {
            username: "  reader ".into(),
            email: " Reader@Example.COM ".into(),
            role: None,
        })
        .unwrap();
        assert_eq!(user.username, "reader");
        assert_eq!(user.email, "reader@example.com");
        assert_eq!(user.role, Role::User);
    }

    #[test]
    fn test_new_user_rejects_bad_input() {
        let err = NewUser::from_request(AddUserRequest {
            username: " ".into(),
            email: "nope".into(),
            role: None,
        })
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = NewUser::from_request(AddUserRequest {
            username: "reader".into(),
            email: "reader@example.com".into(),
            role: Some("owner".into()),
        })
        .unwrap_err();
        assert!(err.to_string().contains("Invalid role"));
    }

    #[test]
    fn test_patch_from_json() {
        let request: UpdateUserRequest =
            serde_json::from_value(json!({ "role": "user", "email": "NEW@example.com" })).unwrap();
        let patch = UserPatch::from_request(request).unwrap();
        assert_eq!(patch.role, Some(Role::User));
        assert_eq!(patch.email.as_deref(), Some("new@example.com"));
        assert!(patch.username.is_none());

        let mut user = sample();
        assert!(patch.demotes(&user));
        patch.apply(&mut user);
        assert_eq!(user.role, Role::User);
        assert_eq!(user.email, "new@example.com");
        assert!(!patch.demotes(&user));

        let empty = UserPatch::from_request(UpdateUserRequest::default()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_user_wire_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["role"], "admin");
        assert!(value["createdAt"].is_string());
    }
}
