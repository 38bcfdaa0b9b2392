//! Admin management of the user directory

use crate::auth::AuthContext;
use crate::errors::{AppError, Result};
use crate::paging::{page_count, ListQuery};
use crate::store::Store;
use crate::users::{
    AddUserRequest, NewUser, UpdateUserRequest, User, UserPage, UserPatch, UserSuggestion,
    UserSuggestionQuery, MIN_SUGGESTION_QUERY,
};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

pub struct UserService {
    store: Arc<dyn Store>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Paginated directory, newest accounts first
    pub async fn list(&self, caller: &AuthContext, query: ListQuery) -> Result<UserPage> {
        caller.require_admin()?;
        query.validate()?;

        let (users, total) = self
            .store
            .list_users(query.search_term(), query.page, query.limit)
            .await?;

        Ok(UserPage {
            users,
            current_page: query.page,
            total_pages: page_count(total, query.limit),
            total_users: total,
        })
    }

    pub async fn add(&self, caller: &AuthContext, request: AddUserRequest) -> Result<User> {
        caller.require_admin()?;
        let new_user = NewUser::from_request(request)?;
        let user = self.store.insert_user(new_user).await?;

        info!(
            user_id = %user.id,
            role = ?user.role,
            admin_id = %caller.user_id,
            "User created"
        );
        Ok(user)
    }

    /// Change name, e-mail or role. The last admin cannot be demoted.
    pub async fn update(
        &self,
        caller: &AuthContext,
        user_id: &str,
        request: UpdateUserRequest,
    ) -> Result<User> {
        caller.require_admin()?;
        let patch = UserPatch::from_request(request)?;
        if patch.is_empty() {
            return self.find_existing(user_id).await;
        }

        let user = self
            .store
            .update_user(user_id, patch)
            .await?
            .ok_or_else(user_not_found)?;

        info!(user_id = %user.id, role = ?user.role, admin_id = %caller.user_id, "User updated");
        Ok(user)
    }

    /// Remove a user. Admins cannot remove themselves or the last admin.
    /// News and reports by the user are kept.
    pub async fn delete(&self, caller: &AuthContext, user_id: &str) -> Result<()> {
        caller.require_admin()?;
        if caller.user_id == user_id {
            return Err(AppError::forbidden("Admin cannot delete themselves."));
        }

        if !self.store.delete_user(user_id).await? {
            return Err(user_not_found());
        }

        info!(user_id = %user_id, admin_id = %caller.user_id, "User deleted");
        Ok(())
    }

    /// Username/e-mail matches for the admin search box. Terms shorter than
    /// two characters yield nothing.
    pub async fn suggestions(
        &self,
        caller: &AuthContext,
        query: UserSuggestionQuery,
    ) -> Result<Vec<UserSuggestion>> {
        caller.require_admin()?;
        query.validate()?;

        let term = query.query.trim();
        if term.chars().count() < MIN_SUGGESTION_QUERY {
            return Ok(Vec::new());
        }
        self.store.suggest_users(term, query.limit).await
    }

    async fn find_existing(&self, user_id: &str) -> Result<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or_else(user_not_found)
    }
}

fn user_not_found() -> AppError {
    AppError::NotFound {
        message: "User not found.".to_string(),
    }
}
