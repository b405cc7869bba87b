use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::instrument;

use crate::database::user_repository::{UserPage, UserRepository};
use crate::dto::user_dto::{CreateUserPayload, UpdateUserPayload};
use crate::error::{Error, Result};
use crate::models::user::{NewUser, User, UserChanges};
use crate::services::credential_service::CredentialService;
use crate::services::query_resolver::{self, UserQuery};
use crate::utils::validation::{normalize_body, FieldErrors};

const EMAIL_TAKEN: &str = "The email has already been taken.";

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    credentials: Arc<dyn CredentialService>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, credentials: Arc<dyn CredentialService>) -> Self {
        Self { users, credentials }
    }

    /// Resolves the raw query pairs and fetches the matching page.
    #[instrument(skip(self))]
    pub async fn list(&self, pairs: &[(String, String)]) -> Result<(UserQuery, UserPage)> {
        let query = query_resolver::resolve(pairs)?;
        let page = self.users.query_paginated(&query).await?;
        Ok((query, page))
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        self.users.find_by_id(id).await?.ok_or_else(not_found)
    }

    /// Validates a registration body, stores the user and issues their
    /// first access token. Returns the user with the plain-text token.
    #[instrument(skip(self, body))]
    pub async fn register(&self, body: JsonValue) -> Result<(User, String)> {
        let body = normalize_body(body);
        let mut errors = FieldErrors::new();
        let payload = CreateUserPayload::from_body(&body, &mut errors);
        self.check_email_free(payload.email.as_deref(), None, &mut errors)
            .await?;
        errors.into_result()?;

        let (Some(name), Some(email), Some(password)) =
            (payload.name, payload.email, payload.password)
        else {
            return Err(Error::Internal("validated payload is incomplete".to_string()));
        };

        let password_hash = self.credentials.hash_password(&password).await?;
        let user = self
            .users
            .create(NewUser {
                name,
                email,
                password_hash,
            })
            .await?;
        let token = self.credentials.issue_token(user.id).await?;

        tracing::info!(user_id = user.id, "user registered");
        Ok((user, token))
    }

    /// Applies a partial update. Validation runs before the lookup, so an
    /// invalid body for a missing user still reports the field errors.
    #[instrument(skip(self, body))]
    pub async fn update(&self, id: i64, body: JsonValue) -> Result<User> {
        let body = normalize_body(body);
        let mut errors = FieldErrors::new();
        let payload = UpdateUserPayload::from_body(&body, &mut errors);
        self.check_email_free(payload.email.as_deref(), Some(id), &mut errors)
            .await?;
        errors.into_result()?;

        let existing = self.get(id).await?;
        if payload.is_empty() {
            return Ok(existing);
        }

        let password_hash = match payload.password.as_deref() {
            Some(password) => Some(self.credentials.hash_password(password).await?),
            None => None,
        };
        let changes = UserChanges {
            name: payload.name,
            email: payload.email,
            password_hash,
        };
        let user = self.users.update(id, changes).await?;

        tracing::info!(user_id = user.id, "user updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.users.delete(id).await?;
        tracing::info!(user_id = id, "user deleted");
        Ok(())
    }

    async fn check_email_free(
        &self,
        email: Option<&str>,
        except_id: Option<i64>,
        errors: &mut FieldErrors,
    ) -> Result<()> {
        if let Some(email) = email {
            if !errors.has("email") && self.users.email_taken(email, except_id).await? {
                errors.add("email", EMAIL_TAKEN);
            }
        }
        Ok(())
    }
}

fn not_found() -> Error {
    Error::NotFound("User not found".to_string())
}
