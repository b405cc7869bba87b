use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use validator::Validate;

use crate::models::user::User;
use crate::utils::validation::{
    check_confirmation, must_be_string, string_field, validate, FieldErrors, Patch,
};

pub const TOKEN_TYPE: &str = "Bearer";

const USER_FIELDS: &[&str] = &["name", "email", "password", "password_confirmation"];

#[derive(Debug, Clone, Default, Validate)]
pub struct CreateUserPayload {
    #[validate(
        required(message = "The name field is required."),
        length(max = 255, message = "The name field must not be greater than 255 characters.")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "The email field is required."),
        email(message = "The email field must be a valid email address."),
        length(max = 255, message = "The email field must not be greater than 255 characters.")
    )]
    pub email: Option<String>,
    #[validate(required(message = "The password field is required."))]
    pub password: Option<String>,
    #[validate(required(message = "The password confirmation field is required."))]
    pub password_confirmation: Option<String>,
}

impl CreateUserPayload {
    /// Reads the body and runs every create rule except email uniqueness,
    /// which needs the store.
    pub fn from_body(body: &Map<String, JsonValue>, errors: &mut FieldErrors) -> Self {
        let payload = Self {
            name: string_field(body, "name", errors).into_option(),
            email: string_field(body, "email", errors).into_option(),
            password: string_field(body, "password", errors).into_option(),
            password_confirmation: string_field(body, "password_confirmation", errors)
                .into_option(),
        };
        validate(&payload, USER_FIELDS, errors);
        check_confirmation(
            payload.password.as_deref(),
            payload.password_confirmation.as_deref(),
            errors,
        );
        payload
    }
}

/// Partial update. `None` means the field was not sent.
#[derive(Debug, Clone, Default, Validate)]
pub struct UpdateUserPayload {
    #[validate(length(
        max = 255,
        message = "The name field must not be greater than 255 characters."
    ))]
    pub name: Option<String>,
    #[validate(
        email(message = "The email field must be a valid email address."),
        length(max = 255, message = "The email field must not be greater than 255 characters.")
    )]
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

impl UpdateUserPayload {
    /// Reads the body and runs every update rule except email uniqueness.
    /// A field sent as `null` is an error: none of them is nullable.
    pub fn from_body(body: &Map<String, JsonValue>, errors: &mut FieldErrors) -> Self {
        let mut sent = |field: &str| match string_field(body, field, errors) {
            Patch::Null => {
                errors.add(field, must_be_string(field));
                None
            }
            other => other.into_option(),
        };
        let payload = Self {
            name: sent("name"),
            email: sent("email"),
            password: sent("password"),
            password_confirmation: sent("password_confirmation"),
        };
        validate(&payload, USER_FIELDS, errors);
        check_confirmation(
            payload.password.as_deref(),
            payload.password_confirmation.as_deref(),
            errors,
        );
        payload
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

/// External shape of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResource {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResource {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            name: value.name,
            email: value.email,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub data: UserResource,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self { data: value.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredUserResponse {
    pub data: UserResource,
    pub access_token: String,
    pub token_type: String,
}

impl RegisteredUserResponse {
    pub fn new(user: User, access_token: String) -> Self {
        Self {
            data: user.into(),
            access_token,
            token_type: TOKEN_TYPE.to_string(),
        }
    }
}
