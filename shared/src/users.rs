//! Business callbacks for the four user operations.
//!
//! Each runs behind `FunctionHandler`, so requests arrive authorized, decoded and validated.

use ulid::Ulid;

use crate::errors::ApiError;
use crate::keys::AlternateKey;
use crate::pipeline::{Json, PathParameters};
use crate::store::{UserStore, UserUpdate};
use crate::types::{
    AccountType, CreateUserRequest, CreateUserResponse, NewUser, UpdateUserRequest, User,
};

pub const USER_ID_PARAMETER: &str = "userId";

/// How a `userId` path value is resolved to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLookup<'a> {
    Id(&'a str),
    EmailAddress(&'a str),
    Username(&'a str),
}

impl<'a> UserLookup<'a> {
    /// ULIDs route to the primary key, anything with `@` to email, the rest to username.
    pub fn route(value: &'a str) -> Self {
        if value.len() == 26 && Ulid::from_string(value).is_ok() {
            UserLookup::Id(value)
        } else if value.contains('@') {
            UserLookup::EmailAddress(value)
        } else {
            UserLookup::Username(value)
        }
    }

    pub async fn fetch(self, store: &dyn UserStore) -> Result<User, ApiError> {
        let user = match self {
            UserLookup::Id(id) => store.get_user(id).await?,
            UserLookup::EmailAddress(email) => {
                store.get_user_by(AlternateKey::EmailAddress, email).await?
            }
            UserLookup::Username(username) => {
                store.get_user_by(AlternateKey::Username, username).await?
            }
        };
        Ok(user)
    }
}

/// Fails when a live user already holds `value` on the given alternate key.
async fn ensure_unclaimed(
    store: &dyn UserStore,
    key: AlternateKey,
    value: &str,
) -> Result<(), ApiError> {
    match store.get_user_by(key, value).await {
        Ok(_) => Err(ApiError::validation(format!(
            "User already exists with given {}: {}",
            key, value
        ))),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn create_user(
    store: &dyn UserStore,
    request: CreateUserRequest,
) -> Result<Json<CreateUserResponse>, ApiError> {
    let email_address = request
        .email_address
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::validation("emailAddress is required"))?;

    let username = match request.username.filter(|u| !u.is_empty()) {
        Some(username) => username,
        None => email_address
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    // Not atomic: two concurrent creates can both pass these checks.
    ensure_unclaimed(store, AlternateKey::EmailAddress, &email_address).await?;
    ensure_unclaimed(store, AlternateKey::Username, &username).await?;

    let user = NewUser {
        username,
        first_name: request.first_name,
        last_name: request.last_name,
        phone_number: request.phone_number,
        email_address,
        primary_address: request.primary_address,
        billing_address: request.billing_address,
        profile_image_id: request.profile_image_id,
        biography: request.biography,
        account_type: AccountType::from_request(request.account_type.as_deref()),
    };

    tracing::info!(
        username = %user.username,
        account_type = %user.account_type,
        "Creating User"
    );

    let user_id = store.create_user(user).await?;
    Ok(Json(CreateUserResponse { user_id }))
}

pub async fn get_user(
    store: &dyn UserStore,
    params: PathParameters,
) -> Result<Json<User>, ApiError> {
    let lookup = UserLookup::route(params.require(USER_ID_PARAMETER)?);
    tracing::debug!(?lookup, "Fetching User");
    Ok(Json(lookup.fetch(store).await?))
}

/// Every whitelisted field is replaced; an absent one is cleared.
pub fn user_update(request: UpdateUserRequest) -> UserUpdate {
    UserUpdate {
        first_name: request.first_name,
        last_name: request.last_name,
        phone_number: request.phone_number,
        primary_address: request.primary_address,
        billing_address: request.billing_address,
        profile_image_id: request.profile_image_id,
        biography: request.biography,
    }
}

pub async fn update_user(
    store: &dyn UserStore,
    request: UpdateUserRequest,
    params: PathParameters,
) -> Result<bool, ApiError> {
    let user_id = params.require(USER_ID_PARAMETER)?;
    let existing = store.get_user(user_id).await?;

    let update = user_update(request);
    tracing::info!(user_id = %existing.user_id, "Updating User");

    store.update_user(&existing.user_id, &update).await?;
    Ok(true)
}

pub async fn delete_user(store: &dyn UserStore, params: PathParameters) -> Result<bool, ApiError> {
    let user_id = params.require(USER_ID_PARAMETER)?;
    tracing::info!(user_id, "Deleting User");
    store.delete_user(user_id).await?;
    Ok(true)
}
