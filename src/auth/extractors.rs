use std::marker::PhantomData;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::{
    jwt::{session_token, JwtKeys},
    roles::Policy,
};
use crate::{error::AppError, state::AppState, users::model::User};

/// Session check: reads the `token` cookie, validates it and loads the user.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(CurrentUser(user.clone()));
        }

        let token = session_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("User is not authenticated"))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::unauthorized("Invalid or expired token")
        })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token for deleted user");
                AppError::unauthorized("User no longer exists")
            })?;

        parts.extensions.insert(user.clone());
        Ok(CurrentUser(user))
    }
}

/// Authenticated user whose role grants `P::CAPABILITY`.
pub struct Authorized<P: Policy> {
    pub user: User,
    _policy: PhantomData<P>,
}

#[async_trait]
impl<P: Policy> FromRequestParts<AppState> for Authorized<P> {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.role.can(P::CAPABILITY) {
            warn!(user_id = %user.id, role = %user.role, capability = ?P::CAPABILITY, "forbidden");
            return Err(AppError::Forbidden(format!(
                "Role ({}) is not authorized to access this resource",
                user.role
            )));
        }
        Ok(Authorized {
            user,
            _policy: PhantomData,
        })
    }
}
