use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::instrument;

use super::{
    model::PublicUser,
    services::{self, AvatarUpload, NewAdminForm},
};
use crate::{
    auth::{
        extractors::Authorized,
        roles::ManageUsers,
    },
    error::{AppError, AppResult},
    extract::AppMultipart,
    state::AppState,
};

const AVATAR_BODY_LIMIT: usize = 5 * 1024 * 1024;

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub success: bool,
    pub users: Vec<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct NewAdminResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
}

pub fn user_admin_routes() -> Router<AppState> {
    Router::new()
        .route("/user/all", get(get_all_users))
        .route(
            "/user/admin/add-new",
            post(register_new_admin).layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
}

#[instrument(skip_all)]
pub async fn get_all_users(
    State(state): State<AppState>,
    _admin: Authorized<ManageUsers>,
) -> AppResult<Json<UsersResponse>> {
    let users = services::list_verified_users(&state).await?;
    Ok(Json(UsersResponse {
        success: true,
        users: users.iter().map(PublicUser::from).collect(),
    }))
}

#[instrument(skip_all)]
pub async fn register_new_admin(
    State(state): State<AppState>,
    _admin: Authorized<ManageUsers>,
    AppMultipart(mut mp): AppMultipart,
) -> AppResult<Json<NewAdminResponse>> {
    let mut form = NewAdminForm::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("avatar") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                if !body.is_empty() {
                    form.avatar = Some(AvatarUpload { content_type, body });
                }
            }
            Some(key @ ("name" | "email" | "password")) => {
                let key = key.to_string();
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::bad_request(e.body_text()))?;
                match key.as_str() {
                    "name" => form.name = value,
                    "email" => form.email = value,
                    _ => form.password = value,
                }
            }
            _ => {}
        }
    }

    let user = services::register_new_admin(&state, form).await?;
    Ok(Json(NewAdminResponse {
        success: true,
        message: "Admin registered successfully.".into(),
        user: PublicUser::from(&user),
    }))
}
