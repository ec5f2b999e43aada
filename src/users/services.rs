use tracing::{error, info, instrument};

use super::{
    avatar::{ext_from_mime, upload_avatar, UploadItem},
    model::{NewUser, User},
};
use crate::{
    auth::{
        password::hash_password,
        roles::Role,
        services::{check_new_account, normalize_email},
    },
    error::{AppError, AppResult},
    state::AppState,
};

/// Fields collected from the `admin/add-new` multipart form.
#[derive(Debug, Default)]
pub struct NewAdminForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub avatar: Option<AvatarUpload>,
}

#[derive(Debug)]
pub struct AvatarUpload {
    pub content_type: String,
    pub body: bytes::Bytes,
}

#[instrument(skip(state))]
pub async fn list_verified_users(state: &AppState) -> AppResult<Vec<User>> {
    Ok(state.users.list_verified().await?)
}

/// Creates a verified admin after uploading their avatar to the media host.
#[instrument(skip(state, form), fields(email = %form.email))]
pub async fn register_new_admin(state: &AppState, form: NewAdminForm) -> AppResult<User> {
    let Some(avatar) = form.avatar else {
        return Err(AppError::bad_request("Admin avatar required."));
    };
    let name = form.name.trim().to_string();
    let email = normalize_email(&form.email);
    if name.is_empty() || email.is_empty() || form.password.is_empty() {
        return Err(AppError::bad_request("Please enter all fields."));
    }
    check_new_account(state, &email, &form.password).await?;
    if ext_from_mime(&avatar.content_type).is_none() {
        return Err(AppError::bad_request("Please upload an image file."));
    }

    let password_hash = hash_password(&form.password)?;
    let uploaded = upload_avatar(
        state.storage.as_ref(),
        UploadItem {
            body: avatar.body,
            content_type: &avatar.content_type,
        },
    )
    .await
    .map_err(|e| {
        error!(error = ?e, "avatar upload failed");
        AppError::Upstream("Error uploading image. Please try again.".into())
    })?;

    let created = state
        .users
        .create(NewUser {
            name,
            email,
            password_hash,
            role: Role::Admin,
            account_verified: true,
            verification_code: None,
            verification_code_expire: None,
            avatar: Some(uploaded.clone()),
        })
        .await;

    match created {
        Ok(user) => {
            info!(user_id = %user.id, "admin registered");
            Ok(user)
        }
        Err(e) => {
            if let Err(del) = state.storage.delete_object(&uploaded.public_id).await {
                error!(error = %del, key = %uploaded.public_id, "failed to remove orphaned avatar");
            }
            Err(e.into())
        }
    }
}
