use axum::{
    extract::{FromRef, Path, State},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, instrument};

use super::{
    dto::{
        AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, RegisterRequest,
        ResetPasswordRequest, UpdatePasswordRequest, UserResponse, VerifyOtpRequest,
    },
    extractors::CurrentUser,
    jwt::{clear_session_cookie, JwtKeys},
    services,
};
use crate::{
    error::{AppError, AppResult},
    extract::AppJson,
    state::AppState,
    users::model::{PublicUser, User},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/user/register", post(register))
        .route("/user/verify-otp", post(verify_otp))
        .route("/user/login", post(login))
        .route("/user/logout", get(logout))
        .route("/user/me", get(get_me))
        .route("/user/password/forgot", post(forgot_password))
        .route("/user/password/reset/:token", put(reset_password))
        .route("/user/password/update", put(update_password))
}

/// Signs a session token, sets it as the `token` cookie and echoes it in the body.
fn send_token(
    state: &AppState,
    user: &User,
    message: &str,
) -> AppResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    let keys = JwtKeys::from_ref(state);
    let token = keys.sign(user.id).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        AppError::Internal(e)
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, keys.session_cookie(&token)?);
    Ok((
        StatusCode::OK,
        headers,
        Json(AuthResponse {
            success: true,
            message: message.to_string(),
            user: PublicUser::from(user),
            token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::register(&state, payload).await?;
    Ok(Json(MessageResponse::ok("Verification code sent successfully.")))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<VerifyOtpRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    let user = services::verify_otp(&state, &payload.email, payload.otp).await?;
    send_token(&state, &user, "Account Verified.")
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    let user = services::login(&state, &payload.email, &payload.password).await?;
    send_token(&state, &user, "Login Successful")
}

pub async fn logout() -> (HeaderMap, Json<MessageResponse>) {
    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, clear_session_cookie());
    (headers, Json(MessageResponse::ok("Logged out Successfully")))
}

pub async fn get_me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse {
        success: true,
        user: PublicUser::from(&user),
    })
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = services::forgot_password(&state, &payload.email).await?;
    Ok(Json(MessageResponse::ok(format!(
        "Email sent to {} successfully",
        email
    ))))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    let user = services::reset_password(&state, &token, payload).await?;
    send_token(&state, &user, "Password reset successful")
}

#[instrument(skip_all)]
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<UpdatePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    services::update_password(&state, &user, payload).await?;
    Ok(Json(MessageResponse::ok("Password updated successfully")))
}
