//! Registration, OTP verification, login and credential reset.
//!
//! Per email an account moves `NoAccount -> PendingVerification(n) -> Verified`.
//! Pending records pile up on retries (at most [`MAX_PENDING_REGISTRATIONS`]);
//! verifying keeps the newest one and discards the rest.

use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use super::{
    dto::{OtpInput, RegisterRequest, ResetPasswordRequest, UpdatePasswordRequest},
    password::{hash_password, password_length_ok, verify_password},
    roles::Role,
    tokens::{generate_otp, generate_reset_token, hash_reset_token},
};
use crate::{
    error::{AppError, AppResult},
    mail::{forgot_password_email, verification_code_email},
    state::AppState,
    users::model::{NewUser, User},
};

pub const MAX_PENDING_REGISTRATIONS: i64 = 5;

const PASSWORD_LENGTH_MSG: &str = "Password must be between 8 and 20 characters long.";
const INVALID_CREDENTIALS_MSG: &str = "Invalid email or password";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Rejects malformed emails and emails already held by a verified account.
pub(crate) async fn ensure_email_available(state: &AppState, email: &str) -> AppResult<()> {
    if !is_valid_email(email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::bad_request("Invalid email"));
    }
    if state.users.find_verified_by_email(email).await?.is_some() {
        warn!(email = %email, "account already exists");
        return Err(AppError::bad_request("Account already exists."));
    }
    Ok(())
}

/// Email availability plus the password length rule. Used by admin provisioning.
pub(crate) async fn check_new_account(
    state: &AppState,
    email: &str,
    password: &str,
) -> AppResult<()> {
    ensure_email_available(state, email).await?;
    if !password_length_ok(password) {
        return Err(AppError::bad_request(PASSWORD_LENGTH_MSG));
    }
    Ok(())
}

#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn register(state: &AppState, req: RegisterRequest) -> AppResult<()> {
    let name = req.name.trim().to_string();
    let email = normalize_email(&req.email);
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::bad_request("Please enter all the fields."));
    }

    ensure_email_available(state, &email).await?;
    let pending = state.users.count_pending(&email).await?;
    if pending >= MAX_PENDING_REGISTRATIONS {
        warn!(email = %email, pending, "too many registration attempts");
        return Err(AppError::bad_request(
            "You have exceeded the number of registration attempts. Please contact support.",
        ));
    }
    if !password_length_ok(&req.password) {
        return Err(AppError::bad_request(PASSWORD_LENGTH_MSG));
    }

    let password_hash = hash_password(&req.password)?;
    let ttl = state.config.otp_ttl_minutes;
    let (code, expire) = generate_otp(OffsetDateTime::now_utc(), ttl);
    let user = state
        .users
        .create(NewUser {
            name,
            email: email.clone(),
            password_hash,
            role: Role::User,
            account_verified: false,
            verification_code: Some(code),
            verification_code_expire: Some(expire),
            avatar: None,
        })
        .await?;

    if let Err(e) = state.mailer.send(verification_code_email(&email, code, ttl)).await {
        error!(error = %e, user_id = %user.id, "verification email failed; discarding pending record");
        if let Err(e) = state.users.delete(user.id).await {
            error!(error = %e, user_id = %user.id, "failed to discard pending record");
        }
        return Err(AppError::Upstream("Verification code failed to send.".into()));
    }

    info!(user_id = %user.id, pending = pending + 1, "registration pending verification");
    Ok(())
}

#[instrument(skip(state, otp))]
pub async fn verify_otp(state: &AppState, email: &str, otp: Option<OtpInput>) -> AppResult<User> {
    let email = normalize_email(email);
    let otp = match otp {
        Some(o) if !email.is_empty() && !o.is_blank() => o,
        _ => return Err(AppError::bad_request("Email or OTP is missing.")),
    };

    let mut entries = state.users.list_pending(&email).await?;
    if entries.is_empty() {
        return Err(AppError::not_found("User not found."));
    }
    // newest wins, the rest are discarded before the code is even checked
    let user = entries.remove(0);
    if !entries.is_empty() {
        let removed = state.users.delete_pending_except(&email, user.id).await?;
        info!(kept = %user.id, removed, "discarded duplicate pending registrations");
    }

    let submitted = otp.code();
    if submitted.is_none() || submitted != user.verification_code {
        warn!(user_id = %user.id, "invalid otp");
        return Err(AppError::bad_request("Invalid OTP"));
    }
    if user.otp_expired_at(OffsetDateTime::now_utc()) {
        warn!(user_id = %user.id, "otp expired");
        return Err(AppError::bad_request("OTP has been expired"));
    }

    let user = state.users.mark_verified(user.id).await?.ok_or_else(|| {
        warn!(user_id = %user.id, "pending record verified or removed concurrently");
        AppError::not_found("User not found.")
    })?;
    info!(user_id = %user.id, "account verified");
    Ok(user)
}

#[instrument(skip(state, password))]
pub async fn login(state: &AppState, email: &str, password: &str) -> AppResult<User> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::bad_request("Please enter email and password"));
    }

    let Some(user) = state.users.find_verified_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS_MSG));
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::unauthorized(INVALID_CREDENTIALS_MSG));
    }

    info!(user_id = %user.id, "user logged in");
    Ok(user)
}

/// Mails a reset link; returns the address it was sent to.
#[instrument(skip(state))]
pub async fn forgot_password(state: &AppState, email: &str) -> AppResult<String> {
    let email = normalize_email(email);
    if email.is_empty() {
        return Err(AppError::bad_request("Please enter email"));
    }
    let user = state
        .users
        .find_verified_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let (raw, hashed) = generate_reset_token();
    let ttl = state.config.reset_ttl_minutes;
    let expire = OffsetDateTime::now_utc() + Duration::minutes(ttl);
    state.users.set_reset_token(user.id, Some((&hashed, expire))).await?;

    let reset_url = format!(
        "{}/password/reset/{}",
        state.config.frontend_url.trim_end_matches('/'),
        raw
    );
    if let Err(e) = state
        .mailer
        .send(forgot_password_email(&user.email, &reset_url, ttl))
        .await
    {
        error!(error = %e, user_id = %user.id, "reset email failed; clearing token");
        state.users.set_reset_token(user.id, None).await?;
        return Err(AppError::Upstream("Email could not be sent".into()));
    }

    info!(user_id = %user.id, "password reset mail sent");
    Ok(user.email)
}

#[instrument(skip_all)]
pub async fn reset_password(
    state: &AppState,
    token: &str,
    req: ResetPasswordRequest,
) -> AppResult<User> {
    let hashed = hash_reset_token(token);
    let user = state
        .users
        .find_by_reset_token(&hashed, OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| {
            warn!("reset token unknown or expired");
            AppError::bad_request("Invalid or expired reset token")
        })?;

    if req.password != req.confirm_password {
        return Err(AppError::bad_request("Password does not match"));
    }
    if !password_length_ok(&req.password) {
        return Err(AppError::bad_request(PASSWORD_LENGTH_MSG));
    }

    let password_hash = hash_password(&req.password)?;
    let user = state.users.replace_password(user.id, &password_hash).await?;
    info!(user_id = %user.id, "password reset");
    Ok(user)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_password(
    state: &AppState,
    user: &User,
    req: UpdatePasswordRequest,
) -> AppResult<()> {
    if req.current_password.is_empty()
        || req.new_password.is_empty()
        || req.confirm_new_password.is_empty()
    {
        return Err(AppError::bad_request("Please enter all the fields."));
    }
    if !verify_password(&req.current_password, &user.password_hash)? {
        return Err(AppError::bad_request("Current password is incorrect"));
    }
    if !password_length_ok(&req.new_password) || !password_length_ok(&req.confirm_new_password) {
        return Err(AppError::bad_request(PASSWORD_LENGTH_MSG));
    }
    if req.new_password != req.confirm_new_password {
        return Err(AppError::bad_request(
            "New Password and Confirm Password do not match.",
        ));
    }

    let password_hash = hash_password(&req.new_password)?;
    state.users.replace_password(user.id, &password_hash).await?;
    info!("password updated");
    Ok(())
}
