use serde::{Deserialize, Serialize};

use super::tokens::parse_otp;
use crate::users::model::PublicUser;

/// Request body for user registration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// The code may arrive as a JSON integer, a whole float or a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OtpInput {
    Number(i64),
    Float(f64),
    Text(String),
}

impl OtpInput {
    pub fn is_blank(&self) -> bool {
        matches!(self, OtpInput::Text(s) if s.trim().is_empty())
    }

    /// Numeric value of the code, if it is a whole number that fits.
    pub fn code(&self) -> Option<i32> {
        match self {
            OtpInput::Number(n) => i32::try_from(*n).ok(),
            OtpInput::Float(f) => {
                let whole = f.fract() == 0.0 && (i32::MIN as f64..=i32::MAX as f64).contains(f);
                whole.then_some(*f as i32)
            }
            OtpInput::Text(s) => parse_otp(s),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: Option<OtpInput>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

/// Plain `{ success, message }` acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Returned whenever a session token is issued.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub message: String,
    pub user: PublicUser,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: PublicUser,
}
