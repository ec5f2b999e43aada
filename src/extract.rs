use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
};
use uuid::Uuid;

use crate::error::AppError;

/// JSON body whose rejections use the app's error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Multipart form whose rejections use the app's error shape.
pub struct AppMultipart(pub Multipart);

#[async_trait]
impl<S> FromRequest<S> for AppMultipart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Multipart::from_request(req, state).await?))
    }
}

/// Parses a path identifier, naming the offending field on failure.
pub fn parse_id(raw: &str, field: &'static str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::InvalidReference(field))
}
