use crate::state::AppState;
use axum::Router;

pub mod avatar;
pub mod handlers;
pub mod model;
pub mod repo;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::user_admin_routes()
}
