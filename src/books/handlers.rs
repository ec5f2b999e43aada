use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use validator::Validate;

use super::{
    dto::{AddBookRequest, BookResponse, BooksResponse},
    repo::NewBook,
};
use crate::{
    auth::{dto::MessageResponse, extractors::Authorized, roles::ManageBooks},
    error::{AppError, AppResult},
    extract::{parse_id, AppJson},
    state::AppState,
};

pub fn book_routes() -> Router<AppState> {
    Router::new()
        .route("/book/all", get(list_books))
        .route("/book/admin/add", post(add_book))
        .route("/book/delete/:id", delete(delete_book))
}

/// Catalog is public; the frontend shows it before login.
#[instrument(skip(state))]
pub async fn list_books(State(state): State<AppState>) -> AppResult<Json<BooksResponse>> {
    let books = state.books.list_all().await?;
    Ok(Json(BooksResponse {
        success: true,
        books,
    }))
}

#[instrument(skip_all)]
pub async fn add_book(
    State(state): State<AppState>,
    admin: Authorized<ManageBooks>,
    AppJson(payload): AppJson<AddBookRequest>,
) -> AppResult<Json<BookResponse>> {
    payload.validate()?;
    let book = state
        .books
        .create(NewBook {
            title: payload.title.trim().to_string(),
            author: payload.author.trim().to_string(),
            description: payload.description.trim().to_string(),
            price: payload.price.unwrap_or_default(),
            quantity: payload.quantity.unwrap_or_default(),
        })
        .await?;
    info!(book_id = %book.id, admin_id = %admin.user.id, "book added");
    Ok(Json(BookResponse {
        success: true,
        message: "Book added successfully.".into(),
        book,
    }))
}

#[instrument(skip(state, _admin))]
pub async fn delete_book(
    State(state): State<AppState>,
    _admin: Authorized<ManageBooks>,
    Path(id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    let id = parse_id(&id, "id")?;
    if !state.books.delete(id).await? {
        warn!(book_id = %id, "delete of unknown book");
        return Err(AppError::not_found("Book not found."));
    }
    info!(book_id = %id, "book deleted");
    Ok(Json(MessageResponse::ok("Book deleted successfully.")))
}
