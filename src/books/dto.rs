use serde::{Deserialize, Serialize};
use validator::Validate;

use super::repo::Book;

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct AddBookRequest {
    #[validate(length(min = 1, message = "Please provide the book title"))]
    pub title: String,
    #[validate(length(min = 1, message = "Please provide the author name"))]
    pub author: String,
    #[validate(length(min = 1, message = "Please provide the book description"))]
    pub description: String,
    #[validate(required(message = "Please provide the book price"), range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    #[validate(required(message = "Please provide the book quantity"), range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct BooksResponse {
    pub success: bool,
    pub books: Vec<Book>,
}

#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub success: bool,
    pub message: String,
    pub book: Book,
}
