mod dto;
pub mod error;
pub mod extract;
pub mod gateway;
mod handlers;
pub mod images;
pub mod parser;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
