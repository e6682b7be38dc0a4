mod dto;
pub mod handlers;
pub mod memory;
pub mod model;
pub mod pg;
pub mod store;

use crate::state::AppState;
use axum::Router;

pub fn router(state: &AppState) -> Router<AppState> {
    handlers::user_routes(state)
}
