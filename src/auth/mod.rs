use crate::state::AppState;
use axum::Router;

pub mod credentials;
pub mod dto;
pub mod gate;
pub mod handlers;
pub mod lifecycle;
pub mod password;
pub mod recovery;
mod repo;
pub mod repo_types;
pub mod session;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::auth_routes())
}
