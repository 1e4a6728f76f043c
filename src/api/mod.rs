pub mod response;
pub mod routes;

pub use routes::{create_router, AppState, API_KEY_HEADER};
