// HTTP server setup (Axum + JSON API)
pub mod app;
pub mod error;
pub mod routes;

pub use app::*;
pub use error::*;
