pub mod app_server;
pub mod error;

pub use app_server::{AppServer, AppState};
pub use error::ApiError;
