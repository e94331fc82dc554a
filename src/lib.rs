pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod forms;
pub mod http;
pub mod models;
pub mod session;
pub mod util;
pub mod views;

pub use api::ApiClient;
pub use config::Config;
pub use error::{ClientError, FieldErrors};
pub use http::Endpoint;
pub use session::{Session, SessionEvent, SessionStore};
