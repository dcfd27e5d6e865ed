pub mod api;
pub mod app;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod session;
pub mod simulator;
pub mod storage;
pub mod view;

pub use api::{ApiClient, BackendApi};
pub use app::App;
pub use bridge::SyncBridge;
pub use error::{ClientError, Result, ValidationError};
