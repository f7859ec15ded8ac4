//! Outbound services and per-request session state.

pub mod auth_client;
pub mod auth_store;
pub mod image_fetcher;

pub use auth_client::{AccountKind, AuthRefresh, AuthService, HttpAuthService};
pub use auth_store::AuthStore;
pub use image_fetcher::{image_file_name, HttpImageFetcher, ImageFetcher};
