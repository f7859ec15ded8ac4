//! Request middleware.

pub mod auth_refresh;

pub use auth_refresh::{account_id, auth_refresh_middleware, Session};
