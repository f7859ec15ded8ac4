//! Centralized default constants for markbox.
//!
//! Every crate reads its fallback values from here instead of defining its
//! own magic numbers.

// =============================================================================
// SERVER
// =============================================================================

/// Default bind host.
pub const HOST: &str = "0.0.0.0";

/// Default bind port.
pub const PORT: u16 = 3000;

/// Default database URL.
pub const DATABASE_URL: &str = "postgres://localhost/markbox";

/// Default request body limit (multipart forms carry page HTML).
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Largest remote image accepted for thumbnails and favicons.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Default CORS origins when `ALLOWED_ORIGINS` is unset.
pub const ALLOWED_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";

// =============================================================================
// AUTH
// =============================================================================

/// Base URL of the auth service.
pub const AUTH_URL: &str = "http://127.0.0.1:8090";

/// Cookie holding the serialized auth store.
pub const AUTH_COOKIE_NAME: &str = "pb_auth";

/// Requests under this path prefix refresh admin sessions.
pub const ADMIN_PATH_PREFIX: &str = "/admin";

/// Browsers cap a single cookie at roughly this many bytes.
pub const MAX_COOKIE_BYTES: usize = 4096;

// =============================================================================
// HTTP CLIENTS
// =============================================================================

/// Timeout for outbound HTTP requests (auth refresh, image fetches).
pub const HTTP_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// STORAGE
// =============================================================================

/// Default blob directory.
pub const FILE_STORAGE_PATH: &str = "/var/lib/markbox/files";

// =============================================================================
// DATABASE
// =============================================================================

/// Maximum number of pooled connections.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Connections kept open while idle.
pub const DB_MIN_CONNECTIONS: u32 = 1;

/// Seconds a request waits for a free connection.
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Seconds before a surplus idle connection is closed.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Seconds before a connection is recycled; 0 disables recycling.
pub const DB_MAX_LIFETIME_SECS: u64 = 1800;

// =============================================================================
// TAGS
// =============================================================================

/// Maximum tag name length in characters.
pub const TAG_NAME_MAX_LEN: usize = 100;

// =============================================================================
// PAGINATION
// =============================================================================

/// Page size for read endpoints when the caller sends no limit.
pub const PAGE_LIMIT: i64 = 50;

/// Upper bound on a caller-supplied limit.
pub const PAGE_LIMIT_MAX: i64 = 500;
