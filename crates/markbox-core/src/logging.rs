//! Structured logging schema and field name constants for markbox.
//!
//! All crates use these field names for structured `tracing` events so log
//! aggregation can query by the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, request continues |
//! | INFO  | Lifecycle events (startup, shutdown), logins, completed writes |
//! | DEBUG | Decision points, resolved references, config choices |
//! | TRACE | Per-item iteration (individual tag resolutions) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the `x-request-id` header (UUIDv7).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "auth", "database", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "bookmarks", "categories", "tags", "auth_refresh"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create", "prepare_tags", "refresh", "store_file"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Owner (user) id every repository call is scoped to.
pub const OWNER_ID: &str = "owner_id";

/// Bookmark id being operated on.
pub const BOOKMARK_ID: &str = "bookmark_id";

/// Category id being operated on.
pub const CATEGORY_ID: &str = "category_id";

/// Stored file id.
pub const FILE_ID: &str = "file_id";

/// Account kind used for a session refresh ("admin" or "user").
pub const ACCOUNT_KIND: &str = "account_kind";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of tag descriptors or resolved tag ids.
pub const TAG_COUNT: &str = "tag_count";

/// Size of a stored blob in bytes.
pub const SIZE_BYTES: &str = "size_bytes";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
