//! Structured logging schema and field name constants for daybook.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue (malformed stored row skipped, auth rejection) |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across a request. Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "recall", "db", "media"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "engine", "rollup", "pool", "gateway"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "entries_for_day", "calendar_month", "upload_asset"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// User scope of a recall query or mutation.
pub const USER_ID: &str = "user_id";

/// Entry UUID being operated on.
pub const ENTRY_ID: &str = "entry_id";

/// Opaque media asset identifier.
pub const ASSET_ID: &str = "asset_id";

/// Local calendar date (`YYYY-MM-DD`) a query targets.
pub const LOCAL_DATE: &str = "local_date";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of candidate entries fetched before grouping.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of buckets (months, years, days) a query produced.
pub const BUCKET_COUNT: &str = "bucket_count";

/// Number of stored rows skipped as malformed during normalization.
pub const SKIPPED_COUNT: &str = "skipped_count";

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
