//! daybook-api - HTTP API server for daybook

mod media;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Multipart, Path, Query, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use uuid::Uuid;

use daybook_core::{
    AccessToken, AuthClaims, CalendarDay, CalendarZone, CreateTokenRequest, CreateTokenResponse,
    Entry, EntryRepository, MediaStore, MediaVariant, NewEntry, Role, TokenVerifier, UpdateEntry,
    User, UserRepository, DEFAULT_JOURNAL_TIMEZONE,
};
use daybook_db::{Database, PgEntryStore};
use daybook_recall::RecallEngine;

use media::MediaGateway;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation and debugging production incidents.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    /// Recall engine over the Postgres entry store.
    engine: Arc<RecallEngine<PgEntryStore>>,
    /// Gateway to the external media service.
    media: Arc<MediaGateway>,
}

/// OpenAPI documentation served at `/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Daybook API",
        description = "Daily journal with temporal recall: entries per day, this day in earlier months and years, and month calendar rollups"
    ),
    paths(
        get_entries_for_day,
        get_same_day_previous_months,
        get_same_day_previous_years,
        get_today_summary,
        get_calendar_entries
    ),
    components(schemas(Entry, CalendarDay, User, Role, CreateTokenRequest, CreateTokenResponse)),
    tags(
        (name = "Recall", description = "Temporal recall queries"),
        (name = "Entries", description = "Entry create/update/delete"),
        (name = "Media", description = "Media asset proxy"),
        (name = "Auth", description = "Login and access tokens"),
        (name = "System", description = "Health checks")
    )
)]
struct ApiDoc;

// =============================================================================
// ERROR MAPPING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Database(daybook_core::Error),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    BadRequest(String),
    UpstreamMedia(String),
}

impl From<daybook_core::Error> for ApiError {
    fn from(err: daybook_core::Error) -> Self {
        match &err {
            daybook_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            daybook_core::Error::EntryNotFound(id) => {
                ApiError::NotFound(format!("Entry not found: {}", id))
            }
            daybook_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            daybook_core::Error::Unauthorized(msg) => ApiError::Unauthorized(msg.clone()),
            daybook_core::Error::Forbidden(msg) => ApiError::Forbidden(msg.clone()),
            daybook_core::Error::Media(msg) => ApiError::UpstreamMedia(msg.clone()),
            _ => ApiError::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::UpstreamMedia(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// AUTHENTICATION EXTRACTOR
// =============================================================================

/// Pull the bearer credential out of an `Authorization` header value.
fn bearer_token(header_value: Option<&str>) -> Option<&str> {
    match header_value {
        Some(h) if h.starts_with("Bearer ") => {
            let token = h.trim_start_matches("Bearer ").trim();
            (!token.is_empty()).then_some(token)
        }
        _ => None,
    }
}

/// Extractor that requires a verified user on the request.
///
/// The verified `user_id` scopes every downstream query; it is never taken
/// from request parameters.
#[derive(Debug, Clone)]
struct RequireUser {
    claims: AuthClaims,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = bearer_token(header_value).ok_or_else(|| {
            ApiError::Unauthorized("Missing or malformed Authorization header".to_string())
        })?;

        let claims = state.db.tokens.verify(token).await.map_err(ApiError::from)?;
        Ok(RequireUser { claims })
    }
}

impl RequireUser {
    fn user_id(&self) -> &str {
        &self.claims.user_id
    }

    fn require_admin(&self) -> Result<(), ApiError> {
        if self.claims.role != Role::Admin {
            return Err(ApiError::Forbidden("Admin role required".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// QUERY TYPES
// =============================================================================

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct DayQuery {
    year: i32,
    /// Calendar month, 1-12.
    month: u32,
    /// Calendar day, 1-31.
    day: u32,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct MonthQuery {
    year: i32,
    /// Calendar month, 1-12.
    month: u32,
}

#[derive(Debug, Deserialize)]
struct MediaQuery {
    /// "thumbnail" (default) or "full".
    variant: Option<String>,
}

// =============================================================================
// SYSTEM HANDLERS
// =============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").execute(state.db.pool()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ok",
                "database": "up",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        ),
        Err(err) => {
            warn!(
                subsystem = "api",
                component = "health",
                error = %err,
                "Health check failed: database ping error"
            );
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "degraded",
                    "database": "down",
                })),
            )
        }
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

// =============================================================================
// RECALL HANDLERS
// =============================================================================

/// All entries filed under one exact local day.
#[utoipa::path(get, path = "/api/v1/entries/day", tag = "Recall",
    params(DayQuery),
    responses(
        (status = 200, description = "Entries of the day, oldest first", body = [Entry]),
        (status = 400, description = "Non-existent calendar date")
    ))]
async fn get_entries_for_day(
    State(state): State<AppState>,
    auth: RequireUser,
    Query(q): Query<DayQuery>,
) -> Result<Json<Vec<Entry>>, ApiError> {
    let entries = state
        .engine
        .entries_for_day(auth.user_id(), q.year, q.month, q.day)
        .await?;
    Ok(Json(entries))
}

/// Best entry for this day in each earlier month of the same year.
#[utoipa::path(get, path = "/api/v1/entries/same-day/previous-months", tag = "Recall",
    params(DayQuery),
    responses(
        (status = 200, description = "One best entry per month, ascending", body = [Entry]),
        (status = 400, description = "Non-existent calendar date")
    ))]
async fn get_same_day_previous_months(
    State(state): State<AppState>,
    auth: RequireUser,
    Query(q): Query<DayQuery>,
) -> Result<Json<Vec<Entry>>, ApiError> {
    let entries = state
        .engine
        .same_day_previous_months(auth.user_id(), q.year, q.month, q.day)
        .await?;
    Ok(Json(entries))
}

/// Best entry for this day-of-month in each previous year.
#[utoipa::path(get, path = "/api/v1/entries/same-day/previous-years", tag = "Recall",
    params(DayQuery),
    responses(
        (status = 200, description = "One best entry per year, ascending", body = [Entry]),
        (status = 400, description = "Non-existent calendar date")
    ))]
async fn get_same_day_previous_years(
    State(state): State<AppState>,
    auth: RequireUser,
    Query(q): Query<DayQuery>,
) -> Result<Json<Vec<Entry>>, ApiError> {
    let entries = state
        .engine
        .same_day_previous_years(auth.user_id(), q.year, q.month, q.day)
        .await?;
    Ok(Json(entries))
}

/// The single best entry of a day, or null.
#[utoipa::path(get, path = "/api/v1/entries/today-summary", tag = "Recall",
    params(DayQuery),
    responses(
        (status = 200, description = "Best entry of the day, or a null payload", body = Entry),
        (status = 400, description = "Non-existent calendar date")
    ))]
async fn get_today_summary(
    State(state): State<AppState>,
    auth: RequireUser,
    Query(q): Query<DayQuery>,
) -> Result<Json<Option<Entry>>, ApiError> {
    let entry = state
        .engine
        .today_summary(auth.user_id(), q.year, q.month, q.day)
        .await?;
    Ok(Json(entry))
}

/// Day-level rollup of a whole month for calendar rendering.
#[utoipa::path(get, path = "/api/v1/entries/calendar", tag = "Recall",
    params(MonthQuery),
    responses(
        (status = 200, description = "One row per day with data, ascending", body = [CalendarDay]),
        (status = 400, description = "Month outside 1-12")
    ))]
async fn get_calendar_entries(
    State(state): State<AppState>,
    auth: RequireUser,
    Query(q): Query<MonthQuery>,
) -> Result<Json<Vec<CalendarDay>>, ApiError> {
    let rows = state
        .engine
        .calendar_month(auth.user_id(), q.year, q.month)
        .await?;
    Ok(Json(rows))
}

// =============================================================================
// ENTRY MUTATION HANDLERS
// =============================================================================

/// One uploaded file pulled out of a multipart form.
struct UploadedFile {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// Fields shared by the entry mutation forms.
#[derive(Default)]
struct EntryForm {
    caption: Option<String>,
    date: Option<String>,
    remove_asset_ids: Vec<String>,
    uploads: Vec<UploadedFile>,
}

/// Drain a multipart form into [`EntryForm`].
///
/// Text fields: `caption`, `date` (`YYYY-MM-DD`), `remove_asset_ids` (JSON
/// array of strings). Every field carrying a filename is treated as a media
/// upload, in form order.
async fn read_entry_form(mut multipart: Multipart) -> Result<EntryForm, ApiError> {
    let mut form = EntryForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let field_name = field.name().map(|n| n.to_string());

        if let Some(file_name) = field.file_name().map(|f| f.to_string()) {
            let content_type = field
                .content_type()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?
                .to_vec();
            form.uploads.push(UploadedFile {
                file_name,
                content_type,
                bytes,
            });
            continue;
        }

        match field_name.as_deref() {
            Some("caption") => {
                form.caption = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?,
                );
            }
            Some("date") => {
                form.date = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?,
                );
            }
            Some("remove_asset_ids") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?;
                form.remove_asset_ids = parse_remove_asset_ids(&raw)?;
            }
            _ => {} // ignore unknown fields
        }
    }

    Ok(form)
}

/// Parse the `remove_asset_ids` form field (a JSON array of strings).
fn parse_remove_asset_ids(raw: &str) -> Result<Vec<String>, ApiError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| ApiError::BadRequest(format!("remove_asset_ids must be a JSON array: {}", e)))
}

/// Upload every file in the form, returning asset ids in form order.
async fn upload_all(
    media: &MediaGateway,
    user_id: &str,
    uploads: Vec<UploadedFile>,
) -> Result<Vec<String>, ApiError> {
    let mut asset_ids = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let asset_id = media
            .upload_asset(user_id, &upload.file_name, &upload.content_type, upload.bytes)
            .await?;
        asset_ids.push(asset_id);
    }
    Ok(asset_ids)
}

async fn create_entry(
    State(state): State<AppState>,
    auth: RequireUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let form = read_entry_form(multipart).await?;
    let asset_ids = upload_all(&state.media, auth.user_id(), form.uploads).await?;

    let id = state
        .db
        .entries
        .insert(NewEntry {
            user_id: auth.user_id().to_string(),
            caption: form.caption,
            media_asset_ids: asset_ids,
            local_date: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

async fn create_backfilled_entry(
    State(state): State<AppState>,
    auth: RequireUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let form = read_entry_form(multipart).await?;

    let date_str = form
        .date
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("date field is required".to_string()))?;
    let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("malformed date: {}", date_str)))?;

    let asset_ids = upload_all(&state.media, auth.user_id(), form.uploads).await?;

    let id = state
        .db
        .entries
        .insert(NewEntry {
            user_id: auth.user_id().to_string(),
            caption: form.caption,
            media_asset_ids: asset_ids,
            local_date: Some(date),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

async fn update_entry(
    State(state): State<AppState>,
    auth: RequireUser,
    Path(entry_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    let form = read_entry_form(multipart).await?;
    let add_asset_ids = upload_all(&state.media, auth.user_id(), form.uploads).await?;

    state
        .db
        .entries
        .update(
            auth.user_id(),
            entry_id,
            UpdateEntry {
                caption: form.caption,
                add_asset_ids,
                remove_asset_ids: form.remove_asset_ids,
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn delete_entry(
    State(state): State<AppState>,
    auth: RequireUser,
    Path(entry_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.db.entries.delete(auth.user_id(), entry_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// MEDIA PROXY HANDLER
// =============================================================================

/// Cache policy per variant: thumbnails change with reprocessing upstream,
/// originals are immutable by asset id.
fn cache_control_for(variant: MediaVariant) -> &'static str {
    match variant {
        MediaVariant::Thumbnail => "no-store",
        MediaVariant::Full => "public, max-age=31536000, immutable",
    }
}

async fn get_media_asset(
    State(state): State<AppState>,
    _auth: RequireUser,
    Path(asset_id): Path<String>,
    Query(q): Query<MediaQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let variant = MediaVariant::from_param(q.variant.as_deref());
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let asset = state
        .media
        .fetch_asset(&asset_id, variant, range.as_deref())
        .await?;

    let mut builder = Response::builder()
        .status(StatusCode::from_u16(asset.status).unwrap_or(StatusCode::BAD_GATEWAY))
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, cache_control_for(variant));

    if let Some(content_type) = asset.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    if let Some(content_length) = asset.content_length {
        builder = builder.header(header::CONTENT_LENGTH, content_length);
    }
    if let Some(content_range) = asset.content_range {
        builder = builder.header(header::CONTENT_RANGE, content_range);
    }

    builder
        .body(axum::body::Body::from(asset.body))
        .map_err(|e| ApiError::UpstreamMedia(format!("response build failed: {}", e)))
}

// =============================================================================
// AUTH HANDLERS
// =============================================================================

/// Upsert the caller from verified claims and return the profile.
async fn login(State(state): State<AppState>, auth: RequireUser) -> Json<User> {
    let user = User::from_claims(&auth.claims);

    // Profile sync is best-effort; login must not fail on a write hiccup.
    if let Err(err) = state.db.users.upsert(&user).await {
        warn!(
            subsystem = "api",
            component = "auth",
            user_id = %user.id,
            error = %err,
            "Failed to sync user profile at login"
        );
    }

    Json(user)
}

async fn create_token(
    State(state): State<AppState>,
    auth: RequireUser,
    Json(req): Json<CreateTokenRequest>,
) -> Result<(StatusCode, Json<CreateTokenResponse>), ApiError> {
    auth.require_admin()?;
    let response = state.db.tokens.create_token(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn list_tokens(
    State(state): State<AppState>,
    auth: RequireUser,
) -> Result<Json<Vec<AccessToken>>, ApiError> {
    let tokens = state.db.tokens.list_tokens(auth.user_id()).await?;
    Ok(Json(tokens))
}

async fn revoke_token(
    State(state): State<AppState>,
    auth: RequireUser,
    Path(token_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;
    if state.db.tokens.revoke_token(token_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Token not found: {}", token_id)))
    }
}

// =============================================================================
// CORS
// =============================================================================

/// Parse the CORS origin whitelist from `ALLOWED_ORIGINS`.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str = std::env::var("ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://localhost:19006".to_string());

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "daybook_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "daybook_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("daybook-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/daybook".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "8081".to_string())
        .parse()
        .unwrap_or(8081);

    // One calendar zone for the whole journal, threaded explicitly from here
    let zone_name = std::env::var("JOURNAL_TIMEZONE")
        .unwrap_or_else(|_| DEFAULT_JOURNAL_TIMEZONE.to_string());
    let zone = CalendarZone::from_name(&zone_name)
        .map_err(|e| anyhow::anyhow!("JOURNAL_TIMEZONE: {}", e))?;
    info!(timezone = zone.name(), "Journal calendar zone configured");

    // Upload size ceiling (caption + a handful of photos/videos)
    let body_limit: usize = std::env::var("REQUEST_BODY_LIMIT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100 * 1024 * 1024); // 100 MB

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url, zone).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Media gateway (external asset service)
    let media = Arc::new(MediaGateway::from_env()?);

    // Recall engine over its own read store
    let engine = Arc::new(RecallEngine::new(
        PgEntryStore::new(db.pool().clone(), zone),
        zone,
    ));

    let state = AppState { db, engine, media };

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // OpenAPI document
        .route("/openapi.json", get(openapi_json))
        // Entry mutations
        .route("/api/v1/entries", post(create_entry))
        .route("/api/v1/entries/backfill", post(create_backfilled_entry))
        .route(
            "/api/v1/entries/:id",
            patch(update_entry).delete(delete_entry),
        )
        // Temporal recall
        .route("/api/v1/entries/day", get(get_entries_for_day))
        .route(
            "/api/v1/entries/same-day/previous-months",
            get(get_same_day_previous_months),
        )
        .route(
            "/api/v1/entries/same-day/previous-years",
            get(get_same_day_previous_years),
        )
        .route("/api/v1/entries/today-summary", get(get_today_summary))
        .route("/api/v1/entries/calendar", get(get_calendar_entries))
        // Media proxy
        .route("/api/v1/media/:asset_id", get(get_media_asset))
        // Login and tokens
        .route("/api/v1/login", get(login))
        .route("/api/v1/tokens", post(create_token).get(list_tokens))
        .route("/api/v1/tokens/:id", delete(revoke_token))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600))
        })
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(Some("Bearer dk_abc")), Some("dk_abc"));
        assert_eq!(bearer_token(Some("Bearer   dk_abc  ")), Some("dk_abc"));
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(Some("Basic dXNlcg==")), None);
        assert_eq!(bearer_token(Some("dk_abc")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn test_api_error_status_codes() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                ApiError::BadRequest("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Unauthorized("no".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (ApiError::Forbidden("nope".into()), StatusCode::FORBIDDEN),
            (ApiError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (
                ApiError::UpstreamMedia("dead".into()),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_invalid_input_maps_to_bad_request() {
        let err: ApiError = daybook_core::Error::InvalidInput("Feb 30".into()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err: ApiError = daybook_core::Error::EntryNotFound(Uuid::nil()).into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_parse_remove_asset_ids() {
        assert_eq!(parse_remove_asset_ids("").unwrap(), Vec::<String>::new());
        assert_eq!(
            parse_remove_asset_ids(r#"["a","b"]"#).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(parse_remove_asset_ids("not json").is_err());
    }

    #[test]
    fn test_cache_control_per_variant() {
        assert_eq!(cache_control_for(MediaVariant::Thumbnail), "no-store");
        assert!(cache_control_for(MediaVariant::Full).contains("immutable"));
    }
}
