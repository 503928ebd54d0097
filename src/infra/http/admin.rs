use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::{
    application::{
        admin::{
            AdminCategoryService, AdminError, AdminPatternService, CategoryInput, FieldErrors,
            PatternInput,
        },
        content::{ContentError, ContentStoreError},
        error::{ErrorReport, HttpError},
    },
    cache::ContentCache,
    domain::locale::Locale,
};

use super::{
    HealthProbe, db_health_response,
    middleware::{log_responses, set_request_context},
    repo_error_to_http,
};

// Room for a 1 MiB Markdown body after JSON escaping.
const ADMIN_BODY_LIMIT: usize = 4 * 1024 * 1024;

#[derive(Clone)]
pub struct AdminState {
    pub categories: Arc<AdminCategoryService>,
    pub patterns: Arc<AdminPatternService>,
    pub cache: Arc<ContentCache>,
    pub health: Arc<dyn HealthProbe>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route(
            "/admin/categories",
            get(list_categories).post(create_category),
        )
        .route(
            "/admin/categories/{id}",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
        .route("/admin/patterns", get(list_patterns).post(create_pattern))
        .route(
            "/admin/patterns/{id}",
            get(get_pattern).put(update_pattern).delete(delete_pattern),
        )
        .route(
            "/admin/patterns/{id}/content/{locale}",
            get(read_content).put(save_content),
        )
        .route("/admin/cache/patterns", post(evict_patterns))
        .route("/_health/db", get(admin_health))
        .layer(DefaultBodyLimit::max(ADMIN_BODY_LIMIT))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn list_categories(State(state): State<AdminState>) -> Response {
    match state.categories.list().await {
        Ok(records) => Json(records).into_response(),
        Err(err) => admin_error_response("infra::http::admin::list_categories", err),
    }
}

async fn get_category(State(state): State<AdminState>, Path(id): Path<Uuid>) -> Response {
    match state.categories.get(id).await {
        Ok(record) => Json(record).into_response(),
        Err(err) => admin_error_response("infra::http::admin::get_category", err),
    }
}

async fn create_category(
    State(state): State<AdminState>,
    Json(input): Json<CategoryInput>,
) -> Response {
    match state.categories.create(input).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => admin_error_response("infra::http::admin::create_category", err),
    }
}

async fn update_category(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(input): Json<CategoryInput>,
) -> Response {
    match state.categories.update(id, input).await {
        Ok(record) => Json(record).into_response(),
        Err(err) => admin_error_response("infra::http::admin::update_category", err),
    }
}

async fn delete_category(State(state): State<AdminState>, Path(id): Path<Uuid>) -> Response {
    match state.categories.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => admin_error_response("infra::http::admin::delete_category", err),
    }
}

async fn list_patterns(State(state): State<AdminState>) -> Response {
    match state.patterns.list().await {
        Ok(records) => Json(records).into_response(),
        Err(err) => admin_error_response("infra::http::admin::list_patterns", err),
    }
}

async fn get_pattern(State(state): State<AdminState>, Path(id): Path<Uuid>) -> Response {
    match state.patterns.get(id).await {
        Ok(record) => Json(record).into_response(),
        Err(err) => admin_error_response("infra::http::admin::get_pattern", err),
    }
}

async fn create_pattern(
    State(state): State<AdminState>,
    Json(input): Json<PatternInput>,
) -> Response {
    match state.patterns.create(input).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => admin_error_response("infra::http::admin::create_pattern", err),
    }
}

async fn update_pattern(
    State(state): State<AdminState>,
    Path(id): Path<Uuid>,
    Json(input): Json<PatternInput>,
) -> Response {
    match state.patterns.update(id, input).await {
        Ok(record) => Json(record).into_response(),
        Err(err) => admin_error_response("infra::http::admin::update_pattern", err),
    }
}

async fn delete_pattern(State(state): State<AdminState>, Path(id): Path<Uuid>) -> Response {
    match state.patterns.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => admin_error_response("infra::http::admin::delete_pattern", err),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentBody {
    markdown: String,
}

async fn read_content(
    State(state): State<AdminState>,
    Path((id, locale)): Path<(Uuid, String)>,
) -> Response {
    let locale = match parse_locale(&locale) {
        Ok(locale) => locale,
        Err(response) => return response,
    };
    match state.patterns.read_content(id, locale).await {
        Ok(markdown) => Json(ContentBody { markdown }).into_response(),
        Err(err) => admin_error_response("infra::http::admin::read_content", err),
    }
}

async fn save_content(
    State(state): State<AdminState>,
    Path((id, locale)): Path<(Uuid, String)>,
    Json(body): Json<ContentBody>,
) -> Response {
    let locale = match parse_locale(&locale) {
        Ok(locale) => locale,
        Err(response) => return response,
    };
    match state.patterns.save_content(id, locale, &body.markdown).await {
        Ok(record) => Json(record).into_response(),
        Err(err) => admin_error_response("infra::http::admin::save_content", err),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EvictRequest {
    all: bool,
}

#[derive(Debug, Serialize)]
struct EvictResponse {
    evicted: usize,
}

async fn evict_patterns(
    State(state): State<AdminState>,
    body: Option<Json<EvictRequest>>,
) -> Response {
    let all = body.map(|Json(request)| request.all).unwrap_or(false);
    let evicted = if all {
        state.cache.flush()
    } else {
        state.cache.forget_catalog()
    };
    info!(
        target = "infra::http::admin::cache",
        all, evicted, "Catalogue cache evicted"
    );
    Json(EvictResponse { evicted }).into_response()
}

async fn admin_health(State(state): State<AdminState>) -> Response {
    db_health_response(state.health.as_ref()).await
}

fn parse_locale(raw: &str) -> Result<Locale, Response> {
    raw.parse().map_err(|_| {
        validation_response(
            "infra::http::admin::parse_locale",
            FieldErrors::single("locale", format!("unsupported locale `{raw}`")),
        )
    })
}

fn validation_response(source: &'static str, errors: FieldErrors) -> Response {
    let detail = errors.fields().collect::<Vec<_>>().join(", ");
    let mut response = (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "errors": errors })),
    )
        .into_response();
    ErrorReport::from_message(
        source,
        StatusCode::UNPROCESSABLE_ENTITY,
        format!("validation failed on {detail}"),
    )
    .attach(&mut response);
    response
}

fn json_error(source: &'static str, status: StatusCode, message: &str, err: &AdminError) -> Response {
    let mut response = (status, Json(json!({ "error": message }))).into_response();
    ErrorReport::from_error(source, status, err).attach(&mut response);
    response
}

fn admin_error_response(source: &'static str, err: AdminError) -> Response {
    match err {
        AdminError::Validation(errors) => validation_response(source, errors),
        AdminError::UnknownCategory => validation_response(
            source,
            FieldErrors::single("category_id", "does not reference an existing category"),
        ),
        AdminError::CategoryInUse { .. } => json_error(
            source,
            StatusCode::CONFLICT,
            "Category still has patterns",
            &err,
        ),
        AdminError::NotFound => {
            json_error(source, StatusCode::NOT_FOUND, "Resource not found", &err)
        }
        AdminError::Repo(err) | AdminError::Content(ContentError::Repo(err)) => {
            repo_error_to_http(source, err).into_response()
        }
        AdminError::Content(ContentError::Store(err @ ContentStoreError::InvalidPath(_))) => {
            HttpError::from_error(
                source,
                StatusCode::BAD_REQUEST,
                "Invalid content path",
                &err,
            )
            .into_response()
        }
        AdminError::Content(ContentError::Store(err)) => HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Content storage error",
            &err,
        )
        .into_response(),
    }
}
