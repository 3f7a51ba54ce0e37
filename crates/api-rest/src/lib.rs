//! # API REST
//!
//! REST API implementation for the COREP reporting assistant.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status mapping)
//!
//! Uses `api-shared` for wire types and `corep-core` for everything else.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::wire::{
    ContextItem, ErrorRes, HealthRes, ListTemplatesRes, PopulatedField, QueryReq, QueryRes,
    TemplateDetailRes, TemplateFieldRes, TemplateSummary,
};
use api_shared::HealthService;
use corep_core::{
    CoreConfig, CorepError, CorepResult, DocumentStore, Embedder, QueryService, Retriever,
    TemplateCatalog,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorRes>)>;

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    query_service: Arc<QueryService>,
}

impl AppState {
    pub fn new(query_service: QueryService) -> Self {
        Self {
            query_service: Arc::new(query_service),
        }
    }

    /// Wire up the services described by `config`.
    ///
    /// Loads the document store snapshot (an absent snapshot gives an empty store) and builds
    /// the configured embedder and reasoner.
    pub async fn from_config(config: &CoreConfig) -> CorepResult<Self> {
        let embedder = config.embedder()?;
        let store = DocumentStore::load_or_empty(config.store_path(), embedder.as_ref()).await?;
        tracing::info!(
            "loaded {} chunks from {} ({})",
            store.len(),
            config.store_path().display(),
            embedder.model_id()
        );

        let service = QueryService::new(
            Arc::new(TemplateCatalog::builtin()?),
            Retriever::new(Arc::new(store), embedder),
            config.reasoner()?,
            config.max_retrieval_results(),
            config.reasoning_deadline(),
        );
        Ok(Self::new(service))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(root, health, list_templates, get_template, query),
    components(schemas(
        QueryReq,
        QueryRes,
        PopulatedField,
        ContextItem,
        HealthRes,
        ListTemplatesRes,
        TemplateSummary,
        TemplateDetailRes,
        TemplateFieldRes,
        ErrorRes
    ))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/health", get(health))
        .route("/api/templates", get(list_templates))
        .route("/api/templates/:code", get(get_template))
        .route("/api/query", post(query))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("++ Starting COREP REST on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Map a core error onto a status and error body.
fn error_response(err: &CorepError) -> (StatusCode, Json<ErrorRes>) {
    let (status, kind) = match err {
        CorepError::TemplateNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        CorepError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "malformed_request"),
        CorepError::BackendUnavailable(_) | CorepError::Embedding(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "backend_unavailable")
        }
        CorepError::BackendTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "backend_timeout"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    (
        status,
        Json(ErrorRes {
            error: kind.into(),
            message: err.to_string(),
        }),
    )
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service banner with endpoint list")
    )
)]
/// Service banner listing the available endpoints.
#[axum::debug_handler]
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "COREP Regulatory Reporting Assistant API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "query": "POST /api/query",
            "health": "GET /api/health",
            "templates": "GET /api/templates",
            "template": "GET /api/templates/{code}",
            "docs": "GET /swagger-ui",
        }
    }))
}

#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Reports the number of stored document chunks and the configured reasoning and embedding
/// strategies. An empty store is reported as `degraded`.
#[axum::debug_handler]
async fn health(State(state): State<AppState>) -> Json<HealthRes> {
    let service = &state.query_service;
    Json(HealthService::check_health(
        service.retriever().document_count(),
        service.reasoner().mode().as_str(),
        service.retriever().embedding_model(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/templates",
    responses(
        (status = 200, description = "Available templates", body = ListTemplatesRes)
    )
)]
#[axum::debug_handler]
async fn list_templates(State(state): State<AppState>) -> Json<ListTemplatesRes> {
    Json(ListTemplatesRes {
        templates: state.query_service.catalog().list_templates(),
    })
}

#[utoipa::path(
    get,
    path = "/api/templates/{code}",
    params(
        ("code" = String, Path, description = "Template code, e.g. C_01.00")
    ),
    responses(
        (status = 200, description = "Template definition", body = TemplateDetailRes),
        (status = 404, description = "Unknown template", body = ErrorRes)
    )
)]
/// Template definition with its field descriptors.
#[axum::debug_handler]
async fn get_template(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<TemplateDetailRes> {
    match state.query_service.catalog().get_template(&code) {
        Ok(template) => Ok(Json(template.detail())),
        Err(e) => {
            tracing::error!("Get template error: {:?}", e);
            Err(error_response(&e))
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/query",
    request_body = QueryReq,
    responses(
        (status = 200, description = "Populated template with flags and audit log", body = QueryRes),
        (status = 400, description = "Malformed request", body = ErrorRes),
        (status = 404, description = "Unknown template", body = ErrorRes),
        (status = 503, description = "Reasoning backend unavailable", body = ErrorRes),
        (status = 504, description = "Reasoning backend timed out", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Answer a regulatory reporting query
///
/// Retrieves regulatory context for the question and scenario, populates the requested
/// template and validates the result.
///
/// # Returns
/// * `Ok(Json<QueryRes>)` - Populated fields, validation flags, audit log and context
/// * `Err((StatusCode, Json<ErrorRes>))` - Malformed request, unknown template or backend failure
#[axum::debug_handler]
async fn query(
    State(state): State<AppState>,
    payload: Result<Json<QueryReq>, JsonRejection>,
) -> ApiResult<QueryRes> {
    let Json(req) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::error!("Query rejected: {}", rejection.body_text());
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorRes {
                    error: "malformed_request".into(),
                    message: rejection.body_text(),
                }),
            ));
        }
    };

    match state.query_service.run(&req).await {
        Ok(res) => Ok(Json(res)),
        Err(e) => {
            tracing::error!("Query error: {:?}", e);
            Err(error_response(&e))
        }
    }
}
