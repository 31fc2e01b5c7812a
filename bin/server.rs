// Portfolio Import - Web Server
// REST API with Axum: workbook import + taxonomy lookups for the form layer

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use portfolio_import::taxonomy::open_taxonomy;
use portfolio_import::{ImportConfig, ImportError, PortfolioImporter, ProductType, TaxonomySource, Workbook};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "portfolio-server")]
#[command(about = "HTTP API for portfolio spreadsheet imports")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:3000", env = "PORTFOLIO_IMPORT_ADDR")]
    addr: String,

    /// Taxonomy snapshot (.json registry or .db SQLite)
    #[arg(short, long, env = "PORTFOLIO_IMPORT_TAXONOMY")]
    taxonomy: PathBuf,

    /// Import configuration (JSON)
    #[arg(short, long, env = "PORTFOLIO_IMPORT_CONFIG")]
    config: Option<PathBuf>,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    importer: Arc<PortfolioImporter>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Body of POST /api/import
#[derive(Deserialize)]
struct ImportRequest {
    workbook: Workbook,
    #[serde(rename = "type", default)]
    product_type: ProductType,
}

fn list_response(
    what: &str,
    result: Result<Vec<String>, portfolio_import::TaxonomyError>,
) -> Response {
    match result {
        Ok(values) => (StatusCode::OK, Json(ApiResponse::ok(values))).into_response(),
        Err(e) => {
            error!("Error listing {}: {}", what, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::<Vec<String>>::err(e.to_string())),
            )
                .into_response()
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/import - Normalize a decoded workbook
async fn import_workbook(State(state): State<AppState>, Json(request): Json<ImportRequest>) -> Response {
    let importer = state.importer.clone();

    // Import is synchronous and may hit SQLite
    let outcome = tokio::task::spawn_blocking(move || importer.import(&request.workbook, request.product_type)).await;

    match outcome {
        Ok(Ok(result)) => (StatusCode::OK, Json(ApiResponse::ok(result))).into_response(),
        Ok(Err(e @ ImportError::InvalidWorkbook(_))) => {
            warn!("Rejected workbook: {}", e);
            (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::err(e.to_string()))).into_response()
        }
        Ok(Err(e)) => {
            error!("Import failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::err(e.to_string())),
            )
                .into_response()
        }
        Err(e) => {
            error!("Import task panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::err("import task failed")),
            )
                .into_response()
        }
    }
}

/// GET /api/taxonomy/categories
async fn get_categories(State(state): State<AppState>) -> Response {
    list_response("categories", state.importer.taxonomy().get_all_categories())
}

/// GET /api/taxonomy/companies
async fn get_companies(State(state): State<AppState>) -> Response {
    list_response("companies", state.importer.taxonomy().get_all_companies())
}

/// GET /api/taxonomy/subcategories/:category/:company
async fn get_sub_categories(
    State(state): State<AppState>,
    Path((category, company)): Path<(String, String)>,
) -> Response {
    // Decode URL-encoded Hebrew path segments
    let category = urlencoding::decode(&category)
        .unwrap_or_else(|_| category.clone().into())
        .into_owned();
    let company = urlencoding::decode(&company)
        .unwrap_or_else(|_| company.clone().into())
        .into_owned();

    list_response(
        "sub-categories",
        state
            .importer
            .taxonomy()
            .get_sub_categories_for_category_and_company(&category, &company),
    )
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/import", post(import_workbook))
        .route("/taxonomy/categories", get(get_categories))
        .route("/taxonomy/companies", get(get_companies))
        .route(
            "/taxonomy/subcategories/:category/:company",
            get(get_sub_categories),
        )
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portfolio_import=info,portfolio_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ImportConfig::from_file(path)?,
        None => ImportConfig::default(),
    };
    let taxonomy: Arc<dyn TaxonomySource> = open_taxonomy(&args.taxonomy)?;
    info!("✓ Taxonomy opened: {}", args.taxonomy.display());

    let state = AppState {
        importer: Arc::new(PortfolioImporter::with_config(taxonomy, config)),
    };

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    info!("🚀 Server running on http://{}", args.addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
