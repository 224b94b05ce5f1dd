use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::app::AppState;
use crate::auth::models::{PAGE_EDITOR_ROLES, SYNC_ROLES};
use crate::error::AppError;
use crate::models::page::{PageDocument, PageSlug};
use crate::sync::engine::{apply_page, resolve_page, sync_all_pages, SyncReport};

/// Success envelope shared by the page endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

/// Request body for `POST /seo/pages/{slug}`.
#[derive(Debug, Deserialize)]
pub struct SavePageRequest {
    #[serde(default)]
    pub data: Option<Value>,
}

/// `GET /seo/pages/{slug}`: the resolved document, seeding stores as needed.
pub async fn get_page_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<PageDocument>>, AppError> {
    state.authorizer.authorize(&headers, PAGE_EDITOR_ROLES).await?;
    let slug: PageSlug = slug.parse()?;

    let resolved = resolve_page(
        state.page_repo.as_ref(),
        state.mirror.as_ref(),
        slug,
        Utc::now(),
    )
    .await?;

    Ok(Json(ApiResponse::new(resolved.document)))
}

/// `POST /seo/pages/{slug}`: save an admin edit.
pub async fn save_page_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(slug): Path<String>,
    payload: Result<Json<SavePageRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<PageDocument>>, AppError> {
    let user = state.authorizer.authorize(&headers, PAGE_EDITOR_ROLES).await?;
    let slug: PageSlug = slug.parse()?;

    let Json(request) =
        payload.map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e.body_text())))?;
    let data = request
        .data
        .filter(Value::is_object)
        .ok_or_else(|| AppError::BadRequest("Field `data` must be an object".into()))?;

    let saved = apply_page(
        state.page_repo.as_ref(),
        state.mirror.as_ref(),
        slug,
        data,
        Utc::now(),
    )
    .await?;

    tracing::info!("Page '{}' saved by '{}'", slug, user.user_id);
    Ok(Json(ApiResponse::new(saved)))
}

/// `POST /seo/sync`: reconcile every page, subject to the sweep throttle.
pub async fn sync_pages_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<SyncReport>>, AppError> {
    state.authorizer.authorize(&headers, SYNC_ROLES).await?;

    let report = sync_all_pages(
        state.page_repo.as_ref(),
        state.mirror.as_ref(),
        &state.sync_throttle,
        Utc::now(),
    )
    .await;

    Ok(Json(ApiResponse::new(report)))
}

/// Routes for the page endpoints. Every response, errors included, is marked
/// uncacheable.
pub fn pages_router() -> Router<AppState> {
    Router::new()
        .route(
            "/seo/pages/{slug}",
            get(get_page_handler).post(save_page_handler),
        )
        .route("/seo/sync", post(sync_pages_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::PRAGMA,
                    HeaderValue::from_static("no-cache"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::EXPIRES,
                    HeaderValue::from_static("0"),
                )),
        )
}
