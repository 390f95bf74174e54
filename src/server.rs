use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::aggregate::{employee_summaries, project_aggregates};
use crate::cache::SnapshotCache;
use crate::entity::{form_from_json, EntityKind};
use crate::error::{StoreError, ValidationErrors};
use crate::models::{Charts, EmployeeSummary, Entity, ProjectAggregate};
use crate::report::build_charts;

#[derive(Clone)]
pub struct AppState {
    cache: Arc<SnapshotCache>,
}

impl AppState {
    pub fn new(cache: Arc<SnapshotCache>) -> Self {
        Self { cache }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self { data })
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Deleted {
    pub id: i64,
    pub cascaded_activities: u64,
}

#[derive(Debug, Serialize)]
pub struct Stats {
    pub projects: Vec<ProjectAggregate>,
    pub employees: Vec<EmployeeSummary>,
}

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationErrors),
    Store(StoreError),
    /// The request never reached a handler: bad JSON, wrong content type, bad path.
    Rejected { status: StatusCode, message: String },
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::Validation(errors)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::MissingReference { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Rejected { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(errors) => json!({
                "error": "validation failed",
                "fields": errors,
            }),
            ApiError::Store(StoreError::Database(err)) => {
                error!(%err, "record store request failed");
                json!({ "error": "database error" })
            }
            ApiError::Store(err) => json!({ "error": err.to_string() }),
            ApiError::Rejected { message, .. } => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

pub async fn list_entities(
    state: AppState,
    kind: EntityKind,
) -> Result<Json<ApiResponse<Vec<Entity>>>, ApiError> {
    let snapshot = state.cache.snapshot().await?;
    Ok(ApiResponse::success(snapshot.entities(kind)))
}

pub async fn create_entity(
    state: AppState,
    kind: EntityKind,
    body: Value,
) -> Result<Json<ApiResponse<Entity>>, ApiError> {
    let input = kind.parse_form(&form_from_json(&body)?)?;
    let entity = state.cache.create(&input).await?;
    info!(%kind, id = entity.id(), "created via api");
    Ok(ApiResponse::success(entity))
}

pub async fn update_entity(
    state: AppState,
    kind: EntityKind,
    id: i64,
    body: Value,
) -> Result<Json<ApiResponse<Entity>>, ApiError> {
    let input = kind.parse_form(&form_from_json(&body)?)?;
    let entity = state.cache.update(id, &input).await?;
    info!(%kind, id, "updated via api");
    Ok(ApiResponse::success(entity))
}

pub async fn delete_entity(
    state: AppState,
    kind: EntityKind,
    id: i64,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    let cascaded_activities = state.cache.delete(kind, id).await?;
    info!(%kind, id, cascaded_activities, "deleted via api");
    Ok(ApiResponse::success(Deleted {
        id,
        cascaded_activities,
    }))
}

/// GET /api/charts
pub async fn charts(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Charts>>, ApiError> {
    let snapshot = state.cache.snapshot().await?;
    Ok(ApiResponse::success(build_charts(&snapshot)))
}

/// GET /api/stats
pub async fn stats(State(state): State<AppState>) -> Result<Json<ApiResponse<Stats>>, ApiError> {
    let snapshot = state.cache.snapshot().await?;
    Ok(ApiResponse::success(Stats {
        projects: project_aggregates(&snapshot.projects, &snapshot.activities, &snapshot.employees),
        employees: employee_summaries(&snapshot.employees, &snapshot.activities),
    }))
}

type JsonBody = Result<Json<Value>, JsonRejection>;
type IdParam = Result<Path<i64>, PathRejection>;

fn entity_routes(kind: EntityKind) -> Router<AppState> {
    Router::new()
        .route(
            kind.endpoint(),
            get(move |State(state): State<AppState>| list_entities(state, kind)).post(
                move |State(state): State<AppState>, body: JsonBody| async move {
                    let Json(body) = body?;
                    create_entity(state, kind, body).await
                },
            ),
        )
        .route(
            &format!("{}/{{id}}", kind.endpoint()),
            axum::routing::put(
                move |State(state): State<AppState>, id: IdParam, body: JsonBody| async move {
                    let Path(id) = id?;
                    let Json(body) = body?;
                    update_entity(state, kind, id, body).await
                },
            )
            .delete(move |State(state): State<AppState>, id: IdParam| async move {
                let Path(id) = id?;
                delete_entity(state, kind, id).await
            }),
        )
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/charts", get(charts))
        .route("/api/stats", get(stats));
    for kind in EntityKind::ALL {
        router = router.merge(entity_routes(kind));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "dashboard api listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::seed;
    use crate::store::MemoryStore;

    async fn seeded_state() -> AppState {
        let cache = Arc::new(SnapshotCache::new(Arc::new(MemoryStore::new())));
        seed(&cache).await.unwrap();
        AppState::new(cache)
    }

    #[tokio::test]
    async fn create_rejects_invalid_body_with_field_messages() {
        let state = seeded_state().await;
        let body = json!({ "name": "", "email": "nope", "team": "Ops", "hourly_rate": 10 });

        let err = create_entity(state, EntityKind::Employee, body)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        match err {
            ApiError::Validation(errors) => {
                assert_eq!(errors.get("name"), Some("Name is required"));
                assert_eq!(errors.get("email"), Some("Invalid email address"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_then_list_returns_new_record() {
        let state = seeded_state().await;
        let body = json!({
            "name": "Rin Sato",
            "email": "rin.sato@example.com",
            "team": "Data",
            "hourly_rate": "61.25"
        });

        let Json(created) = create_entity(state.clone(), EntityKind::Employee, body)
            .await
            .unwrap();
        let Json(listed) = list_entities(state, EntityKind::Employee).await.unwrap();
        assert_eq!(listed.data.len(), 4);
        assert!(listed.data.contains(&created.data));
    }

    #[tokio::test]
    async fn activity_with_unknown_project_is_a_bad_request() {
        let state = seeded_state().await;
        let body = json!({
            "date": "2026-03-02",
            "description": "Orphan",
            "kind": "development",
            "minutes": 30,
            "employee_id": 1,
            "project_id": 999
        });

        let err = create_entity(state, EntityKind::Activity, body)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn deleting_project_reports_cascade_and_updates_charts() {
        let state = seeded_state().await;

        let Json(deleted) = delete_entity(state.clone(), EntityKind::Project, 1)
            .await
            .unwrap();
        assert_eq!(
            deleted.data,
            Deleted {
                id: 1,
                cascaded_activities: 3
            }
        );

        let Json(activities) = list_entities(state.clone(), EntityKind::Activity)
            .await
            .unwrap();
        assert_eq!(activities.data.len(), 3);

        let Json(chart_set) = charts(State(state)).await.unwrap();
        let names: Vec<&str> = chart_set
            .data
            .project_costs
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Borealis Portal"]);
    }

    #[tokio::test]
    async fn update_and_delete_of_missing_record_are_not_found() {
        let state = seeded_state().await;
        let body = json!({
            "name": "Ghost",
            "company": "Nowhere",
            "budget": 1,
            "start_date": "2026-01-01",
            "end_date": "2026-01-02"
        });

        let err = update_entity(state.clone(), EntityKind::Project, 77, body)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = delete_entity(state, EntityKind::Employee, 77)
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stats_cover_every_record() {
        let state = seeded_state().await;
        let Json(summary) = stats(State(state)).await.unwrap();
        assert_eq!(summary.data.projects.len(), 2);
        assert_eq!(summary.data.employees.len(), 3);
        let activity_total: usize = summary.data.projects.iter().map(|p| p.activity_count).sum();
        assert_eq!(activity_total, 6);
    }

    async fn rejected_body(request: axum::http::Request<axum::body::Body>) -> (StatusCode, Value) {
        use axum::extract::FromRequest;

        let rejection = Json::<Value>::from_request(request, &()).await.unwrap_err();
        let response = ApiError::from(rejection).into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn malformed_json_body_keeps_the_error_envelope() {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/employees")
            .header(axum::http::header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();

        let (status, body) = rejected_body(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("JSON"));
    }

    #[tokio::test]
    async fn body_without_json_content_type_keeps_the_error_envelope() {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/employees")
            .body(axum::body::Body::from(r#"{"name":"Rin"}"#))
            .unwrap();

        let (status, body) = rejected_body(request).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["error"].is_string());
    }

    #[test]
    fn router_builds_for_every_kind() {
        let cache = Arc::new(SnapshotCache::new(Arc::new(MemoryStore::new())));
        let _ = router(AppState::new(cache));
    }
}
