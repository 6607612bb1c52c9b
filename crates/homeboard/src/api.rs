use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::dashboard::Dashboard;
use crate::dashboard::DashboardError;
use crate::mapping::MappingError;

/// Dashboard shared between the API handlers and the background sync
pub type SharedDashboard = Arc<Mutex<Dashboard>>;

/// Response for the /v1/ping endpoint
#[derive(Serialize)]
struct PingResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

#[derive(Serialize)]
struct ToggleResponse {
    entity_id: String,
    is_on: bool,
}

#[derive(Debug, Deserialize)]
struct BrightnessRequest {
    brightness_pct: u8,
}

#[derive(Serialize)]
struct ImportResponse {
    rooms: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    version: &'static str,
    dashboard: SharedDashboard,
}

/// Error half of every handler, rendered as `{error}` with a matching status
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        let status = match &err {
            DashboardError::UnknownLight(_) | DashboardError::UnknownRoom(_) => {
                StatusCode::NOT_FOUND
            }
            DashboardError::Hub(_) => StatusCode::BAD_GATEWAY,
            DashboardError::Mapping(e) => return e.into(),
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<&MappingError> for ApiError {
    fn from(err: &MappingError) -> Self {
        let status = match err {
            MappingError::InvalidImport(_)
            | MappingError::UnsupportedVersion { .. }
            | MappingError::EmptyRoomName
            | MappingError::DuplicateRoom(_) => StatusCode::BAD_REQUEST,
            MappingError::RoomNotFound(_) | MappingError::EntityNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            MappingError::Encode(_) | MappingError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!("Request failed: {}", self.message);
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(PingResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
        }),
    )
}

#[tracing::instrument(skip(state))]
async fn list_rooms(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dashboard = state.dashboard.lock().await;
    Json(dashboard.rooms().to_vec())
}

#[tracing::instrument(skip(state))]
async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let dashboard = state.dashboard.lock().await;
    let room = dashboard
        .room(&room_id)
        .ok_or_else(|| ApiError::not_found(format!("no room '{}'", room_id)))?;
    Ok(Json(room.clone()))
}

#[tracing::instrument(skip(state))]
async fn unmapped_entities(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dashboard = state.dashboard.lock().await;
    let unmapped: Vec<_> = dashboard
        .mapper()
        .unmapped_entities()
        .into_iter()
        .cloned()
        .collect();
    Json(unmapped)
}

#[tracing::instrument(skip(state))]
async fn toggle_light(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut dashboard = state.dashboard.lock().await;
    let is_on = dashboard.toggle_light(&entity_id).await?;
    Ok(Json(ToggleResponse { entity_id, is_on }))
}

#[tracing::instrument(skip(state))]
async fn set_brightness(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    Json(body): Json<BrightnessRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut dashboard = state.dashboard.lock().await;
    dashboard
        .set_brightness(&entity_id, body.brightness_pct)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state))]
async fn export_mapping(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dashboard = state.dashboard.lock().await;
    Json(dashboard.mapper().export_document(Utc::now()))
}

#[tracing::instrument(skip(state, body))]
async fn import_mapping(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let mut dashboard = state.dashboard.lock().await;
    let rooms = dashboard
        .mapper_mut()
        .import_configuration(&body)
        .map_err(|e| ApiError::from(&e))?;
    dashboard.rebuild();
    Ok(Json(ImportResponse { rooms }))
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/rooms", get(list_rooms))
        .route("/v1/rooms/:room_id", get(get_room))
        .route("/v1/entities/unmapped", get(unmapped_entities))
        .route("/v1/lights/:entity_id/toggle", post(toggle_light))
        .route("/v1/lights/:entity_id/brightness", put(set_brightness))
        .route("/v1/mapping", get(export_mapping).post(import_mapping))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves the API until `shutdown_rx` fires.
pub async fn serve(
    listen: String,
    port: u16,
    dashboard: SharedDashboard,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, dashboard });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Method;
    use axum::http::Request;
    use serde_json::json;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::entity::EntityState;
    use crate::hub::MockHub;
    use crate::mapping::EntityMapper;
    use crate::storage::MemoryStorage;
    use crate::storage::Storage;

    async fn app(hub: Arc<MockHub>) -> Router {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mapper = EntityMapper::load(storage).unwrap();
        let mut dashboard = Dashboard::new(hub, mapper);
        dashboard.refresh().await.unwrap();

        let mapper = dashboard.mapper_mut();
        mapper.add_room("Kitchen", "🍳").unwrap();
        mapper
            .map_entity_to_room("light.kitchen_island", "kitchen")
            .unwrap();
        dashboard.rebuild();

        create_router(Arc::new(AppState {
            version: "test",
            dashboard: Arc::new(Mutex::new(dashboard)),
        }))
    }

    fn hub() -> Arc<MockHub> {
        Arc::new(MockHub::new(vec![
            EntityState::new("light.kitchen_island", "off")
                .with_attribute("friendly_name", "Island")
                .with_attribute("brightness", 128),
            EntityState::new("light.porch", "on"),
        ]))
    }

    async fn send(app: Router, method: Method, uri: &str, body: Body) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        send(app, Method::GET, uri, Body::empty()).await
    }

    #[tokio::test]
    async fn test_ping_and_info() {
        let app = app(hub()).await;

        let (status, body) = get(app.clone(), "/v1/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));

        let (status, body) = get(app, "/v1/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "test");
        assert!(body["hostname"].is_string());
    }

    #[tokio::test]
    async fn test_rooms() {
        let app = app(hub()).await;

        let (status, body) = get(app.clone(), "/v1/rooms").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = get(app.clone(), "/v1/rooms/kitchen").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "id": "kitchen",
                "name": "Kitchen",
                "icon": "🍳",
                "has_active_devices": false,
                "lights": [{
                    "id": "light.kitchen_island",
                    "name": "Island",
                    "is_on": false,
                    "brightness": 50
                }]
            })
        );

        let (status, body) = get(app, "/v1/rooms/attic").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no room 'attic'");
    }

    #[tokio::test]
    async fn test_unmapped_entities() {
        let (status, body) = get(app(hub()).await, "/v1/entities/unmapped").await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["entity_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["light.porch"]);
    }

    #[tokio::test]
    async fn test_toggle_light() {
        let hub = hub();
        let app = app(hub.clone()).await;

        let (status, body) = send(
            app.clone(),
            Method::POST,
            "/v1/lights/light.kitchen_island/toggle",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"entity_id": "light.kitchen_island", "is_on": true}));
        assert_eq!(hub.calls().len(), 1);

        let (_, room) = get(app, "/v1/rooms/kitchen").await;
        assert_eq!(room["has_active_devices"], true);
    }

    #[tokio::test]
    async fn test_toggle_unknown_light_is_404() {
        let (status, _) = send(
            app(hub()).await,
            Method::POST,
            "/v1/lights/light.nowhere/toggle",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_toggle_hub_failure_is_502() {
        let hub = hub();
        let app = app(hub.clone()).await;
        hub.fail_requests(true);

        let (status, body) = send(
            app.clone(),
            Method::POST,
            "/v1/lights/light.kitchen_island/toggle",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("503"));

        let (_, room) = get(app, "/v1/rooms/kitchen").await;
        assert_eq!(room["lights"][0]["is_on"], false);
    }

    #[tokio::test]
    async fn test_set_brightness() {
        let hub = hub();
        let app = app(hub.clone()).await;

        let (status, _) = send(
            app.clone(),
            Method::PUT,
            "/v1/lights/light.kitchen_island/brightness",
            Body::from(r#"{"brightness_pct": 75}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        // The light is off, so only the local value changes
        assert!(hub.calls().is_empty());

        let (_, room) = get(app, "/v1/rooms/kitchen").await;
        assert_eq!(room["lights"][0]["brightness"], 75);
    }

    #[tokio::test]
    async fn test_mapping_export_and_import() {
        let app = app(hub()).await;

        let (status, exported) = get(app.clone(), "/v1/mapping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(exported["version"], 1);
        assert_eq!(exported["mappings"], json!({"kitchen": ["light.kitchen_island"]}));

        let document = json!({
            "version": 1,
            "rooms": [{"id": "porch", "name": "Porch", "icon": "🚪", "entities": []}],
            "mappings": {"porch": ["light.porch"]}
        });
        let (status, body) = send(
            app.clone(),
            Method::POST,
            "/v1/mapping",
            Body::from(document.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"rooms": 1}));

        let (status, room) = get(app.clone(), "/v1/rooms/porch").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(room["lights"][0]["id"], "light.porch");
        let (status, _) = get(app, "/v1/rooms/kitchen").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_import_is_400() {
        let app = app(hub()).await;

        let (status, body) = send(
            app.clone(),
            Method::POST,
            "/v1/mapping",
            Body::from(r#"{"rooms": []}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("invalid configuration"));

        let (_, rooms) = get(app, "/v1/rooms").await;
        assert_eq!(rooms.as_array().unwrap().len(), 1);
    }
}
