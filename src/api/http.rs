// SPDX-License-Identifier: GPL-3.0-only
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::api::handlers::{
    ApiHandlers, ApiResponse, ApiResult, ClustersQuery, PointRequest, SetModeRequest,
};
use crate::api::websocket::WebSocketServer;
use crate::cluster::Cluster;
use crate::controller::Outcome;
use crate::registry::models::{Marker, MarkerId};
use crate::session::{SessionHandle, SessionView};

pub struct HttpServer {
    handlers: Arc<ApiHandlers>,
    addr: SocketAddr,
}

impl HttpServer {
    pub fn new(session: SessionHandle, addr: SocketAddr) -> Self {
        Self {
            handlers: Arc::new(ApiHandlers::new(session)),
            addr,
        }
    }

    /// REST routes plus the `/ws` endpoint
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/api/health", get(health_handler))
            .route("/api/view", get(view_handler))
            .route("/api/markers", get(list_markers_handler).delete(clear_all_handler))
            .route("/api/clusters", get(clusters_handler))
            .route("/api/mode/toggle", post(toggle_mode_handler))
            .route("/api/mode", put(set_mode_handler))
            .route("/api/map/click", post(map_click_handler))
            .route("/api/markers/:id/click", post(marker_click_handler))
            .route("/api/markers/:id/dragend", post(marker_drag_end_handler))
            .with_state(self.handlers.clone());

        api.merge(WebSocketServer::new(self.handlers.clone()).router())
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let app = self.router();

        info!(addr = %self.addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

async fn health_handler() -> Json<ApiResponse<&'static str>> {
    ApiHandlers::health().await
}

async fn view_handler(State(handlers): State<Arc<ApiHandlers>>) -> Json<ApiResponse<SessionView>> {
    handlers.view().await
}

async fn list_markers_handler(State(handlers): State<Arc<ApiHandlers>>) -> ApiResult<Vec<Marker>> {
    handlers.list_markers().await
}

async fn clusters_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    query: Query<ClustersQuery>,
) -> ApiResult<Vec<Cluster>> {
    handlers.clusters(query).await
}

async fn toggle_mode_handler(State(handlers): State<Arc<ApiHandlers>>) -> ApiResult<Outcome> {
    handlers.toggle_mode().await
}

async fn set_mode_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(request): Json<SetModeRequest>,
) -> ApiResult<Outcome> {
    handlers.set_mode(Json(request)).await
}

async fn map_click_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Json(request): Json<PointRequest>,
) -> ApiResult<Outcome> {
    handlers.map_click(Json(request)).await
}

async fn marker_click_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(id): Path<MarkerId>,
) -> ApiResult<Outcome> {
    handlers.marker_click(Path(id)).await
}

async fn marker_drag_end_handler(
    State(handlers): State<Arc<ApiHandlers>>,
    Path(id): Path<MarkerId>,
    Json(request): Json<PointRequest>,
) -> ApiResult<Outcome> {
    handlers.marker_drag_end(Path(id), Json(request)).await
}

async fn clear_all_handler(State(handlers): State<Arc<ApiHandlers>>) -> ApiResult<Outcome> {
    handlers.clear_all().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SessionStatus};
    use crate::store::MemoryStore;
    use crate::test_helpers::{create_test_config, test_settings, wait_for_view};

    #[tokio::test]
    async fn test_serves_over_tcp() {
        let session = Session::start(Arc::new(MemoryStore::new()), test_settings()).await;
        wait_for_view(&session.handle(), |v| v.status == SessionStatus::Ready).await;

        let listener = tokio::net::TcpListener::bind(create_test_config().local_api_bind)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let app = HttpServer::new(session.handle(), addr).router();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::new();
        let base = format!("http://{}", addr);

        let health: serde_json::Value = client
            .get(format!("{}/api/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health, serde_json::json!({ "success": true, "data": "ok", "error": null }));

        let toggled: serde_json::Value = client
            .post(format!("{}/api/mode/toggle", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(toggled["data"], serde_json::json!({ "kind": "mode_changed", "value": "SET_MARKER" }));

        let added: serde_json::Value = client
            .post(format!("{}/api/map/click", base))
            .json(&serde_json::json!({ "lat": 34.1, "lng": -118.3 }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(added["data"]["kind"], "added");
        assert_eq!(added["data"]["value"]["id"], 1);

        let view: serde_json::Value = client
            .get(format!("{}/api/view", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(view["data"]["status"]["state"], "ready");
        assert_eq!(view["data"]["mode"], "SET_MARKER");

        let cleared = client.delete(format!("{}/api/markers", base)).send().await.unwrap();
        assert!(cleared.status().is_success());

        server.abort();
        session.shutdown().await;
    }
}
