// SPDX-License-Identifier: GPL-3.0-only
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::cluster::grid::cluster_handles;
use crate::cluster::{Cluster, Gesture};
use crate::controller::{ControllerEvent, Mode, Outcome};
use crate::error::SessionError;
use crate::registry::models::{Coordinate, Marker, MarkerId};
use crate::session::{SessionCommand, SessionHandle, SessionView};

/// Optional coordinate from the UI shell; a click the widget could not
/// resolve arrives with `lat`/`lng` missing.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PointRequest {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl PointRequest {
    pub fn coordinate(&self) -> Option<Coordinate> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinate::new(lat, lng)),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetModeRequest {
    pub mode: Mode,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClustersQuery {
    pub zoom: Option<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

pub type ApiRejection = (StatusCode, Json<ApiResponse<()>>);
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiRejection>;

fn reject(err: SessionError) -> ApiRejection {
    let status = match err {
        SessionError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SessionError::Stopped => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiResponse::<()>::error(err.to_string())))
}

pub struct ApiHandlers {
    session: SessionHandle,
}

impl ApiHandlers {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    async fn run(&self, command: SessionCommand) -> ApiResult<Outcome> {
        match self.session.dispatch(command).await {
            Ok(outcome) => Ok(Json(ApiResponse::success(outcome))),
            Err(e) => {
                warn!(error = %e, "Session command rejected");
                Err(reject(e))
            }
        }
    }

    /// Current view, unless the map failed to load
    fn ready_view(&self) -> Result<SessionView, ApiRejection> {
        let view = self.session.view();
        if let crate::session::SessionStatus::Failed(reason) = &view.status {
            return Err(reject(SessionError::Unavailable(reason.clone())));
        }
        Ok(view)
    }
}

impl ApiHandlers {
    pub async fn health() -> Json<ApiResponse<&'static str>> {
        Json(ApiResponse::success("ok"))
    }

    /// Always answers so the shell can render a failed map
    pub async fn view(&self) -> Json<ApiResponse<SessionView>> {
        Json(ApiResponse::success(self.session.view()))
    }

    pub async fn list_markers(&self) -> ApiResult<Vec<Marker>> {
        let view = self.ready_view()?;
        Ok(Json(ApiResponse::success(view.markers)))
    }

    pub async fn clusters(&self, Query(query): Query<ClustersQuery>) -> ApiResult<Vec<Cluster>> {
        let view = self.ready_view()?;
        let zoom = query.zoom.unwrap_or(view.zoom);
        Ok(Json(ApiResponse::success(cluster_handles(&view.handles, zoom, view.grid))))
    }

    pub async fn toggle_mode(&self) -> ApiResult<Outcome> {
        self.run(SessionCommand::Event(ControllerEvent::ToggleMode)).await
    }

    pub async fn set_mode(&self, Json(request): Json<SetModeRequest>) -> ApiResult<Outcome> {
        self.run(SessionCommand::Event(ControllerEvent::SetMode(request.mode))).await
    }

    pub async fn map_click(&self, Json(request): Json<PointRequest>) -> ApiResult<Outcome> {
        self.run(SessionCommand::Event(ControllerEvent::MapClick(request.coordinate()))).await
    }

    pub async fn marker_click(&self, Path(id): Path<MarkerId>) -> ApiResult<Outcome> {
        self.run(SessionCommand::Gesture {
            marker_id: id,
            gesture: Gesture::Click,
        })
        .await
    }

    pub async fn marker_drag_end(
        &self,
        Path(id): Path<MarkerId>,
        Json(request): Json<PointRequest>,
    ) -> ApiResult<Outcome> {
        self.run(SessionCommand::Gesture {
            marker_id: id,
            gesture: Gesture::DragEnd {
                position: request.coordinate(),
            },
        })
        .await
    }

    pub async fn clear_all(&self) -> ApiResult<Outcome> {
        info!("Clear all markers requested");
        let result = self.run(SessionCommand::Event(ControllerEvent::ClearAll)).await;
        if result.is_err() {
            error!("Failed to clear markers");
        }
        result
    }
}
