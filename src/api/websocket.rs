// SPDX-License-Identifier: GPL-3.0-only
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Path;
use axum::Json;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::api::handlers::{ApiHandlers, ApiResult, PointRequest, SetModeRequest};
use crate::controller::Mode;
use crate::registry::models::MarkerId;
use crate::session::SessionView;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum WsMessage {
    MapClick { lat: Option<f64>, lng: Option<f64> },
    MarkerClick { id: MarkerId },
    MarkerDragEnd { id: MarkerId, lat: Option<f64>, lng: Option<f64> },
    ToggleMode,
    SetMode { mode: Mode },
    ClearAll,
    GetView,
}

#[derive(Debug, Serialize, Deserialize)]
struct WsResponse {
    success: bool,
    data: Option<serde_json::Value>,
    error: Option<String>,
}

impl WsResponse {
    fn from_api<T: Serialize>(result: ApiResult<T>) -> Self {
        match result {
            Ok(Json(response)) => match response.data.map(serde_json::to_value).transpose() {
                Ok(data) => WsResponse {
                    success: response.success,
                    data,
                    error: response.error,
                },
                Err(e) => {
                    error!(error = %e, "Failed to encode WebSocket reply");
                    WsResponse {
                        success: false,
                        data: None,
                        error: Some(format!("Failed to encode response: {}", e)),
                    }
                }
            },
            Err((_, Json(response))) => WsResponse {
                success: false,
                data: None,
                error: response.error,
            },
        }
    }
}

/// Server-initiated messages
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum WsPush {
    View(SessionView),
}

pub struct WebSocketServer {
    handlers: Arc<ApiHandlers>,
}

impl WebSocketServer {
    pub fn new(handlers: Arc<ApiHandlers>) -> Self {
        Self { handlers }
    }

    pub fn router(&self) -> Router {
        let handlers = self.handlers.clone();
        Router::new().route(
            "/ws",
            get(move |ws: WebSocketUpgrade| async move {
                ws.on_upgrade(move |socket| handle_socket(socket, handlers))
            }),
        )
    }
}

async fn handle_socket(socket: WebSocket, handlers: Arc<ApiHandlers>) {
    let connection_id = Uuid::new_v4();
    info!(connection_id = %connection_id, "WebSocket connection opened");

    let (sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut send_task = tokio::spawn(async move {
        let mut sender = sender;
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sender.send(msg).await {
                error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    let mut views = handlers.session().subscribe_view();
    let view_tx = tx.clone();
    let mut view_task = tokio::spawn(async move {
        loop {
            let view = views.borrow_and_update().clone();
            if push_view(view, &view_tx).is_err() {
                break;
            }
            if views.changed().await.is_err() {
                debug!("Session view channel closed");
                break;
            }
        }
    });

    let handlers_clone = handlers.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = handle_message(text, &handlers_clone, &tx).await {
                        error!(error = %e, "Failed to handle WebSocket message");
                    }
                }
                Message::Close(_) => {
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
            view_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
            view_task.abort();
        }
        _ = (&mut view_task) => {
            send_task.abort();
            recv_task.abort();
        }
    };

    info!(connection_id = %connection_id, "WebSocket connection closed");
}

fn push_view(view: SessionView, tx: &mpsc::UnboundedSender<Message>) -> anyhow::Result<()> {
    let text = serde_json::to_string(&WsPush::View(view))?;
    tx.send(Message::Text(text))?;
    Ok(())
}

async fn handle_message(
    text: String,
    handlers: &ApiHandlers,
    tx: &mpsc::UnboundedSender<Message>,
) -> anyhow::Result<()> {
    let msg: WsMessage = match serde_json::from_str(&text) {
        Ok(m) => m,
        Err(e) => {
            let response = WsResponse {
                success: false,
                data: None,
                error: Some(format!("Invalid message format: {}", e)),
            };
            tx.send(Message::Text(serde_json::to_string(&response)?))?;
            return Ok(());
        }
    };

    let response = match msg {
        WsMessage::MapClick { lat, lng } => {
            WsResponse::from_api(handlers.map_click(Json(PointRequest { lat, lng })).await)
        }
        WsMessage::MarkerClick { id } => WsResponse::from_api(handlers.marker_click(Path(id)).await),
        WsMessage::MarkerDragEnd { id, lat, lng } => WsResponse::from_api(
            handlers
                .marker_drag_end(Path(id), Json(PointRequest { lat, lng }))
                .await,
        ),
        WsMessage::ToggleMode => WsResponse::from_api(handlers.toggle_mode().await),
        WsMessage::SetMode { mode } => WsResponse::from_api(
            handlers
                .set_mode(Json(SetModeRequest { mode }))
                .await,
        ),
        WsMessage::ClearAll => WsResponse::from_api(handlers.clear_all().await),
        WsMessage::GetView => {
            let Json(response) = handlers.view().await;
            WsResponse::from_api(Ok(Json(response)))
        }
    };

    tx.send(Message::Text(serde_json::to_string(&response)?))?;
    Ok(())
}
